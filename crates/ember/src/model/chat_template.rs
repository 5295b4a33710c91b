use minijinja::{context, Environment, ErrorKind};

use super::core_trait::ChatMessage;
use crate::error::{Error, Result};

const TEMPLATE_NAME: &str = "chat";

/// A tokenizer's Jinja chat template, rendered the way HuggingFace renders
/// it: block tags swallow their trailing newline and leading whitespace,
/// `raise_exception` aborts rendering, and the special tokens are in scope.
pub struct ChatTemplate {
    env: Environment<'static>,
    bos_token: String,
    eos_token: String,
}

impl ChatTemplate {
    pub fn new(source: String, bos_token: impl Into<String>, eos_token: impl Into<String>) -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_function("raise_exception", raise_exception);
        env.add_template_owned(TEMPLATE_NAME, source)
            .map_err(|e| Error::Template(format!("invalid template syntax: {e}")))?;

        Ok(Self {
            env,
            bos_token: bos_token.into(),
            eos_token: eos_token.into(),
        })
    }

    pub fn render(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(|e| Error::Template(e.to_string()))?;

        template
            .render(context! {
                messages => messages,
                add_generation_prompt => add_generation_prompt,
                bos_token => self.bos_token.as_str(),
                eos_token => self.eos_token.as_str(),
            })
            .map_err(|e| Error::Template(format!("render error: {e}")))
    }
}

fn raise_exception(message: String) -> std::result::Result<String, minijinja::Error> {
    Err(minijinja::Error::new(ErrorKind::InvalidOperation, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    // As shipped in TinyLlama-1.1B-Chat-v1.0's tokenizer_config.json
    const TINYLLAMA_TEMPLATE: &str = "{% for message in messages %}\n{% if message['role'] == 'user' %}\n{{ '<|user|>\\n' + message['content'] + eos_token }}\n{% elif message['role'] == 'system' %}\n{{ '<|system|>\\n' + message['content'] + eos_token }}\n{% elif message['role'] == 'assistant' %}\n{{ '<|assistant|>\\n'  + message['content'] + eos_token }}\n{% endif %}\n{% if loop.last and add_generation_prompt %}\n{{ '<|assistant|>' }}\n{% endif %}\n{% endfor %}";

    fn tinyllama() -> ChatTemplate {
        ChatTemplate::new(TINYLLAMA_TEMPLATE.to_string(), "<s>", "</s>").unwrap()
    }

    #[test]
    fn test_single_user_turn_with_generation_prompt() {
        let rendered = tinyllama().render(&[ChatMessage::user("Hello")], true).unwrap();
        assert_eq!(rendered, "<|user|>\nHello</s>\n<|assistant|>\n");
    }

    #[test]
    fn test_generation_prompt_is_optional() {
        let rendered = tinyllama().render(&[ChatMessage::user("Hello")], false).unwrap();
        assert_eq!(rendered, "<|user|>\nHello</s>\n");
    }

    #[test]
    fn test_raise_exception_fails_render() {
        let template = ChatTemplate::new(
            "{% if messages[0]['role'] != 'user' %}{{ raise_exception('user first') }}{% endif %}ok".to_string(),
            "",
            "",
        )
        .unwrap();

        assert_eq!(template.render(&[ChatMessage::user("x")], true).unwrap(), "ok");
        let err = template.render(&[ChatMessage::new("assistant", "x")], true).unwrap_err();
        assert!(matches!(err, Error::Template(ref m) if m.contains("user first")));
    }

    #[test]
    fn test_invalid_syntax_is_rejected() {
        assert!(matches!(
            ChatTemplate::new("{% for %}".to_string(), "", ""),
            Err(Error::Template(_))
        ));
    }
}
