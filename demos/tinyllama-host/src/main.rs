use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ember::prelude::*;

/// Play the host: load the adapter, send it one batch, shut it down.
#[derive(Parser, Debug)]
#[command(name = "tinyllama-host", version, about)]
struct Args {
    /// Prompt to send; repeat the flag to send a batch
    #[arg(short, long, default_value = "Hello")]
    prompt: Vec<String>,

    #[arg(long, default_value_t = 20)]
    max_tokens: i32,

    /// 0 selects greedy decoding
    #[arg(short, long, default_value_t = 0.0)]
    temperature: f32,

    #[arg(long, default_value = ember::config::DEFAULT_MODEL_ID)]
    model_id: String,

    #[arg(long, default_value = ember::config::DEFAULT_CACHE_DIR)]
    cache_dir: String,

    /// `isolate` or `abort_batch`
    #[arg(long, default_value = "isolate")]
    failure_policy: String,

    /// Do not install runtime packages before loading
    #[arg(long)]
    skip_bootstrap: bool,

    /// Interpreter used to check and install runtime packages
    #[arg(long, default_value = "python3")]
    python: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember=info,tinyllama_host=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let packages: &[PackageSpec] = if args.skip_bootstrap { &[] } else { PINNED_PACKAGES };
    let bootstrapper = Bootstrapper::new(PipPackageManager::new(&args.python), packages);
    let mut adapter = Adapter::new(CandleLoader::default(), bootstrapper);

    let model_config = json!({
        "name": "tinyllama",
        "parameters": {
            "model_id": {"string_value": args.model_id},
            "cache_dir": {"string_value": args.cache_dir},
            "failure_policy": {"string_value": args.failure_policy},
        }
    });
    adapter
        .initialize(&model_config.to_string())
        .await
        .context("adapter failed to initialize")?;

    let requests: Vec<InferenceRequest> = args
        .prompt
        .iter()
        .map(|prompt| {
            InferenceRequest::new(vec![
                HostTensor::string(TEXT_INPUT, prompt),
                HostTensor::int32(MAX_TOKENS, args.max_tokens),
                HostTensor::fp32(TEMPERATURE, args.temperature),
            ])
        })
        .collect();
    info!(batch_size = requests.len(), "sending batch");

    let responses = adapter.execute(requests).await?;
    for (prompt, response) in args.prompt.iter().zip(&responses) {
        println!(">>> {prompt}");
        match response.error() {
            Some(error) => println!("!!! {error}"),
            None => {
                let text = response
                    .output_by_name(TEXT_OUTPUT)
                    .context("response has no text output")?
                    .first_str()?;
                println!("{text}");
            }
        }
        println!();
    }

    adapter.finalize();
    Ok(())
}
