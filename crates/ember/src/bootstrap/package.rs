use std::fmt;

/// A runtime package the adapter needs before it can load a model.
///
/// Specs are `'static` so the full list can live in a `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageSpec {
    /// Name the package is imported by
    pub module: &'static str,
    /// Pinned requirement handed to the installer, e.g. `torch==2.0.1`
    pub requirement: &'static str,
    /// Extra installer flags, such as an alternate package index
    pub extra_args: &'static [&'static str],
}

impl PackageSpec {
    pub const fn new(module: &'static str, requirement: &'static str) -> Self {
        Self {
            module,
            requirement,
            extra_args: &[],
        }
    }

    pub const fn with_args(
        module: &'static str,
        requirement: &'static str,
        extra_args: &'static [&'static str],
    ) -> Self {
        Self {
            module,
            requirement,
            extra_args,
        }
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.module, self.requirement)
    }
}

/// Runtime packages installed into the host environment, in install order.
pub const PINNED_PACKAGES: &[PackageSpec] = &[
    PackageSpec::with_args(
        "torch",
        "torch==2.0.1",
        &["--index-url", "https://download.pytorch.org/whl/cu118"],
    ),
    PackageSpec::new("transformers", "transformers==4.35.2"),
    PackageSpec::new("accelerate", "accelerate==0.25.0"),
    PackageSpec::new("sentencepiece", "sentencepiece==0.1.99"),
];

/// Where a package is in the check-then-acquire sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Unchecked,
    Present,
    /// Install attempt `attempt` (1-based) is about to run
    Installing { attempt: u32 },
    Failed { attempts: u32 },
}

impl PackageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Present | Self::Failed { .. })
    }
}

/// Result of a single install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Installed,
    Failed(String),
}

/// One install attempt, as recorded in a [`BootstrapReport`](super::BootstrapReport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallAttempt {
    pub package: PackageSpec,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_packages_order_and_flags() {
        let modules: Vec<_> = PINNED_PACKAGES.iter().map(|p| p.module).collect();
        assert_eq!(modules, vec!["torch", "transformers", "accelerate", "sentencepiece"]);

        let torch = PINNED_PACKAGES[0];
        assert_eq!(torch.requirement, "torch==2.0.1");
        assert_eq!(torch.extra_args, &["--index-url", "https://download.pytorch.org/whl/cu118"]);
        assert!(PINNED_PACKAGES[1..].iter().all(|p| p.extra_args.is_empty()));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PackageState::Unchecked.is_terminal());
        assert!(!PackageState::Installing { attempt: 2 }.is_terminal());
        assert!(PackageState::Present.is_terminal());
        assert!(PackageState::Failed { attempts: 3 }.is_terminal());
    }
}
