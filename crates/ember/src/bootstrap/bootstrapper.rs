use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::core_trait::{InstallError, PackageManager};
use super::package::{AttemptOutcome, InstallAttempt, PackageSpec, PackageState};

/// How many times to try an install, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(10),
        }
    }
}

/// A package could not be made importable.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("failed to install `{module}` after {attempts} attempts: {source}")]
    Exhausted {
        module: &'static str,
        attempts: u32,
        #[source]
        source: InstallError,
    },
}

/// What a successful bootstrap run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Final state of every package, in list order
    pub packages: Vec<(&'static str, PackageState)>,
    /// Every install attempt that was made, in order
    pub attempts: Vec<InstallAttempt>,
}

impl BootstrapReport {
    /// Number of install attempts made for `module`.
    pub fn attempts_for(&self, module: &str) -> usize {
        self.attempts
            .iter()
            .filter(|attempt| attempt.package.module == module)
            .count()
    }
}

/// # Bootstrapper
///
/// Makes every package in a fixed, ordered list importable before the model
/// is touched.
///
/// Each package walks the [`PackageState`] machine: an `Unchecked` package is
/// checked and becomes `Present`, or moves to `Installing`. A failed install
/// that still has budget left waits out the backoff and tries again. The
/// first package to exhaust its budget stops the run; packages after it are
/// never looked at.
///
/// Running it again is cheap: packages that are already present are no-ops.
pub struct Bootstrapper<P> {
    manager: P,
    packages: Vec<PackageSpec>,
    policy: RetryPolicy,
}

impl<P> Bootstrapper<P>
where
    P: PackageManager,
{
    pub fn new(manager: P, packages: &[PackageSpec]) -> Self {
        Self {
            manager,
            packages: packages.to_vec(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn packages(&self) -> &[PackageSpec] {
        &self.packages
    }

    /// Check, and where needed install, every package in order.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::Exhausted`] for the first package whose installs all
    /// failed, carrying the last installer error.
    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let mut report = BootstrapReport::default();
        for package in &self.packages {
            self.acquire(package, &mut report).await?;
        }
        Ok(report)
    }

    async fn acquire(
        &self,
        package: &PackageSpec,
        report: &mut BootstrapReport,
    ) -> Result<(), BootstrapError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = PackageState::Unchecked;
        let mut last_error = None;

        while !state.is_terminal() {
            state = match state {
                PackageState::Unchecked => {
                    if self.manager.is_present(package).await {
                        info!(module = package.module, "already installed");
                        PackageState::Present
                    } else {
                        info!(module = package.module, requirement = package.requirement, "installing");
                        PackageState::Installing { attempt: 1 }
                    }
                }
                PackageState::Installing { attempt } => {
                    match self.manager.install(package).await {
                        Ok(()) => {
                            info!(module = package.module, attempt, "installed successfully");
                            report.attempts.push(InstallAttempt {
                                package: *package,
                                attempt,
                                outcome: AttemptOutcome::Installed,
                            });
                            PackageState::Present
                        }
                        Err(e) => {
                            report.attempts.push(InstallAttempt {
                                package: *package,
                                attempt,
                                outcome: AttemptOutcome::Failed(e.to_string()),
                            });
                            last_error = Some(e);
                            if attempt < max_attempts {
                                warn!(
                                    module = package.module,
                                    "installation failed, retrying... ({attempt}/{max_attempts})"
                                );
                                tokio::time::sleep(self.policy.backoff).await;
                                PackageState::Installing { attempt: attempt + 1 }
                            } else {
                                error!(
                                    module = package.module,
                                    "failed to install after {max_attempts} attempts"
                                );
                                PackageState::Failed { attempts: attempt }
                            }
                        }
                    }
                }
                terminal => terminal,
            };
        }

        if let PackageState::Failed { attempts } = state {
            let source = last_error
                .take()
                .unwrap_or_else(|| InstallError::Other("no installer error recorded".to_string()));
            return Err(BootstrapError::Exhausted {
                module: package.module,
                attempts,
                source,
            });
        }
        report.packages.push((package.module, state));
        Ok(())
    }
}
