use async_trait::async_trait;
use thiserror::Error;

use super::package::PackageSpec;

/// Failure of a single install invocation.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("failed to spawn installer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("installer exited with {status} for `{requirement}`")]
    ExitStatus { requirement: String, status: String },

    #[error("{0}")]
    Other(String),
}

/// # PackageManager
///
/// The capability the bootstrapper drives. It answers whether a package can
/// already be imported and runs one install for it.
///
/// The bootstrapper owns the retry and backoff schedule, so an implementation
/// makes exactly one attempt per `install` call. Tests substitute a scripted
/// fake to check retry behavior without spawning processes.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Whether `package` is importable right now.
    async fn is_present(&self, package: &PackageSpec) -> bool;

    /// Run the installer once for `package`.
    async fn install(&self, package: &PackageSpec) -> Result<(), InstallError>;
}
