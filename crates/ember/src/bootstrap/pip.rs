use std::ffi::OsString;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::core_trait::{InstallError, PackageManager};
use super::package::PackageSpec;

/// Installer flags appended to every install: no reuse of the local wheel
/// cache, and a network timeout long enough for multi-gigabyte wheels.
pub const INSTALL_FLAGS: &[&str] = &["--no-cache-dir", "--timeout", "1000"];

/// [`PackageManager`] backed by the host environment's interpreter and `pip`.
///
/// Presence is checked with `<python> -c "import <module>"`; installs run
/// `<python> -m pip install <requirement> <extra args> --no-cache-dir --timeout 1000`.
#[derive(Debug, Clone)]
pub struct PipPackageManager {
    python: OsString,
}

impl PipPackageManager {
    pub fn new(python: impl Into<OsString>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Arguments passed to the interpreter for one install of `package`.
    pub fn install_args(package: &PackageSpec) -> Vec<String> {
        ["-m", "pip", "install", package.requirement]
            .into_iter()
            .chain(package.extra_args.iter().copied())
            .chain(INSTALL_FLAGS.iter().copied())
            .map(String::from)
            .collect()
    }

    fn program(&self) -> String {
        self.python.to_string_lossy().into_owned()
    }
}

impl Default for PipPackageManager {
    fn default() -> Self {
        Self::new("python3")
    }
}

#[async_trait]
impl PackageManager for PipPackageManager {
    async fn is_present(&self, package: &PackageSpec) -> bool {
        let status = Command::new(&self.python)
            .arg("-c")
            .arg(format!("import {}", package.module))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(module = package.module, error = %e, "import check could not run");
                false
            }
        }
    }

    async fn install(&self, package: &PackageSpec) -> Result<(), InstallError> {
        let args = Self::install_args(package);
        debug!(program = %self.program(), ?args, "running installer");

        let status = Command::new(&self.python)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| InstallError::Spawn {
                program: self.program(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(InstallError::ExitStatus {
                requirement: package.requirement.to_string(),
                status: status.to_string(),
            })
        }
    }
}
