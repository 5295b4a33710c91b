//! # Dependency Bootstrap
//!
//! Ensures the runtime packages the adapter depends on are importable before
//! any model is loaded, installing the missing ones.
//!
//! ## Key Components
//!
//! * [`PackageSpec`] - A pinned package, defined once at process scope
//! * [`PackageManager`] - The check/install capability the bootstrapper drives
//! * [`PipPackageManager`] - The default manager, shelling out to the host interpreter
//! * [`Bootstrapper`] - Walks the package list with bounded retries and backoff
//!
//! The bootstrapper decides *when* and *how often* to install; how packages
//! actually get installed belongs to the [`PackageManager`].

mod bootstrapper;
mod core_trait;
mod package;
mod pip;

pub use bootstrapper::{BootstrapError, BootstrapReport, Bootstrapper, RetryPolicy};
pub use core_trait::*;
pub use package::{AttemptOutcome, InstallAttempt, PackageSpec, PackageState, PINNED_PACKAGES};
pub use pip::{PipPackageManager, INSTALL_FLAGS};
