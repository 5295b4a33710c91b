use std::sync::Arc;

use tracing::{info, warn};

use super::core_trait::ModelLoader;
use super::handle::{ModelHandle, Placement};
use crate::bootstrap::{Bootstrapper, PackageManager};
use crate::config::ModelSettings;
use crate::error::{Error, Result};

enum LifecycleState {
    Uninitialized,
    Ready(Arc<ModelHandle>),
    Finalized,
}

/// # ModelLifecycle
///
/// Owns the one [`ModelHandle`] of an adapter instance.
///
/// `initialize` runs the dependency bootstrap, prepares the artifact cache,
/// picks a [`Placement`] and asks the loader for a handle. Any failure along
/// the way is returned as is; there is no degraded mode. `finalize` drops the
/// lifecycle's reference to the handle.
pub struct ModelLifecycle<L, P> {
    loader: L,
    bootstrapper: Bootstrapper<P>,
    state: LifecycleState,
}

impl<L, P> ModelLifecycle<L, P>
where
    L: ModelLoader,
    P: PackageManager,
{
    pub fn new(loader: L, bootstrapper: Bootstrapper<P>) -> Self {
        Self {
            loader,
            bootstrapper,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Bring the model up.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyInitialized`] if a handle is already live; it is left untouched
    /// * [`Error::Bootstrap`] if a runtime package could not be installed
    /// * [`Error::Io`] if the cache directory cannot be created
    /// * whatever the loader reports if the model or tokenizer fails to load
    pub async fn initialize(&mut self, settings: &ModelSettings) -> Result<Arc<ModelHandle>> {
        if matches!(self.state, LifecycleState::Ready(_)) {
            return Err(Error::AlreadyInitialized);
        }

        info!(packages = self.bootstrapper.packages().len(), "checking runtime dependencies");
        let report = self.bootstrapper.run().await?;
        info!(
            packages = report.packages.len(),
            install_attempts = report.attempts.len(),
            "runtime dependencies ready"
        );

        tokio::fs::create_dir_all(&settings.cache_dir).await?;

        let placement = Placement::select(self.loader.accelerator_available());
        info!(model_id = %settings.model_id, device = %placement.device, "loading model");

        let handle = Arc::new(self.loader.load(settings, placement).await?);
        info!(device = %handle.device(), "model loaded successfully");

        self.state = LifecycleState::Ready(handle.clone());
        Ok(handle)
    }

    /// The live handle.
    pub fn handle(&self) -> Result<Arc<ModelHandle>> {
        match &self.state {
            LifecycleState::Ready(handle) => Ok(handle.clone()),
            _ => Err(Error::NotInitialized),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LifecycleState::Ready(_))
    }

    /// Release the handle. Safe to call in any state, any number of times.
    pub fn finalize(&mut self) {
        match std::mem::replace(&mut self.state, LifecycleState::Finalized) {
            LifecycleState::Ready(handle) => {
                info!(device = %handle.device(), "cleaning up");
                if Arc::strong_count(&handle) > 1 {
                    warn!("model handle still referenced elsewhere at finalize");
                }
            }
            LifecycleState::Uninitialized | LifecycleState::Finalized => {
                info!("finalize called without a loaded model");
            }
        }
    }
}
