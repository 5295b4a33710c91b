use tracing::info;

use crate::bootstrap::{Bootstrapper, PINNED_PACKAGES, PackageManager, PipPackageManager};
use crate::config::AdapterConfig;
use crate::error::{Error, Result};
use crate::handler::RequestHandler;
use crate::model::{ModelLifecycle, ModelLoader};
use crate::protocol::{InferenceRequest, InferenceResponse};

/// # Adapter
///
/// The three entry points a host calls: [`initialize`](Adapter::initialize)
/// once, [`execute`](Adapter::execute) for every batch, and
/// [`finalize`](Adapter::finalize) at shutdown.
///
/// `execute` borrows the adapter immutably while `initialize` and `finalize`
/// need it mutably, so lifecycle changes can never overlap a batch.
///
/// # Type Parameters
///
/// * `L` - The [`ModelLoader`] producing the model handle
/// * `P` - The [`PackageManager`] the dependency bootstrap drives
pub struct Adapter<L, P> {
    lifecycle: ModelLifecycle<L, P>,
    handler: Option<RequestHandler>,
    config: Option<AdapterConfig>,
}

impl<L> Adapter<L, PipPackageManager>
where
    L: ModelLoader,
{
    /// An adapter that installs the pinned runtime packages with the host
    /// interpreter's `pip` before loading.
    ///
    /// The packages serve the host's Python runtime, not the candle backend,
    /// and weigh several gigabytes. Hosts that only run candle models should
    /// build the adapter with [`Adapter::new`] and an empty package list.
    pub fn with_pinned_packages(loader: L) -> Self {
        Self::new(
            loader,
            Bootstrapper::new(PipPackageManager::default(), PINNED_PACKAGES),
        )
    }
}

impl<L, P> Adapter<L, P>
where
    L: ModelLoader,
    P: PackageManager,
{
    pub fn new(loader: L, bootstrapper: Bootstrapper<P>) -> Self {
        Self {
            lifecycle: ModelLifecycle::new(loader, bootstrapper),
            handler: None,
            config: None,
        }
    }

    /// Bootstrap dependencies and load the model described by the host's
    /// model config JSON.
    ///
    /// The config is only read. See [`AdapterConfig::from_model_config`] for
    /// the parameters that are recognized.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyInitialized`] if the adapter is already serving
    /// * [`Error::Config`] if the model config cannot be parsed
    /// * any bootstrap or load failure; the adapter stays uninitialized
    pub async fn initialize(&mut self, model_config_json: &str) -> Result<()> {
        if self.handler.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let config = AdapterConfig::from_model_config(model_config_json)?;
        info!(
            name = config.name.as_deref().unwrap_or("<unnamed>"),
            model_id = %config.model.model_id,
            failure_policy = %config.handler.failure_policy,
            "initializing adapter"
        );

        let handle = self.lifecycle.initialize(&config.model).await?;
        self.handler = Some(RequestHandler::new(handle, config.handler.clone()));
        self.config = Some(config);
        Ok(())
    }

    /// Serve one batch. Response `i` answers `requests[i]`.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] outside of `initialize`/`finalize`, and
    /// otherwise per [`RequestHandler::execute`].
    pub async fn execute(&self, requests: Vec<InferenceRequest>) -> Result<Vec<InferenceResponse>> {
        let handler = self.handler.as_ref().ok_or(Error::NotInitialized)?;
        handler.execute(requests).await
    }

    /// Release the model. Safe to call at any time, any number of times.
    pub fn finalize(&mut self) {
        // drop the handler's reference first so the lifecycle holds the last one
        self.handler = None;
        self.lifecycle.finalize();
    }

    pub fn is_ready(&self) -> bool {
        self.handler.is_some()
    }

    /// The configuration the adapter was initialized with.
    pub fn config(&self) -> Option<&AdapterConfig> {
        self.config.as_ref()
    }
}
