//! The long-lived wait indicator facade

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::lock;
use crate::dialog::WaitDialogService;
use crate::error::{ArgumentError, ConfigResult, OperationResult, WaitError, WaitResult};
use crate::instance::WaitIndicatorInstance;
use crate::outcome::{Outcome, WaitOutcome};
use crate::scheduler::{block_on, ForegroundScheduler};
use crate::types::{WaitIndicatorConfig, WaitRequest};

#[derive(Default)]
struct FacadeState {
    active: bool,
    disposed: bool,
    runtime: Option<Handle>,
    instance: Option<Arc<WaitIndicatorInstance>>,
}

/// Owns at most one [`WaitIndicatorInstance`] for as long as it is active.
///
/// The instance is created and initialized by the first wait after
/// activation and disposed on deactivation.
pub struct WaitIndicator {
    scheduler: Arc<dyn ForegroundScheduler>,
    dialog_service: Arc<dyn WaitDialogService>,
    config: WaitIndicatorConfig,
    state: Mutex<FacadeState>,
}

impl WaitIndicator {
    pub fn new(
        scheduler: Arc<dyn ForegroundScheduler>,
        dialog_service: Arc<dyn WaitDialogService>,
    ) -> Self {
        Self {
            scheduler,
            dialog_service,
            config: WaitIndicatorConfig::default(),
            state: Mutex::new(FacadeState::default()),
        }
    }

    pub fn with_config(
        scheduler: Arc<dyn ForegroundScheduler>,
        dialog_service: Arc<dyn WaitDialogService>,
        config: WaitIndicatorConfig,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            scheduler,
            dialog_service,
            config,
            state: Mutex::new(FacadeState::default()),
        })
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }

    /// Makes the facade accept waits. Activating twice is a no-op.
    pub async fn activate(&self) {
        let mut state = lock(&self.state);
        if state.disposed || state.active {
            return;
        }
        state.active = true;
        if self.config.enter_runtime {
            state.runtime = Handle::try_current().ok();
        }
        debug!("wait indicator activated");
    }

    /// Stops accepting waits and disposes the owned instance
    pub async fn deactivate(&self) {
        let instance = {
            let mut state = lock(&self.state);
            if !state.active {
                return;
            }
            state.active = false;
            state.instance.take()
        };
        if let Some(instance) = instance {
            instance.dispose_async().await;
        }
        debug!("wait indicator deactivated");
    }

    /// Same as [`WaitIndicator::activate`]
    pub async fn load(&self) {
        self.activate().await;
    }

    /// Same as [`WaitIndicator::deactivate`]
    pub async fn unload(&self) {
        self.deactivate().await;
    }

    /// Disposes the facade and the owned instance
    pub fn dispose(&self) {
        if let Some(instance) = self.mark_disposed() {
            instance.dispose();
        }
    }

    /// Disposes the facade and the owned instance
    pub async fn dispose_async(&self) {
        if let Some(instance) = self.mark_disposed() {
            instance.dispose_async().await;
        }
    }

    pub fn wait_for_operation<T, F>(&self, request: &WaitRequest, operation: Option<F>) -> WaitResult<T>
    where
        T: Default,
        F: FnOnce(CancellationToken) -> OperationResult<T>,
    {
        let operation = validate(request, operation)?;
        self.instance()?.wait_for_operation(request, Some(operation))
    }

    pub fn wait_for_operation_with_result<T, F>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<(WaitOutcome, T)>
    where
        T: Default,
        F: FnOnce(CancellationToken) -> OperationResult<T>,
    {
        let operation = validate(request, operation)?;
        self.instance()?
            .wait_for_operation_with_result(request, Some(operation))
    }

    pub fn wait_for_operation_outcome<T, F>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<Outcome<T>>
    where
        F: FnOnce(CancellationToken) -> OperationResult<T>,
    {
        let operation = validate(request, operation)?;
        self.instance()?.wait_for_operation_outcome(request, Some(operation))
    }

    pub fn wait_for_async_operation<T, F, Fut>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<T>
    where
        T: Default,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = OperationResult<T>>,
    {
        let operation = validate(request, operation)?;
        self.instance()?.wait_for_async_operation(request, Some(operation))
    }

    pub fn wait_for_async_operation_with_result<T, F, Fut>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<(WaitOutcome, T)>
    where
        T: Default,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = OperationResult<T>>,
    {
        let operation = validate(request, operation)?;
        self.instance()?
            .wait_for_async_operation_with_result(request, Some(operation))
    }

    pub fn wait_for_async_operation_outcome<T, F, Fut>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<Outcome<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = OperationResult<T>>,
    {
        let operation = validate(request, operation)?;
        self.instance()?
            .wait_for_async_operation_outcome(request, Some(operation))
    }

    /// Returns the owned instance, creating and initializing it on first use
    fn instance(&self) -> WaitResult<Arc<WaitIndicatorInstance>> {
        let (instance, runtime) = {
            let mut state = lock(&self.state);
            if state.disposed {
                return Err(WaitError::Disposed);
            }
            if !state.active {
                return Err(WaitError::NotActive);
            }
            let instance = state
                .instance
                .get_or_insert_with(|| {
                    debug!("creating wait indicator instance");
                    Arc::new(WaitIndicatorInstance::configured(
                        self.scheduler.clone(),
                        self.dialog_service.clone(),
                        self.config.clone(),
                    ))
                })
                .clone();
            (instance, state.runtime.clone())
        };

        if !instance.is_initialized() {
            let _guard = runtime.as_ref().map(Handle::enter);
            block_on(instance.initialize())?;
        }
        Ok(instance)
    }

    fn mark_disposed(&self) -> Option<Arc<WaitIndicatorInstance>> {
        let mut state = lock(&self.state);
        if state.disposed {
            return None;
        }
        state.disposed = true;
        state.active = false;
        debug!("wait indicator facade disposed");
        state.instance.take()
    }
}

impl std::fmt::Debug for WaitIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("WaitIndicator")
            .field("active", &state.active)
            .field("disposed", &state.disposed)
            .field("instance", &state.instance)
            .finish()
    }
}

impl Drop for WaitIndicator {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn validate<F>(request: &WaitRequest, operation: Option<F>) -> Result<F, ArgumentError> {
    request.validate()?;
    operation.ok_or(ArgumentError::null("operation"))
}
