//! The engine that runs one operation at a time under a wait dialog

use std::future::Future;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{lock, DialogSession, WaitContext};
use crate::dialog::{WaitDialogFactory, WaitDialogService};
use crate::error::{ArgumentError, ConfigResult, OperationError, OperationResult, WaitError, WaitResult};
use crate::outcome::{classify, Classification, Outcome, WaitOutcome};
use crate::scheduler::{block_on, run_on_foreground, ForegroundScheduler};
use crate::types::{WaitIndicatorConfig, WaitRequest};
use crate::BoxFuture;

/// A synchronous operation. Mostly useful to name the type of a missing
/// operation, e.g. `None::<SyncOperation<i32>>`.
pub type SyncOperation<T> = fn(CancellationToken) -> OperationResult<T>;

/// An asynchronous operation, see [`SyncOperation`]
pub type AsyncOperation<T> = fn(CancellationToken) -> BoxFuture<OperationResult<T>>;

/// Lifecycle of a [`WaitIndicatorInstance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Uninitialized,
    Initialized,
    Disposed,
}

/// Runs operations while a wait dialog is shown and turns whatever they
/// return into a [`WaitResult`].
///
/// Every wait blocks the calling thread. Dialog sessions are opened on the
/// foreground context; the operation itself runs on the calling thread, and
/// asynchronous operations are driven inside the tokio runtime that was
/// current when the instance was initialized. That runtime should be
/// multi-threaded, otherwise work the operation spawns cannot make progress
/// while the caller is blocked.
///
/// The wait entry points are not meant to be called concurrently on one
/// instance; callers serialize them, usually by only waiting from the UI
/// thread.
pub struct WaitIndicatorInstance {
    scheduler: Arc<dyn ForegroundScheduler>,
    dialog_service: Arc<dyn WaitDialogService>,
    config: WaitIndicatorConfig,
    factory: OnceCell<Arc<dyn WaitDialogFactory>>,
    runtime: OnceCell<Handle>,
    state: Mutex<InstanceState>,
    /// Sessions of waits that are still in flight
    active: Mutex<Vec<Arc<DialogSession>>>,
}

impl WaitIndicatorInstance {
    /// Create a new instance with default configuration
    pub fn new(
        scheduler: Arc<dyn ForegroundScheduler>,
        dialog_service: Arc<dyn WaitDialogService>,
    ) -> Self {
        Self::configured(scheduler, dialog_service, WaitIndicatorConfig::default())
    }

    /// Create a new instance with custom configuration
    pub fn with_config(
        scheduler: Arc<dyn ForegroundScheduler>,
        dialog_service: Arc<dyn WaitDialogService>,
        config: WaitIndicatorConfig,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::configured(scheduler, dialog_service, config))
    }

    /// Builds an instance from a configuration that was already validated
    pub(crate) fn configured(
        scheduler: Arc<dyn ForegroundScheduler>,
        dialog_service: Arc<dyn WaitDialogService>,
        config: WaitIndicatorConfig,
    ) -> Self {
        Self {
            scheduler,
            dialog_service,
            config,
            factory: OnceCell::new(),
            runtime: OnceCell::new(),
            state: Mutex::new(InstanceState::Uninitialized),
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &WaitIndicatorConfig {
        &self.config
    }

    pub fn state(&self) -> InstanceState {
        *lock(&self.state)
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == InstanceState::Initialized
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == InstanceState::Disposed
    }

    /// Resolves the dialog factory. Must complete before the first wait.
    ///
    /// A failure leaves the instance uninitialized so initialization can be
    /// retried. Initializing twice is a no-op.
    pub async fn initialize(&self) -> WaitResult<()> {
        if self.is_disposed() {
            return Err(WaitError::Disposed);
        }

        if self.factory.get().is_none() {
            let factory = self.dialog_service.factory().await?;
            let _ = self.factory.set(factory);
        }

        if self.config.enter_runtime {
            if let Ok(handle) = Handle::try_current() {
                let _ = self.runtime.set(handle);
            }
        }

        let mut state = lock(&self.state);
        match *state {
            InstanceState::Uninitialized => {
                *state = InstanceState::Initialized;
                debug!(
                    enters_runtime = self.runtime.get().is_some(),
                    "wait indicator initialized"
                );
                Ok(())
            }
            InstanceState::Initialized => Ok(()),
            InstanceState::Disposed => Err(WaitError::Disposed),
        }
    }

    /// Disposes the instance, ending the dialogs of waits still in flight
    pub fn dispose(&self) {
        if !self.mark_disposed() {
            return;
        }
        end_sessions(self.take_active());
    }

    /// Disposes the instance, ending in-flight dialogs on the foreground
    /// context they were opened on
    pub async fn dispose_async(&self) {
        if !self.mark_disposed() {
            return;
        }

        let sessions = self.take_active();
        if sessions.is_empty() {
            return;
        }

        let fallback = sessions.clone();
        if let Err(err) = run_on_foreground(&*self.scheduler, move || end_sessions(sessions)).await {
            warn!(error = %err, "could not reach the foreground context, ending wait dialogs inline");
            end_sessions(fallback);
        }
    }

    /// Runs `operation` and returns its value, or `T::default()` when it was
    /// canceled. With `T = ()` this is a fire-and-forget wait.
    pub fn wait_for_operation<T, F>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<T>
    where
        T: Default,
        F: FnOnce(CancellationToken) -> OperationResult<T>,
    {
        self.execute(request, operation).map(Outcome::unwrap_or_default)
    }

    /// Runs `operation` and reports whether it completed next to its value
    pub fn wait_for_operation_with_result<T, F>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<(WaitOutcome, T)>
    where
        T: Default,
        F: FnOnce(CancellationToken) -> OperationResult<T>,
    {
        self.execute(request, operation).map(Outcome::into_parts)
    }

    /// Runs `operation` and returns its [`Outcome`]
    pub fn wait_for_operation_outcome<T, F>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<Outcome<T>>
    where
        F: FnOnce(CancellationToken) -> OperationResult<T>,
    {
        self.execute(request, operation)
    }

    /// Blocks until the future returned by `operation` resolves and returns
    /// its value, or `T::default()` when it was canceled
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
        self.execute_async(request, operation)
            .map(Outcome::unwrap_or_default)
    }

    /// Blocks until the future returned by `operation` resolves and reports
    /// whether it completed next to its value
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
        self.execute_async(request, operation).map(Outcome::into_parts)
    }

    /// Blocks until the future returned by `operation` resolves and returns
    /// its [`Outcome`]
    pub fn wait_for_async_operation_outcome<T, F, Fut>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<Outcome<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = OperationResult<T>>,
    {
        self.execute_async(request, operation)
    }

    fn execute<T, F>(&self, request: &WaitRequest, operation: Option<F>) -> WaitResult<Outcome<T>>
    where
        F: FnOnce(CancellationToken) -> OperationResult<T>,
    {
        let operation = operation.ok_or(ArgumentError::null("operation"))?;
        let (context, _active) = self.drive(self.open_context(request))?;
        let result = operation(context.cancellation_token());
        self.finish(context, result)
    }

    fn execute_async<T, F, Fut>(
        &self,
        request: &WaitRequest,
        operation: Option<F>,
    ) -> WaitResult<Outcome<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = OperationResult<T>>,
    {
        let operation = operation.ok_or(ArgumentError::null("operation"))?;
        self.drive(async move {
            let (context, _active) = self.open_context(request).await?;
            let result = operation(context.cancellation_token())
                .await
                .map_err(OperationError::into_innermost);
            self.finish(context, result)
        })
    }

    /// Opens the dialog session of a wait on the foreground context
    async fn open_context(&self, request: &WaitRequest) -> WaitResult<(WaitContext, ActiveWait<'_>)> {
        let (title, message) = request.validate()?;
        let factory = self.ready_factory()?;

        let title = title.to_string();
        let message = message.to_string();
        let cancelable = request.cancelable;
        let context = run_on_foreground(&*self.scheduler, move || {
            WaitContext::new(&*factory, title, message, cancelable)
        })
        .await??;

        let active = self.track(&context)?;
        Ok((context, active))
    }

    /// Ends the session and normalizes the operation's result
    fn finish<T>(&self, context: WaitContext, result: OperationResult<T>) -> WaitResult<Outcome<T>> {
        let wait_id = context.id();
        context.dispose();

        match result {
            Ok(value) => {
                debug!(wait_id = %wait_id, "operation completed");
                Ok(Outcome::Completed(value))
            }
            Err(err) => match classify(&err) {
                Classification::Cancellation => {
                    debug!(wait_id = %wait_id, "operation canceled");
                    Ok(Outcome::Canceled)
                }
                Classification::Other => {
                    debug!(wait_id = %wait_id, error = %err, "operation failed");
                    Err(WaitError::Operation(err))
                }
            },
        }
    }

    fn ready_factory(&self) -> WaitResult<Arc<dyn WaitDialogFactory>> {
        match self.state() {
            InstanceState::Uninitialized => Err(WaitError::NotInitialized),
            InstanceState::Disposed => Err(WaitError::Disposed),
            InstanceState::Initialized => self.factory.get().cloned().ok_or(WaitError::NotInitialized),
        }
    }

    fn track(&self, context: &WaitContext) -> WaitResult<ActiveWait<'_>> {
        // Holding the state lock while registering keeps a concurrent dispose
        // from missing this session.
        let state = lock(&self.state);
        if *state == InstanceState::Disposed {
            context.dispose();
            return Err(WaitError::Disposed);
        }

        let session = context.session();
        let mut active = lock(&self.active);
        if !active.is_empty() {
            debug!(wait_id = %context.id(), in_flight = active.len(), "nested wait started");
        }
        active.push(session.clone());

        Ok(ActiveWait {
            instance: self,
            session,
        })
    }

    fn mark_disposed(&self) -> bool {
        let mut state = lock(&self.state);
        if *state == InstanceState::Disposed {
            return false;
        }
        *state = InstanceState::Disposed;
        info!("wait indicator disposed");
        true
    }

    fn take_active(&self) -> Vec<Arc<DialogSession>> {
        std::mem::take(&mut *lock(&self.active))
    }

    /// Blocks on `future` inside the captured runtime
    fn drive<F: Future>(&self, future: F) -> F::Output {
        let _guard = self.runtime.get().map(Handle::enter);
        block_on(future)
    }
}

impl std::fmt::Debug for WaitIndicatorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitIndicatorInstance")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("in_flight", &lock(&self.active).len())
            .finish()
    }
}

impl Drop for WaitIndicatorInstance {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn end_sessions(sessions: Vec<Arc<DialogSession>>) {
    for session in sessions {
        if session.end() {
            warn!("ended the dialog of an in-flight wait because the wait indicator was disposed");
        }
        session.cancel();
    }
}

/// Keeps a session registered with its instance while the wait runs
struct ActiveWait<'a> {
    instance: &'a WaitIndicatorInstance,
    session: Arc<DialogSession>,
}

impl Drop for ActiveWait<'_> {
    fn drop(&mut self) {
        lock(&self.instance.active).retain(|session| !Arc::ptr_eq(session, &self.session));
    }
}
