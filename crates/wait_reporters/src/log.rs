use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use wait_indicator::{
    async_trait, CancelableWaitDialog, DialogError, DialogStartOptions, DialogUpdate, WaitDialog,
    WaitDialogCallback, WaitDialogFactory, WaitDialogService,
};

use crate::cancel::{CancelHandle, CancelRegistry, DialogId};

/// A dialog service for headless hosts that reports waits through `tracing`
#[derive(Clone, Default)]
pub struct LogDialogService {
    registry: Arc<CancelRegistry>,
}

impl LogDialogService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.registry.clone())
    }
}

#[async_trait]
impl WaitDialogService for LogDialogService {
    async fn factory(&self) -> Result<Arc<dyn WaitDialogFactory>, DialogError> {
        Ok(Arc::new(self.clone()))
    }
}

impl WaitDialogFactory for LogDialogService {
    fn create_instance(&self) -> Result<Option<Box<dyn WaitDialog>>, DialogError> {
        Ok(Some(Box::new(LogWaitDialog {
            id: self.registry.next_dialog_id(),
            registry: self.registry.clone(),
            title: String::new(),
            started: None,
            current_step: 0,
        })))
    }
}

pub struct LogWaitDialog {
    id: DialogId,
    registry: Arc<CancelRegistry>,
    title: String,
    started: Option<Instant>,
    current_step: u32,
}

impl WaitDialog for LogWaitDialog {
    fn into_cancelable(self: Box<Self>) -> Option<Box<dyn CancelableWaitDialog>> {
        Some(self)
    }
}

impl CancelableWaitDialog for LogWaitDialog {
    fn start_with_callback(
        &mut self,
        options: &DialogStartOptions<'_>,
        callback: Arc<dyn WaitDialogCallback>,
    ) -> Result<(), DialogError> {
        if self.started.is_some() {
            return Err(DialogError::session("wait dialog was already started"));
        }
        self.title = options.title.to_string();
        self.started = Some(Instant::now());
        self.registry.register(self.id, callback, options.cancelable);
        info!(
            dialog = self.id.0,
            title = options.title,
            message = options.message,
            cancelable = options.cancelable,
            "waiting"
        );
        Ok(())
    }

    fn update_progress(&mut self, update: &DialogUpdate<'_>) -> Result<bool, DialogError> {
        self.current_step = update.current_step;
        self.registry.set_cancelable(self.id, !update.disable_cancel);
        info!(
            dialog = self.id.0,
            title = %self.title,
            message = update.message,
            cancelable = !update.disable_cancel,
            "wait updated"
        );
        Ok(self.registry.is_canceled(self.id))
    }

    fn end(&mut self) -> Result<u32, DialogError> {
        let Some(started) = self.started.take() else {
            warn!(dialog = self.id.0, "ending a wait dialog that is not showing");
            return Ok(self.current_step);
        };
        let canceled = self.registry.is_canceled(self.id);
        self.registry.unregister(self.id);
        info!(
            dialog = self.id.0,
            title = %self.title,
            canceled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "wait finished"
        );
        Ok(self.current_step)
    }
}

impl Drop for LogWaitDialog {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wait_indicator::{
        CancellationToken, ForegroundThread, OperationError, WaitIndicator, WaitOutcome, WaitRequest,
    };

    struct Ignore;

    impl WaitDialogCallback for Ignore {
        fn on_canceled(&self) {}
    }

    #[test]
    fn test_start_twice_is_a_session_error() {
        let service = LogDialogService::new();
        let mut dialog = service.create_instance().unwrap().unwrap().into_cancelable().unwrap();
        let options = DialogStartOptions::new("t", "m", false);
        dialog.start_with_callback(&options, Arc::new(Ignore)).unwrap();
        assert!(matches!(
            dialog.start_with_callback(&options, Arc::new(Ignore)),
            Err(DialogError::Session { .. })
        ));
        assert_eq!(dialog.end().unwrap(), 0);
        assert_eq!(dialog.end().unwrap(), 0);
    }

    #[test]
    fn test_dropped_dialog_unregisters() {
        let service = LogDialogService::new();
        let mut dialog = service.create_instance().unwrap().unwrap().into_cancelable().unwrap();
        dialog
            .start_with_callback(&DialogStartOptions::new("t", "m", true), Arc::new(Ignore))
            .unwrap();
        assert!(service.cancel_handle().has_open_dialog());
        drop(dialog);
        assert!(!service.cancel_handle().has_open_dialog());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_facade_waits_with_log_dialog() {
        let service = LogDialogService::new();
        let handle = service.cancel_handle();
        let indicator = Arc::new(WaitIndicator::new(
            Arc::new(ForegroundThread::spawn("log-dialog-foreground").unwrap()),
            Arc::new(service),
        ));
        indicator.activate().await;

        let waiter = indicator.clone();
        let result = tokio::task::spawn_blocking(move || {
            waiter.wait_for_async_operation_with_result(
                &WaitRequest::new("Sync", "syncing").cancelable(true),
                Some(move |token: CancellationToken| async move {
                    assert!(handle.cancel());
                    token.cancelled().await;
                    Err::<u32, _>(OperationError::Canceled)
                }),
            )
        })
        .await
        .unwrap();

        assert_eq!(result.unwrap(), (WaitOutcome::Canceled, 0));
        indicator.dispose_async().await;
        assert!(indicator.is_disposed());
    }
}
