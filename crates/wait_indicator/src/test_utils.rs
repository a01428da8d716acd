//! A recording dialog service used by the unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::dialog::{
    CancelableWaitDialog, DialogStartOptions, DialogUpdate, WaitDialog, WaitDialogCallback,
    WaitDialogFactory, WaitDialogService,
};
use crate::error::DialogError;

/// Everything a dialog was started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartRecord {
    pub title: String,
    pub message: String,
    pub progress_text: Option<String>,
    pub status_animation: Option<String>,
    pub status_bar_text: Option<String>,
    pub cancelable: bool,
    pub delay_to_show: Duration,
    pub show_progress: bool,
    pub total_steps: u32,
    pub current_step: u32,
    pub thread_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpdateRecord {
    pub message: String,
    pub disable_cancel: bool,
}

/// Shared log of every call made on the dialogs of one service
#[derive(Default)]
pub(crate) struct DialogLog {
    starts: Mutex<Vec<StartRecord>>,
    updates: Mutex<Vec<UpdateRecord>>,
    ends: AtomicUsize,
    end_threads: Mutex<Vec<Option<String>>>,
    callback: Mutex<Option<Arc<dyn WaitDialogCallback>>>,
    user_canceled: AtomicBool,
}

impl DialogLog {
    pub fn starts(&self) -> Vec<StartRecord> {
        self.starts.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<UpdateRecord> {
        self.updates.lock().unwrap().clone()
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    /// Names of the threads dialogs were ended on, in order
    pub fn end_threads(&self) -> Vec<Option<String>> {
        self.end_threads.lock().unwrap().clone()
    }

    /// Simulates the user pressing cancel on the most recent dialog
    pub fn cancel(&self) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback.on_canceled();
        }
    }

    /// Makes `update_progress` report that the user has canceled
    pub fn set_user_canceled(&self, canceled: bool) {
        self.user_canceled.store(canceled, Ordering::SeqCst);
    }

    /// Asserts that exactly one dialog was started with the given values and
    /// that every unused progress parameter was left at its default
    pub fn assert_single_start(&self, title: &str, message: &str, cancelable: bool) {
        self.assert_starts(1, title, message, cancelable);
    }

    /// Same as [`DialogLog::assert_single_start`] for `count` dialogs
    pub fn assert_starts(&self, count: usize, title: &str, message: &str, cancelable: bool) {
        let starts = self.starts();
        assert_eq!(starts.len(), count, "unexpected number of dialog sessions");
        for start in &starts {
            assert_eq!(start.title, title);
            assert_eq!(start.message, message);
            assert_eq!(start.cancelable, cancelable);
            assert_eq!(start.progress_text, None);
            assert_eq!(start.status_animation, None);
            assert_eq!(start.status_bar_text, None);
            assert_eq!(start.delay_to_show, Duration::ZERO);
            assert!(!start.show_progress);
            assert_eq!(start.total_steps, 0);
            assert_eq!(start.current_step, 0);
        }
    }
}

/// What the recording factory hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DialogKind {
    /// A dialog that supports cancellation callbacks
    Cancelable,
    /// A dialog without the callback surface
    WithoutCallback,
    /// No dialog at all
    Missing,
}

pub(crate) struct RecordingDialog {
    log: Arc<DialogLog>,
    kind: DialogKind,
}

impl WaitDialog for RecordingDialog {
    fn into_cancelable(self: Box<Self>) -> Option<Box<dyn CancelableWaitDialog>> {
        match self.kind {
            DialogKind::Cancelable => Some(self),
            DialogKind::WithoutCallback | DialogKind::Missing => None,
        }
    }
}

impl CancelableWaitDialog for RecordingDialog {
    fn start_with_callback(
        &mut self,
        options: &DialogStartOptions<'_>,
        callback: Arc<dyn WaitDialogCallback>,
    ) -> Result<(), DialogError> {
        self.log.starts.lock().unwrap().push(StartRecord {
            title: options.title.to_string(),
            message: options.message.to_string(),
            progress_text: options.progress_text.map(str::to_string),
            status_animation: options.status_animation.map(str::to_string),
            status_bar_text: options.status_bar_text.map(str::to_string),
            cancelable: options.cancelable,
            delay_to_show: options.delay_to_show,
            show_progress: options.show_progress,
            total_steps: options.total_steps,
            current_step: options.current_step,
            thread_name: std::thread::current().name().map(str::to_string),
        });
        *self.log.callback.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn update_progress(&mut self, update: &DialogUpdate<'_>) -> Result<bool, DialogError> {
        self.log.updates.lock().unwrap().push(UpdateRecord {
            message: update.message.to_string(),
            disable_cancel: update.disable_cancel,
        });
        Ok(self.log.user_canceled.load(Ordering::SeqCst))
    }

    fn end(&mut self) -> Result<u32, DialogError> {
        self.log
            .end_threads
            .lock()
            .unwrap()
            .push(std::thread::current().name().map(str::to_string));
        self.log.ends.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

pub(crate) struct RecordingFactory {
    log: Arc<DialogLog>,
    kind: DialogKind,
    failure_status: Option<i32>,
}

impl WaitDialogFactory for RecordingFactory {
    fn create_instance(&self) -> Result<Option<Box<dyn WaitDialog>>, DialogError> {
        if let Some(code) = self.failure_status {
            return Err(DialogError::Status { code });
        }
        if self.kind == DialogKind::Missing {
            return Ok(None);
        }
        Ok(Some(Box::new(RecordingDialog {
            log: self.log.clone(),
            kind: self.kind,
        })))
    }
}

pub(crate) struct RecordingDialogService {
    factory: Arc<RecordingFactory>,
    available: AtomicBool,
}

impl RecordingDialogService {
    pub fn new() -> Self {
        Self::with_kind(DialogKind::Cancelable)
    }

    pub fn with_kind(kind: DialogKind) -> Self {
        Self::build(kind, None)
    }

    pub fn failing_status(code: i32) -> Self {
        Self::build(DialogKind::Cancelable, Some(code))
    }

    fn build(kind: DialogKind, failure_status: Option<i32>) -> Self {
        Self {
            factory: Arc::new(RecordingFactory {
                log: Arc::new(DialogLog::default()),
                kind,
                failure_status,
            }),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn log(&self) -> Arc<DialogLog> {
        self.factory.log.clone()
    }

    pub fn recording_factory(&self) -> Arc<RecordingFactory> {
        self.factory.clone()
    }
}

#[async_trait]
impl WaitDialogService for RecordingDialogService {
    async fn factory(&self) -> Result<Arc<dyn WaitDialogFactory>, DialogError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(DialogError::unavailable("dialog service is not registered"));
        }
        let factory: Arc<dyn WaitDialogFactory> = self.factory.clone();
        Ok(factory)
    }
}

/// A multi-threaded runtime for tests that block the calling thread
pub(crate) fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}
