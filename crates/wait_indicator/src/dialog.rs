//! Contracts of the dialog service that displays a wait
//!
//! The executor never renders anything itself. It asks a [`WaitDialogService`]
//! for a factory, opens one session per wait through that factory, and
//! listens for cancel requests through a [`WaitDialogCallback`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DialogError;

/// Parameters used to start a dialog session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogStartOptions<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub progress_text: Option<&'a str>,
    pub status_animation: Option<&'a str>,
    pub status_bar_text: Option<&'a str>,
    pub cancelable: bool,
    /// How long the host waits before the dialog becomes visible
    pub delay_to_show: Duration,
    pub show_progress: bool,
    pub total_steps: u32,
    pub current_step: u32,
}

impl<'a> DialogStartOptions<'a> {
    /// Options for an indeterminate dialog that shows immediately
    pub fn new(title: &'a str, message: &'a str, cancelable: bool) -> Self {
        Self {
            title,
            message,
            progress_text: None,
            status_animation: None,
            status_bar_text: None,
            cancelable,
            delay_to_show: Duration::ZERO,
            show_progress: false,
            total_steps: 0,
            current_step: 0,
        }
    }
}

/// Parameters pushed to a live dialog session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogUpdate<'a> {
    pub message: &'a str,
    pub progress_text: Option<&'a str>,
    pub status_bar_text: Option<&'a str>,
    pub current_step: u32,
    pub total_steps: u32,
    pub disable_cancel: bool,
}

impl<'a> DialogUpdate<'a> {
    pub fn new(message: &'a str, cancelable: bool) -> Self {
        Self {
            message,
            progress_text: None,
            status_bar_text: None,
            current_step: 0,
            total_steps: 0,
            disable_cancel: !cancelable,
        }
    }
}

/// Invoked by the dialog when the user asks to cancel
pub trait WaitDialogCallback: Send + Sync {
    fn on_canceled(&self);
}

/// A dialog instance handed out by a [`WaitDialogFactory`].
///
/// Not every dialog can report cancellation. The executor only works with
/// dialogs that expose the [`CancelableWaitDialog`] surface.
pub trait WaitDialog: Send {
    /// Returns the callback-capable control surface of this dialog, if any.
    fn into_cancelable(self: Box<Self>) -> Option<Box<dyn CancelableWaitDialog>>;
}

/// Session control of a dialog that reports cancellation through a callback
pub trait CancelableWaitDialog: Send {
    /// Shows the dialog
    fn start_with_callback(
        &mut self,
        options: &DialogStartOptions<'_>,
        callback: Arc<dyn WaitDialogCallback>,
    ) -> Result<(), DialogError>;

    /// Updates the live dialog. Returns whether the user has canceled.
    fn update_progress(&mut self, update: &DialogUpdate<'_>) -> Result<bool, DialogError>;

    /// Closes the dialog and returns the number of steps completed
    fn end(&mut self) -> Result<u32, DialogError>;
}

/// Creates dialog instances, one per wait
pub trait WaitDialogFactory: Send + Sync {
    /// Returns `Ok(None)` when the host produced no dialog.
    fn create_instance(&self) -> Result<Option<Box<dyn WaitDialog>>, DialogError>;
}

/// Asynchronous accessor for the dialog factory
#[async_trait]
pub trait WaitDialogService: Send + Sync {
    async fn factory(&self) -> Result<Arc<dyn WaitDialogFactory>, DialogError>;
}

/// A dialog service that shows nothing; waits still run and can still be
/// canceled through their tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpDialogService;

/// The dialog produced by [`NoOpDialogService`]
#[derive(Debug, Default)]
pub struct NoOpDialog;

#[async_trait]
impl WaitDialogService for NoOpDialogService {
    async fn factory(&self) -> Result<Arc<dyn WaitDialogFactory>, DialogError> {
        Ok(Arc::new(NoOpDialogService))
    }
}

impl WaitDialogFactory for NoOpDialogService {
    fn create_instance(&self) -> Result<Option<Box<dyn WaitDialog>>, DialogError> {
        Ok(Some(Box::new(NoOpDialog)))
    }
}

impl WaitDialog for NoOpDialog {
    fn into_cancelable(self: Box<Self>) -> Option<Box<dyn CancelableWaitDialog>> {
        Some(self)
    }
}

impl CancelableWaitDialog for NoOpDialog {
    fn start_with_callback(
        &mut self,
        _options: &DialogStartOptions<'_>,
        _callback: Arc<dyn WaitDialogCallback>,
    ) -> Result<(), DialogError> {
        Ok(())
    }

    fn update_progress(&mut self, _update: &DialogUpdate<'_>) -> Result<bool, DialogError> {
        Ok(false)
    }

    fn end(&mut self) -> Result<u32, DialogError> {
        Ok(0)
    }
}
