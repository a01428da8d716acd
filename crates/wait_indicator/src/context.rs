//! A single wait and the dialog session it owns

use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dialog::{
    CancelableWaitDialog, DialogStartOptions, DialogUpdate, WaitDialogCallback, WaitDialogFactory,
};
use crate::error::{ArgumentError, WaitResult};

/// Unique identifier for a wait, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitId(pub Uuid);

impl WaitId {
    /// Generate a new unique wait ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WaitId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for WaitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The live dialog of a wait. Shared with the owning instance so disposing
/// the instance can end a wait that is still in flight.
pub(crate) struct DialogSession {
    wait_id: WaitId,
    dialog: Mutex<Option<Box<dyn CancelableWaitDialog>>>,
    token: CancellationToken,
}

impl DialogSession {
    /// Ends the dialog if it is still open. Returns whether this call ended it.
    pub(crate) fn end(&self) -> bool {
        let Some(mut dialog) = lock(&self.dialog).take() else {
            return false;
        };
        match dialog.end() {
            Ok(steps) => debug!(wait_id = %self.wait_id, steps, "wait dialog ended"),
            Err(err) => warn!(wait_id = %self.wait_id, error = %err, "failed to end wait dialog"),
        }
        true
    }

    /// Signals cancellation to the operation running under this session
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    pub(crate) fn is_ended(&self) -> bool {
        lock(&self.dialog).is_none()
    }

    fn update(&self, update: &DialogUpdate<'_>) -> bool {
        let mut dialog = lock(&self.dialog);
        let Some(dialog) = dialog.as_mut() else {
            return false;
        };
        match dialog.update_progress(update) {
            Ok(canceled) => canceled,
            Err(err) => {
                warn!(wait_id = %self.wait_id, error = %err, "failed to update wait dialog");
                false
            }
        }
    }
}

/// Flips the wait's token when the dialog reports a cancel request, as long
/// as the wait still allows cancellation.
struct CancelCallback {
    wait_id: WaitId,
    token: CancellationToken,
    allow_cancel: Arc<AtomicBool>,
}

impl WaitDialogCallback for CancelCallback {
    fn on_canceled(&self) {
        if self.allow_cancel.load(Ordering::SeqCst) {
            debug!(wait_id = %self.wait_id, "cancellation requested from wait dialog");
            self.token.cancel();
        } else {
            debug!(wait_id = %self.wait_id, "ignoring cancellation of a non-cancelable wait");
        }
    }
}

/// Owns the dialog session of one wait.
///
/// The session is ended on [`WaitContext::dispose`] or when the context is
/// dropped, whichever happens first.
pub struct WaitContext {
    id: WaitId,
    title: String,
    message: String,
    allow_cancel: Arc<AtomicBool>,
    session: Arc<DialogSession>,
}

impl WaitContext {
    /// Opens a dialog session and shows `title` and `message` in it
    pub fn new(
        factory: &dyn WaitDialogFactory,
        title: impl Into<String>,
        message: impl Into<String>,
        allow_cancel: bool,
    ) -> WaitResult<Self> {
        let title = title.into();
        let message = message.into();

        let dialog = factory
            .create_instance()?
            .ok_or(ArgumentError::null("dialog"))?;
        let mut dialog = dialog
            .into_cancelable()
            .ok_or(ArgumentError::UnsupportedDialog)?;

        let id = WaitId::new();
        let token = CancellationToken::new();
        let allow_cancel_flag = Arc::new(AtomicBool::new(allow_cancel));
        let callback = Arc::new(CancelCallback {
            wait_id: id,
            token: token.clone(),
            allow_cancel: allow_cancel_flag.clone(),
        });

        dialog.start_with_callback(
            &DialogStartOptions::new(&title, &message, allow_cancel),
            callback,
        )?;
        debug!(wait_id = %id, title = %title, cancelable = allow_cancel, "wait dialog started");

        Ok(Self {
            id,
            title,
            message,
            allow_cancel: allow_cancel_flag,
            session: Arc::new(DialogSession {
                wait_id: id,
                dialog: Mutex::new(Some(dialog)),
                token,
            }),
        })
    }

    pub fn id(&self) -> WaitId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Changes the message shown by the live dialog
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.push_update();
    }

    pub fn allow_cancel(&self) -> bool {
        self.allow_cancel.load(Ordering::SeqCst)
    }

    /// Enables or disables the cancel button of the live dialog
    pub fn set_allow_cancel(&mut self, allow_cancel: bool) {
        self.allow_cancel.store(allow_cancel, Ordering::SeqCst);
        self.push_update();
    }

    /// The token handed to the operation running under this wait
    pub fn cancellation_token(&self) -> CancellationToken {
        self.session.token.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.session.is_ended()
    }

    /// Ends the dialog session. Calling this more than once has no effect.
    pub fn dispose(&self) {
        self.session.end();
    }

    pub(crate) fn session(&self) -> Arc<DialogSession> {
        self.session.clone()
    }

    fn push_update(&self) {
        let allow_cancel = self.allow_cancel();
        let user_canceled = self
            .session
            .update(&DialogUpdate::new(&self.message, allow_cancel));
        if user_canceled && allow_cancel {
            self.session.cancel();
        }
    }
}

impl fmt::Debug for WaitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitContext")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("message", &self.message)
            .field("allow_cancel", &self.allow_cancel())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for WaitContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
