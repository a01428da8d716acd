//! Routes user cancel requests to the wait dialog that is showing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tracing::debug;
use wait_indicator::WaitDialogCallback;

/// Identifies a dialog opened by one of the services in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogId(pub usize);

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Registration {
    callback: Arc<dyn WaitDialogCallback>,
    cancelable: bool,
    canceled: bool,
}

/// The open dialogs of a service, in the order they were started
#[derive(Default)]
pub(crate) struct CancelRegistry {
    next_id: AtomicUsize,
    dialogs: Mutex<IndexMap<DialogId, Registration>>,
}

impl CancelRegistry {
    /// Returns a unique ID for a new dialog.
    pub(crate) fn next_dialog_id(&self) -> DialogId {
        DialogId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register(&self, id: DialogId, callback: Arc<dyn WaitDialogCallback>, cancelable: bool) {
        lock(&self.dialogs).insert(
            id,
            Registration {
                callback,
                cancelable,
                canceled: false,
            },
        );
    }

    pub(crate) fn set_cancelable(&self, id: DialogId, cancelable: bool) {
        if let Some(registration) = lock(&self.dialogs).get_mut(&id) {
            registration.cancelable = cancelable;
        }
    }

    pub(crate) fn is_canceled(&self, id: DialogId) -> bool {
        lock(&self.dialogs)
            .get(&id)
            .is_some_and(|registration| registration.canceled)
    }

    pub(crate) fn unregister(&self, id: DialogId) {
        lock(&self.dialogs).shift_remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.dialogs).len()
    }

    /// Cancels the most recently started dialog, if it accepts cancellation
    fn cancel_latest(&self) -> Option<DialogId> {
        let (id, callback) = {
            let mut dialogs = lock(&self.dialogs);
            let (id, registration) = dialogs.last_mut()?;
            if !registration.cancelable {
                debug!(dialog = id.0, "ignoring cancel request, the wait is not cancelable");
                return None;
            }
            registration.canceled = true;
            (*id, registration.callback.clone())
        };

        debug!(dialog = id.0, "cancel requested");
        callback.on_canceled();
        Some(id)
    }
}

/// Lets the host cancel the wait that is currently showing, e.g. from a
/// Ctrl-C handler.
#[derive(Clone, Default)]
pub struct CancelHandle {
    registry: Arc<CancelRegistry>,
}

impl CancelHandle {
    pub(crate) fn new(registry: Arc<CancelRegistry>) -> Self {
        Self { registry }
    }

    /// Cancels the topmost wait. Returns false when no dialog is open or the
    /// topmost wait does not allow cancellation.
    pub fn cancel(&self) -> bool {
        self.registry.cancel_latest().is_some()
    }

    /// Returns true while at least one dialog is open
    pub fn has_open_dialog(&self) -> bool {
        self.registry.len() > 0
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("open_dialogs", &self.registry.len())
            .finish()
    }
}
