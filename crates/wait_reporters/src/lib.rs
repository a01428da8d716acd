//! Wait dialogs for terminals and headless hosts.
//!
//! [`SpinnerDialogService`] draws each wait as an indicatif spinner and
//! [`LogDialogService`] only reports waits through `tracing`. Both hand out a
//! [`CancelHandle`] the host wires to its own cancel gesture.

mod cancel;
mod log;
mod spinner;

pub use cancel::{CancelHandle, DialogId};
pub use log::{LogDialogService, LogWaitDialog};
pub use spinner::{SpinnerConfig, SpinnerDialogService, SpinnerWaitDialog};
