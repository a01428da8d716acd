//! Wait Indicator - blocking waits behind a cancelable dialog
//!
//! Runs a synchronous or asynchronous operation while the host shows a wait
//! dialog, blocking the calling context until the operation finishes.
//!
//! # Overview
//!
//! - A [`WaitContext`] owns the dialog session of a single wait and ties the
//!   dialog's cancel button to a [`CancellationToken`]
//! - A [`WaitIndicatorInstance`] opens sessions on the foreground context,
//!   drives the operation and normalizes its result
//! - A [`WaitIndicator`] is the long-lived facade that owns an instance while
//!   it is active
//! - Cancellation never surfaces as an error: it becomes `T::default()` or
//!   [`Outcome::Canceled`], depending on the entry point
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wait_indicator::{
//!     CancellationToken, InlineForeground, NoOpDialogService, OperationError, WaitIndicator,
//!     WaitRequest,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = tokio::runtime::Runtime::new()?;
//!     let indicator = WaitIndicator::new(Arc::new(InlineForeground), Arc::new(NoOpDialogService));
//!     runtime.block_on(indicator.activate());
//!
//!     let request = WaitRequest::new("Restoring", "Restoring packages...").cancelable(true);
//!     let restored = indicator.wait_for_async_operation(&request, Some(|token: CancellationToken| async move {
//!         tokio::select! {
//!             _ = token.cancelled() => Err(OperationError::Canceled),
//!             _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => Ok(12),
//!         }
//!     }))?;
//!
//!     println!("restored {restored} packages");
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod dialog;
pub mod error;
pub mod indicator;
pub mod instance;
pub mod outcome;
pub mod scheduler;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use context::{WaitContext, WaitId};
pub use dialog::{
    CancelableWaitDialog, DialogStartOptions, DialogUpdate, NoOpDialog, NoOpDialogService,
    WaitDialog, WaitDialogCallback, WaitDialogFactory, WaitDialogService,
};
pub use error::{
    ArgumentError, ConfigError, ConfigResult, DialogError, OperationError, OperationResult,
    SchedulerError, WaitError, WaitResult,
};
pub use indicator::WaitIndicator;
pub use instance::{AsyncOperation, InstanceState, SyncOperation, WaitIndicatorInstance};
pub use outcome::{classify, join_operations, Classification, Outcome, WaitOutcome};
pub use scheduler::{run_on_foreground, ForegroundScheduler, ForegroundThread, InlineForeground};
pub use types::{WaitIndicatorConfig, WaitRequest};
pub use tokio_util::sync::CancellationToken;

use std::future::Future;
use std::pin::Pin;

/// A boxed future that is Send and can be used across thread boundaries
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

// Re-export async_trait for dialog service implementations
pub use async_trait::async_trait;
