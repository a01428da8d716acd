//! Error types for the wait indicator

use thiserror::Error;

/// Main error type returned by every wait entry point
#[derive(Error, Debug)]
pub enum WaitError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),

    #[error("Failed to initialize the wait dialog: {0}")]
    Initialization(#[from] DialogError),

    #[error("Foreground scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("The wait indicator has not been initialized")]
    NotInitialized,

    #[error("The wait indicator is not active")]
    NotActive,

    #[error("The wait indicator has been disposed")]
    Disposed,

    /// The operation failed with something other than a cancellation signal.
    #[error(transparent)]
    Operation(OperationError),
}

/// Errors raised while validating the arguments of a wait
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Value cannot be null: {name}")]
    Null { name: &'static str },

    #[error("The wait dialog does not support cancellation callbacks")]
    UnsupportedDialog,
}

/// Errors reported by the dialog service or one of its sessions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    #[error("Dialog service is unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Dialog factory returned failure status {code:#x}")]
    Status { code: i32 },

    #[error("Dialog session failed: {reason}")]
    Session { reason: String },
}

/// Errors related to the foreground scheduler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("The foreground context has shut down")]
    Closed,

    #[error("Foreground job was dropped before it completed")]
    JobDropped,
}

/// Errors related to configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid foreground thread name: name must not be empty")]
    EmptyThreadName,

    #[error("Invalid tick interval: {interval:?} (must be > 0)")]
    InvalidTickInterval { interval: std::time::Duration },

    #[error("Invalid progress template: {reason}")]
    InvalidTemplate { reason: String },
}

/// Failure raised by a waited-on operation
///
/// Cancellation is a distinct variant so the executor can tell a cooperative
/// abort apart from a real failure. Operations that fan out into several
/// sub-operations report every failure through [`OperationError::Aggregate`].
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("The operation was canceled")]
    Canceled,

    #[error("{} operation(s) failed", .0.len())]
    Aggregate(Vec<OperationError>),

    #[error(transparent)]
    Failed(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Result type alias for wait operations
pub type WaitResult<T> = Result<T, WaitError>;

/// Result type alias for operation bodies
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl WaitError {
    /// Check if this error is an argument validation failure
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, WaitError::InvalidArgument(_))
    }

    /// Check if this error comes from the dialog service or its factory
    pub fn is_initialization(&self) -> bool {
        matches!(self, WaitError::Initialization(_))
    }

    /// Check if this error propagates a failure of the operation itself
    pub fn is_operation(&self) -> bool {
        matches!(self, WaitError::Operation(_))
    }

    /// Returns the operation failure, if that is what this error carries
    pub fn into_operation_error(self) -> Option<OperationError> {
        match self {
            WaitError::Operation(err) => Some(err),
            _ => None,
        }
    }
}

impl ArgumentError {
    /// Create a missing-argument error
    pub fn null(name: &'static str) -> Self {
        ArgumentError::Null { name }
    }
}

impl DialogError {
    /// Create an unavailable-service error
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        DialogError::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a session failure
    pub fn session<S: Into<String>>(reason: S) -> Self {
        DialogError::Session {
            reason: reason.into(),
        }
    }
}

impl OperationError {
    /// Wrap any error as a non-cancellation failure
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        OperationError::Failed(error.into())
    }

    /// Create a failure from a plain message
    pub fn msg<S: Into<String>>(message: S) -> Self {
        let message: String = message.into();
        OperationError::Failed(message.into())
    }

    /// Group several failures into one aggregate
    pub fn aggregate(errors: impl IntoIterator<Item = OperationError>) -> Self {
        OperationError::Aggregate(errors.into_iter().collect())
    }

    /// Check if this error is a cancellation signal, looking through
    /// aggregates and wrapped failures
    pub fn is_cancellation(&self) -> bool {
        crate::outcome::classify(self).is_cancellation()
    }

    /// Strips aggregates that wrap exactly one failure and boxed operation
    /// errors so the innermost cause is surfaced.
    pub fn into_innermost(self) -> Self {
        match self {
            OperationError::Aggregate(mut errors) if errors.len() == 1 => match errors.pop() {
                Some(inner) => inner.into_innermost(),
                None => OperationError::Aggregate(errors),
            },
            OperationError::Failed(inner) => match inner.downcast::<OperationError>() {
                Ok(inner) => (*inner).into_innermost(),
                Err(inner) => OperationError::Failed(inner),
            },
            other => other,
        }
    }
}

impl From<tokio::task::JoinError> for OperationError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            OperationError::Canceled
        } else {
            OperationError::Failed(Box::new(err))
        }
    }
}
