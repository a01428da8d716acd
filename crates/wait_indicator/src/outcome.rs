//! Outcome types and the classification of operation failures

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{OperationError, OperationResult};

/// Flat outcome of a wait, reported next to the value by the `_with_result`
/// entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaitOutcome {
    /// The operation ran to completion
    Completed,
    /// The operation signaled cancellation
    Canceled,
}

/// Tagged result of a wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation ran to completion and produced a value
    Completed(T),
    /// The operation signaled cancellation
    Canceled,
}

impl<T> Outcome<T> {
    /// Check if the operation completed
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// Check if the operation was canceled
    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled)
    }

    /// Returns the flat outcome without the value
    pub fn outcome(&self) -> WaitOutcome {
        match self {
            Outcome::Completed(_) => WaitOutcome::Completed,
            Outcome::Canceled => WaitOutcome::Canceled,
        }
    }

    /// Returns the value if the operation completed
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Canceled => None,
        }
    }

    /// Maps the completed value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Canceled => Outcome::Canceled,
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Returns the value, or `T::default()` if the operation was canceled
    pub fn unwrap_or_default(self) -> T {
        self.completed().unwrap_or_default()
    }

    /// Splits into the flat outcome and the value, defaulting the value on
    /// cancellation
    pub fn into_parts(self) -> (WaitOutcome, T) {
        let outcome = self.outcome();
        (outcome, self.unwrap_or_default())
    }
}

/// How a failure is treated by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A cooperative abort; reported as [`Outcome::Canceled`]
    Cancellation,
    /// Anything else; propagated to the caller
    Other,
}

impl Classification {
    pub fn is_cancellation(self) -> bool {
        self == Classification::Cancellation
    }
}

/// Classifies a failure raised by an operation.
///
/// An aggregate only counts as a cancellation when it is non-empty and every
/// member is itself a cancellation. Boxed failures are looked through so a
/// cancellation that was wrapped on its way out is still recognized.
pub fn classify(error: &OperationError) -> Classification {
    match error {
        OperationError::Canceled => Classification::Cancellation,
        OperationError::Aggregate(errors) => {
            if !errors.is_empty() && errors.iter().all(|err| classify(err).is_cancellation()) {
                Classification::Cancellation
            } else {
                Classification::Other
            }
        }
        OperationError::Failed(inner) => {
            if let Some(inner) = inner.downcast_ref::<OperationError>() {
                classify(inner)
            } else {
                match inner.downcast_ref::<tokio::task::JoinError>() {
                    Some(join_error) if join_error.is_cancelled() => Classification::Cancellation,
                    _ => Classification::Other,
                }
            }
        }
    }
}

/// Awaits all operations concurrently and collects their values.
///
/// Unlike a fail-fast join, every operation runs to completion; all failures
/// are reported together in one [`OperationError::Aggregate`].
pub async fn join_operations<I, F, T>(operations: I) -> OperationResult<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = OperationResult<T>>,
{
    let results = futures::future::join_all(operations).await;

    let mut values = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(OperationError::Aggregate(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_cancellation() {
        assert_eq!(classify(&OperationError::Canceled), Classification::Cancellation);
        assert_eq!(classify(&OperationError::msg("boom")), Classification::Other);
    }

    #[test]
    fn test_aggregate_classification() {
        let all_canceled = OperationError::aggregate([OperationError::Canceled, OperationError::Canceled]);
        assert_eq!(classify(&all_canceled), Classification::Cancellation);

        let mixed = OperationError::aggregate([OperationError::Canceled, OperationError::msg("boom")]);
        assert_eq!(classify(&mixed), Classification::Other);

        let nested = OperationError::aggregate([
            OperationError::Canceled,
            OperationError::aggregate([OperationError::Canceled]),
        ]);
        assert_eq!(classify(&nested), Classification::Cancellation);

        let empty = OperationError::aggregate([]);
        assert_eq!(classify(&empty), Classification::Other);
    }

    #[test]
    fn test_wrapped_cancellation() {
        let wrapped = OperationError::failed(OperationError::Canceled);
        assert_eq!(classify(&wrapped), Classification::Cancellation);

        let wrapped_mixed = OperationError::failed(OperationError::aggregate([
            OperationError::Canceled,
            OperationError::msg("boom"),
        ]));
        assert_eq!(classify(&wrapped_mixed), Classification::Other);
    }

    #[test]
    fn test_outcome_conversions() {
        let completed = Outcome::Completed(42);
        assert!(completed.is_completed());
        assert_eq!(completed.outcome(), WaitOutcome::Completed);
        assert_eq!(completed.clone().into_parts(), (WaitOutcome::Completed, 42));
        assert_eq!(completed.map(|v| v * 2).completed(), Some(84));

        let canceled: Outcome<i32> = Outcome::Canceled;
        assert!(canceled.is_canceled());
        assert_eq!(canceled.clone().into_parts(), (WaitOutcome::Canceled, 0));
        assert_eq!(canceled.unwrap_or_default(), 0);

        let canceled: Outcome<Option<String>> = Outcome::Canceled;
        assert_eq!(canceled.unwrap_or_default(), None);
    }

    #[tokio::test]
    async fn test_join_operations_collects_values() {
        let values = join_operations((1..=2).map(|value| async move { Ok::<_, OperationError>(value) }))
            .await
            .unwrap();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_join_operations_aggregates_spawned_failures() {
        let handles = [
            tokio::spawn(async { Err::<(), _>(OperationError::Canceled) }),
            tokio::spawn(async { Err::<(), _>(OperationError::Canceled) }),
        ];
        let err = join_operations(handles.into_iter().map(|handle| async move { handle.await? }))
            .await
            .unwrap_err();
        assert!(matches!(&err, OperationError::Aggregate(errors) if errors.len() == 2));
        assert!(err.is_cancellation());

        let handles = [
            tokio::spawn(async { Err::<(), _>(OperationError::Canceled) }),
            tokio::spawn(async { Err::<(), _>(OperationError::msg("boom")) }),
        ];
        let err = join_operations(handles.into_iter().map(|handle| async move { handle.await? }))
            .await
            .unwrap_err();
        assert!(!err.is_cancellation());
    }
}
