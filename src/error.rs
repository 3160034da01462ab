use thiserror::Error;

/// A failure produced by a single task of a worker pool run.
///
/// Failures are collected without any correlation to the originating item;
/// callers that need correlation should encode it in their error value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure<E> {
  /// The operation returned `Err`.
  #[error("Task failed: {0}")]
  Failed(E),

  /// The operation panicked. The payload is kept when it was a string.
  #[error("Task panicked: {0}")]
  Panicked(String),
}

impl<E> TaskFailure<E> {
  /// Returns `true` if the task panicked instead of returning an error.
  pub fn is_panic(&self) -> bool {
    matches!(self, TaskFailure::Panicked(_))
  }

  /// Returns the error returned by the operation, if any.
  pub fn failure(&self) -> Option<&E> {
    match self {
      TaskFailure::Failed(e) => Some(e),
      TaskFailure::Panicked(_) => None,
    }
  }

  pub fn into_failure(self) -> Option<E> {
    match self {
      TaskFailure::Failed(e) => Some(e),
      TaskFailure::Panicked(_) => None,
    }
  }
}

/// Errors raised by the channel plumbing (broadcast, merge, round-robin).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
  #[error("Destination channel {index} was closed by all of its receivers")]
  DestinationClosed { index: usize },

  #[error("No destination channels were provided")]
  NoDestinations,
}

/// Errors of the pool's internal intake queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum PoolError {
  #[error("Run was cancelled, intake refuses new items")]
  Cancelled,

  #[error("Intake queue (receiver side) was closed unexpectedly")]
  IntakeClosed,
}
