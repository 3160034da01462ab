use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// A cancellation handle shared by every executor and the dispatcher of a
/// single pool run.
///
/// The signal is one-shot: once cancelled it never becomes clear again. Any
/// operation may call [`cancel`](Self::cancel) to stop the run from handing
/// out further items; tasks that are already executing are not interrupted.
#[derive(Debug, Clone)]
pub struct CancelSignal {
  run_id: u64,
  token: CancellationToken,
}

impl CancelSignal {
  pub(crate) fn new(run_id: u64, token: CancellationToken) -> Self {
    Self { run_id, token }
  }

  /// Returns the id of the pool run this signal belongs to.
  pub fn run_id(&self) -> u64 {
    self.run_id
  }

  /// Requests cancellation of the run.
  pub fn cancel(&self) {
    if !self.token.is_cancelled() {
      tracing::debug!(run_id = %self.run_id, "CancelSignal: Cancellation requested.");
    }
    self.token.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Resolves once the run has been cancelled.
  pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
    self.token.cancelled()
  }

  pub(crate) fn token(&self) -> &CancellationToken {
    &self.token
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cancel_is_sticky_and_shared_between_clones() {
    let signal = CancelSignal::new(7, CancellationToken::new());
    let clone = signal.clone();
    assert!(!signal.is_cancelled());

    clone.cancel();
    assert!(signal.is_cancelled());
    clone.cancel();
    assert!(signal.is_cancelled());
    assert_eq!(signal.run_id(), 7);
  }

  #[test]
  fn child_signal_follows_parent_token() {
    let parent = CancellationToken::new();
    let signal = CancelSignal::new(1, parent.child_token());
    parent.cancel();
    assert!(signal.is_cancelled());
  }

  #[test]
  fn cancelling_child_leaves_parent_untouched() {
    let parent = CancellationToken::new();
    let signal = CancelSignal::new(2, parent.child_token());
    signal.cancel();
    assert!(!parent.is_cancelled());
  }

  #[tokio::test]
  async fn cancelled_future_resolves_after_cancel() {
    let signal = CancelSignal::new(3, CancellationToken::new());
    let waiter = signal.clone();
    let handle = tokio::spawn(async move { waiter.cancelled().await });
    signal.cancel();
    handle.await.unwrap();
  }
}
