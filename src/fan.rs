//! One-to-many and many-to-one channel plumbing.
//!
//! All functions take already-open channels. They own the destination side
//! they are handed and close it by dropping it once the sources are exhausted.
//! A destination is only truly closed when no other sender handle to it is
//! alive, so callers should not keep clones of the senders they pass in.

use crate::error::FlowError;

use futures::future::try_join_all;
use kanal::{AsyncReceiver, AsyncSender};
use tracing::{debug, trace, warn};

/// Copies every item of `from` to every channel in `to`, in arrival order.
///
/// A destination that is not being read blocks the whole broadcast until it
/// has room again. Returns the number of items read from `from`.
///
/// # Errors
/// Returns `FlowError::NoDestinations` if `to` is empty, and
/// `FlowError::DestinationClosed` if all receivers of a destination were
/// dropped. In both cases every destination is closed on return.
pub async fn broadcast<T: Clone>(from: AsyncReceiver<T>, to: Vec<AsyncSender<T>>) -> Result<u64, FlowError> {
  if to.is_empty() {
    return Err(FlowError::NoDestinations);
  }

  let mut forwarded: u64 = 0;
  while let Ok(item) = from.recv().await {
    for (index, tx) in to.iter().enumerate() {
      send_or_closed(tx, item.clone(), index).await?;
    }
    forwarded += 1;
    trace!(forwarded, "broadcast: item delivered to {} destinations.", to.len());
  }

  debug!(forwarded, destinations = to.len(), "broadcast: source exhausted, closing destinations.");
  Ok(forwarded)
}

/// Forwards every item of every channel in `from` into `to`.
///
/// Sources are read concurrently. Items of one source keep their relative
/// order; interleaving across sources is unspecified. `to` is closed once all
/// sources are exhausted. Returns the number of items forwarded.
///
/// # Errors
/// Returns `FlowError::DestinationClosed` (index 0) as soon as one reader
/// finds that every receiver of `to` was dropped. The remaining readers are
/// dropped without waiting for their sources to close.
pub async fn merge<T>(to: AsyncSender<T>, from: Vec<AsyncReceiver<T>>) -> Result<u64, FlowError> {
  let sources = from.len();
  let readers = from.into_iter().enumerate().map(|(source, rx)| {
    let to = &to;
    async move {
      let mut forwarded: u64 = 0;
      while let Ok(item) = rx.recv().await {
        if to.send(item).await.is_err() {
          warn!(source, forwarded, "merge: destination closed, reader stopping.");
          return Err(FlowError::DestinationClosed { index: 0 });
        }
        forwarded += 1;
      }
      trace!(source, forwarded, "merge: source exhausted.");
      Ok(forwarded)
    }
  });

  let outcome = try_join_all(readers).await;
  drop(to);

  let total: u64 = outcome?.into_iter().sum();
  debug!(sources, total, "merge: all sources exhausted, destination closed.");
  Ok(total)
}

pub(crate) async fn send_or_closed<T>(tx: &AsyncSender<T>, item: T, index: usize) -> Result<(), FlowError> {
  if tx.send(item).await.is_err() {
    warn!(index, "Destination channel closed by its receivers.");
    return Err(FlowError::DestinationClosed { index });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn broadcast_without_destinations_is_rejected() {
    let (_tx, rx) = kanal::unbounded_async::<u32>();
    assert_eq!(broadcast(rx, Vec::new()).await, Err(FlowError::NoDestinations));
  }

  #[tokio::test]
  async fn merge_stops_when_destination_closes_despite_idle_source() {
    let (out_tx, out_rx) = kanal::unbounded_async::<u32>();
    drop(out_rx);

    let (busy_tx, busy_rx) = kanal::unbounded_async::<u32>();
    busy_tx.send(1).await.unwrap();
    // Kept alive so this source never reports exhaustion.
    let (_idle_tx, idle_rx) = kanal::unbounded_async::<u32>();

    let result = tokio::time::timeout(std::time::Duration::from_millis(300), merge(out_tx, vec![busy_rx, idle_rx]))
      .await
      .expect("merge kept waiting on an idle source after its destination closed");
    assert_eq!(result, Err(FlowError::DestinationClosed { index: 0 }));
  }

  #[tokio::test]
  async fn merge_without_sources_closes_destination() {
    let (tx, rx) = kanal::unbounded_async::<u32>();
    assert_eq!(merge(tx, Vec::new()).await, Ok(0));
    assert!(rx.recv().await.is_err());
  }
}
