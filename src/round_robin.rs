use crate::error::FlowError;
use crate::fan::send_or_closed;

use kanal::{AsyncReceiver, AsyncSender};
use tracing::debug;

/// Routes each item of `from` to exactly one channel in `to`.
///
/// The n-th item read (0-indexed) goes to `to[n % to.len()]`, so the
/// assignment depends only on arrival order. All destinations are closed once
/// `from` is exhausted. Returns the number of items routed.
///
/// # Errors
/// `FlowError::NoDestinations` if `to` is empty (the source is left untouched),
/// `FlowError::DestinationClosed` if the destination chosen for an item has no
/// receivers left.
pub async fn distribute<T>(from: AsyncReceiver<T>, to: Vec<AsyncSender<T>>) -> Result<u64, FlowError> {
  if to.is_empty() {
    return Err(FlowError::NoDestinations);
  }

  let mut count: u64 = 0;
  while let Ok(item) = from.recv().await {
    let index = (count % to.len() as u64) as usize;
    send_or_closed(&to[index], item, index).await?;
    count += 1;
  }

  debug!(routed = count, destinations = to.len(), "distribute: source exhausted, closing destinations.");
  Ok(count)
}
