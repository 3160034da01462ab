use kanal::{AsyncReceiver, AsyncSender};

/// Receives every remaining item of `rx` into `out` and returns it.
///
/// Completes once all senders of `rx` have been dropped and the buffer is empty.
pub async fn channel_to_vec<T>(rx: AsyncReceiver<T>, mut out: Vec<T>) -> Vec<T> {
  while let Ok(item) = rx.recv().await {
    out.push(item);
  }
  out
}

/// Receives every remaining item of `rx` into a new vector.
pub async fn drain_channel<T>(rx: AsyncReceiver<T>) -> Vec<T> {
  channel_to_vec(rx, Vec::new()).await
}

/// Sends `items` into `tx` in order and returns how many were delivered.
///
/// Stops early if every receiver of `tx` has been dropped.
pub async fn load_channel<T, I>(tx: &AsyncSender<T>, items: I) -> usize
where
  I: IntoIterator<Item = T>,
{
  let mut sent = 0;
  for item in items {
    if tx.send(item).await.is_err() {
      tracing::debug!(sent, "load_channel: receivers dropped, stopping.");
      break;
    }
    sent += 1;
  }
  sent
}
