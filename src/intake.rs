use crate::error::PoolError;
use crate::signal::CancelSignal;

use kanal::{AsyncReceiver, AsyncSender};
use std::fmt;

/// The bounded FIFO through which dispatched items reach the executors.
///
/// Both halves are backed by a `kanal` channel. The producer side is held by a
/// single dispatcher; the consumer side is cloned once per executor. Dropping
/// the producer closes the intake, after which consumers drain what is left
/// and then observe closure.
pub(crate) struct Intake<T: Send + 'static> {
  tx: AsyncSender<T>,
  rx: AsyncReceiver<T>,
}

impl<T: Send + 'static> Intake<T> {
  pub(crate) fn new(capacity: usize) -> Self {
    let (tx, rx) = kanal::bounded_async(capacity.max(1));
    Self { tx, rx }
  }

  pub(crate) fn split(self) -> (IntakeProducer<T>, IntakeConsumer<T>) {
    (IntakeProducer { tx: self.tx }, IntakeConsumer { rx: self.rx })
  }
}

/// Write half of the intake. Not cloneable: exactly one dispatcher feeds a run.
pub(crate) struct IntakeProducer<T: Send + 'static> {
  tx: AsyncSender<T>,
}

/// Read half of the intake, shared by all executors of a run.
pub(crate) struct IntakeConsumer<T: Send + 'static> {
  rx: AsyncReceiver<T>,
}

// Manual impl: cloning the receiver handle must not require `T: Clone`.
impl<T: Send + 'static> Clone for IntakeConsumer<T> {
  fn clone(&self) -> Self {
    Self { rx: self.rx.clone() }
  }
}

impl<T: Send + 'static> fmt::Debug for IntakeProducer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IntakeProducer")
      .field("len", &self.len())
      .finish_non_exhaustive()
  }
}

impl<T: Send + 'static> fmt::Debug for IntakeConsumer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IntakeConsumer")
      .field("len", &self.rx.len())
      .finish_non_exhaustive()
  }
}

impl<T: Send + 'static> IntakeProducer<T> {
  /// Sends an item into the intake, waiting while the intake is full.
  ///
  /// The signal is checked before blocking and raced against the send, so a
  /// cancelled run never accepts another item.
  pub(crate) async fn send(&self, item: T, signal: &CancelSignal) -> Result<(), PoolError> {
    if signal.is_cancelled() {
      return Err(PoolError::Cancelled);
    }

    tokio::select! {
      biased;
      _ = signal.cancelled() => Err(PoolError::Cancelled),
      sent = self.tx.send(item) => sent.map_err(|_| PoolError::IntakeClosed),
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.tx.len()
  }
}

impl<T: Send + 'static> IntakeConsumer<T> {
  /// Wraps a caller-owned queue so executors can read it directly.
  pub(crate) fn from_receiver(rx: AsyncReceiver<T>) -> Self {
    Self { rx }
  }

  /// Takes the next item.
  ///
  /// Returns `None` once the intake is closed and drained, or as soon as the
  /// run is cancelled.
  pub(crate) async fn recv(&self, signal: &CancelSignal) -> Option<T> {
    if signal.is_cancelled() {
      return None;
    }

    tokio::select! {
      biased;
      _ = signal.cancelled() => None,
      received = self.rx.recv() => received.ok(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::time::Duration;
  use tokio_util::sync::CancellationToken;

  fn signal() -> CancelSignal {
    CancelSignal::new(0, CancellationToken::new())
  }

  #[tokio::test]
  async fn test_intake_send_recv() {
    let (producer, consumer) = Intake::<u32>::new(4).split();
    let signal = signal();

    producer.send(1, &signal).await.unwrap();
    producer.send(2, &signal).await.unwrap();
    assert_eq!(producer.len(), 2);

    assert_eq!(consumer.recv(&signal).await, Some(1));
    assert_eq!(consumer.recv(&signal).await, Some(2));
    assert_eq!(producer.len(), 0);
  }

  #[tokio::test]
  async fn test_intake_capacity_blocks_send() {
    let (producer, consumer) = Intake::<u32>::new(1).split();
    let signal = signal();

    producer.send(1, &signal).await.unwrap();

    let send_future = producer.send(2, &signal);
    tokio::pin!(send_future);

    tokio::select! {
      _ = &mut send_future => {
        panic!("Send should have blocked because the intake is full.");
      },
      _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    assert_eq!(consumer.recv(&signal).await, Some(1));

    tokio::time::timeout(Duration::from_millis(50), send_future)
      .await
      .expect("Send did not complete after the intake was drained.")
      .unwrap();
    assert_eq!(consumer.recv(&signal).await, Some(2));
  }

  #[tokio::test]
  async fn test_cancel_unblocks_waiting_send() {
    let (producer, _consumer) = Intake::<u32>::new(1).split();
    let signal = signal();

    producer.send(1, &signal).await.unwrap();

    let canceller = signal.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      canceller.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(1), producer.send(2, &signal))
      .await
      .expect("Cancelled send should not hang.");
    assert_eq!(result, Err(PoolError::Cancelled));
  }

  #[tokio::test]
  async fn test_send_refused_after_cancel() {
    let (producer, consumer) = Intake::<u32>::new(4).split();
    let signal = signal();
    signal.cancel();

    assert_eq!(producer.send(1, &signal).await, Err(PoolError::Cancelled));
    assert_eq!(consumer.recv(&signal).await, None);
  }

  #[tokio::test]
  async fn test_dropping_producer_closes_after_drain() {
    let (producer, consumer) = Intake::<u32>::new(2).split();
    let signal = signal();

    producer.send(5, &signal).await.unwrap();
    drop(producer);

    assert_eq!(consumer.recv(&signal).await, Some(5));
    assert_eq!(consumer.recv(&signal).await, None);
  }

  #[tokio::test]
  async fn test_send_fails_when_consumers_dropped() {
    let (producer, consumer) = Intake::<u32>::new(1).split();
    let signal = signal();
    drop(consumer);

    assert_eq!(producer.send(1, &signal).await, Err(PoolError::IntakeClosed));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_intake_shared_by_many_consumers() {
    let (producer, consumer) = Intake::<u64>::new(4).split();
    let signal = signal();
    let received = Arc::new(AtomicUsize::new(0));
    let num_items: u64 = 40;

    let mut readers = Vec::new();
    for _ in 0..3 {
      let consumer = consumer.clone();
      let signal = signal.clone();
      let received = received.clone();
      readers.push(tokio::spawn(async move {
        while consumer.recv(&signal).await.is_some() {
          received.fetch_add(1, Ordering::SeqCst);
        }
      }));
    }
    drop(consumer);

    for i in 0..num_items {
      producer.send(i, &signal).await.unwrap();
    }
    drop(producer);

    for reader in readers {
      reader.await.unwrap();
    }
    assert_eq!(received.load(Ordering::SeqCst), num_items as usize);
  }
}
