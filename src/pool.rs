use crate::channels::drain_channel;
use crate::error::{PoolError, TaskFailure};
use crate::intake::{Intake, IntakeConsumer, IntakeProducer};
use crate::signal::CancelSignal;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::FutureExt;
use kanal::{AsyncReceiver, AsyncSender};
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// A bounded worker pool.
///
/// Each `run_*` call spawns exactly `concurrency` executors on the pool's
/// runtime handle. The executors share one intake queue, and at most
/// `concurrency` operations execute at any instant. Failures are collected
/// and returned once every executor has exited; they never stop sibling tasks.
///
/// The pool itself holds no running state, so one `WorkerPool` can serve any
/// number of runs, sequentially or concurrently.
#[derive(Debug, Clone)]
pub struct WorkerPool {
  pool_name: Arc<String>,
  concurrency: usize,
  intake_capacity: usize,
  tokio_handle: TokioHandle,
  parent_token: Option<CancellationToken>,
}

impl WorkerPool {
  /// Creates a pool. A `concurrency` of 0 is treated as 1.
  pub fn new(concurrency: usize, tokio_handle: TokioHandle, pool_name: &str) -> Self {
    if concurrency == 0 {
      warn!(pool_name = %pool_name, "Concurrency limit of 0 requested, clamping to 1.");
    }
    let concurrency = concurrency.max(1);

    Self {
      pool_name: Arc::new(pool_name.to_string()),
      concurrency,
      intake_capacity: concurrency,
      tokio_handle,
      parent_token: None,
    }
  }

  /// Sets the capacity of the intake queue used for slice and map sources.
  pub fn with_intake_capacity(mut self, capacity: usize) -> Self {
    self.intake_capacity = capacity.max(1);
    self
  }

  /// Links every run to `token`: cancelling it cancels all runs of this pool.
  ///
  /// Runs use child tokens, so an operation cancelling its own run does not
  /// cancel `token` or any other run.
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.parent_token = Some(token);
    self
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn concurrency(&self) -> usize {
    self.concurrency
  }

  pub fn intake_capacity(&self) -> usize {
    self.intake_capacity
  }

  /// Runs `operation` over every item of an ordered sequence.
  ///
  /// Items are fed to the executors by a dispatcher task in iteration order,
  /// but may complete in any order.
  pub async fn run_slice<I, T, E, F, Fut>(&self, items: I, operation: F) -> Vec<TaskFailure<E>>
  where
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(T, CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    let mut items = items.into_iter().peekable();
    if items.peek().is_none() {
      debug!(pool_name = %self.pool_name, "Run skipped: source is empty.");
      return Vec::new();
    }

    let signal = self.new_signal();
    let (producer, consumer) = Intake::new(self.intake_capacity).split();
    let dispatcher = Self::run_dispatcher(self.pool_name.clone(), items, producer, signal.clone());

    self
      .execute(signal, consumer, Some(dispatcher), Arc::new(operation))
      .await
  }

  /// Runs `operation` over every key/value pair of a mapping.
  ///
  /// The visiting order is whatever the mapping's iterator yields.
  pub async fn run_map<I, K, V, E, F, Fut>(&self, items: I, operation: F) -> Vec<TaskFailure<E>>
  where
    I: IntoIterator<Item = (K, V)>,
    I::IntoIter: Send + 'static,
    K: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
    F: Fn(K, V, CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    self
      .run_slice(items, move |(key, value): (K, V), signal: CancelSignal| operation(key, value, signal))
      .await
  }

  /// Runs `operation` over every item received from a live queue until all of
  /// its senders are dropped and it is drained, or the run is cancelled.
  ///
  /// The executors read `items` directly; no dispatcher task is involved.
  /// Items still buffered in the queue when the run is cancelled are left there.
  pub async fn run_channel<T, E, F, Fut>(&self, items: AsyncReceiver<T>, operation: F) -> Vec<TaskFailure<E>>
  where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(T, CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    let signal = self.new_signal();
    let consumer = IntakeConsumer::from_receiver(items);

    self
      .execute(signal, consumer, None::<std::future::Ready<()>>, Arc::new(operation))
      .await
  }

  fn new_signal(&self) -> CancelSignal {
    let run_id = NEXT_RUN_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let token = match &self.parent_token {
      Some(parent) => parent.child_token(),
      None => CancellationToken::new(),
    };
    CancelSignal::new(run_id, token)
  }

  async fn execute<T, E, F, Fut, D>(
    &self,
    signal: CancelSignal,
    consumer: IntakeConsumer<T>,
    dispatcher: Option<D>,
    operation: Arc<F>,
  ) -> Vec<TaskFailure<E>>
  where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(T, CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    D: Future<Output = ()> + Send + 'static,
  {
    let run_id = signal.run_id();
    info!(pool_name = %self.pool_name, %run_id, concurrency = self.concurrency, "Run started.");

    // If the caller drops this future mid-run, the guard cancels the signal and
    // dropping `tasks` aborts whatever is still running.
    let cancel_on_drop = signal.token().clone().drop_guard();

    let semaphore = Arc::new(Semaphore::new(self.concurrency));
    let (failure_tx, failure_rx) = kanal::unbounded_async::<TaskFailure<E>>();
    let mut tasks = JoinSet::new();

    if let Some(dispatcher) = dispatcher {
      tasks.spawn_on(
        dispatcher.instrument(info_span!("pool_dispatcher", pool_name = %self.pool_name, %run_id)),
        &self.tokio_handle,
      );
    }

    for executor in 0..self.concurrency {
      tasks.spawn_on(
        Self::run_executor(
          self.pool_name.clone(),
          executor,
          consumer.clone(),
          semaphore.clone(),
          failure_tx.clone(),
          signal.clone(),
          operation.clone(),
        )
        .instrument(info_span!("pool_executor", pool_name = %self.pool_name, %run_id, %executor)),
        &self.tokio_handle,
      );
    }

    // Only the executors may keep the intake and the error sink open.
    drop(consumer);
    drop(failure_tx);

    while let Some(joined) = tasks.join_next().await {
      if let Err(join_error) = joined {
        error!(pool_name = %self.pool_name, %run_id, "Error joining pool task: {:?}", join_error);
      }
    }

    let _ = cancel_on_drop.disarm();

    let failures = drain_channel(failure_rx).await;
    info!(
      pool_name = %self.pool_name,
      %run_id,
      failures = failures.len(),
      cancelled = signal.is_cancelled(),
      "Run done."
    );
    failures
  }

  async fn run_dispatcher<I, T>(pool_name: Arc<String>, items: I, producer: IntakeProducer<T>, signal: CancelSignal)
  where
    I: Iterator<Item = T>,
    T: Send + 'static,
  {
    let mut dispatched: u64 = 0;

    for item in items {
      match producer.send(item, &signal).await {
        Ok(()) => dispatched += 1,
        Err(PoolError::Cancelled) => {
          debug!(name = %*pool_name, dispatched, "Dispatcher observed cancellation. No further items accepted.");
          break;
        }
        Err(PoolError::IntakeClosed) => {
          warn!(name = %*pool_name, dispatched, "Intake closed before the source was exhausted. Stopping dispatch.");
          break;
        }
      }
    }

    // Dropping the producer closes the intake; executors drain what remains.
    info!(name = %*pool_name, dispatched, "Dispatch finished. Run draining.");
  }

  async fn run_executor<T, E, F, Fut>(
    pool_name: Arc<String>,
    executor: usize,
    consumer: IntakeConsumer<T>,
    semaphore: Arc<Semaphore>,
    failures: AsyncSender<TaskFailure<E>>,
    signal: CancelSignal,
    operation: Arc<F>,
  ) where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(T, CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    debug!(name = %*pool_name, %executor, "Executor started.");
    let mut processed: u64 = 0;

    while let Some(item) = consumer.recv(&signal).await {
      let permit = match semaphore.clone().acquire_owned().await {
        Ok(p) => p,
        Err(_) => {
          error!(name = %*pool_name, %executor, "Semaphore closed. Executor exiting.");
          break;
        }
      };
      trace!(name = %*pool_name, %executor, "Acquired concurrency token. Available: {}", semaphore.available_permits());

      let task_signal = signal.clone();
      let outcome = AssertUnwindSafe(async { operation(item, task_signal).await })
        .catch_unwind()
        .await;
      drop(permit);
      processed += 1;

      let failure = match outcome {
        Ok(Ok(())) => {
          trace!(name = %*pool_name, %executor, "Task executed successfully.");
          continue;
        }
        Ok(Err(e)) => TaskFailure::Failed(e),
        Err(panic_payload) => {
          error!(name = %*pool_name, %executor, "Task panicked during execution.");
          TaskFailure::Panicked(panic_message(panic_payload))
        }
      };

      // The sink is unbounded, so this never waits on other executors.
      if failures.send(failure).await.is_err() {
        warn!(name = %*pool_name, %executor, "Error sink closed. Task failure was lost.");
      }
    }

    debug!(
      name = %*pool_name,
      %executor,
      processed,
      cancelled = signal.is_cancelled(),
      "Executor stopped."
    );
  }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
