//! Tokio-based bounded worker pools and channel plumbing with cooperative
//! cancellation.
//!
//! [`WorkerPool`] runs an async operation over a sequence, a mapping or a live
//! `kanal` queue using a fixed number of executors and returns every failure.
//! [`broadcast`], [`merge`] and [`distribute`] move items between channels.

mod batch;
mod channels;
mod dedup;
mod error;
mod fan;
mod intake;
mod pool;
mod round_robin;
mod segment;
mod signal;

pub use batch::{batch_map, batch_slice, incremental_batch, BatchAccumulator};
pub use channels::{channel_to_vec, drain_channel, load_channel};
pub use dedup::{deduplicate, Counter, Deduplicator, ObjectCounter, ObjectDeduplicator};
pub use error::{FlowError, TaskFailure};
pub use fan::{broadcast, merge};
pub use pool::WorkerPool;
pub use round_robin::distribute;
pub use segment::{
  incremental_segment_map, incremental_segment_slice, segment_channel, segment_map, segment_slice,
};
pub use signal::CancelSignal;
