use std::collections::HashMap;
use std::hash::Hash;

use kanal::AsyncReceiver;

/// Adds `item` to the segment `f` assigns it to, creating the segment if needed.
pub fn incremental_segment_slice<T, S, F>(segments: &mut HashMap<S, Vec<T>>, item: T, f: F)
where
  S: Eq + Hash,
  F: FnOnce(&T) -> S,
{
  let segment = f(&item);
  segments.entry(segment).or_default().push(item);
}

/// Groups `items` by the segment `f` returns for each one.
///
/// Items keep their input order inside a segment.
pub fn segment_slice<I, T, S, F>(items: I, mut f: F) -> HashMap<S, Vec<T>>
where
  I: IntoIterator<Item = T>,
  S: Eq + Hash,
  F: FnMut(&T) -> S,
{
  let mut segments = HashMap::new();
  for item in items {
    incremental_segment_slice(&mut segments, item, &mut f);
  }
  segments
}

/// Adds the `(key, value)` pair to the segment `f` assigns it to.
///
/// A key already present in that segment has its value replaced.
pub fn incremental_segment_map<K, V, S, F>(segments: &mut HashMap<S, HashMap<K, V>>, key: K, value: V, f: F)
where
  K: Eq + Hash,
  S: Eq + Hash,
  F: FnOnce(&K, &V) -> S,
{
  let segment = f(&key, &value);
  segments.entry(segment).or_default().insert(key, value);
}

/// Splits a mapping into smaller mappings keyed by the segment `f` returns.
pub fn segment_map<I, K, V, S, F>(items: I, mut f: F) -> HashMap<S, HashMap<K, V>>
where
  I: IntoIterator<Item = (K, V)>,
  K: Eq + Hash,
  S: Eq + Hash,
  F: FnMut(&K, &V) -> S,
{
  let mut segments = HashMap::new();
  for (key, value) in items {
    incremental_segment_map(&mut segments, key, value, &mut f);
  }
  segments
}

/// Receives every remaining item of `rx` and groups them like [`segment_slice`].
///
/// Completes once all senders of `rx` have been dropped and the buffer is empty.
pub async fn segment_channel<T, S, F>(rx: AsyncReceiver<T>, mut f: F) -> HashMap<S, Vec<T>>
where
  S: Eq + Hash,
  F: FnMut(&T) -> S,
{
  let mut segments = HashMap::new();
  let mut received: u64 = 0;
  while let Ok(item) = rx.recv().await {
    incremental_segment_slice(&mut segments, item, &mut f);
    received += 1;
  }
  tracing::trace!(received, segments = segments.len(), "segment_channel: source closed.");
  segments
}
