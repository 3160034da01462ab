use std::collections::HashMap;
use std::hash::Hash;

/// Folds `item` into `state`, emitting a batch once `batch_size` elements
/// have accumulated.
///
/// Returns the new state and the completed batch, if any. A `batch_size` of
/// 0 is treated as 1.
pub fn incremental_batch<T>(mut state: Vec<T>, item: T, batch_size: usize) -> (Vec<T>, Option<Vec<T>>) {
  let batch_size = batch_size.max(1);
  state.push(item);
  if state.len() < batch_size {
    return (state, None);
  }
  let remainder = state.split_off(batch_size);
  (remainder, Some(state))
}

/// Owned form of [`incremental_batch`]: collects items one at a time and
/// hands back fixed-size batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAccumulator<T> {
  buffer: Vec<T>,
  batch_size: usize,
}

impl<T> BatchAccumulator<T> {
  pub fn new(batch_size: usize) -> Self {
    let batch_size = batch_size.max(1);
    Self {
      buffer: Vec::with_capacity(batch_size),
      batch_size,
    }
  }

  /// Adds `item` and returns a batch if the buffer just became full.
  pub fn insert(&mut self, item: T) -> Option<Vec<T>> {
    let state = std::mem::take(&mut self.buffer);
    let (state, batch) = incremental_batch(state, item, self.batch_size);
    self.buffer = state;
    batch
  }

  /// Takes whatever is buffered, even if it is a short batch.
  pub fn flush(&mut self) -> Option<Vec<T>> {
    if self.buffer.is_empty() {
      None
    } else {
      Some(std::mem::take(&mut self.buffer))
    }
  }

  pub fn pending(&self) -> &[T] {
    &self.buffer
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn batch_size(&self) -> usize {
    self.batch_size
  }
}

/// Splits `items` into batches of `size`; the last batch may be shorter.
pub fn batch_slice<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
  items.chunks(size.max(1)).map(|chunk| chunk.to_vec()).collect()
}

/// Splits a mapping into mappings of at most `size` entries.
///
/// Which entries land in which batch follows the map's iteration order.
pub fn batch_map<K, V, S>(items: HashMap<K, V, S>, size: usize) -> Vec<HashMap<K, V>>
where
  K: Eq + Hash,
{
  let size = size.max(1);
  let mut batches = Vec::with_capacity(items.len() / size + 1);
  let mut batch = HashMap::with_capacity(size);

  for (key, value) in items {
    batch.insert(key, value);
    if batch.len() == size {
      batches.push(std::mem::replace(&mut batch, HashMap::with_capacity(size)));
    }
  }
  if !batch.is_empty() {
    batches.push(batch);
  }
  batches
}
