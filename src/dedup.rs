use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Remembers values it has seen so later occurrences can be dropped.
#[derive(Debug, Clone)]
pub struct Deduplicator<T> {
  seen: HashSet<T>,
}

impl<T: Eq + Hash> Default for Deduplicator<T> {
  fn default() -> Self {
    Self { seen: HashSet::new() }
  }
}

impl<T: Eq + Hash + Clone> Deduplicator<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records `value` and returns `true` if it had not been seen before.
  pub fn add(&mut self, value: T) -> bool {
    self.seen.insert(value)
  }

  pub fn seen(&self, value: &T) -> bool {
    self.seen.contains(value)
  }

  pub fn reset(&mut self) {
    self.seen.clear();
  }

  /// Returns the values not seen before, in their original order.
  pub fn deduplicate(&mut self, values: &[T]) -> Vec<T> {
    values.iter().filter(|v| self.add((*v).clone())).cloned().collect()
  }

  /// Returns the indices of `values` that are duplicates.
  pub fn duplicate_indices(&mut self, values: &[T]) -> Vec<usize> {
    values
      .iter()
      .enumerate()
      .filter(|(_, v)| !self.add((*v).clone()))
      .map(|(idx, _)| idx)
      .collect()
  }
}

/// Returns `values` without repeated elements, keeping first occurrences.
pub fn deduplicate<T: Eq + Hash + Clone>(values: &[T]) -> Vec<T> {
  Deduplicator::new().deduplicate(values)
}

/// Counts occurrences of values.
#[derive(Debug, Clone)]
pub struct Counter<T> {
  counts: HashMap<T, usize>,
}

impl<T: Eq + Hash> Default for Counter<T> {
  fn default() -> Self {
    Self { counts: HashMap::new() }
  }
}

impl<T: Eq + Hash + Clone> Counter<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds one occurrence of `value` and returns its new count.
  pub fn add(&mut self, value: T) -> usize {
    let count = self.counts.entry(value).or_insert(0);
    *count += 1;
    *count
  }

  pub fn count(&self, value: &T) -> usize {
    self.counts.get(value).copied().unwrap_or(0)
  }

  pub fn add_many(&mut self, values: &[T]) {
    for value in values {
      self.add(value.clone());
    }
  }

  pub fn reset(&mut self) {
    self.counts.clear();
  }
}

/// A [`Deduplicator`] over values identified by a key function. Values
/// mapping to the same key are treated as duplicates.
pub struct ObjectDeduplicator<T, K> {
  inner: Deduplicator<K>,
  to_key: Box<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T, K> fmt::Debug for ObjectDeduplicator<T, K> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ObjectDeduplicator")
      .field("seen", &self.inner.seen.len())
      .finish_non_exhaustive()
  }
}

impl<T: Clone, K: Eq + Hash + Clone> ObjectDeduplicator<T, K> {
  pub fn new(to_key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
    Self {
      inner: Deduplicator::new(),
      to_key: Box::new(to_key),
    }
  }

  pub fn add(&mut self, value: &T) -> bool {
    self.inner.add((self.to_key)(value))
  }

  pub fn seen(&self, value: &T) -> bool {
    self.inner.seen(&(self.to_key)(value))
  }

  pub fn reset(&mut self) {
    self.inner.reset();
  }

  pub fn deduplicate(&mut self, values: &[T]) -> Vec<T> {
    values.iter().filter(|v| self.add(v)).cloned().collect()
  }

  pub fn duplicate_indices(&mut self, values: &[T]) -> Vec<usize> {
    values
      .iter()
      .enumerate()
      .filter(|(_, v)| !self.add(v))
      .map(|(idx, _)| idx)
      .collect()
  }
}

/// A [`Counter`] over values identified by a key function.
pub struct ObjectCounter<T, K> {
  inner: Counter<K>,
  to_key: Box<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T, K> fmt::Debug for ObjectCounter<T, K> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ObjectCounter")
      .field("keys", &self.inner.counts.len())
      .finish_non_exhaustive()
  }
}

impl<T, K: Eq + Hash + Clone> ObjectCounter<T, K> {
  pub fn new(to_key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
    Self {
      inner: Counter::new(),
      to_key: Box::new(to_key),
    }
  }

  pub fn add(&mut self, value: &T) -> usize {
    self.inner.add((self.to_key)(value))
  }

  pub fn count(&self, value: &T) -> usize {
    self.inner.count(&(self.to_key)(value))
  }

  pub fn add_many(&mut self, values: &[T]) {
    for value in values {
      self.add(value);
    }
  }

  pub fn reset(&mut self) {
    self.inner.reset();
  }
}
