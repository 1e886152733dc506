//! A single partition of the key space.
//!
//! Every shard guards its own map with its own reader/writer lock. No method
//! ever touches another shard, and no guard escapes a method call.

use crate::error::{Error, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::time::Duration;

pub(crate) struct Shard<V> {
  id: usize,
  entries: RwLock<HashMap<String, V>>,
}

impl<V> Shard<V> {
  pub fn new(id: usize) -> Self {
    Self {
      id,
      entries: RwLock::new(HashMap::new()),
    }
  }

  /// Inserts or overwrites `key`, returning the previous value.
  pub fn set(&self, key: String, value: V) -> Option<V> {
    self.entries.write().insert(key, value)
  }

  /// Removes `key`. Returns whether it was present.
  pub fn delete(&self, key: &str) -> bool {
    self.entries.write().remove(key).is_some()
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.entries.read().contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.read().is_empty()
  }

  /// Copies out every key present under a single read lock.
  pub fn scan_keys(&self) -> Vec<String> {
    self.entries.read().keys().cloned().collect()
  }

  pub fn set_within(
    &self,
    key: String,
    value: V,
    timeout: Option<Duration>,
  ) -> Result<Option<V>> {
    Ok(self.write_within(timeout)?.insert(key, value))
  }

  pub fn delete_within(&self, key: &str, timeout: Option<Duration>) -> Result<bool> {
    Ok(self.write_within(timeout)?.remove(key).is_some())
  }

  pub fn scan_keys_within(&self, timeout: Option<Duration>) -> Result<Vec<String>> {
    Ok(self.read_within(timeout)?.keys().cloned().collect())
  }

  fn read_within(
    &self,
    timeout: Option<Duration>,
  ) -> Result<RwLockReadGuard<'_, HashMap<String, V>>> {
    match timeout {
      None => Ok(self.entries.read()),
      Some(waited) => self
        .entries
        .try_read_for(waited)
        .ok_or_else(|| self.timed_out(waited)),
    }
  }

  fn write_within(
    &self,
    timeout: Option<Duration>,
  ) -> Result<RwLockWriteGuard<'_, HashMap<String, V>>> {
    match timeout {
      None => Ok(self.entries.write()),
      Some(waited) => self
        .entries
        .try_write_for(waited)
        .ok_or_else(|| self.timed_out(waited)),
    }
  }

  fn timed_out(&self, waited: Duration) -> Error {
    tracing::warn!(
      target: "ironshard",
      "Lock on shard {} not acquired within {:?}",
      self.id,
      waited
    );
    Error::Timeout {
      shard: self.id,
      waited,
    }
  }

  /// Holds this shard's write lock until `f` returns.
  #[cfg(test)]
  pub(crate) fn with_write_locked<R>(&self, f: impl FnOnce() -> R) -> R {
    let _guard = self.entries.write();
    f()
  }
}

impl<V: Clone> Shard<V> {
  /// Returns a clone of the value for `key`. The read lock covers the lookup only.
  pub fn get(&self, key: &str) -> Option<V> {
    self.entries.read().get(key).cloned()
  }

  pub fn get_within(&self, key: &str, timeout: Option<Duration>) -> Result<Option<V>> {
    Ok(self.read_within(timeout)?.get(key).cloned())
  }
}
