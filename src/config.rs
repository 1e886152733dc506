use crate::error::{Error, Result};
use crate::router::Router;
use std::time::Duration;

/// Defines how `ShardedStore::keys` merges the per-shard scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScan {
  /// Every scan thread appends into one accumulator guarded by its own mutex.
  /// The mutex is held only for a single append per shard.
  SharedAccumulator,

  /// Every scan thread fills a private buffer. Buffers are concatenated
  /// after all threads have joined, so nothing is shared during the scan.
  PerShardBuffers,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// Number of independently locked partitions.
  /// Fixed for the lifetime of the store.
  /// Default: 16.
  pub shard_count: usize,

  /// Upper bound on how long the `try_*` operations wait for a shard lock.
  /// If None, they block until the lock is granted and never time out.
  /// Default: None.
  pub lock_timeout: Option<Duration>,

  pub key_scan: KeyScan,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      shard_count: 16,
      lock_timeout: None,
      key_scan: KeyScan::SharedAccumulator,
    }
  }
}

impl StoreOptions {
  pub fn new(shard_count: usize) -> Self {
    Self {
      shard_count,
      ..Default::default()
    }
  }

  /// Checks the options before any shard is allocated.
  pub fn validate(&self) -> Result<()> {
    Router::new(self.shard_count)?;
    self.validate_lock_timeout()
  }

  pub(crate) fn validate_lock_timeout(&self) -> Result<()> {
    if self.lock_timeout == Some(Duration::ZERO) {
      return Err(Error::Config(
        "lock_timeout must be non-zero (use None to block)".into(),
      ));
    }
    Ok(())
  }
}
