#![allow(dead_code)]

use ironshard::{KeyScan, ShardedStore, StoreOptions};
use std::collections::HashSet;
use std::time::Duration;

/// Installs a test-scoped subscriber once. Filter with `RUST_LOG=ironshard=trace`.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

pub fn setup<V>(shard_count: usize) -> ShardedStore<V> {
  init_tracing();
  ShardedStore::with_shards(shard_count).unwrap()
}

pub fn setup_with(
  shard_count: usize,
  key_scan: KeyScan,
  lock_timeout: Option<Duration>,
) -> ShardedStore<i64> {
  init_tracing();
  let mut opts = StoreOptions::new(shard_count);
  opts.key_scan = key_scan;
  opts.lock_timeout = lock_timeout;
  ShardedStore::new(opts).unwrap()
}

/// Collects `keys()` output into a set, asserting it held no duplicates.
pub fn key_set(keys: Vec<String>) -> HashSet<String> {
  let len = keys.len();
  let set: HashSet<String> = keys.into_iter().collect();
  assert_eq!(set.len(), len, "keys() returned duplicates");
  set
}

pub fn names(keys: &[&str]) -> HashSet<String> {
  keys.iter().map(|k| k.to_string()).collect()
}
