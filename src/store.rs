//! ShardedStore implementation - the main public API.

use crate::config::{KeyScan, StoreOptions};
use crate::error::Result;
use crate::router::Router;
use crate::shard::Shard;

use parking_lot::Mutex;
use std::convert::Infallible;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

/// Shard counts beyond this multiple of the available parallelism add memory
/// without reducing contention.
const OVERSHARD_FACTOR: usize = 16;

/// Floor on scan threads for `keys()` on machines with few cores.
const MIN_SCAN_THREADS: usize = 16;

/// A key-value map partitioned across independently locked shards.
///
/// Every key routes to exactly one shard, so operations on keys in different
/// shards never contend. Whole-store operations visit each shard under that
/// shard's own lock and are therefore consistent per shard, not atomic
/// across shards.
///
/// # Example
///
/// ```
/// use ironshard::ShardedStore;
///
/// # fn main() -> ironshard::Result<()> {
/// let store = ShardedStore::with_shards(5)?;
/// store.set("alpha", 1);
/// store.set("beta", 2);
///
/// assert_eq!(store.get("alpha"), Some(1));
/// assert!(store.delete("beta"));
/// assert_eq!(store.keys(), vec!["alpha".to_string()]);
/// # Ok(())
/// # }
/// ```
pub struct ShardedStore<V> {
  shards: Vec<Shard<V>>,
  router: Router,
  lock_timeout: Option<Duration>,
  key_scan: KeyScan,
}

impl<V> ShardedStore<V> {
  /// Creates a store with `opts.shard_count` empty shards.
  ///
  /// # Errors
  ///
  /// Returns `Error::Config` if `shard_count` is zero or `lock_timeout`
  /// is `Some(Duration::ZERO)`.
  pub fn new(opts: StoreOptions) -> Result<Self> {
    let router = Router::new(opts.shard_count)?;
    opts.validate_lock_timeout()?;

    if let Ok(cores) = thread::available_parallelism() {
      let limit = cores.get() * OVERSHARD_FACTOR;
      if opts.shard_count > limit {
        tracing::warn!(
          target: "ironshard",
          "shard_count ({}) exceeds {}x available parallelism ({}). \
           Extra shards cost memory without reducing contention",
          opts.shard_count,
          OVERSHARD_FACTOR,
          cores
        );
      }
    }

    let shards = (0..opts.shard_count).map(Shard::new).collect();

    tracing::debug!(
      target: "ironshard",
      shard_count = opts.shard_count,
      lock_timeout = ?opts.lock_timeout,
      key_scan = ?opts.key_scan,
      "Created sharded store"
    );

    Ok(Self {
      shards,
      router,
      lock_timeout: opts.lock_timeout,
      key_scan: opts.key_scan,
    })
  }

  /// Creates a store with `shard_count` shards and default options.
  pub fn with_shards(shard_count: usize) -> Result<Self> {
    Self::new(StoreOptions::new(shard_count))
  }

  /// Inserts or overwrites `key`, returning the previous value.
  pub fn set(&self, key: impl Into<String>, value: V) -> Option<V> {
    let key = key.into();
    self.shard(&key).set(key, value)
  }

  /// Removes `key`. Returns `true` if it was present.
  pub fn delete(&self, key: &str) -> bool {
    self.shard(key).delete(key)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.shard(key).contains_key(key)
  }

  /// Like `set`, but gives up after `lock_timeout`.
  pub fn try_set(&self, key: impl Into<String>, value: V) -> Result<Option<V>> {
    let key = key.into();
    self.shard(&key).set_within(key, value, self.lock_timeout)
  }

  /// Like `delete`, but gives up after `lock_timeout`.
  pub fn try_delete(&self, key: &str) -> Result<bool> {
    self.shard(key).delete_within(key, self.lock_timeout)
  }

  /// Returns the index of the shard that owns `key`.
  pub fn shard_for(&self, key: &str) -> usize {
    self.router.route(key)
  }

  pub fn shard_count(&self) -> usize {
    self.router.shard_count()
  }

  /// Total number of entries. Each shard is counted under its own lock.
  pub fn len(&self) -> usize {
    self.shards.iter().map(Shard::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.shards.iter().all(Shard::is_empty)
  }

  /// Number of entries held by each shard, indexed by shard id.
  pub fn shard_lens(&self) -> Vec<usize> {
    self.shards.iter().map(Shard::len).collect()
  }

  fn shard(&self, key: &str) -> &Shard<V> {
    &self.shards[self.router.route(key)]
  }
}

impl<V: Clone> ShardedStore<V> {
  /// Returns a clone of the value stored for `key`.
  pub fn get(&self, key: &str) -> Option<V> {
    self.shard(key).get(key)
  }

  /// Like `get`, but gives up after `lock_timeout`.
  pub fn try_get(&self, key: &str) -> Result<Option<V>> {
    self.shard(key).get_within(key, self.lock_timeout)
  }
}

impl<V: Send + Sync> ShardedStore<V> {
  /// Lists every key in the store, in no particular order.
  ///
  /// Shards are scanned in parallel on a bounded set of threads, each
  /// covering a contiguous run of shards. Each shard's keys reflect a single
  /// read of that shard; writes racing with the scan may or may not be
  /// visible depending on when that shard was read.
  pub fn keys(&self) -> Vec<String> {
    let Ok(keys) = self.scan(|shard| Ok::<_, Infallible>(shard.scan_keys()));
    keys
  }

  /// Like `keys`, but fails if any shard's read lock is not granted within
  /// `lock_timeout`. A scan thread stops at its first timed out shard; the
  /// other threads run to completion and their keys are discarded.
  pub fn try_keys(&self) -> Result<Vec<String>> {
    let timeout = self.lock_timeout;
    self.scan(|shard| shard.scan_keys_within(timeout))
  }

  fn scan<E, F>(&self, scan_shard: F) -> std::result::Result<Vec<String>, E>
  where
    E: Send,
    F: Fn(&Shard<V>) -> std::result::Result<Vec<String>, E> + Sync,
  {
    let keys = match self.key_scan {
      KeyScan::SharedAccumulator => self.scan_into_accumulator(&scan_shard)?,
      KeyScan::PerShardBuffers => self.scan_into_buffers(&scan_shard)?,
    };

    tracing::trace!(
      target: "ironshard",
      "Scanned {} keys across {} shards",
      keys.len(),
      self.shards.len()
    );

    Ok(keys)
  }

  /// Number of shards each scan thread covers.
  ///
  /// Scan threads spend most of their time waiting on shard locks, so the
  /// thread count may exceed the core count. It is capped at the larger of
  /// `MIN_SCAN_THREADS` and the available parallelism.
  fn scan_chunk_len(&self) -> usize {
    let threads = thread::available_parallelism()
      .map_or(1, NonZeroUsize::get)
      .max(MIN_SCAN_THREADS)
      .min(self.shards.len());
    self.shards.len().div_ceil(threads)
  }

  fn scan_into_accumulator<E, F>(&self, scan_shard: &F) -> std::result::Result<Vec<String>, E>
  where
    E: Send,
    F: Fn(&Shard<V>) -> std::result::Result<Vec<String>, E> + Sync,
  {
    // Guards only the merge; never held while a shard lock is being acquired.
    let accumulator = Mutex::new(Vec::new());
    let first_error = Mutex::new(None);

    thread::scope(|s| {
      for chunk in self.shards.chunks(self.scan_chunk_len()) {
        let accumulator = &accumulator;
        let first_error = &first_error;
        s.spawn(move || {
          for shard in chunk {
            match scan_shard(shard) {
              Ok(keys) => accumulator.lock().extend(keys),
              Err(e) => {
                first_error.lock().get_or_insert(e);
                return;
              }
            }
          }
        });
      }
    });

    match first_error.into_inner() {
      Some(e) => Err(e),
      None => Ok(accumulator.into_inner()),
    }
  }

  fn scan_into_buffers<E, F>(&self, scan_shard: &F) -> std::result::Result<Vec<String>, E>
  where
    E: Send,
    F: Fn(&Shard<V>) -> std::result::Result<Vec<String>, E> + Sync,
  {
    let buffers: Vec<std::result::Result<Vec<String>, E>> = thread::scope(|s| {
      let handles: Vec<_> = self
        .shards
        .chunks(self.scan_chunk_len())
        .map(|chunk| {
          s.spawn(move || {
            let mut buffer = Vec::new();
            for shard in chunk {
              buffer.extend(scan_shard(shard)?);
            }
            Ok::<_, E>(buffer)
          })
        })
        .collect();

      handles
        .into_iter()
        .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
        .collect()
    });

    let mut keys = Vec::new();
    for buffer in buffers {
      keys.extend(buffer?);
    }
    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use std::collections::HashSet;
  use std::sync::Arc;
  use std::sync::mpsc;
  use std::time::Instant;

  /// Write-locks `shard` on a helper thread until the returned sender fires.
  fn hold_write_lock(
    store: &Arc<ShardedStore<i32>>,
    shard: usize,
  ) -> (thread::JoinHandle<()>, mpsc::Sender<()>) {
    let (locked_tx, locked_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let store = store.clone();
    let holder = thread::spawn(move || {
      store.shards[shard].with_write_locked(|| {
        locked_tx.send(()).unwrap();
        release_rx.recv().unwrap();
      })
    });
    locked_rx.recv().unwrap();
    (holder, release_tx)
  }

  fn key_set(keys: Vec<String>) -> HashSet<String> {
    let len = keys.len();
    let set: HashSet<String> = keys.into_iter().collect();
    assert_eq!(set.len(), len, "keys() returned duplicates");
    set
  }

  #[test]
  fn test_construction_validation() {
    assert!(matches!(
      ShardedStore::<i32>::with_shards(0),
      Err(Error::Config(_))
    ));

    let store = ShardedStore::<i32>::with_shards(5).unwrap();
    assert_eq!(store.shard_count(), 5);
    assert!(store.is_empty());
    assert_eq!(store.shard_lens(), vec![0; 5]);
  }

  #[test]
  fn test_key_lands_in_routed_shard() {
    let store = ShardedStore::with_shards(8).unwrap();

    for i in 0..200 {
      let key = format!("key_{}", i);
      store.set(key.as_str(), i);
      let shard_id = store.shard_for(&key);
      assert!(store.shards[shard_id].contains_key(&key));

      for (other_id, other) in store.shards.iter().enumerate() {
        if other_id != shard_id {
          assert!(!other.contains_key(&key), "{} present in two shards", key);
        }
      }
    }

    assert_eq!(store.shard_lens().iter().sum::<usize>(), 200);
  }

  #[test]
  fn test_len_tracks_overwrites_and_deletes() {
    let store = ShardedStore::with_shards(4).unwrap();
    store.set("a", 1);
    store.set("b", 2);
    assert_eq!(store.set("a", 10), Some(1));
    assert_eq!(store.len(), 2);

    assert!(store.delete("a"));
    assert!(!store.delete("a"));
    assert_eq!(store.len(), 1);
    assert!(store.contains_key("b"));
    assert!(!store.contains_key("a"));
  }

  #[test]
  fn test_both_scan_strategies_agree() {
    let mut opts = StoreOptions::new(7);
    let shared = ShardedStore::new(opts.clone()).unwrap();
    opts.key_scan = KeyScan::PerShardBuffers;
    let buffered = ShardedStore::new(opts).unwrap();

    for i in 0..500 {
      shared.set(format!("key_{}", i), i);
      buffered.set(format!("key_{}", i), i);
    }

    let expected: HashSet<String> = (0..500).map(|i| format!("key_{}", i)).collect();
    assert_eq!(key_set(shared.keys()), expected);
    assert_eq!(key_set(buffered.keys()), expected);
  }

  #[test]
  fn test_keys_on_empty_store() {
    let store = ShardedStore::<u8>::with_shards(3).unwrap();
    assert!(store.keys().is_empty());
    assert_eq!(store.try_keys(), Ok(Vec::new()));
  }

  #[test]
  fn test_try_keys_reports_locked_shard() {
    for key_scan in [KeyScan::SharedAccumulator, KeyScan::PerShardBuffers] {
      let mut opts = StoreOptions::new(4);
      opts.lock_timeout = Some(Duration::from_millis(20));
      opts.key_scan = key_scan;
      let store = Arc::new(ShardedStore::new(opts).unwrap());
      store.set("alpha", 1);

      let locked = store.shard_for("alpha");
      let (locked_tx, locked_rx) = mpsc::channel();
      let (release_tx, release_rx) = mpsc::channel::<()>();

      let holder = {
        let store = store.clone();
        thread::spawn(move || {
          store.shards[locked].with_write_locked(|| {
            locked_tx.send(()).unwrap();
            release_rx.recv().unwrap();
          })
        })
      };

      locked_rx.recv().unwrap();
      assert!(matches!(
        store.try_keys(),
        Err(Error::Timeout { shard, .. }) if shard == locked
      ));
      assert!(store.try_get("alpha").is_err());
      assert!(store.try_set("alpha", 2).is_err());
      assert!(store.try_delete("alpha").is_err());

      release_tx.send(()).unwrap();
      holder.join().unwrap();

      assert_eq!(store.try_keys(), Ok(vec!["alpha".to_string()]));
      assert_eq!(store.try_get("alpha"), Ok(Some(1)));
    }
  }

  #[test]
  fn test_locked_shards_wait_in_parallel() {
    let timeout = Duration::from_millis(200);

    for key_scan in [KeyScan::SharedAccumulator, KeyScan::PerShardBuffers] {
      let mut opts = StoreOptions::new(4);
      opts.lock_timeout = Some(timeout);
      opts.key_scan = key_scan;
      let store = Arc::new(ShardedStore::new(opts).unwrap());

      let (first, release_first) = hold_write_lock(&store, 0);
      let (second, release_second) = hold_write_lock(&store, 1);

      let started = Instant::now();
      let result = store.try_keys();
      let elapsed = started.elapsed();

      release_first.send(()).unwrap();
      release_second.send(()).unwrap();
      first.join().unwrap();
      second.join().unwrap();

      assert!(matches!(
        result,
        Err(Error::Timeout { shard: 0 | 1, .. })
      ));
      // Two timed out shards waited on sequentially would take 2x the timeout.
      assert!(elapsed >= timeout, "{:?}: returned early after {:?}", key_scan, elapsed);
      assert!(
        elapsed < timeout * 7 / 4,
        "{:?}: locked shards were waited on one after another ({:?})",
        key_scan,
        elapsed
      );
    }
  }

  #[test]
  fn test_scan_threads_are_bounded() {
    let store = ShardedStore::<u8>::with_shards(10_000).unwrap();
    let chunk_len = store.scan_chunk_len();
    let threads = store.shard_count().div_ceil(chunk_len);
    let cap = thread::available_parallelism()
      .map_or(1, NonZeroUsize::get)
      .max(MIN_SCAN_THREADS);

    assert!(threads <= cap, "{} scan threads for cap {}", threads, cap);
    assert!(threads * chunk_len >= store.shard_count());

    // Small stores still get one thread per shard.
    let small = ShardedStore::<u8>::with_shards(4).unwrap();
    assert_eq!(small.scan_chunk_len(), 1);
  }

  #[test]
  fn test_shard_count_matches_router() {
    let store = ShardedStore::<u8>::with_shards(9).unwrap();
    assert_eq!(store.shard_count(), 9);
    assert_eq!(store.shard_count(), store.shards.len());
  }
}
