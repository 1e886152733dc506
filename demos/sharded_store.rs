//! Example: Using ShardedStore from several threads
//!
//! This example demonstrates:
//! - Routing keys to shards
//! - Concurrent writers on independent shards
//! - Enumerating keys across all shards
//! - Bounded lock waits

use ironshard::{ShardedStore, StoreOptions};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> ironshard::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  println!("=== IronShard Example ===\n");

  // 1. Create a store with 5 shards
  let store = ShardedStore::with_shards(5)?;
  store.set("alpha", 1);
  store.set("beta", 2);
  store.set("gamma", 3);

  for key in ["alpha", "beta", "gamma"] {
    println!("  {} -> {:?} (shard {})", key, store.get(key), store.shard_for(key));
  }

  let mut keys = store.keys();
  keys.sort();
  println!("  keys: {:?}", keys);

  println!("\n--- Deleting ---");
  println!("  delete(beta) = {}", store.delete("beta"));
  println!("  get(beta) = {:?}", store.get("beta"));

  // 2. Concurrent writers
  println!("\n--- Concurrent Writes ---");
  let mut opts = StoreOptions::new(16);
  opts.lock_timeout = Some(Duration::from_millis(50));
  let store = Arc::new(ShardedStore::new(opts)?);

  let handles: Vec<_> = (0..4)
    .map(|worker| {
      let store = store.clone();
      thread::spawn(move || -> ironshard::Result<()> {
        for i in 0..250 {
          store.try_set(format!("worker_{}_item_{}", worker, i), i)?;
        }
        Ok(())
      })
    })
    .collect();

  for h in handles {
    h.join().expect("worker panicked")?;
  }

  println!("  {} entries across {} shards", store.len(), store.shard_count());
  println!("  per shard: {:?}", store.shard_lens());

  Ok(())
}
