//! Key-based routing to determine shard assignment.
//!
//! Keys are digested with SHA-256. The first eight digest bytes, read as a
//! big-endian `u64`, are reduced modulo the shard count. Reducing the whole
//! word rather than a single digest byte keeps the distribution uniform for
//! shard counts above 256.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};

/// Maps `key` to a shard index in `0..shard_count`.
///
/// # Errors
///
/// Returns `Error::Config` if `shard_count` is zero.
pub fn shard_index(key: &str, shard_count: usize) -> Result<usize> {
  Ok(Router::new(shard_count)?.route(key))
}

/// Routes keys to shard indices for a fixed shard count.
#[derive(Debug, Clone, Copy)]
pub struct Router {
  shard_count: usize,
}

impl Router {
  /// Creates a new router with the specified shard count.
  ///
  /// # Errors
  ///
  /// Returns `Error::Config` if `shard_count` is zero.
  pub fn new(shard_count: usize) -> Result<Self> {
    if shard_count == 0 {
      return Err(Error::Config(
        "shard_count must be greater than zero".into(),
      ));
    }
    Ok(Self { shard_count })
  }

  /// Routes a key to its assigned shard index.
  ///
  /// # Determinism
  ///
  /// The same key always routes to the same shard, in every process.
  #[inline]
  pub fn route(&self, key: &str) -> usize {
    let digest = Sha256::digest(key.as_bytes());
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(word) % self.shard_count as u64) as usize
  }

  /// Returns the total number of shards.
  pub fn shard_count(&self) -> usize {
    self.shard_count
  }
}
