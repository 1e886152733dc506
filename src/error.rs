use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Lock Timeout: shard {shard} not acquired within {waited:?}")]
  Timeout { shard: usize, waited: Duration },
}
