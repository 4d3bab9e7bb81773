//! The `RecommendationCache` trait, its error type and value encoding.
//!
//! The cache holds a disposable projection of the keyword store: one entry
//! per user holding that user's deduplicated product ids. It may be flushed
//! at any time without loss of correctness.

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::{ProductId, UserId};

/// Lifetime of a cached recommendation list, counted from write time.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Prefix shared by every key this service writes.
pub const KEY_PREFIX: &str = "recs:";

/// Errors raised by a cache backend. A miss is never an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
  #[error("cache connection failed: {0}")]
  ConnectionFailed(String),
  #[error("cache operation failed: {0}")]
  OperationFailed(String),
  #[error("cache serialization error: {0}")]
  Serialization(String),
}

/// Key-value cache of recommendation lists, keyed by user.
pub trait RecommendationCache: Send + Sync {
  /// `Ok(None)` on a miss; `Ok(Some(vec![]))` is a cached "no recommendations".
  fn get(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Option<Vec<ProductId>>, CacheError>> + Send + '_;

  /// Unconditionally overwrite the entry for `user`.
  fn set(
    &self,
    user: UserId,
    products: Vec<ProductId>,
    ttl: Duration,
  ) -> impl Future<Output = Result<(), CacheError>> + Send + '_;

  /// Remove the entry for `user`; absent entries are not an error.
  fn invalidate(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<(), CacheError>> + Send + '_;

  /// Remove every entry written by this service.
  fn invalidate_all(&self) -> impl Future<Output = Result<(), CacheError>> + Send + '_;
}

/// Cache key for `user`, e.g. `recs:42`.
pub fn cache_key(user: UserId) -> String { format!("{KEY_PREFIX}{user}") }

/// Encode a product list as a JSON array of integers.
pub fn encode_products(products: &[ProductId]) -> Result<Vec<u8>, CacheError> {
  serde_json::to_vec(products).map_err(|e| CacheError::Serialization(e.to_string()))
}

pub fn decode_products(raw: &[u8]) -> Result<Vec<ProductId>, CacheError> {
  serde_json::from_slice(raw).map_err(|e| CacheError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn key_is_prefixed_user_id() {
    assert_eq!(cache_key(UserId::new(42).unwrap()), "recs:42");
  }

  #[test]
  fn encodes_as_json_array() {
    let ids = vec![ProductId::new(10).unwrap(), ProductId::new(3).unwrap()];
    let raw = encode_products(&ids).unwrap();
    assert_eq!(raw, b"[10,3]");
    assert_eq!(decode_products(&raw).unwrap(), ids);
  }

  #[test]
  fn empty_list_is_a_value() {
    assert_eq!(encode_products(&[]).unwrap(), b"[]");
    assert!(decode_products(b"[]").unwrap().is_empty());
  }

  #[test]
  fn corrupt_value_is_serialization_error() {
    assert!(matches!(decode_products(b"{"), Err(CacheError::Serialization(_))));
  }
}
