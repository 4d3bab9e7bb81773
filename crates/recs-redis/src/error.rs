//! Redis error mapping to the core error types.

use recs_core::{bus::BusError, cache::CacheError};

fn is_connection_error(err: &redis::RedisError) -> bool {
  err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped()
}

/// Maps Redis errors to CacheError.
pub fn map_cache_error(err: redis::RedisError) -> CacheError {
  if is_connection_error(&err) {
    CacheError::ConnectionFailed(err.to_string())
  } else {
    CacheError::OperationFailed(err.to_string())
  }
}

/// Maps Redis errors raised while subscribing to `topic`.
pub fn map_subscribe_error(topic: &str, err: redis::RedisError) -> BusError {
  if is_connection_error(&err) {
    BusError::ConnectionFailed(err.to_string())
  } else {
    BusError::SubscribeFailed { topic: topic.to_owned(), reason: err.to_string() }
  }
}
