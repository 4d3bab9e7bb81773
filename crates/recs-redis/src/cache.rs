//! Redis recommendation cache.
//!
//! Every entry key is also recorded in an index set so that a global
//! invalidation removes only this service's keys, without `SCAN` and without
//! flushing a shared database. Writing an entry and indexing it happen in
//! one `MULTI`, and a flush drains the index in one `MULTI`, so an entry is
//! always either covered by the flush or indexed for the next one.

use std::time::Duration;

use redis::{AsyncCommands, aio::ConnectionManager};

use recs_core::{
  ProductId, UserId,
  cache::{
    CacheError, KEY_PREFIX, RecommendationCache, cache_key, decode_products,
    encode_products,
  },
};

use crate::{CONNECT_TIMEOUT, error::map_cache_error};

/// Redis cache backend using a connection manager for reconnection.
#[derive(Clone)]
pub struct RedisCache {
  conn:  ConnectionManager,
  index: String,
}

impl RedisCache {
  /// Connect to `url`, e.g. `redis://localhost:6379`.
  ///
  /// # Errors
  ///
  /// Returns `CacheError::ConnectionFailed` if no connection can be made
  /// within [`CONNECT_TIMEOUT`].
  pub async fn new(url: &str) -> Result<Self, CacheError> {
    let client = redis::Client::open(url).map_err(map_cache_error)?;
    let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
      .await
      .map_err(|_| {
        CacheError::ConnectionFailed(format!("no connection within {CONNECT_TIMEOUT:?}"))
      })?
      .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
    Ok(Self { conn, index: format!("{KEY_PREFIX}index") })
  }
}

impl RecommendationCache for RedisCache {
  async fn get(&self, user: UserId) -> Result<Option<Vec<ProductId>>, CacheError> {
    let mut conn = self.conn.clone();
    let raw: Option<Vec<u8>> = conn.get(cache_key(user)).await.map_err(map_cache_error)?;
    raw.map(|bytes| decode_products(&bytes)).transpose()
  }

  async fn set(
    &self,
    user: UserId,
    products: Vec<ProductId>,
    ttl: Duration,
  ) -> Result<(), CacheError> {
    let mut conn = self.conn.clone();
    let key = cache_key(user);
    let value = encode_products(&products)?;
    let seconds = ttl.as_secs().max(1);

    let _: () = redis::pipe()
      .atomic()
      .set_ex(&key, value, seconds)
      .ignore()
      .sadd(&self.index, &key)
      .ignore()
      .query_async(&mut conn)
      .await
      .map_err(map_cache_error)?;
    Ok(())
  }

  async fn invalidate(&self, user: UserId) -> Result<(), CacheError> {
    let mut conn = self.conn.clone();
    let key = cache_key(user);

    let _: () = redis::pipe()
      .atomic()
      .del(&key)
      .ignore()
      .srem(&self.index, &key)
      .ignore()
      .query_async(&mut conn)
      .await
      .map_err(map_cache_error)?;
    Ok(())
  }

  async fn invalidate_all(&self) -> Result<(), CacheError> {
    let mut conn = self.conn.clone();

    let (keys, _): (Vec<String>, i64) = redis::pipe()
      .atomic()
      .smembers(&self.index)
      .del(&self.index)
      .query_async(&mut conn)
      .await
      .map_err(map_cache_error)?;

    // Expired entries may still be indexed; DEL on a missing key is a no-op.
    for chunk in keys.chunks(512) {
      conn.del::<_, ()>(chunk.to_vec()).await.map_err(map_cache_error)?;
    }

    tracing::debug!(entries = keys.len(), "flushed recommendation cache");
    Ok(())
  }
}
