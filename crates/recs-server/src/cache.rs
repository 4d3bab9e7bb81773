//! Cache backend chosen at startup from configuration.

use std::time::Duration;

use recs_core::{
  ProductId, UserId,
  cache::{CacheError, RecommendationCache},
};
use recs_engine::memory::MemoryCache;
use recs_redis::RedisCache;

use crate::config::{CacheBackend, CacheConfig};

pub enum AnyCache {
  Memory(MemoryCache),
  Redis(RedisCache),
}

impl AnyCache {
  pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
    Ok(match config.backend {
      CacheBackend::Memory => AnyCache::Memory(MemoryCache::new(config.max_entries)),
      CacheBackend::Redis => AnyCache::Redis(RedisCache::new(&config.url).await?),
    })
  }

  pub fn backend(&self) -> CacheBackend {
    match self {
      AnyCache::Memory(_) => CacheBackend::Memory,
      AnyCache::Redis(_) => CacheBackend::Redis,
    }
  }
}

impl RecommendationCache for AnyCache {
  async fn get(&self, user: UserId) -> Result<Option<Vec<ProductId>>, CacheError> {
    match self {
      AnyCache::Memory(c) => c.get(user).await,
      AnyCache::Redis(c) => c.get(user).await,
    }
  }

  async fn set(
    &self,
    user: UserId,
    products: Vec<ProductId>,
    ttl: Duration,
  ) -> Result<(), CacheError> {
    match self {
      AnyCache::Memory(c) => c.set(user, products, ttl).await,
      AnyCache::Redis(c) => c.set(user, products, ttl).await,
    }
  }

  async fn invalidate(&self, user: UserId) -> Result<(), CacheError> {
    match self {
      AnyCache::Memory(c) => c.invalidate(user).await,
      AnyCache::Redis(c) => c.invalidate(user).await,
    }
  }

  async fn invalidate_all(&self) -> Result<(), CacheError> {
    match self {
      AnyCache::Memory(c) => c.invalidate_all().await,
      AnyCache::Redis(c) => c.invalidate_all().await,
    }
  }
}
