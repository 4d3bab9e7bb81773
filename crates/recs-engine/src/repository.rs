//! [`RecommendationRepository`]: cache-aside reads over the keyword store,
//! and writes that update the store before invalidating the cache.
//!
//! # Consistency
//!
//! A write commits to the store first and invalidates afterwards. A read that
//! runs between the two can repopulate the cache from the committed state;
//! the invalidation that follows then discards that entry. A read that began
//! before the commit can still serve or cache the previous list until the
//! invalidation runs. That window is accepted: the cache never survives an
//! invalidation, and every entry is derivable from some committed state.

use std::{future::Future, time::Duration};

use recs_core::{
  Error, ProductId, Result, UserId,
  cache::{DEFAULT_TTL, RecommendationCache},
  event::{ProductAction, ProductUpdate, UpdateEvent, UserUpdate},
  keyword::{DELETION_MARKER, dedup_ids, dedup_keywords},
  store::KeywordStore,
};
use serde::Deserialize;

// ─── Policies ────────────────────────────────────────────────────────────────

/// What a failed cache write on the read path does to the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWritePolicy {
  /// Log and return the freshly computed list anyway.
  #[default]
  BestEffort,
  /// Fail the read with [`Error::CacheUnavailable`].
  Propagate,
}

/// How a product deletion is recorded in the keyword store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
  /// Replace the product's keywords with the reserved deletion marker.
  #[default]
  Tombstone,
  /// Replace the product's keywords with the empty set.
  Clear,
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
  pub cache_ttl:      Duration,
  pub cache_write:    CacheWritePolicy,
  pub product_delete: DeletePolicy,
}

impl Default for RepositoryConfig {
  fn default() -> Self {
    Self {
      cache_ttl:      DEFAULT_TTL,
      cache_write:    CacheWritePolicy::default(),
      product_delete: DeletePolicy::default(),
    }
  }
}

// ─── Repository ──────────────────────────────────────────────────────────────

/// Orchestrates a [`KeywordStore`] and a [`RecommendationCache`].
///
/// Safe to share behind an `Arc` between the query endpoint and the
/// dispatcher; both backends handle concurrent callers.
pub struct RecommendationRepository<S, C> {
  store:  S,
  cache:  C,
  config: RepositoryConfig,
}

impl<S, C> RecommendationRepository<S, C>
where
  S: KeywordStore,
  C: RecommendationCache,
{
  pub fn new(store: S, cache: C, config: RepositoryConfig) -> Self {
    Self { store, cache, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn cache(&self) -> &C { &self.cache }

  pub fn config(&self) -> &RepositoryConfig { &self.config }

  // ── Read path ───────────────────────────────────────────────────────────

  /// Deduplicated product ids recommended to `user`.
  ///
  /// Served from the cache when possible. An unavailable cache degrades to a
  /// store read; store failures (including an unknown user) propagate.
  pub async fn get_recommendations(&self, user: UserId) -> Result<Vec<ProductId>> {
    match self.cache.get(user).await {
      Ok(Some(products)) => {
        tracing::debug!(user_id = %user, count = products.len(), "recommendations served from cache");
        return Ok(products);
      }
      Ok(None) => tracing::debug!(user_id = %user, "recommendation cache miss"),
      Err(error) => {
        tracing::warn!(user_id = %user, %error, "cache unavailable, reading keyword store");
      }
    }

    let products = self
      .store
      .product_ids_for_user(user)
      .await
      .map_err(Into::<Error>::into)?;
    let products = dedup_ids(products);

    if let Err(error) = self
      .cache
      .set(user, products.clone(), self.config.cache_ttl)
      .await
    {
      match self.config.cache_write {
        CacheWritePolicy::BestEffort => {
          tracing::warn!(user_id = %user, %error, "failed to cache recommendations");
        }
        CacheWritePolicy::Propagate => {
          tracing::error!(user_id = %user, %error, "failed to cache recommendations");
          return Err(Error::CacheUnavailable(error));
        }
      }
    }

    tracing::debug!(user_id = %user, count = products.len(), "recommendations computed from store");
    Ok(products)
  }

  /// [`get_recommendations`](Self::get_recommendations), abandoned with
  /// [`Error::Cancelled`] if `cancel` resolves first.
  ///
  /// Abandoning drops the in-flight store or cache call. Each of those is a
  /// single transaction or command, so nothing partial becomes visible.
  pub async fn get_recommendations_or_cancel(
    &self,
    user: UserId,
    cancel: impl Future<Output = ()>,
  ) -> Result<Vec<ProductId>> {
    tokio::select! {
      biased;
      _ = cancel => {
        tracing::debug!(user_id = %user, "recommendation read cancelled");
        Err(Error::Cancelled)
      }
      result = self.get_recommendations(user) => result,
    }
  }

  // ── Write path ──────────────────────────────────────────────────────────

  /// Record `update` as the user's complete interest set.
  ///
  /// Only this user's cache entry can change, so only it is invalidated. A
  /// failed store write returns before the cache is touched.
  pub async fn apply_user_update(&self, update: UserUpdate) -> Result<()> {
    let UserUpdate { user_id, interests } = update;

    self.store.upsert_user(user_id).await.map_err(Into::<Error>::into)?;
    self
      .store
      .replace_user_keywords(user_id, dedup_keywords(interests))
      .await
      .map_err(Into::<Error>::into)?;

    self.cache.invalidate(user_id).await?;
    tracing::info!(user_id = %user_id, "applied user update");
    Ok(())
  }

  /// Record `update` as the product's complete keyword set, or its deletion.
  ///
  /// Any user's recommendations may change and the cache has no reverse
  /// index from products to users, so the whole cache is invalidated.
  pub async fn apply_product_update(&self, update: ProductUpdate) -> Result<()> {
    let ProductUpdate { product_id, keywords, action } = update;

    let keywords = match (action, self.config.product_delete) {
      (ProductAction::Delete, DeletePolicy::Tombstone) => vec![DELETION_MARKER.to_owned()],
      (ProductAction::Delete, DeletePolicy::Clear) => Vec::new(),
      (ProductAction::Update, _) => dedup_keywords(keywords),
    };

    self.store.upsert_product(product_id).await.map_err(Into::<Error>::into)?;
    self
      .store
      .replace_product_keywords(product_id, keywords)
      .await
      .map_err(Into::<Error>::into)?;

    self.cache.invalidate_all().await?;
    tracing::info!(product_id = %product_id, ?action, "applied product update");
    Ok(())
  }

  pub async fn apply(&self, event: UpdateEvent) -> Result<()> {
    match event {
      UpdateEvent::User(update) => self.apply_user_update(update).await,
      UpdateEvent::Product(update) => self.apply_product_update(update).await,
    }
  }
}
