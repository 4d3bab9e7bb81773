//! HTTP query endpoint for recommendations.
//!
//! Exposes an axum [`Router`] backed by a shared
//! [`RecommendationRepository`]. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! axum::serve(listener, recs_api::api_router(repo, shutdown)).await?;
//! ```

pub mod error;
pub mod recommendations;

use std::sync::Arc;

use axum::{Router, routing::get};
use recs_core::{cache::RecommendationCache, store::KeywordStore};
use recs_engine::{RecommendationRepository, Shutdown};

pub use error::ApiError;

/// Shared handler state.
pub struct ApiState<S, C> {
  pub repo:     Arc<RecommendationRepository<S, C>>,
  pub shutdown: Shutdown,
}

impl<S, C> Clone for ApiState<S, C> {
  fn clone(&self) -> Self {
    Self { repo: self.repo.clone(), shutdown: self.shutdown.clone() }
  }
}

/// Build a fully-materialised API router for `repo`.
///
/// In-flight reads return an error once `shutdown` fires instead of holding
/// the server open.
pub fn api_router<S, C>(repo: Arc<RecommendationRepository<S, C>>, shutdown: Shutdown) -> Router<()>
where
  S: KeywordStore + 'static,
  C: RecommendationCache + 'static,
{
  Router::new()
    .route("/recommendation/{user_id}", get(recommendations::get_for_user::<S, C>))
    .route("/health", get(recommendations::health))
    .with_state(ApiState { repo, shutdown })
}
