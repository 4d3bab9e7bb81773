//! Handlers for the recommendation read path.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/recommendation/{user_id}` | 400 on a non-positive or non-numeric id, 404 for an unknown user |
//! | `GET`  | `/health` | Liveness check |

use axum::{
  Json,
  extract::{Path, State},
};
use recs_core::{ProductId, UserId, cache::RecommendationCache, store::KeywordStore};

use crate::{ApiState, error::ApiError};

/// `GET /recommendation/{user_id}`
///
/// The read is abandoned when the server begins shutting down.
pub async fn get_for_user<S, C>(
  State(state): State<ApiState<S, C>>,
  Path(raw): Path<String>,
) -> Result<Json<Vec<ProductId>>, ApiError>
where
  S: KeywordStore + 'static,
  C: RecommendationCache + 'static,
{
  let user = parse_user_id(&raw)?;
  let products = state
    .repo
    .get_recommendations_or_cancel(user, state.shutdown.wait())
    .await?;
  tracing::debug!(user_id = %user, count = products.len(), "served recommendations");
  Ok(Json(products))
}

/// `GET /health`
pub async fn health() -> &'static str { "ok" }

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
  let id: i64 = raw
    .parse()
    .map_err(|_| ApiError::BadRequest("userId parameter incorrect in path".to_owned()))?;
  UserId::new(id)
    .map_err(|e| ApiError::BadRequest(format!("userId validation failed: {e}")))
}
