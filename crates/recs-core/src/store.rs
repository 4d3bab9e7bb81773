//! The `KeywordStore` trait.
//!
//! The keyword store is the single source of truth for users, products, the
//! keyword dictionary and the two association tables. Every method runs in
//! one transaction and leaves no partial state behind on failure.

use std::future::Future;

use crate::{ProductId, UserId};

/// Abstraction over the relational keyword graph.
///
/// Replacement operations delete the entity's whole association set before
/// inserting the new one, so re-applying the same input is a no-op.
pub trait KeywordStore: Send + Sync {
  /// Backend error; must classify into the shared taxonomy.
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Insert the user if absent. Never fails on a duplicate.
  fn upsert_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert the product if absent. Never fails on a duplicate.
  fn upsert_product(
    &self,
    id: ProductId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Replace every keyword associated with `id`, creating dictionary rows
  /// for unseen keywords.
  fn replace_user_keywords(
    &self,
    id: UserId,
    keywords: Vec<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Product counterpart of [`KeywordStore::replace_user_keywords`].
  fn replace_product_keywords(
    &self,
    id: ProductId,
    keywords: Vec<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Products sharing at least one non-reserved keyword with the user.
  ///
  /// One entry per matching (keyword, product) pair, so duplicates are
  /// expected. Fails with a not-found error for an unknown user.
  fn product_ids_for_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Vec<ProductId>, Self::Error>> + Send + '_;
}
