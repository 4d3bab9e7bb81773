//! Recommendation engine: the cache-aside repository and the event
//! dispatcher that feeds its write path.
//!
//! The engine is generic over the traits in `recs-core`; it never names a
//! concrete store, cache or bus. In-memory cache and bus implementations
//! live in [`memory`] for single-process use and tests.

pub mod dispatcher;
pub mod memory;
pub mod repository;
pub mod shutdown;

pub use dispatcher::{
  DispatchError, DispatchPolicy, DispatcherConfig, DispatcherState, EventDispatcher, OnError,
  Topics,
};
pub use repository::{CacheWritePolicy, DeletePolicy, RecommendationRepository, RepositoryConfig};
pub use shutdown::Shutdown;
