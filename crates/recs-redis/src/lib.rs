//! Redis backends: the recommendation cache and the stream event source.
//!
//! Both share one error mapping so connection trouble always surfaces as a
//! connection failure, never as a cache miss or an empty stream.

use std::time::Duration;

mod bus;
mod cache;
mod error;

pub use bus::RedisBus;
pub use cache::RedisCache;

/// Upper bound on establishing any Redis connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
