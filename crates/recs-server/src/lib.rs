//! Wiring for the recommendation service binary: configuration and the
//! runtime-selected cache backend.

pub mod cache;
pub mod config;

pub use cache::AnyCache;
pub use config::{LogFormat, ServiceConfig};
