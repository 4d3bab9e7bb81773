//! Core types and trait definitions for the keyword recommendation service.
//!
//! This crate has no HTTP, database or Redis dependencies.
//! Backends implement the traits in [`store`], [`cache`] and [`bus`]; the
//! engine orchestrates them without knowing which backend is in use.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod bus;
pub mod cache;
pub mod error;
pub mod event;
pub mod id;
pub mod keyword;
pub mod store;

pub use error::{Entity, Error, ErrorKind, Result};
pub use id::{ProductId, UserId};
