//! Core types and trait definitions for the sitestats record store.
//!
//! This crate has no database dependencies. It owns the
//! closed kind taxonomy, the per-kind value payloads, the calendar-relative
//! query rules and the [`store::StatsStore`] abstraction that backends
//! implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod calendar;
pub mod error;
pub mod kind;
pub mod query;
pub mod record;
pub mod store;
pub mod value;

pub use error::{Error, Result};
