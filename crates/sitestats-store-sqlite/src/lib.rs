//! SQLite backend for the sitestats record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write is one SQLite transaction
//! on that thread, which is what makes stage-then-validate atomic.

mod encode;
mod schema;
mod store;
mod validate;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
