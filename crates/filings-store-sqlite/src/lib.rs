//! SQLite backend for the disclosure store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each ingested batch runs as a single
//! `BEGIN IMMEDIATE` transaction on that thread.

mod encode;
mod normalize;
mod pipeline;
mod register;
mod resolve;
mod schema;
mod store;
mod uow;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
