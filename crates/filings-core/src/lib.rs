//! Core types and trait definitions for the disclosure ingestion pipeline.
//!
//! This crate is free of database dependencies. It owns the raw record shape,
//! the normalized domain model, the ratio engine and the [`DisclosureStore`]
//! abstraction that storage backends implement.
//!
//! [`DisclosureStore`]: store::DisclosureStore

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod ratio;
pub mod record;
pub mod report;
pub mod store;

pub use config::IngestConfig;
pub use error::{Error, Result};
