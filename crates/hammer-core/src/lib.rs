//! Core types, collaborator traits and the ban-resolution engine for Hammer.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::EventStore`]; transports implement the
//! collaborator traits in [`hooks`] and [`names`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod error;
pub mod event;
pub mod hooks;
pub mod ledger;
pub mod message;
pub mod names;
pub mod recheck;
pub mod resolver;
pub mod store;
pub mod timespec;

#[cfg(test)]
mod testing;

pub use error::{BoxError, Error, Result};
