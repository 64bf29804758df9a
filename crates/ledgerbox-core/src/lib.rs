//! Core types shared across Ledgerbox crates.
//!
//! This crate provides the execution [`Context`] threaded through every
//! storage call (cancellation plus an optional deadline), the per-call
//! [`Scope`] that bounds a single operation, and common AWS type
//! definitions.

mod context;
mod error;
mod types;

pub use context::{Context, Scope};
pub use error::Interrupted;
pub use types::AwsRegion;
