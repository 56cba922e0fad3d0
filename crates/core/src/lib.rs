//! `ridelink-core` — request-governance building blocks.
//!
//! This crate contains **pure** types and functions (no HTTP, no clocks, no IO).

pub mod classify;
pub mod error;
pub mod id;

pub use classify::{classify, Classification, ErrorResponse};
pub use error::{FailureCondition, FailureKind, FailureResult};
pub use id::ClientKey;
