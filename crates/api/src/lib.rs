//! HTTP API: router, request governance layers, and request/response mapping.

pub mod app;
pub mod context;
pub mod middleware;
