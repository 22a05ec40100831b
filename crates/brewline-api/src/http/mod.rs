//! HTTP surface of a Brewline worker.
//!
//! Axum-based API at `/api/v1/` exposing the engine primitives (start,
//! signal, query, result) with the envelope response format and CORS.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
