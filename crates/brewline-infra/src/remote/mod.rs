//! Reaching a remote engine over its HTTP surface.

pub mod client;

pub use client::HttpEngineClient;
