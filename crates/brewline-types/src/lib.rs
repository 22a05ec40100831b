//! Shared wire and domain types for Brewline.
//!
//! This crate contains the payloads exchanged between order submitters and
//! workers: orders, their in-flight state and terminal results, retry
//! policies, durable history events, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod history;
pub mod order;
pub mod retry;
