//! Infrastructure layer for Brewline.
//!
//! Contains implementations of the ports defined in `brewline-core`:
//! simulated payment/brew/notify services, SQLite workflow history, the
//! HTTP client for a remote engine, and configuration loading.

pub mod config;
pub mod remote;
pub mod services;
pub mod sqlite;
pub mod store;
