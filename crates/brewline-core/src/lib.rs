//! Business logic and port definitions for Brewline.
//!
//! This crate defines the order workflow state machine, the retry contract
//! that wraps every side-effecting step, and the "ports" (service, history,
//! and engine traits) that the infrastructure layer implements. It depends
//! only on `brewline-types` -- never on `brewline-infra` or any
//! database/network crate.

pub mod client;
pub mod engine;
pub mod pricing;
pub mod repository;
pub mod service;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
