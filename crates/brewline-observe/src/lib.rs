//! Observability setup shared by Brewline binaries.

pub mod tracing_setup;
