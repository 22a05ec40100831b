//! Execution engine port and the in-process engine.
//!
//! The order workflow never talks to storage or the network directly; it is
//! started, signalled, queried, and awaited through [`WorkflowEngine`].
//! [`local::LocalEngine`] runs instances inside the current process;
//! brewline-infra provides an HTTP client for reaching a remote one.

pub mod error;
pub mod local;
pub mod port;

pub use error::EngineError;
pub use local::{LocalEngine, WorkerRegistration};
pub use port::{StartOptions, StartRequest, WorkflowEngine, WorkflowHandle};
