use thiserror::Error;

/// Errors raised when validating requests, policies, or user input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("order_id must not be empty")]
    EmptyOrderId,

    #[error("unknown drink: '{0}'")]
    UnknownDrink(String),

    #[error("unknown size: '{0}' (expected S, M or L)")]
    UnknownSize(String),

    #[error("amount must be non-negative, got {0}")]
    NegativeAmount(i64),

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors returned by a single side-effect call (charge, brew, notify).
///
/// Every variant counts as one failed attempt; the step executor decides
/// whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Errors from repository operations (used by trait definitions in brewline-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
