//! Engine error taxonomy.

/// Errors returned by any [`super::WorkflowEngine`].
///
/// Every variant has a stable machine code so the HTTP surface and the HTTP
/// client agree on what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("workflow instance '{0}' already started")]
    AlreadyStarted(String),

    #[error("workflow instance '{0}' not found")]
    NotFound(String),

    #[error("no worker is polling task queue '{task_queue}'")]
    NoWorker { task_queue: String },

    #[error("unknown workflow type '{0}'")]
    UnknownWorkflowType(String),

    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    #[error("unknown query '{0}'")]
    UnknownQuery(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("workflow instance '{0}' is closed")]
    InstanceClosed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("history error: {0}")]
    History(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyStarted(_) => "ALREADY_STARTED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NoWorker { .. } => "NO_WORKER",
            Self::UnknownWorkflowType(_) => "UNKNOWN_WORKFLOW_TYPE",
            Self::UnknownSignal(_) => "UNKNOWN_SIGNAL",
            Self::UnknownQuery(_) => "UNKNOWN_QUERY",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::InstanceClosed(_) => "INSTANCE_CLOSED",
            Self::Transport(_) => "TRANSPORT",
            Self::History(_) => "HISTORY",
            Self::Unavailable(_) => "UNAVAILABLE",
        }
    }

    /// The variant's payload: instance key, name, queue, or message.
    pub fn detail(&self) -> &str {
        match self {
            Self::AlreadyStarted(s)
            | Self::NotFound(s)
            | Self::UnknownWorkflowType(s)
            | Self::UnknownSignal(s)
            | Self::UnknownQuery(s)
            | Self::InvalidPayload(s)
            | Self::InstanceClosed(s)
            | Self::Transport(s)
            | Self::History(s)
            | Self::Unavailable(s) => s,
            Self::NoWorker { task_queue } => task_queue,
        }
    }

    /// Rebuild an error from its code and detail. Unknown codes become
    /// `Unavailable`.
    pub fn from_code(code: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match code {
            "ALREADY_STARTED" => Self::AlreadyStarted(detail),
            "NOT_FOUND" => Self::NotFound(detail),
            "NO_WORKER" => Self::NoWorker { task_queue: detail },
            "UNKNOWN_WORKFLOW_TYPE" => Self::UnknownWorkflowType(detail),
            "UNKNOWN_SIGNAL" => Self::UnknownSignal(detail),
            "UNKNOWN_QUERY" => Self::UnknownQuery(detail),
            "INVALID_PAYLOAD" => Self::InvalidPayload(detail),
            "INSTANCE_CLOSED" => Self::InstanceClosed(detail),
            "TRANSPORT" => Self::Transport(detail),
            "HISTORY" => Self::History(detail),
            _ => Self::Unavailable(detail),
        }
    }

    /// Transport failures are the only errors that mean the engine could not
    /// be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_detail_rebuild_the_same_error() {
        let errors = vec![
            EngineError::AlreadyStarted("order-1".to_string()),
            EngineError::NoWorker {
                task_queue: "coffee-orders".to_string(),
            },
            EngineError::UnknownQuery("get_price".to_string()),
            EngineError::InstanceClosed("order-2".to_string()),
            EngineError::Transport("connection refused".to_string()),
        ];
        for err in errors {
            assert_eq!(EngineError::from_code(err.code(), err.detail()), err);
        }
    }

    #[test]
    fn test_unknown_code_maps_to_unavailable() {
        let err = EngineError::from_code("TEAPOT", "short and stout");
        assert_eq!(err, EngineError::Unavailable("short and stout".to_string()));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_display_names_the_subject() {
        let err = EngineError::NoWorker {
            task_queue: "coffee-orders".to_string(),
        };
        assert_eq!(err.to_string(), "no worker is polling task queue 'coffee-orders'");
    }
}
