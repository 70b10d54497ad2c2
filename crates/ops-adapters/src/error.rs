use thiserror::Error;

/// The sub-kind surfaced to clients inside a tool result's structured payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    NotFound,
    Unauthorized,
    Unreachable,
    Timeout,
    Cancelled,
    Transient,
    Permanent,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("cancelled")]
    Cancelled,
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("permanent failure: {0}")]
    Permanent(String),
    #[error("no host entry named `{0}`")]
    UnknownHost(String),
    #[error("no cluster entry named `{0}`")]
    UnknownCluster(String),
    #[error("no docker endpoint named `{0}`")]
    UnknownDockerEndpoint(String),
    #[error("pool exhausted for `{0}` after waiting {1:?}")]
    PoolTimeout(String, std::time::Duration),
    #[error("spawning `{command}` failed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl AdapterError {
    pub fn kind(&self) -> AdapterErrorKind {
        match self {
            AdapterError::NotFound(_) => AdapterErrorKind::NotFound,
            AdapterError::Unauthorized(_) => AdapterErrorKind::Unauthorized,
            AdapterError::Unreachable(_)
            | AdapterError::UnknownHost(_)
            | AdapterError::UnknownCluster(_)
            | AdapterError::UnknownDockerEndpoint(_) => AdapterErrorKind::Unreachable,
            AdapterError::Timeout(_) | AdapterError::PoolTimeout(_, _) => AdapterErrorKind::Timeout,
            AdapterError::Cancelled => AdapterErrorKind::Cancelled,
            AdapterError::Transient(_) => AdapterErrorKind::Transient,
            AdapterError::Permanent(_) | AdapterError::Spawn { .. } => AdapterErrorKind::Permanent,
        }
    }

    /// Whether the handler may retry this once with backoff, per the
    /// propagation policy (`Transient` only; `Timeout`/`Cancelled` never retry).
    pub fn retryable(&self) -> bool {
        matches!(self.kind(), AdapterErrorKind::Transient)
    }
}
