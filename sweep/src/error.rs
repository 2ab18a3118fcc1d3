use thiserror::Error;

use crate::xrpc::XrpcError;

/// Rejected configuration. Raised before any upstream call is made.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("group size must be between 1 and {max}, got {got}")]
    GroupSize { got: usize, max: usize },

    #[error("concurrency must be at least 1")]
    Concurrency,

    #[error("max retries must be at least 1")]
    MaxRetries,

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to read session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed session file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("session is missing {0}")]
    Unusable(&'static str),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid fetch configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("session unusable: {0}")]
    Session(#[from] SessionError),

    #[error("session rejected by upstream: {0}")]
    SessionRejected(#[source] XrpcError),

    #[error("fetch cancelled after {completed} of {total} groups")]
    Cancelled { completed: usize, total: usize },
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("no handles provided")]
    NoHandles,

    #[error("session unusable: {0}")]
    Session(#[from] SessionError),

    #[error("session rejected by upstream: {0}")]
    SessionRejected(#[source] XrpcError),

    #[error("upstream error: {0}")]
    Upstream(#[from] XrpcError),

    #[error("malformed record uri: {0}")]
    MalformedUri(String),
}

impl GraphError {
    /// Separates session rejections from ordinary upstream failures.
    pub fn from_upstream(e: XrpcError) -> Self {
        if e.is_auth_failure() {
            GraphError::SessionRejected(e)
        } else {
            GraphError::Upstream(e)
        }
    }
}
