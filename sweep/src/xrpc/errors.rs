use thiserror::Error;

/// Upstream error codes that mean the bearer token is no longer accepted.
const SESSION_ERROR_CODES: [&str; 3] = ["ExpiredToken", "InvalidToken", "AuthenticationRequired"];

#[derive(Error, Debug)]
pub enum XrpcError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {message}")]
    Status {
        status: u16,
        /// Machine-readable `error` field of the XRPC error body.
        error: Option<String>,
        message: String,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl XrpcError {
    pub fn status(&self) -> Option<u16> {
        match self {
            XrpcError::Http(e) => e.status().map(|s| s.as_u16()),
            XrpcError::Status { status, .. } => Some(*status),
            XrpcError::InvalidResponse(_) => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            XrpcError::Status { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    /// The session itself was rejected, so retrying with it is pointless.
    pub fn is_auth_failure(&self) -> bool {
        self.status() == Some(401)
            || self
                .code()
                .is_some_and(|code| SESSION_ERROR_CODES.contains(&code))
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}
