/// Errors returned by a transport before they are folded into session state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent (connect failure, reset, timeout).
    #[error("request failed: {message}")]
    Request { message: String },
    /// The server answered with a non-success status.
    #[error("server returned status {status}: {detail}")]
    Status { status: u16, detail: String },
    /// The response body stream failed after the connection was established.
    #[error("stream read failed: {message}")]
    Read { message: String },
}

impl TransportError {
    /// Creates a request-level error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Creates a status error carrying the server-provided detail.
    pub fn status(status: u16, detail: impl Into<String>) -> Self {
        Self::Status {
            status,
            detail: detail.into(),
        }
    }

    /// Creates a body read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code, if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request { .. } | Self::Read { .. } => None,
        }
    }
}

/// Reason carried by a `Failed` session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum SessionFailure {
    /// The caller supplied an unusable request; no network activity happened.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    /// The connection failed, was reset, or returned a non-success status.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// The server sent an `error` frame; the payload is kept verbatim.
    #[error("{message}")]
    Protocol { message: String },
    /// The stream closed without a `done` or `error` frame.
    #[error("stream ended without completion")]
    IncompleteStream,
    /// A line grew past the parser's limit without a terminator.
    #[error("stream line exceeded {limit} bytes")]
    LineTooLong { limit: usize },
}

impl From<&TransportError> for SessionFailure {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Status { status, detail } => SessionFailure::Transport {
                message: detail.clone(),
                status_code: Some(*status),
            },
            TransportError::Request { .. } | TransportError::Read { .. } => {
                SessionFailure::Transport {
                    message: err.to_string(),
                    status_code: None,
                }
            }
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecommendError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The request failed local validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// `start` was called while the session still had a run in flight.
    #[error("session is already streaming")]
    AlreadyStreaming,
    /// The session was never started.
    #[error("session not started")]
    NotStarted,
    /// The run reached a `Failed` terminal state.
    #[error(transparent)]
    Failed(SessionFailure),
    /// The run was cancelled before it reached a terminal frame.
    #[error("cancelled")]
    Cancelled,
}

impl RecommendError {
    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

impl From<SessionFailure> for RecommendError {
    fn from(value: SessionFailure) -> Self {
        match value {
            SessionFailure::InvalidRequest { message } => RecommendError::InvalidRequest(message),
            other => RecommendError::Failed(other),
        }
    }
}
