use std::time::Duration;

/// Failure to turn an inbound text frame into a [`crate::ServerFrame`].
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame has no string `type` field")]
    MissingType,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No confirmation arrived for a pending request before its deadline.
    #[error("no confirmation within {after:?}")]
    Timeout { after: Duration },

    /// The server refused the request; carries the server's reason.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// A manual disconnect abandoned the request.
    #[error("disconnected before confirmation")]
    Disconnected,

    /// The session event loop has shut down.
    #[error("session client is closed")]
    ClientClosed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout { .. })
    }

    pub fn from_tungstenite(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}
