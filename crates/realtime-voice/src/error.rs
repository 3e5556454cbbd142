/// Failure reported by a host surface (peer connection, capture device, playback element).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Reasons the microphone could not be opened. Each precondition is its own variant so the
/// presentation layer can explain what the user has to change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error("Microphone is only available in the browser.")]
    NotInBrowser,
    #[error("Microphone capture requires HTTPS or localhost.")]
    InsecureContext,
    #[error("getUserMedia is unavailable in this browser.")]
    CaptureUnavailable,
    #[error("Microphone access was denied: {0}")]
    Denied(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error("{0}")]
    Credential(String),
    #[error("{}", signaling_message(.detail))]
    Signaling { detail: Option<String> },
    #[error("{0}")]
    Playback(String),
    #[error("{0}")]
    Transport(String),
    /// The negotiation was superseded by a teardown before it finished.
    #[error("session negotiation was cancelled")]
    Cancelled,
}

impl From<HostError> for SessionError {
    fn from(error: HostError) -> Self {
        SessionError::Transport(error.0)
    }
}

fn signaling_message(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!("Realtime SDP exchange failed: {detail}"),
        None => "Realtime SDP exchange failed.".to_string(),
    }
}
