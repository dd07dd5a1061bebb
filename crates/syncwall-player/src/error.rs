//! Error types for the playback side.
//!
//! None of these are surfaced to the operator as faults. An engine reports them
//! through [`EngineEvent::Error`](crate::EngineEvent::Error), the adapter logs
//! the error and parks in its `Error` state, and that stream simply never
//! becomes ready.

/// Playback engine error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlayerError {
    /// The manifest or media URL could not be fetched.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The manifest was fetched but could not be parsed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The manifest did not arrive within the configured timeout.
    #[error("Timed out loading {0}")]
    Timeout(String),
}

impl PlayerError {
    /// Create a new Transport error.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new Decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            Self::Timeout(url)
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type alias using the player Error type.
pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlayerError::decode("not an m3u8");
        assert_eq!(err.to_string(), "Decode error: not an m3u8");

        let err = PlayerError::transport("HTTP 404");
        assert_eq!(err.to_string(), "Transport error: HTTP 404");
    }
}
