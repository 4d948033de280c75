// Error taxonomy for drivetunes
// Listing and playback failures are turned into status-line messages by the UI,
// nothing in here is allowed to take the app down.

use thiserror::Error;

/// The provider refused access (HTTP 401/403).
///
/// Kept apart from other failures so the UI can tell the user what to fix
/// instead of showing a generic error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access denied by Google Drive (HTTP {status})")]
pub struct PermissionError {
    pub status: u16,
}

impl PermissionError {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    pub fn remediation(&self) -> &'static str {
        match self.status {
            401 => "check drive.api_key in config.toml (or DRIVETUNES_API_KEY)",
            _ => "make sure the folder is shared as \"anyone with the link\" and the Drive API is enabled for the key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("network error: {0}")]
    Network(String),
    #[error("Drive returned HTTP {0}")]
    Status(u16),
    #[error("malformed listing payload: {0}")]
    Malformed(String),
    #[error(transparent)]
    PermissionDenied(#[from] PermissionError),
}

impl ListingError {
    /// Text for the status line.
    pub fn user_message(&self) -> String {
        match self {
            ListingError::PermissionDenied(denied) => {
                format!("{} - {}", denied, denied.remediation())
            }
            other => format!("Error loading files: {}", other),
        }
    }
}

impl From<reqwest::Error> for ListingError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ListingError::Status(status.as_u16()),
            // the request url carries the api key
            None => ListingError::Network(err.without_url().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackStartError {
    #[error("could not fetch media: {0}")]
    Fetch(String),
    #[error("unsupported audio format or corrupted file: {0}")]
    Decode(String),
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("playback rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    PermissionDenied(#[from] PermissionError),
}

impl PlaybackStartError {
    pub fn user_message(&self) -> String {
        match self {
            PlaybackStartError::PermissionDenied(denied) => {
                format!("{} - {}", denied, denied.remediation())
            }
            other => format!("Error playing audio: {}", other),
        }
    }
}

/// Best effort only - logged and dropped by whoever tears the session down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("teardown incomplete: {0}")]
pub struct TeardownError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_distinct() {
        let err: ListingError = PermissionError::new(403).into();
        assert!(matches!(err, ListingError::PermissionDenied(_)));

        let message = err.user_message();
        assert!(message.contains("HTTP 403"));
        assert!(message.contains("anyone with the link"));
        assert!(!message.starts_with("Error loading files"));
    }

    #[test]
    fn test_generic_errors_keep_generic_message() {
        let err = ListingError::Status(500);
        assert_eq!(err.user_message(), "Error loading files: Drive returned HTTP 500");

        let err = PlaybackStartError::Decode("no codec".to_string());
        assert!(err.user_message().starts_with("Error playing audio"));
    }
}
