use crate::time::Seconds;

/// Errors surfaced by the session layer.
///
/// `Clone` because a single outcome is handed to every caller that joined the
/// same in-flight operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Credentials were rejected. Message is shown to the user as is
    #[error("{message}")]
    Authentication { message: String },
    #[error("No refresh token available, please log in again")]
    NoRefreshToken,
    #[error("Unable to refresh the session: {0}")]
    RefreshFailed(String),
    #[error("Unable to reach the server. Please check your connection and try again")]
    Network(String),
    #[error("Unable to load permissions: {0}")]
    PermissionFetch(String),
    #[error("{message}")]
    Server {
        message: String,
        code: Option<String>,
    },
    #[error("{operation} did not complete within {after}")]
    Timeout {
        operation: &'static str,
        after: Seconds,
    },
    #[error("Unexpected response from server: {0}")]
    UnexpectedResponse(String),
    /// The user logged out or another user logged in while the operation was
    /// running. Its outcome was discarded
    #[error("The session changed before {operation} completed")]
    SessionChanged { operation: &'static str },
}

impl SessionError {
    /// Returns `true` if the error means the user has to log in again
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::NoRefreshToken | Self::RefreshFailed(_))
    }

    /// Returns `true` if retrying the same request manually may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout { .. })
    }
}
