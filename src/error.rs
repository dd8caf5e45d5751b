use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad credentials")]
    BadCredentials,

    #[error("too many requests, try again later")]
    TooManyRequests,

    #[error("server is down for maintenance")]
    Maintenance,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("no registered event listener")]
    NoRegisteredEventListener,

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown server: {0}")]
    UnknownServer(String),

    #[error("error communicating with API: {0}")]
    UpdateFailed(String),
}

impl Error {
    /// Credential problems need user action; everything else may clear up on retry.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::BadCredentials)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why activating a config entry failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    /// The user must re-enter credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// Transient; the host should retry setup later.
    #[error("not ready: {0}")]
    NotReady(String),
}

impl SetupError {
    pub(crate) fn from_login(err: &Error) -> Self {
        match err {
            Error::BadCredentials => SetupError::AuthFailed("Invalid credentials".to_string()),
            Error::TooManyRequests => {
                SetupError::NotReady("Too many requests, try again later".to_string())
            }
            Error::Maintenance => SetupError::NotReady("Server is under maintenance".to_string()),
            other => SetupError::NotReady(format!("Unexpected error: {other}")),
        }
    }
}
