use thiserror::Error;

/// Failure of one API call, after the transport's own recovery.
///
/// Anti-forgery failures are handled inside the transport; when the single
/// retry also fails they surface here as [`ApiError::Auth`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network unreachable, connection reset, TLS failure, ...
    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    /// The server answered 2xx with `success: false`.
    #[error("API error {code}: {message}")]
    Envelope { code: String, message: String },

    /// 401/403 unrelated to (or not recovered from) anti-forgery.
    #[error("not authorized ({status}): {message}")]
    Auth {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The body did not match the declared response shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Human-readable message for display by the host UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Envelope { message, .. } | Self::Auth { message, .. } if !message.is_empty() => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}
