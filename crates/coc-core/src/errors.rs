use std::{fmt, time::Duration};

/// Core error type for the client.
///
/// Adapter crates map their transport-specific failures into this type so that
/// callers can branch on [`ErrorKind`] instead of on error strings.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        payload: Option<serde_json::Value>,
    },

    #[error("no API key is registered for egress address {address}; create one for this IP and log in again")]
    KeyResolution { address: String },

    #[error("api protocol error: {message}")]
    ApiProtocol {
        message: String,
        payload: Option<serde_json::Value>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid tag: {0}")]
    InvalidTag(String),

    #[error("route error: {0}")]
    Route(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure classes surfaced to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    KeyResolution,
    ApiProtocol,
    Transport,
    /// Local misuse: bad config, malformed tag, unfilled route placeholder.
    Usage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::KeyResolution => "key_resolution",
            ErrorKind::ApiProtocol => "api_protocol",
            ErrorKind::Transport => "transport",
            ErrorKind::Usage => "usage",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::KeyResolution { .. } => ErrorKind::KeyResolution,
            Error::ApiProtocol { .. } | Error::Json(_) => ErrorKind::ApiProtocol,
            Error::Transport(_) | Error::Timeout(_) | Error::Io(_) => ErrorKind::Transport,
            Error::Config(_) | Error::InvalidTag(_) | Error::Route(_) => ErrorKind::Usage,
        }
    }

    /// Raw provider payload attached to the failure, when there is one.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Error::Authentication { payload, .. } | Error::ApiProtocol { payload, .. } => {
                payload.as_ref()
            }
            _ => None,
        }
    }

    pub fn protocol(message: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Error::ApiProtocol {
            message: message.into(),
            payload,
        }
    }

    pub fn auth(message: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Error::Authentication {
            message: message.into(),
            payload,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
