use std::fmt;

use thiserror::Error;

/// Collection a delta tried to address by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeTarget {
    Zone,
    Activity,
    Day,
}

impl fmt::Display for MergeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeTarget::Zone => write!(f, "zone"),
            MergeTarget::Activity => write!(f, "activity"),
            MergeTarget::Day => write!(f, "program day"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        status: u16,
        endpoint: String,
        body: String,
    },

    #[error("GraphQL {operation} failed: {message}")]
    Graphql { operation: String, message: String },

    #[error("unknown system: {0}")]
    UnknownSystem(String),

    #[error("{target} {id} not found in current snapshot")]
    MergeTargetNotFound { target: MergeTarget, id: String },

    #[error("unrecognized message type: {0}")]
    UnrecognizedMessage(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unrecognized value {value:?} for {field}")]
    UnrecognizedValue { field: &'static str, value: String },

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Network failure or non-2xx response on a fetch or command.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Status { .. })
    }

    /// Failure while applying a realtime delta to a snapshot.
    pub fn is_merge_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownSystem(_)
                | Error::MergeTargetNotFound { .. }
                | Error::UnrecognizedMessage(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
