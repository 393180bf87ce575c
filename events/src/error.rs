//! Error types for the `events` crate.

use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// A payload could not be converted to or from JSON.
    Serialization(serde_json::Error),

    /// The destination no longer accepts events. Producers should stop.
    Closed,

    /// A handler failed for a reason specific to that handler.
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Serialization(err) => write!(f, "Serialization error: {err}"),
            Error::Closed => write!(f, "Event destination is closed"),
            Error::Handler(err) => write!(f, "Handler error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Serialization(err) => Some(err),
            Error::Handler(err) => Some(err.as_ref()),
            Error::Closed => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}
