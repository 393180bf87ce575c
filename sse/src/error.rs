//! Error types for the `sse` crate.

use crate::subscription::SubscriptionId;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The hub has been shut down and accepts no further publishes or subscriptions.
    HubClosed,

    /// A subscription with this identity is already live.
    DuplicateSubscription(SubscriptionId),

    /// The upstream event feed could not be reached or read.
    Upstream(reqwest::Error),

    /// The upstream event feed answered with a non-success status.
    UpstreamStatus(reqwest::StatusCode),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::HubClosed => write!(f, "Hub is closed"),
            Error::DuplicateSubscription(id) => {
                write!(f, "Subscription {id} is already registered")
            }
            Error::Upstream(err) => write!(f, "Upstream error: {err}"),
            Error::UpstreamStatus(status) => write!(f, "Upstream returned status {status}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Upstream(err)
    }
}
