use crate::kinds::ActivityKind;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("an action for {0} is already in flight")]
    AlreadyPending(ActivityKind),
    #[error("insufficient points: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("{kind} is not available: {reason}")]
    NotEligible { kind: ActivityKind, reason: String },
    #[error("{detail}")]
    Validation { detail: String },
    #[error("{detail}")]
    Conflict { status: u16, detail: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded with {status}: {detail}")]
    Server { status: u16, detail: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid server payload: {0}")]
    Decode(String),
}

/// How a failure feeds back into the cached activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any request left the client.
    Local,
    /// 400: the request was wrong for the current server state.
    Validation,
    /// 404/409: the resource moved under us; the cache is known stale.
    Conflict,
    /// No usable response: network, 5xx, timeout, undecodable body.
    Transient,
}

impl Error {
    /// Maps a non-success HTTP status and its `detail` text onto the taxonomy.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match status {
            400 => Error::Validation {
                detail: detail.unwrap_or_else(|| "request rejected".to_string()),
            },
            404 | 409 => Error::Conflict {
                status,
                detail: detail.unwrap_or_else(|| "already claimed or sold out".to_string()),
            },
            _ => Error::Server {
                status,
                detail: detail.unwrap_or_default(),
            },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::AlreadyPending(_)
            | Error::InsufficientFunds { .. }
            | Error::NotEligible { .. } => ErrorClass::Local,
            Error::Validation { .. } => ErrorClass::Validation,
            Error::Conflict { .. } => ErrorClass::Conflict,
            Error::Network(_)
            | Error::Server { .. }
            | Error::Timeout(_)
            | Error::Decode(_) => ErrorClass::Transient,
        }
    }

    /// True when the server never saw a response-producing request, so the
    /// message shown is a generic retry hint rather than server text.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}
