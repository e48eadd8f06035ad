//! Error types for credential handling and backend delivery.

use thiserror::Error;

/// Errors raised while talking to the dashboard backend or loading credentials.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not logged in; run `session-sync login --url <URL> --api-key <KEY>`")]
    NotLoggedIn,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid site URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("site URL must use http or https: {0}")]
    UnsupportedScheme(String),

    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend rejected {endpoint}: {status} {body}")]
    Backend {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
