pub mod config;
pub mod metrics;
pub mod notification;
pub mod reconcile;
pub mod server;
pub mod template;
pub mod tracker;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Tracker error: {0}")]
    Tracker(String),
    #[error("Tracker rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Status code reported to the webhook caller. Only malformed payloads are
    /// the caller's fault; everything else is a server error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Decode(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Flattens an error and its sources into one line. Tera and reqwest keep the
/// useful part of the message in the source chain.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
