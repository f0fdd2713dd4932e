use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing {0} environment variable")]
    Configuration(&'static str),

    #[error("callback listener error: {0}")]
    Listener(#[source] std::io::Error),

    #[error("no free callback port in {first}..={last}")]
    PortsExhausted { first: u16, last: u16 },

    #[error("no authorization callback within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("state mismatch (expected={expected}, received={received})")]
    StateMismatch { expected: String, received: String },

    #[error("token exchange failed with status {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("token storage error: {0}")]
    Storage(#[source] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("tasks api returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("not authenticated")]
    NotAuthenticated,
}
