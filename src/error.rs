//! Failure taxonomy shared by the gateway, streaming channel, and gate.
//!
//! Every public operation resolves to `Result<T, ApiError>`; raw transport
//! errors never escape this crate. The variants mirror the distinct failure
//! classes the navigation gate cares about: no response at all, an explicit
//! credential rejection, an operation-level failure with a structured
//! message, and a refused stream handshake.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use serde_json::Value;

/// Errors produced by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A configuration value was missing or could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),

    /// No response reached the client (connect, DNS, timeout, body read).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The authority rejected the attached credential. The stored
    /// credential has already been evicted when this variant is returned.
    #[error("unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// Transport succeeded but the operation itself failed.
    #[error("operation failed with status {status}: {message}")]
    Application { status: u16, message: String },

    /// A success response body could not be deserialized.
    #[error("response parse failed: {0}")]
    ResponseParse(String),

    /// The initial handshake of a streaming call was refused; the stream
    /// was never opened.
    #[error("stream open failed with status {status}: {body}")]
    StreamOpen { status: u16, body: String },
}

impl ApiError {
    /// Stable discriminant for logging and assertions.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::ClientBuild(_) => "client_build",
            Self::Transport(_) => "transport",
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::Application { .. } => "application",
            Self::ResponseParse(_) => "response_parse",
            Self::StreamOpen { .. } => "stream_open",
        }
    }
}

/// Best-effort extraction of the structured error message from an error
/// response body. The authority reports application failures as
/// `{"detail": "..."}`; anything else falls back to the raw body, or to a
/// status placeholder when the body is empty.
pub(crate) fn detail_message(status: u16, body: &str) -> String {
    if let Some(detail) = serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("detail"))
        .and_then(Value::as_str)
    {
        return detail.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("request failed with status {status}")
    } else {
        trimmed.to_string()
    }
}
