use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug)]
pub enum PerplexityApiError {
    MissingApiToken,
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Transport(String),
    MalformedSse(String),
    Cancelled,
    JoinError(String),
}

impl PerplexityApiError {
    /// True for failures raised before any streaming state exists.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingApiToken | Self::InvalidHeader(_) | Self::Request(_) | Self::Status(..)
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
    pub detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

impl ErrorPayloadFields {
    pub fn message_or_fallback(&self) -> Option<String> {
        let message = self.message.as_deref().and_then(non_empty_string)?;
        match self.type_.as_deref().and_then(non_empty_string) {
            Some(kind) => Some(format!("{message} ({kind})")),
            None => Some(message.to_owned()),
        }
    }
}

impl fmt::Display for PerplexityApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiToken => write!(f, "API token is required"),
            Self::InvalidHeader(message) => write!(f, "invalid request header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "bad status: HTTP {status} {message}"),
            Self::Transport(message) => write!(f, "SSE read: {message}"),
            Self::MalformedSse(message) => write!(f, "malformed SSE event: {message}"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::JoinError(message) => write!(f, "output task join failure: {message}"),
        }
    }
}

impl std::error::Error for PerplexityApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PerplexityApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

/// Turns an error response body into a single readable line.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        let body = body.trim();
        if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.to_string()
        }
    };

    let Ok(parsed) = serde_json::from_str::<ErrorPayload>(body) else {
        return fallback();
    };

    if let Some(message) = parsed.value.as_ref().and_then(|value| value.message_or_fallback()) {
        return message;
    }
    if let Some(detail) = parsed.detail {
        return match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
    }

    fallback()
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
