//! Error taxonomy for the inference request pipeline

use thiserror::Error;

/// Maximum number of characters of a response body kept in a transport error
pub const BODY_SNIPPET_LEN: usize = 200;

/// Errors raised while building, submitting or interpreting a scoring request.
///
/// None of these are recovered internally: each one aborts the current
/// prediction attempt and is meant to be shown to the user.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required attribute is missing from a manual or batch record,
    /// or was rejected at the collection point.
    #[error("schema error: field '{field}' {reason}")]
    Schema { field: String, reason: String },

    /// The upload is neither valid delimited text nor a valid spreadsheet.
    #[error("parse error at {context}: {reason}")]
    Parse { context: String, reason: String },

    /// Connection failure, timeout or non-2xx response from the scoring service.
    #[error("transport error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    /// Malformed response or missing/misshaped `probability` field.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl PipelineError {
    /// A required attribute is absent from the source
    pub fn missing_field(field: &str) -> Self {
        PipelineError::Schema {
            field: field.to_string(),
            reason: "is required but missing".to_string(),
        }
    }

    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        PipelineError::Schema {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn parse(context: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Parse {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Non-2xx response; keeps the status and a bounded body snippet
    pub fn http_status(status: u16, body: &str) -> Self {
        PipelineError::Transport {
            status: Some(status),
            message: snippet(body),
        }
    }

    /// Name of the offending field for schema errors
    pub fn field(&self) -> Option<&str> {
        match self {
            PipelineError::Schema { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            format!("request timed out: {}", e)
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            e.to_string()
        };
        PipelineError::Transport {
            status: e.status().map(|s| s.as_u16()),
            message,
        }
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(BODY_SNIPPET_LEN).collect();
        cut.push_str("...");
        cut
    }
}
