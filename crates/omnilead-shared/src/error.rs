use serde::Deserialize;
use thiserror::Error;

/// Errors produced when talking to the backend.
///
/// The transport layer classifies each failure exactly once; callers store
/// or display the result and never re-classify. All variants are local to
/// the resource domain that produced them except `Unauthorized`, which
/// triggers global session teardown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received at all.
    #[error("Server unreachable. Check that the backend is running.")]
    Unreachable,

    /// Credential missing, expired, or rejected (HTTP 401).
    #[error("Authentication rejected")]
    Unauthorized,

    /// Field-level rejection (HTTP 422), flattened to one readable sentence.
    #[error("{0}")]
    ValidationFailed(String),

    /// Generic backend failure (HTTP 5xx).
    #[error("Server error. Please try again later.")]
    ServerFault,

    /// Anything else: passthrough of whatever the backend said.
    #[error("{0}")]
    Unknown(String),
}

/// Convenience alias used throughout the client crates.
pub type Result<T> = std::result::Result<T, ApiError>;

/// One entry of a structured validation error body
/// (`{"detail": [{"loc": [...], "msg": "...", "type": "..."}]}`).
#[derive(Debug, Clone, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl FieldError {
    /// Dotted field path, skipping the leading `body` / `query` segment.
    fn path(&self) -> String {
        self.loc
            .iter()
            .filter_map(|part| match part {
                serde_json::Value::String(s) if s != "body" && s != "query" => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Flatten a structured field-error list into one display string.
///
/// Each entry becomes either the provided message prefixed by the field
/// path, or "<path> is required" when the backend gave no message.
pub fn flatten_field_errors(errors: &[FieldError]) -> String {
    let parts: Vec<String> = errors
        .iter()
        .map(|err| {
            let path = err.path();
            match err.msg.as_deref() {
                Some(msg) if !msg.is_empty() => {
                    if path.is_empty() {
                        msg.to_string()
                    } else {
                        format!("{path}: {msg}")
                    }
                }
                _ if !path.is_empty() => format!("{path} is required"),
                _ => "Invalid request".to_string(),
            }
        })
        .collect();

    if parts.is_empty() {
        "Invalid request".to_string()
    } else {
        parts.join("; ")
    }
}
