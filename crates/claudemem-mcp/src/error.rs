//! Error types for the tool server.

use thiserror::Error;

use claudemem_backend::BackendError;

pub type Result<T> = std::result::Result<T, McpError>;

/// Errors surfaced by the tool server loop itself, as opposed to errors from
/// a single request (those are reported in-band as a `{"error": ...}`
/// response, see [`crate::server::ErrorPayload`]).
#[derive(Error, Debug)]
pub enum McpError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Maps an error onto the stable `kind` string used in a request's error
/// response (spec.md §4.11, mirroring the §7 error taxonomy so a calling
/// assistant can branch on `kind` without parsing `message`).
impl McpError {
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::MalformedRequest(_) => "malformed_request",
            McpError::UnknownTool(_) => "unknown_tool",
            McpError::Backend(e) => backend_error_kind(e),
            McpError::Io(_) => "io",
            McpError::Json(_) => "serialization",
        }
    }
}

fn backend_error_kind(err: &BackendError) -> &'static str {
    match err {
        BackendError::Search(_) => "search",
        BackendError::Core(_) => "core",
        BackendError::Configuration(_) => "configuration",
        BackendError::Authentication(_) => "authentication",
        BackendError::Transient(_) => "transient",
        BackendError::Storage(_) => "storage",
        BackendError::NotFound(_) => "not_found",
        BackendError::Cancelled => "cancelled",
        BackendError::Config(_) => "configuration",
        BackendError::Io(_) => "io",
        BackendError::Http(_) => "transient",
        BackendError::Serialization(_) => "serialization",
    }
}
