use serde::{Deserialize, Serialize};

/// Opaque descriptor of a single file location on an agent.
///
/// The hub and the action pass this through verbatim; only the source
/// resolver on the agent gives it meaning. Exactly one path spec per
/// collection: no lists, no globs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSpec(String);

impl PathSpec {
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for PathSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PathSpec {
    fn from(spec: &str) -> Self {
        Self(spec.to_string())
    }
}

/// Pre-authorized, time-bounded write URL issued by the storage service.
///
/// Opaque at this layer: never parsed, never constructed, never reused
/// across transfers. One session borrows it for one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedUploadUrl(String);

impl SignedUploadUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SignedUploadUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignedUploadUrl {
    fn from(url: &str) -> Self {
        Self(url.to_string())
    }
}

/// Classification of every error the collect action reports synchronously.
///
/// Source-open failures come first (before any network I/O); the URL and
/// remote classifications come from session initiation. Nothing that
/// happens after the transfer is handed off appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    PermissionDenied,
    Unreadable,
    UrlInvalid,
    UrlExpired,
    RemoteRejected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::Unreadable => "unreadable",
            ErrorCode::UrlInvalid => "url_invalid",
            ErrorCode::UrlExpired => "url_expired",
            ErrorCode::RemoteRejected => "remote_rejected",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details carried in a message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Fault {
    pub code: ErrorCode,
    pub message: String,
}

impl Fault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
