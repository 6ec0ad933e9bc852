//! Resumable upload sessions against pre-signed object-store URLs.
//!
//! This is the transfer core: one session owns one signed URL and one byte
//! source, negotiates a server-side upload session, streams byte-range-tagged
//! chunks, and survives interruptions by re-reading the committed offset from
//! the endpoint before sending another byte.

mod session;
mod wire;

pub use session::{
    FailureKind, ResumableUploadSession, SessionConfig, SessionState, TransferSummary,
};

/// Storage-provider chunk granularity.
///
/// Every chunk except the last must be a multiple of this; the session
/// rounds configured chunk sizes up to it.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// Default chunk size: 8 MiB.
///
/// Larger chunks reduce per-chunk overhead (request round trips, digest
/// updates); the cost is a larger resend window after an interruption.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Terminal upload failure, classified and carrying the last byte position
/// the endpoint durably acknowledged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} (committed {committed}): {message}")]
pub struct UploadError {
    pub kind: FailureKind,
    pub committed: u64,
    pub message: String,
}
