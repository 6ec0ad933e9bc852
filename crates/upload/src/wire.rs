//! Wire-level pieces of the endpoint's resumable-upload protocol.
//!
//! Session creation, byte-range-tagged chunk requests, the committed-offset
//! query, and the finalize marker. The header names and status conventions
//! are the storage provider's contract and are not ours to redesign.

use reqwest::StatusCode;

use crate::FailureKind;

/// Marks a POST against the signed URL as a session-creation request.
pub const RESUMABLE_START_HEADER: &str = "x-goog-resumable";
pub const RESUMABLE_START_VALUE: &str = "start";

/// Declares the eventual object size at initiation, when known.
pub const UPLOAD_CONTENT_LENGTH_HEADER: &str = "x-upload-content-length";

/// Status the endpoint uses to acknowledge bytes without finalizing.
pub const RESUME_INCOMPLETE: u16 = 308;

/// Formats the `Content-Range` value for a data chunk starting at `start`.
///
/// `total` is `None` while the stream length is still unknown; the final
/// chunk of an unknown-length stream carries its exact total instead.
pub fn content_range(start: u64, len: usize, total: Option<u64>) -> String {
    let end = start + len as u64 - 1;
    match total {
        Some(t) => format!("bytes {start}-{end}/{t}"),
        None => format!("bytes {start}-{end}/*"),
    }
}

/// Formats the `Content-Range` value for a status query or finalize marker
/// (no body bytes).
pub fn content_range_marker(total: Option<u64>) -> String {
    match total {
        Some(t) => format!("bytes */{t}"),
        None => "bytes */*".to_string(),
    }
}

/// Extracts the committed offset from a `Range: bytes=0-<end>` response
/// header.
///
/// A missing or malformed header means the endpoint has nothing durable
/// yet, which callers treat as offset 0.
pub fn committed_from_range(header: Option<&str>) -> Option<u64> {
    let value = header?.trim();
    let end = value.strip_prefix("bytes=")?.split('-').nth(1)?;
    end.parse::<u64>().ok().map(|e| e + 1)
}

/// Classifies a rejection status from the endpoint.
pub fn classify_rejection(status: StatusCode) -> FailureKind {
    match status.as_u16() {
        400 => FailureKind::UrlInvalid,
        401 | 403 => FailureKind::UrlExpired,
        _ => FailureKind::RemoteRejected,
    }
}
