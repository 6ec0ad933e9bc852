//! Byte source resolution: turns an opaque path specification into a
//! sequential, chunked byte stream for the upload session to drain.

mod file;
mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

/// Errors surfaced while resolving or reading a byte source.
///
/// All of these occur before or during local I/O only; a failed source is
/// reported to the action caller before any network traffic starts.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unreadable: {0}")]
    Unreadable(String),
}

impl SourceError {
    /// Maps an I/O failure on `context` onto the source taxonomy.
    pub fn from_io(context: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(format!("{context}: {err}")),
            std::io::ErrorKind::PermissionDenied => {
                SourceError::PermissionDenied(format!("{context}: {err}"))
            }
            _ => SourceError::Unreadable(format!("{context}: {err}")),
        }
    }
}

/// A sequential, read-once-by-default byte stream of known or unknown
/// total length.
///
/// Contract:
/// - `read_chunk` returns exactly `size` bytes unless end-of-data is
///   reached, and signals end-of-data with an empty vec exactly once.
/// - `rewind` repositions the stream so the next read starts at `offset`;
///   sources that cannot reposition return `Ok(false)` and the caller
///   decides whether the transfer can continue.
/// - `consumed` is the number of bytes handed out so far, adjusted by
///   successful rewinds.
///
/// A source is owned and drained by exactly one upload session.
pub trait ByteSource: Send {
    /// Total length in bytes, when determinable before the first read.
    fn total_len(&self) -> Option<u64>;

    /// Reads the next chunk of up to `size` bytes.
    fn read_chunk(&mut self, size: usize) -> Result<Vec<u8>, SourceError>;

    /// Repositions the stream to `offset`. Returns `Ok(false)` if this
    /// source cannot seek.
    fn rewind(&mut self, offset: u64) -> Result<bool, SourceError>;

    /// Bytes handed out so far.
    fn consumed(&self) -> u64;
}
