use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use longhaul_protocol::PathSpec;
use tracing::debug;

use crate::{ByteSource, SourceError};

/// A local regular file resolved from a path specification.
///
/// Seekable, with the total length known up front.
#[derive(Debug)]
pub struct FileSource {
    file: std::fs::File,
    total: u64,
    consumed: u64,
    path: String,
}

impl FileSource {
    /// Resolves `spec` as a local filesystem path and opens it for reading.
    pub fn open(spec: &PathSpec) -> Result<Self, SourceError> {
        let path = Path::new(spec.as_str());
        let file = std::fs::File::open(path).map_err(|e| SourceError::from_io(spec.as_str(), e))?;
        let meta = file
            .metadata()
            .map_err(|e| SourceError::from_io(spec.as_str(), e))?;
        if !meta.is_file() {
            return Err(SourceError::Unreadable(format!(
                "{}: not a regular file",
                spec.as_str()
            )));
        }

        debug!(path = %spec, size = meta.len(), "opened file source");

        Ok(Self {
            file,
            total: meta.len(),
            consumed: 0,
            path: spec.as_str().to_string(),
        })
    }
}

impl ByteSource for FileSource {
    fn total_len(&self) -> Option<u64> {
        Some(self.total)
    }

    fn read_chunk(&mut self, size: usize) -> Result<Vec<u8>, SourceError> {
        let mut buf = vec![0u8; size];
        let mut filled = 0;
        // Fill the full chunk unless EOF cuts it short.
        while filled < size {
            let n = self
                .file
                .read(&mut buf[filled..])
                .map_err(|e| SourceError::from_io(&self.path, e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        self.consumed += filled as u64;
        Ok(buf)
    }

    fn rewind(&mut self, offset: u64) -> Result<bool, SourceError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| SourceError::from_io(&self.path, e))?;
        self.consumed = offset;
        Ok(true)
    }

    fn consumed(&self) -> u64 {
        self.consumed
    }
}
