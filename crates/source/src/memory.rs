use crate::{ByteSource, SourceError};

/// An in-memory byte source for fixtures and tests.
///
/// Seekable. The total length is reported by default but can be withheld
/// to exercise the unknown-length upload path.
pub struct MemorySource {
    data: Vec<u8>,
    pos: usize,
    report_len: bool,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            report_len: true,
        }
    }

    /// Hides the total length, as a stream of unknown size would.
    pub fn with_unknown_len(mut self) -> Self {
        self.report_len = false;
        self
    }
}

impl ByteSource for MemorySource {
    fn total_len(&self) -> Option<u64> {
        self.report_len.then_some(self.data.len() as u64)
    }

    fn read_chunk(&mut self, size: usize) -> Result<Vec<u8>, SourceError> {
        let end = (self.pos + size).min(self.data.len());
        let chunk = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(chunk)
    }

    fn rewind(&mut self, offset: u64) -> Result<bool, SourceError> {
        if offset > self.data.len() as u64 {
            return Err(SourceError::Unreadable(format!(
                "rewind past end: {offset} > {}",
                self.data.len()
            )));
        }
        self.pos = offset as usize;
        Ok(true)
    }

    fn consumed(&self) -> u64 {
        self.pos as u64
    }
}
