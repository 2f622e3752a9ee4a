use std::io;

use crate::error::{StreamError, StreamResult};
use crate::stream::{RandomAccessStream, ReadOutcome, ReadableStream};

/// In-memory, `Vec`-backed stream.
///
/// Intended for tests and embedding. Writes behave like writes to a file:
/// they overwrite existing bytes and extend the buffer (zero-padding any gap)
/// when they pass the end.
#[derive(Clone, Debug, Default)]
pub struct MemoryStream {
    data: Vec<u8>,
    pos: u64,
    write_limit: Option<usize>,
    closed: bool,
}

impl MemoryStream {
    /// Create a stream over `data`, positioned at 0.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            write_limit: None,
            closed: false,
        }
    }

    /// Cap the number of bytes a single `write` call accepts.
    ///
    /// Writes larger than `limit` are short writes.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// The current contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream and return its contents.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> StreamResult<()> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        Ok(())
    }
}

impl ReadableStream for MemoryStream {
    fn seek(&mut self, pos: u64) -> StreamResult<()> {
        self.ensure_open()?;
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        self.ensure_open()?;
        let len = self.data.len() as u64;
        if self.pos >= len {
            return Ok(ReadOutcome::EndOfStream);
        }
        let start = self.pos as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(ReadOutcome::Read(n))
    }

    fn length(&self) -> StreamResult<u64> {
        self.ensure_open()?;
        Ok(self.data.len() as u64)
    }

    fn file_pointer(&self) -> StreamResult<u64> {
        self.ensure_open()?;
        Ok(self.pos)
    }

    fn close(&mut self) -> StreamResult<()> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}

impl RandomAccessStream for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        self.ensure_open()?;
        let n = match self.write_limit {
            Some(limit) => buf.len().min(limit),
            None => buf.len(),
        };
        let start = usize::try_from(self.pos).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "position exceeds addressable memory")
        })?;
        let end = start + n;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(&buf[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_then_end_of_stream() {
        let mut s = MemoryStream::new(b"ABCD".to_vec());
        let mut buf = [0u8; 3];
        assert_eq!(s.read(&mut buf).unwrap(), ReadOutcome::Read(3));
        assert_eq!(&buf, b"ABC");
        assert_eq!(s.read(&mut buf).unwrap(), ReadOutcome::Read(1));
        assert_eq!(buf[0], b'D');
        assert_eq!(s.read(&mut buf).unwrap(), ReadOutcome::EndOfStream);
        assert_eq!(s.file_pointer().unwrap(), 4);
    }

    #[test]
    fn seek_past_end_reads_end_of_stream() {
        let mut s = MemoryStream::new(b"AB".to_vec());
        s.seek(10).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(s.read(&mut buf).unwrap(), ReadOutcome::EndOfStream);
    }

    #[test]
    fn write_overwrites_and_extends() {
        let mut s = MemoryStream::new(b"ABCD".to_vec());
        s.seek(2).unwrap();
        assert_eq!(s.write(b"xyz").unwrap(), 3);
        assert_eq!(s.as_bytes(), b"ABxyz");
        s.seek(7).unwrap();
        s.write(b"!").unwrap();
        assert_eq!(s.into_inner(), b"ABxyz\0\0!");
    }

    #[test]
    fn write_limit_produces_short_write() {
        let mut s = MemoryStream::new(vec![0; 8]).with_write_limit(2);
        assert_eq!(s.write(b"abcd").unwrap(), 2);
        assert_eq!(s.file_pointer().unwrap(), 2);
        s.seek(0).unwrap();
        let err = s.write_all(b"abcd").unwrap_err();
        assert!(matches!(
            err,
            StreamError::ShortWrite {
                written: 2,
                requested: 4
            }
        ));
    }

    #[test]
    fn closed_stream_rejects_operations() {
        let mut s = MemoryStream::new(b"AB".to_vec());
        s.close().unwrap();
        assert!(s.is_closed());
        assert!(matches!(s.length(), Err(StreamError::Closed)));
        assert!(matches!(s.close(), Err(StreamError::Closed)));
    }
}
