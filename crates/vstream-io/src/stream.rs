use crate::error::{StreamError, StreamResult};

/// Outcome of a single `read` call.
///
/// A read may legitimately return fewer bytes than asked for; only
/// `EndOfStream` means that no byte at all was available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were placed at the start of the buffer.
    Read(usize),
    /// The file pointer is at or beyond the end of the stream.
    EndOfStream,
}

impl ReadOutcome {
    /// Number of bytes read, treating end of stream as zero.
    pub fn bytes(self) -> usize {
        match self {
            Self::Read(n) => n,
            Self::EndOfStream => 0,
        }
    }

    /// Returns `true` if this is the end-of-stream marker.
    pub fn is_end_of_stream(self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Random-access readable stream.
///
/// Every backing store and every composite stream implements this trait.
/// Implementations must satisfy these invariants:
/// - After a successful `read`, the file pointer has advanced by exactly the
///   number of bytes returned.
/// - `seek` never fails merely because the target lies past the end; the
///   next `read` reports end of stream instead.
/// - Once `close` has succeeded, all further operations fail with
///   [`StreamError::Closed`].
pub trait ReadableStream: Send {
    /// Move the file pointer to an absolute position.
    fn seek(&mut self, pos: u64) -> StreamResult<()>;

    /// Read up to `buf.len()` bytes at the file pointer.
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome>;

    /// Total length of the stream in bytes.
    fn length(&self) -> StreamResult<u64>;

    /// Current position of the file pointer.
    fn file_pointer(&self) -> StreamResult<u64>;

    /// Release the stream and whatever it holds.
    fn close(&mut self) -> StreamResult<()>;

    /// Fill `buf` completely, or fail with [`StreamError::UnexpectedEnd`].
    fn read_fully(&mut self, buf: &mut [u8]) -> StreamResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..])? {
                ReadOutcome::Read(0) | ReadOutcome::EndOfStream => {
                    return Err(StreamError::UnexpectedEnd {
                        requested: buf.len(),
                        read: filled,
                    });
                }
                ReadOutcome::Read(n) => filled += n,
            }
        }
        Ok(())
    }

    /// Read a single byte, or `None` at end of stream.
    fn read_byte(&mut self) -> StreamResult<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            ReadOutcome::Read(1) => Ok(Some(byte[0])),
            _ => Ok(None),
        }
    }

    /// Bytes between the file pointer and the end of the stream.
    fn remaining_length(&self) -> StreamResult<u64> {
        Ok(self.length()?.saturating_sub(self.file_pointer()?))
    }
}

/// Random-access stream that can also be written.
pub trait RandomAccessStream: ReadableStream {
    /// Write `buf` at the file pointer and return how many bytes the backing
    /// store accepted. A count lower than `buf.len()` is a short write.
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize>;

    /// Write all of `buf`, treating a short write as [`StreamError::ShortWrite`].
    fn write_all(&mut self, buf: &[u8]) -> StreamResult<()> {
        let written = self.write(buf)?;
        if written < buf.len() {
            return Err(StreamError::ShortWrite {
                written,
                requested: buf.len(),
            });
        }
        Ok(())
    }
}

impl<T: ReadableStream + ?Sized> ReadableStream for Box<T> {
    fn seek(&mut self, pos: u64) -> StreamResult<()> {
        (**self).seek(pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        (**self).read(buf)
    }

    fn length(&self) -> StreamResult<u64> {
        (**self).length()
    }

    fn file_pointer(&self) -> StreamResult<u64> {
        (**self).file_pointer()
    }

    fn close(&mut self) -> StreamResult<()> {
        (**self).close()
    }
}

impl<T: RandomAccessStream + ?Sized> RandomAccessStream for Box<T> {
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        (**self).write(buf)
    }
}

impl<T: ReadableStream + ?Sized> ReadableStream for &mut T {
    fn seek(&mut self, pos: u64) -> StreamResult<()> {
        (**self).seek(pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        (**self).read(buf)
    }

    fn length(&self) -> StreamResult<u64> {
        (**self).length()
    }

    fn file_pointer(&self) -> StreamResult<u64> {
        (**self).file_pointer()
    }

    fn close(&mut self) -> StreamResult<()> {
        (**self).close()
    }
}

impl<T: RandomAccessStream + ?Sized> RandomAccessStream for &mut T {
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        (**self).write(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStream;

    #[test]
    fn read_outcome_bytes() {
        assert_eq!(ReadOutcome::Read(7).bytes(), 7);
        assert_eq!(ReadOutcome::EndOfStream.bytes(), 0);
        assert!(ReadOutcome::EndOfStream.is_end_of_stream());
        assert!(!ReadOutcome::Read(0).is_end_of_stream());
    }

    #[test]
    fn read_fully_reports_shortfall() {
        let mut stream = MemoryStream::new(b"abc".to_vec());
        let mut buf = [0u8; 5];
        let err = stream.read_fully(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            StreamError::UnexpectedEnd {
                requested: 5,
                read: 3
            }
        ));
    }

    #[test]
    fn read_byte_and_remaining() {
        let mut stream = MemoryStream::new(b"xy".to_vec());
        assert_eq!(stream.remaining_length().unwrap(), 2);
        assert_eq!(stream.read_byte().unwrap(), Some(b'x'));
        assert_eq!(stream.read_byte().unwrap(), Some(b'y'));
        assert_eq!(stream.read_byte().unwrap(), None);
        assert_eq!(stream.remaining_length().unwrap(), 0);
    }

    #[test]
    fn boxed_stream_delegates() {
        let mut boxed: Box<dyn RandomAccessStream> = Box::new(MemoryStream::new(vec![0; 4]));
        boxed.seek(1).unwrap();
        boxed.write_all(b"ab").unwrap();
        boxed.seek(0).unwrap();
        let mut buf = [0u8; 4];
        boxed.read_fully(&mut buf).unwrap();
        assert_eq!(&buf, b"\0ab\0");
    }
}
