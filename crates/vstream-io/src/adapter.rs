use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::StreamError;
use crate::stream::{RandomAccessStream, ReadOutcome, ReadableStream};

/// Adapts any stream to `std::io::{Read, Seek, Write}`.
#[derive(Debug)]
pub struct StreamReader<S> {
    inner: S,
}

impl<S: ReadableStream> StreamReader<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match &err {
            StreamError::Io(e) => e.kind(),
            StreamError::Open { source, .. } => source.kind(),
            StreamError::UnexpectedEnd { .. } => io::ErrorKind::UnexpectedEof,
            StreamError::ShortWrite { .. } => io::ErrorKind::WriteZero,
            StreamError::ReadOnly => io::ErrorKind::PermissionDenied,
            StreamError::WriteToHole { .. }
            | StreamError::WriteBeyondEnd { .. }
            | StreamError::InvalidPart(_) => io::ErrorKind::InvalidInput,
            StreamError::Closed
            | StreamError::AlreadyClosed
            | StreamError::NoReferences
            | StreamError::ReadOverrun { .. }
            | StreamError::WriteOverrun { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

impl<S: ReadableStream> Read for StreamReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf)? {
            ReadOutcome::Read(n) => Ok(n),
            ReadOutcome::EndOfStream => Ok(0),
        }
    }
}

impl<S: ReadableStream> Seek for StreamReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.inner.length()?.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.inner.file_pointer()?.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative or overflowing position")
        })?;
        self.inner.seek(target)?;
        Ok(target)
    }
}

impl<S: RandomAccessStream> Write for StreamReader<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.inner.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
