use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{StreamError, StreamResult};
use crate::stream::{RandomAccessStream, ReadOutcome, ReadableStream};

/// Access mode for a leaf stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpenMode {
    /// Reads only; writes fail with [`StreamError::ReadOnly`].
    #[default]
    ReadOnly,
    /// Reads and writes. The file must already exist.
    ReadWrite,
}

/// Leaf stream over an OS file handle.
#[derive(Debug)]
pub struct FileStream {
    file: Option<File>,
    path: Option<PathBuf>,
    mode: OpenMode,
}

impl FileStream {
    /// Open the file at `path` in the given mode.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> StreamResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)
            .map_err(|source| StreamError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), ?mode, "opened file stream");
        Ok(Self {
            file: Some(file),
            path: Some(path.to_path_buf()),
            mode,
        })
    }

    /// Wrap an already open file. The caller vouches that `mode` matches
    /// how the handle was opened.
    pub fn from_file(file: File, mode: OpenMode) -> Self {
        Self {
            file: Some(file),
            path: None,
            mode,
        }
    }

    /// Path the stream was opened from, if known.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Mode the stream was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Truncate or extend the underlying file.
    pub fn set_length(&mut self, new_length: u64) -> StreamResult<()> {
        if self.mode != OpenMode::ReadWrite {
            return Err(StreamError::ReadOnly);
        }
        self.file()?.set_len(new_length)?;
        Ok(())
    }

    fn file(&self) -> StreamResult<&File> {
        self.file.as_ref().ok_or(StreamError::Closed)
    }
}

impl ReadableStream for FileStream {
    fn seek(&mut self, pos: u64) -> StreamResult<()> {
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        let mut file = self.file()?;
        if buf.is_empty() {
            return Ok(ReadOutcome::Read(0));
        }
        let n = loop {
            match file.read(buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        trace!(requested = buf.len(), read = n, "file read");
        if n == 0 {
            return Ok(ReadOutcome::EndOfStream);
        }
        Ok(ReadOutcome::Read(n))
    }

    fn length(&self) -> StreamResult<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn file_pointer(&self) -> StreamResult<u64> {
        let mut file = self.file()?;
        Ok(file.stream_position()?)
    }

    fn close(&mut self) -> StreamResult<()> {
        let file = self.file.take().ok_or(StreamError::Closed)?;
        if self.mode == OpenMode::ReadWrite {
            file.sync_all()?;
        }
        debug!(path = ?self.path, "closed file stream");
        Ok(())
    }
}

impl RandomAccessStream for FileStream {
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        if self.mode != OpenMode::ReadWrite {
            return Err(StreamError::ReadOnly);
        }
        let mut file = self.file()?;
        file.write_all(buf)?;
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.bin");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn read_seek_and_length() {
        let (_dir, path) = temp_file(b"ABCDEFGH");
        let mut s = FileStream::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(s.length().unwrap(), 8);
        s.seek(5).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(s.read(&mut buf).unwrap(), ReadOutcome::Read(3));
        assert_eq!(&buf[..3], b"FGH");
        assert_eq!(s.file_pointer().unwrap(), 8);
        assert_eq!(s.read(&mut buf).unwrap(), ReadOutcome::EndOfStream);
    }

    #[test]
    fn open_missing_file_carries_system_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bin");
        let err = FileStream::open(&missing, OpenMode::ReadOnly).unwrap_err();
        match err {
            StreamError::Open { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn read_only_rejects_writes() {
        let (_dir, path) = temp_file(b"ABCD");
        let mut s = FileStream::open(&path, OpenMode::ReadOnly).unwrap();
        assert!(matches!(s.write(b"x"), Err(StreamError::ReadOnly)));
        assert!(matches!(s.set_length(0), Err(StreamError::ReadOnly)));
    }

    #[test]
    fn write_and_set_length() {
        let (_dir, path) = temp_file(b"ABCD");
        let mut s = FileStream::open(&path, OpenMode::ReadWrite).unwrap();
        s.seek(1).unwrap();
        s.write_all(b"xy").unwrap();
        s.set_length(6).unwrap();
        s.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"AxyD\0\0");
    }

    #[test]
    fn double_close_is_rejected() {
        let (_dir, path) = temp_file(b"AB");
        let mut s = FileStream::open(&path, OpenMode::ReadOnly).unwrap();
        s.close().unwrap();
        assert!(matches!(s.close(), Err(StreamError::Closed)));
        assert!(matches!(s.length(), Err(StreamError::Closed)));
    }
}
