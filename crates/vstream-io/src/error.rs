use std::io;
use std::path::PathBuf;

/// Errors produced by streams and stream wrappers.
///
/// Three classes are distinguished:
/// - I/O failures (`Io`, `Open`) carry the originating system error.
/// - Policy errors (`WriteToHole`, `WriteBeyondEnd`, `ReadOnly`, ...) fail
///   the current call only; the stream stays usable.
/// - Invariant violations (see [`StreamError::is_invariant_violation`])
///   indicate a bug in part-table construction or reference discipline.
///
/// End of stream is not an error; see [`crate::ReadOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// I/O error from the backing store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A leaf stream could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The stream (or its shared source) has been closed.
    #[error("stream is closed")]
    Closed,

    /// `read_fully` hit the end of the stream before filling the buffer.
    #[error("unexpected end of stream: requested {requested} bytes, read {read}")]
    UnexpectedEnd { requested: usize, read: usize },

    /// A write touched a hole part, which has no backing store.
    #[error("tried to write to hole at virtual offset {offset}")]
    WriteToHole { offset: u64 },

    /// A write would extend past the end of the last part.
    #[error("tried to write beyond end of stream: {len} bytes at offset {offset}, stream length {length}")]
    WriteBeyondEnd { offset: u64, len: usize, length: u64 },

    /// The backing store accepted fewer bytes than requested.
    #[error("could not write all data requested: wrote {written} of {requested} bytes")]
    ShortWrite { written: usize, requested: usize },

    /// A part description is malformed.
    #[error("invalid part: {0}")]
    InvalidPart(String),

    /// Write attempted on a stream opened read-only.
    #[error("stream is read-only")]
    ReadOnly,

    /// `close` called on a handle or wrapper that was already closed.
    #[error("stream already closed")]
    AlreadyClosed,

    /// A reference was released when none were left to release.
    #[error("no references left to release")]
    NoReferences,

    /// A read produced more bytes than were requested.
    #[error("read more than requested: {read} of {requested} bytes")]
    ReadOverrun { read: usize, requested: usize },

    /// A member stream claimed to write more bytes than it was given.
    #[error("wrote more than requested: {written} of {requested} bytes")]
    WriteOverrun { written: usize, requested: usize },
}

impl StreamError {
    /// Returns `true` for usage and bookkeeping bugs, as opposed to I/O
    /// failures or per-call policy errors.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyClosed
                | Self::NoReferences
                | Self::ReadOverrun { .. }
                | Self::WriteOverrun { .. }
        )
    }

    /// Returns `true` if the error carries an underlying system error.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Open { .. })
    }
}

/// Result alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(StreamError::NoReferences.is_invariant_violation());
        assert!(StreamError::AlreadyClosed.is_invariant_violation());
        assert!(StreamError::ReadOverrun { read: 2, requested: 1 }.is_invariant_violation());
        assert!(StreamError::WriteOverrun { written: 3, requested: 2 }.is_invariant_violation());
        assert!(!StreamError::WriteToHole { offset: 0 }.is_invariant_violation());
        assert!(!StreamError::Closed.is_invariant_violation());

        let io = StreamError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(io.is_io());
        assert!(!io.is_invariant_violation());
    }

    #[test]
    fn open_error_names_path() {
        let err = StreamError::Open {
            path: PathBuf::from("/no/such/image.001"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/no/such/image.001"));
        assert!(err.is_io());
    }
}
