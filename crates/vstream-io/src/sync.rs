//! Reference-counted, mutex-guarded sharing of a single stream.
//!
//! [`SynchronizedStream`] serializes every operation on its source under one
//! lock and counts references so the source is closed exactly once, when the
//! last holder lets go. [`SharedStream`] is the handle type composite streams
//! store: each handle keeps a private file pointer and reads through
//! [`SynchronizedStream::read_at`], so holders never disturb each other.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{StreamError, StreamResult};
use crate::stream::{RandomAccessStream, ReadOutcome, ReadableStream};

struct SyncState<S> {
    source: S,
    ref_count: u64,
    closed: bool,
}

impl<S: ReadableStream> SyncState<S> {
    fn source_closed(&self) -> bool {
        self.closed && self.ref_count == 0
    }

    fn source(&mut self) -> StreamResult<&mut S> {
        if self.source_closed() {
            return Err(StreamError::Closed);
        }
        Ok(&mut self.source)
    }

    fn try_close_source(&mut self) -> StreamResult<()> {
        if self.ref_count == 0 {
            debug!("last reference released; closing source");
            self.source.close()?;
        }
        Ok(())
    }
}

/// Stream wrapper that makes one source safely usable by several owners.
///
/// Reference discipline:
/// - The wrapper starts with one reference, owned by its creator, who
///   releases it with [`close`](Self::close). Closing twice is
///   [`StreamError::AlreadyClosed`].
/// - Further holders call [`add_reference`](Self::add_reference) and release
///   with [`remove_reference`](Self::remove_reference). Releasing a reference
///   that does not exist is [`StreamError::NoReferences`].
/// - The source is closed when the count reaches zero. From then on every
///   I/O operation fails with [`StreamError::Closed`].
pub struct SynchronizedStream<S> {
    state: Mutex<SyncState<S>>,
}

impl<S: ReadableStream> SynchronizedStream<S> {
    /// Wrap `source` with a reference count of one.
    pub fn new(source: S) -> Self {
        Self {
            state: Mutex::new(SyncState {
                source,
                ref_count: 1,
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState<S>> {
        self.state.lock().expect("stream mutex poisoned")
    }

    pub fn seek(&self, pos: u64) -> StreamResult<()> {
        self.lock().source()?.seek(pos)
    }

    pub fn read(&self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        self.lock().source()?.read(buf)
    }

    pub fn read_fully(&self, buf: &mut [u8]) -> StreamResult<()> {
        self.lock().source()?.read_fully(buf)
    }

    pub fn length(&self) -> StreamResult<u64> {
        self.lock().source()?.length()
    }

    pub fn file_pointer(&self) -> StreamResult<u64> {
        self.lock().source()?.file_pointer()
    }

    pub fn remaining_length(&self) -> StreamResult<u64> {
        self.lock().source()?.remaining_length()
    }

    /// Read at an absolute position without moving the file pointer.
    ///
    /// The position seen by [`file_pointer`](Self::file_pointer) is restored
    /// afterwards, also when the seek or the read fails.
    pub fn read_at(&self, pos: u64, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        let mut state = self.lock();
        let source = state.source()?;
        let old_fp = source.file_pointer()?;

        let result = if old_fp != pos {
            source.seek(pos).and_then(|()| source.read(buf))
        } else {
            source.read(buf)
        };

        restore_position(source, old_fp, result)
    }

    /// How many of `len` bytes starting at `pos` lie inside the stream.
    ///
    /// Pure query: the file pointer is left untouched.
    pub fn skip_from(&self, pos: u64, len: u64) -> StreamResult<u64> {
        let stream_length = self.lock().source()?.length()?;
        match pos.checked_add(len) {
            Some(end) if end <= stream_length => Ok(len),
            _ => Ok(stream_length.saturating_sub(pos)),
        }
    }

    /// Register an additional holder.
    pub fn add_reference(&self) -> StreamResult<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        state.ref_count += 1;
        debug!(ref_count = state.ref_count, "added stream reference");
        Ok(())
    }

    /// Release a reference taken with [`add_reference`](Self::add_reference).
    pub fn remove_reference(&self) -> StreamResult<()> {
        let mut state = self.lock();
        if (state.closed && state.ref_count == 0) || (!state.closed && state.ref_count == 1) {
            return Err(StreamError::NoReferences);
        }
        state.ref_count -= 1;
        debug!(ref_count = state.ref_count, "removed stream reference");
        state.try_close_source()
    }

    /// Release the creator's reference and refuse new ones.
    pub fn close(&self) -> StreamResult<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(StreamError::AlreadyClosed);
        }
        state.ref_count -= 1;
        state.closed = true;
        debug!(ref_count = state.ref_count, "closed synchronized stream");
        state.try_close_source()
    }

    /// Number of live references.
    pub fn ref_count(&self) -> u64 {
        self.lock().ref_count
    }

    /// Returns `true` once the creator's reference has been released.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns `true` once the source itself has been closed.
    pub fn is_source_closed(&self) -> bool {
        self.lock().source_closed()
    }
}

impl<S: RandomAccessStream> SynchronizedStream<S> {
    pub fn write(&self, buf: &[u8]) -> StreamResult<usize> {
        self.lock().source()?.write(buf)
    }

    /// Write at an absolute position without moving the file pointer.
    pub fn write_at(&self, pos: u64, buf: &[u8]) -> StreamResult<usize> {
        let mut state = self.lock();
        let source = state.source()?;
        let old_fp = source.file_pointer()?;

        let result = if old_fp != pos {
            source.seek(pos).and_then(|()| source.write(buf))
        } else {
            source.write(buf)
        };

        restore_position(source, old_fp, result)
    }
}

fn restore_position<S: ReadableStream, T>(
    source: &mut S,
    old_fp: u64,
    result: StreamResult<T>,
) -> StreamResult<T> {
    match (result, source.seek(old_fp)) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            warn!(old_fp, error = %restore_err, "failed to restore file pointer");
            Err(e)
        }
    }
}

impl<S: ReadableStream> ReadableStream for SynchronizedStream<S> {
    fn seek(&mut self, pos: u64) -> StreamResult<()> {
        SynchronizedStream::seek(self, pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        SynchronizedStream::read(self, buf)
    }

    fn length(&self) -> StreamResult<u64> {
        SynchronizedStream::length(self)
    }

    fn file_pointer(&self) -> StreamResult<u64> {
        SynchronizedStream::file_pointer(self)
    }

    fn close(&mut self) -> StreamResult<()> {
        SynchronizedStream::close(self)
    }
}

impl<S: RandomAccessStream> RandomAccessStream for SynchronizedStream<S> {
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        SynchronizedStream::write(self, buf)
    }
}

impl<S> std::fmt::Debug for SynchronizedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("SynchronizedStream");
        match self.state.try_lock() {
            Ok(state) => d
                .field("ref_count", &state.ref_count)
                .field("closed", &state.closed)
                .finish(),
            Err(_) => d.finish_non_exhaustive(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandleRole {
    Owner,
    Borrower,
}

/// Handle to a [`SynchronizedStream`] with its own file pointer.
///
/// The handle created by [`SharedStream::new`] owns the wrapper's initial
/// reference; [`share`](SharedStream::share) hands out borrower handles.
/// Closing (or dropping) a handle releases exactly its own reference.
pub struct SharedStream<S: ReadableStream> {
    inner: Arc<SynchronizedStream<S>>,
    pos: u64,
    role: HandleRole,
    released: bool,
}

impl<S: ReadableStream> SharedStream<S> {
    /// Wrap `source` and return the owner handle.
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(SynchronizedStream::new(source)),
            pos: 0,
            role: HandleRole::Owner,
            released: false,
        }
    }

    /// Take another reference and return a borrower handle positioned at 0.
    pub fn share(&self) -> StreamResult<Self> {
        if self.released {
            return Err(StreamError::Closed);
        }
        self.inner.add_reference()?;
        Ok(Self {
            inner: Arc::clone(&self.inner),
            pos: 0,
            role: HandleRole::Borrower,
            released: false,
        })
    }

    /// The wrapper behind this handle.
    pub fn synchronized(&self) -> &SynchronizedStream<S> {
        &self.inner
    }

    /// Returns `true` if both handles refer to the same wrapper.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_live(&self) -> StreamResult<()> {
        if self.released {
            return Err(StreamError::Closed);
        }
        Ok(())
    }

    fn release(&mut self) -> StreamResult<()> {
        // The wrapper drops the reference before closing the source, so a
        // failed source close still consumes this handle.
        self.released = true;
        match self.role {
            HandleRole::Owner => self.inner.close(),
            HandleRole::Borrower => self.inner.remove_reference(),
        }
    }
}

impl<S: ReadableStream> ReadableStream for SharedStream<S> {
    fn seek(&mut self, pos: u64) -> StreamResult<()> {
        self.ensure_live()?;
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        self.ensure_live()?;
        let outcome = self.inner.read_at(self.pos, buf)?;
        self.pos += outcome.bytes() as u64;
        Ok(outcome)
    }

    fn length(&self) -> StreamResult<u64> {
        self.ensure_live()?;
        self.inner.length()
    }

    fn file_pointer(&self) -> StreamResult<u64> {
        self.ensure_live()?;
        Ok(self.pos)
    }

    fn close(&mut self) -> StreamResult<()> {
        if self.released {
            return Err(StreamError::AlreadyClosed);
        }
        self.release()
    }
}

impl<S: RandomAccessStream> RandomAccessStream for SharedStream<S> {
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        self.ensure_live()?;
        let written = self.inner.write_at(self.pos, buf)?;
        self.pos += written as u64;
        Ok(written)
    }
}

impl<S: ReadableStream> Drop for SharedStream<S> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release() {
                warn!(error = %e, "failed to release shared stream reference on drop");
            }
        }
    }
}

impl<S: ReadableStream> std::fmt::Debug for SharedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStream")
            .field("pos", &self.pos)
            .field("role", &self.role)
            .field("released", &self.released)
            .field("inner", &self.inner)
            .finish()
    }
}
