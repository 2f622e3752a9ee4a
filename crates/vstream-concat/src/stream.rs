use tracing::{debug, error, trace};
use vstream_io::{RandomAccessStream, ReadOutcome, ReadableStream, StreamError, StreamResult};

use crate::part::{Part, SourceId};
use crate::table::PartTable;

/// A single virtual stream stitched together from a [`PartTable`].
///
/// The stream keeps its own virtual file pointer, independent of the
/// positions of the member streams, and translates every read and write
/// through the table. Reads that cross part boundaries are served in one
/// call; holes read as zeros.
///
/// `ConcatenatedStream<S>` is readable for any `S: ReadableStream` and
/// writable when `S: RandomAccessStream`.
///
/// The stream does no locking. To share a member stream between several
/// composites or threads, use [`vstream_io::SharedStream`] handles as `S`.
pub struct ConcatenatedStream<S> {
    table: PartTable<S>,
    virtual_fp: u64,
    closed: bool,
}

impl<S: ReadableStream> ConcatenatedStream<S> {
    /// Build a stream over an existing table, positioned at 0.
    pub fn new(table: PartTable<S>) -> Self {
        Self {
            table,
            virtual_fp: 0,
            closed: false,
        }
    }

    /// Build a stream whose first part is `length` bytes of `source` starting
    /// at `start_offset`.
    pub fn with_first_part(source: S, start_offset: u64, length: u64) -> StreamResult<Self> {
        let mut table = PartTable::new();
        table.push_source(source, start_offset, length)?;
        Ok(Self::new(table))
    }

    /// Append a part backed by a new source.
    pub fn add_part(&mut self, source: S, start_offset: u64, length: u64) -> StreamResult<SourceId> {
        self.ensure_open()?;
        self.table.push_source(source, start_offset, length)
    }

    /// Append another part backed by a source that is already registered.
    pub fn add_shared_part(&mut self, source: SourceId, start_offset: u64, length: u64) -> StreamResult<()> {
        self.ensure_open()?;
        self.table.push(Part::backed(source, start_offset, length))
    }

    /// Append a zero-filled hole.
    pub fn add_hole(&mut self, length: u64) -> StreamResult<()> {
        self.ensure_open()?;
        self.table.push_hole(length)
    }

    pub fn table(&self) -> &PartTable<S> {
        &self.table
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> StreamResult<()> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        Ok(())
    }

    fn source_for(&mut self, part: &Part) -> StreamResult<&mut S> {
        let id = part.source.ok_or_else(|| StreamError::InvalidPart("hole has no source".into()))?;
        self.table
            .source_mut(id)
            .ok_or_else(|| StreamError::InvalidPart(format!("unknown source {id}")))
    }
}

impl<S: ReadableStream> ReadableStream for ConcatenatedStream<S> {
    fn seek(&mut self, pos: u64) -> StreamResult<()> {
        self.ensure_open()?;
        trace!(pos, "seek");
        self.virtual_fp = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        self.ensure_open()?;
        trace!(virtual_fp = self.virtual_fp, len = buf.len(), "read");

        let Some(location) = self.table.locate(self.virtual_fp) else {
            return Ok(ReadOutcome::EndOfStream);
        };
        if buf.is_empty() {
            return Ok(ReadOutcome::Read(0));
        }

        let len = buf.len();
        let mut bytes_read = 0usize;
        let mut index = location.index;
        let mut skip_in_part = location.residual;

        while bytes_read < len && index < self.table.len() {
            let part = self.table.parts()[index];
            index += 1;
            let left_in_part = part.length - skip_in_part;
            let in_part_offset = skip_in_part;
            skip_in_part = 0;
            if left_in_part == 0 {
                continue;
            }

            let wanted = (len - bytes_read).min(usize::try_from(left_in_part).unwrap_or(usize::MAX));
            let dest = &mut buf[bytes_read..bytes_read + wanted];

            trace!(
                part = index - 1,
                hole = part.is_hole(),
                offset = part.start_offset + in_part_offset,
                wanted,
                "reading from part"
            );

            let outcome = if part.is_hole() {
                dest.fill(0);
                ReadOutcome::Read(wanted)
            } else {
                let source = self.source_for(&part)?;
                source.seek(part.start_offset + in_part_offset)?;
                source.read(dest)?
            };

            match outcome {
                ReadOutcome::Read(n) if n > 0 => {
                    if n > wanted {
                        error!(part = index - 1, read = n, wanted, "source read more than requested");
                        return Err(StreamError::ReadOverrun {
                            read: bytes_read + n,
                            requested: len,
                        });
                    }
                    self.virtual_fp += n as u64;
                    bytes_read += n;
                    if n < wanted {
                        // Short physical read: hand back what we have.
                        break;
                    }
                }
                _ => {
                    // The source ended early.
                    break;
                }
            }
        }

        if bytes_read == 0 {
            return Ok(ReadOutcome::EndOfStream);
        }
        Ok(ReadOutcome::Read(bytes_read))
    }

    fn length(&self) -> StreamResult<u64> {
        self.ensure_open()?;
        Ok(self.table.total_length())
    }

    fn file_pointer(&self) -> StreamResult<u64> {
        self.ensure_open()?;
        Ok(self.virtual_fp)
    }

    /// Close every registered source once, then refuse further use.
    ///
    /// All sources are closed even if one fails; the first error is returned.
    fn close(&mut self) -> StreamResult<()> {
        self.ensure_open()?;
        self.closed = true;
        let mut first_err = None;
        for source in self.table.sources_mut() {
            if let Err(e) = source.close() {
                first_err.get_or_insert(e);
            }
        }
        debug!(sources = self.table.source_count(), "closed concatenated stream");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<S: RandomAccessStream> RandomAccessStream for ConcatenatedStream<S> {
    /// Write `buf` at the virtual file pointer.
    ///
    /// The whole range is checked before any byte is written: writing past
    /// the end of the last part fails with [`StreamError::WriteBeyondEnd`]
    /// and touching a hole fails with [`StreamError::WriteToHole`], leaving
    /// every part unchanged. A short write by a member stream fails with
    /// [`StreamError::ShortWrite`]; the file pointer then reflects the bytes
    /// that did reach the backing store.
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        self.ensure_open()?;
        let offset = self.virtual_fp;
        let len = buf.len();
        let length = self.table.total_length();
        trace!(virtual_fp = offset, len, "write");

        let fits = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= length);
        if !fits {
            return Err(StreamError::WriteBeyondEnd { offset, len, length });
        }
        if let Some(hole_at) = self.table.first_hole_in(offset, len as u64) {
            return Err(StreamError::WriteToHole { offset: hole_at });
        }
        let Some(location) = self.table.locate(offset) else {
            return Ok(0);
        };

        let mut bytes_written = 0usize;
        let mut index = location.index;
        let mut skip_in_part = location.residual;

        while bytes_written < len && index < self.table.len() {
            let part = self.table.parts()[index];
            index += 1;
            let left_in_part = part.length - skip_in_part;
            let in_part_offset = skip_in_part;
            skip_in_part = 0;
            if left_in_part == 0 {
                continue;
            }

            let wanted = (len - bytes_written).min(usize::try_from(left_in_part).unwrap_or(usize::MAX));
            trace!(
                part = index - 1,
                offset = part.start_offset + in_part_offset,
                wanted,
                "writing to part"
            );

            let source = self.source_for(&part)?;
            source.seek(part.start_offset + in_part_offset)?;
            let n = source.write(&buf[bytes_written..bytes_written + wanted])?;
            if n > wanted {
                error!(part = index - 1, written = n, wanted, "source wrote more than requested");
                return Err(StreamError::WriteOverrun {
                    written: bytes_written + n,
                    requested: len,
                });
            }
            self.virtual_fp += n as u64;
            bytes_written += n;
            if n < wanted {
                break;
            }
        }

        if bytes_written < len {
            error!(written = bytes_written, requested = len, "short write to member stream");
            return Err(StreamError::ShortWrite {
                written: bytes_written,
                requested: len,
            });
        }
        Ok(bytes_written)
    }
}

impl<S> std::fmt::Debug for ConcatenatedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcatenatedStream")
            .field("virtual_fp", &self.virtual_fp)
            .field("closed", &self.closed)
            .field("table", &self.table)
            .finish()
    }
}
