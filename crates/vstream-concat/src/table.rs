use tracing::debug;
use vstream_io::{StreamError, StreamResult};

use crate::part::{Part, SourceId};

/// Position of a virtual offset inside the part table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    /// Index of the part containing the offset.
    pub index: usize,
    /// Offset of the byte within that part.
    pub residual: u64,
}

/// Ordered sequence of parts plus the sources they read from.
///
/// Part order defines the virtual address space: part *i* covers
/// `[sum(len[0..i]), sum(len[0..i]) + len[i])`. The table only grows.
///
/// Each source is registered once and referenced from parts by
/// [`SourceId`], so a source used by several parts is still a single
/// entry and is closed once.
pub struct PartTable<S> {
    sources: Vec<S>,
    parts: Vec<Part>,
    total_length: u64,
}

impl<S> PartTable<S> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            parts: Vec::new(),
            total_length: 0,
        }
    }

    /// Register a source without adding a part for it yet.
    pub fn add_source(&mut self, source: S) -> SourceId {
        self.sources.push(source);
        SourceId(self.sources.len() - 1)
    }

    /// Append a part.
    ///
    /// Fails with [`StreamError::InvalidPart`] for a zero-length hole, an
    /// unknown source, or offsets that overflow `u64`.
    pub fn push(&mut self, part: Part) -> StreamResult<()> {
        match part.source {
            None if part.length == 0 => {
                return Err(StreamError::InvalidPart("hole must have a positive length".into()));
            }
            None => {}
            Some(id) => {
                if id.0 >= self.sources.len() {
                    return Err(StreamError::InvalidPart(format!("unknown source {id}")));
                }
                if part.start_offset.checked_add(part.length).is_none() {
                    return Err(StreamError::InvalidPart(format!(
                        "start offset {} + length {} overflows",
                        part.start_offset, part.length
                    )));
                }
            }
        }
        let total_length = self.extended_length(part.length)?;

        debug!(
            index = self.parts.len(),
            source = ?part.source,
            start_offset = part.start_offset,
            length = part.length,
            "appended part"
        );
        self.parts.push(part);
        self.total_length = total_length;
        Ok(())
    }

    /// Append a zero-filled gap.
    pub fn push_hole(&mut self, length: u64) -> StreamResult<()> {
        self.push(Part::hole(length))
    }

    /// Register `source` and append a part backed by it.
    pub fn push_source(&mut self, source: S, start_offset: u64, length: u64) -> StreamResult<SourceId> {
        if start_offset.checked_add(length).is_none() {
            return Err(StreamError::InvalidPart(format!(
                "start offset {start_offset} + length {length} overflows"
            )));
        }
        // Reject before registering so a failed push leaves no orphan source.
        self.extended_length(length)?;
        let id = self.add_source(source);
        self.push(Part::backed(id, start_offset, length))?;
        Ok(id)
    }

    fn extended_length(&self, length: u64) -> StreamResult<u64> {
        self.total_length.checked_add(length).ok_or_else(|| {
            StreamError::InvalidPart(format!(
                "part of {length} bytes overflows virtual length {}",
                self.total_length
            ))
        })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Number of distinct registered sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source(&self, id: SourceId) -> Option<&S> {
        self.sources.get(id.0)
    }

    pub fn source_mut(&mut self, id: SourceId) -> Option<&mut S> {
        self.sources.get_mut(id.0)
    }

    pub(crate) fn sources_mut(&mut self) -> impl Iterator<Item = &mut S> {
        self.sources.iter_mut()
    }

    /// Sum of all part lengths.
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Virtual offset at which part `index` begins.
    pub fn part_start(&self, index: usize) -> u64 {
        self.parts[..index.min(self.parts.len())]
            .iter()
            .map(|p| p.length)
            .sum()
    }

    /// Find the part holding the byte at virtual offset `pos`.
    ///
    /// A part matches only if its first byte lies at or before `pos` and
    /// `pos` is strictly inside it, so zero-length parts never match.
    /// Returns `None` at or beyond the end of the table.
    pub fn locate(&self, pos: u64) -> Option<Location> {
        let mut to_skip = pos;
        for (index, part) in self.parts.iter().enumerate() {
            if to_skip < part.length {
                return Some(Location {
                    index,
                    residual: to_skip,
                });
            }
            to_skip -= part.length;
        }
        None
    }

    /// Virtual offset of the first hole byte in `[pos, pos + len)`, if any.
    pub fn first_hole_in(&self, pos: u64, len: u64) -> Option<u64> {
        let end = pos.saturating_add(len);
        let mut part_start = 0u64;
        for part in &self.parts {
            let part_end = part_start + part.length;
            if part_start >= end {
                break;
            }
            if part.is_hole() && part_end > pos {
                return Some(part_start.max(pos));
            }
            part_start = part_end;
        }
        None
    }
}

impl<S> Default for PartTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for PartTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartTable")
            .field("source_count", &self.sources.len())
            .field("parts", &self.parts)
            .field("total_length", &self.total_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PartTable<&'static str> {
        // [hole 4][a 0..3][b (empty)][a 10..15]
        let mut t = PartTable::new();
        t.push_hole(4).unwrap();
        let a = t.push_source("a", 0, 3).unwrap();
        t.push_source("b", 7, 0).unwrap();
        t.push(Part::backed(a, 10, 5)).unwrap();
        t
    }

    #[test]
    fn total_length_is_sum_of_parts() {
        let t = table();
        assert_eq!(t.len(), 4);
        assert_eq!(t.source_count(), 2);
        assert_eq!(t.total_length(), 12);
        assert_eq!(t.total_length(), t.parts().iter().map(|p| p.length).sum::<u64>());
    }

    #[test]
    fn locate_uses_first_byte_within_part() {
        let t = table();
        assert_eq!(t.locate(0), Some(Location { index: 0, residual: 0 }));
        assert_eq!(t.locate(3), Some(Location { index: 0, residual: 3 }));
        assert_eq!(t.locate(4), Some(Location { index: 1, residual: 0 }));
        // Offset 7 is the first byte after part 1; the empty part 2 is skipped.
        assert_eq!(t.locate(7), Some(Location { index: 3, residual: 0 }));
        assert_eq!(t.locate(11), Some(Location { index: 3, residual: 4 }));
        assert_eq!(t.locate(12), None);
        assert_eq!(t.locate(u64::MAX), None);
    }

    #[test]
    fn part_start_offsets() {
        let t = table();
        assert_eq!(t.part_start(0), 0);
        assert_eq!(t.part_start(1), 4);
        assert_eq!(t.part_start(3), 7);
        assert_eq!(t.part_start(99), 12);
    }

    #[test]
    fn first_hole_in_range() {
        let t = table();
        assert_eq!(t.first_hole_in(0, 1), Some(0));
        assert_eq!(t.first_hole_in(2, 5), Some(2));
        assert_eq!(t.first_hole_in(4, 8), None);
        assert_eq!(t.first_hole_in(4, 0), None);
    }

    #[test]
    fn invalid_parts_are_rejected() {
        let mut t: PartTable<&str> = PartTable::new();
        assert!(matches!(t.push_hole(0), Err(StreamError::InvalidPart(_))));
        assert!(matches!(
            t.push(Part::backed(SourceId(0), 0, 1)),
            Err(StreamError::InvalidPart(_))
        ));
        assert!(matches!(
            t.push_source("x", u64::MAX, 1),
            Err(StreamError::InvalidPart(_))
        ));
        assert_eq!(t.source_count(), 0);

        t.push_hole(u64::MAX).unwrap();
        assert!(matches!(t.push_hole(1), Err(StreamError::InvalidPart(_))));
        assert_eq!(t.total_length(), u64::MAX);
        assert!(t.first_hole_in(0, 1).is_some());
    }

    #[test]
    fn overflowing_source_part_registers_nothing() {
        let mut t: PartTable<&str> = PartTable::new();
        t.push_hole(u64::MAX - 1).unwrap();
        assert!(matches!(t.push_source("x", 0, 5), Err(StreamError::InvalidPart(_))));
        assert_eq!(t.source_count(), 0);
        assert_eq!(t.len(), 1);

        let id = t.push_source("y", 0, 1).unwrap();
        assert_eq!(id.index(), 0);
        assert_eq!(t.total_length(), u64::MAX);
    }
}
