/// Index of a source stream registered in a [`PartTable`](crate::PartTable).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub(crate) usize);

impl SourceId {
    /// Position of the source in the table's source list.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

/// One contiguous segment of the virtual address space.
///
/// A part with no source is a *hole*: it reads as zeros and cannot be
/// written. `length` is the extent in both virtual and physical space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Part {
    pub source: Option<SourceId>,
    /// Where this part's data begins inside the source.
    pub start_offset: u64,
    pub length: u64,
}

impl Part {
    /// A part backed by `length` bytes of `source` starting at `start_offset`.
    pub fn backed(source: SourceId, start_offset: u64, length: u64) -> Self {
        Self {
            source: Some(source),
            start_offset,
            length,
        }
    }

    /// A zero-filled gap of `length` bytes.
    pub fn hole(length: u64) -> Self {
        Self {
            source: None,
            start_offset: 0,
            length,
        }
    }

    pub fn is_hole(&self) -> bool {
        self.source.is_none()
    }
}
