//! Part-mapped streams for vstream.
//!
//! A [`ConcatenatedStream`] presents data that is physically split across
//! several backing streams (whole files, sub-ranges of files, or zero-filled
//! holes) as one contiguous, byte-addressable stream.
//!
//! # Architecture
//!
//! - [`Part`]: one segment of the virtual address space, backed or a hole
//! - [`PartTable`]: the ordered parts plus the registered sources
//! - [`ConcatenatedStream`]: virtual file pointer + table walk for reads
//!   and writes
//!
//! Member streams can be anything implementing
//! [`vstream_io::ReadableStream`]; use [`vstream_io::SharedStream`] handles
//! when one leaf stream backs several composites.

pub mod part;
pub mod stream;
pub mod table;

pub use part::{Part, SourceId};
pub use stream::ConcatenatedStream;
pub use table::{Location, PartTable};
