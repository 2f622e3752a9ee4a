//! Random-access stream primitives for vstream.
//!
//! This crate defines the stream capability every backing store and every
//! composite stream implements, plus the leaf streams and wrappers that
//! composite streams are built from.
//!
//! # Traits
//!
//! - [`ReadableStream`] -- seek, read, length, file pointer, close
//! - [`RandomAccessStream`] -- adds write
//!
//! # Streams
//!
//! - [`FileStream`] -- leaf stream over an OS file
//! - [`MemoryStream`] -- `Vec`-backed leaf stream for tests and embedding
//! - [`SynchronizedStream`] / [`SharedStream`] -- one source shared by many
//!   holders, with reference counting and position-preserving reads
//! - [`Crc32Stream`] -- pass-through filter computing a running CRC-32
//! - [`StreamReader`] -- bridge to `std::io::{Read, Seek, Write}`
//!
//! # Design Rules
//!
//! 1. End of stream is a return value ([`ReadOutcome::EndOfStream`]), never an error.
//! 2. A short read is not a failure; a short write is.
//! 3. Streams do no locking of their own; sharing goes through [`SynchronizedStream`].
//! 4. A source is closed exactly once, by whoever releases the last reference.
//! 5. I/O errors are propagated unchanged; only interrupted reads are retried.

pub mod adapter;
pub mod crc;
pub mod error;
pub mod file;
pub mod memory;
pub mod stream;
pub mod sync;
pub mod util;

pub use adapter::StreamReader;
pub use crc::Crc32Stream;
pub use error::{StreamError, StreamResult};
pub use file::{FileStream, OpenMode};
pub use memory::MemoryStream;
pub use stream::{RandomAccessStream, ReadOutcome, ReadableStream};
pub use sync::{SharedStream, SynchronizedStream};
pub use util::{format_binary_size, read_all};
