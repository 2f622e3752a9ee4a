use crate::error::StreamResult;
use crate::stream::{ReadOutcome, ReadableStream};

/// Pass-through stream that keeps a running CRC-32 of every byte read.
///
/// Seeking does not reset the checksum; call
/// [`reset_checksum`](Self::reset_checksum) explicitly.
pub struct Crc32Stream<S> {
    source: S,
    hasher: crc32fast::Hasher,
}

impl<S: ReadableStream> Crc32Stream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            hasher: crc32fast::Hasher::new(),
        }
    }

    /// CRC-32 of all bytes read since creation or the last reset.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn reset_checksum(&mut self) {
        self.hasher.reset();
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ReadableStream> ReadableStream for Crc32Stream<S> {
    fn seek(&mut self, pos: u64) -> StreamResult<()> {
        self.source.seek(pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<ReadOutcome> {
        let outcome = self.source.read(buf)?;
        if let ReadOutcome::Read(n) = outcome {
            self.hasher.update(&buf[..n]);
        }
        Ok(outcome)
    }

    fn length(&self) -> StreamResult<u64> {
        self.source.length()
    }

    fn file_pointer(&self) -> StreamResult<u64> {
        self.source.file_pointer()
    }

    fn close(&mut self) -> StreamResult<()> {
        self.source.close()
    }
}

impl<S> std::fmt::Debug for Crc32Stream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32Stream")
            .field("checksum", &format_args!("{:#010x}", self.hasher.clone().finalize()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStream;

    #[test]
    fn checksum_matches_one_shot_hash() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut s = Crc32Stream::new(MemoryStream::new(data.to_vec()));
        let mut buf = [0u8; 7];
        while !s.read(&mut buf).unwrap().is_end_of_stream() {}
        assert_eq!(s.checksum(), crc32fast::hash(data));
        assert_eq!(s.checksum(), 0x414f_a339);
    }

    #[test]
    fn only_bytes_actually_read_are_hashed() {
        let mut s = Crc32Stream::new(MemoryStream::new(b"abc".to_vec()));
        let mut buf = [0xffu8; 16];
        s.read_fully(&mut buf[..3]).unwrap();
        assert_eq!(s.checksum(), crc32fast::hash(b"abc"));
    }

    #[test]
    fn reset_and_seek() {
        let mut s = Crc32Stream::new(MemoryStream::new(b"abcdef".to_vec()));
        let mut buf = [0u8; 3];
        s.read_fully(&mut buf).unwrap();
        s.reset_checksum();
        assert_eq!(s.checksum(), 0);

        s.seek(0).unwrap();
        s.read_fully(&mut buf).unwrap();
        s.read_fully(&mut buf).unwrap();
        assert_eq!(s.checksum(), crc32fast::hash(b"abcdef"));
        assert_eq!(s.file_pointer().unwrap(), 6);
        assert_eq!(s.into_inner().into_inner(), b"abcdef");
    }
}
