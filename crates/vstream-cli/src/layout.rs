use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::debug;
use vstream_concat::{ConcatenatedStream, Part, PartTable};
use vstream_io::{FileStream, OpenMode, ReadableStream, SharedStream};

/// One `[[part]]` entry of a layout manifest.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartSpec {
    /// Backing file. A part without a path is a hole.
    pub path: Option<PathBuf>,
    /// Start offset inside the backing file.
    #[serde(default)]
    pub offset: u64,
    /// Extent of the part. Defaults to the rest of the file after `offset`.
    pub length: Option<u64>,
}

impl PartSpec {
    pub fn is_hole(&self) -> bool {
        self.path.is_none()
    }
}

/// A TOML manifest describing how a virtual stream is assembled.
///
/// ```toml
/// [[part]]
/// path = "disk.001"
///
/// [[part]]
/// length = 4096      # hole
///
/// [[part]]
/// path = "disk.003"
/// offset = 512
/// length = 1048576
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    #[serde(rename = "part", default)]
    pub parts: Vec<PartSpec>,
    /// Directory relative part paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Layout {
    /// Load and validate a manifest from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading layout {}", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_toml_str(&text, base_dir).with_context(|| format!("in layout {}", path.display()))
    }

    /// Parse and validate a manifest; relative paths resolve against `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let mut layout: Layout = toml::from_str(text).context("parsing layout manifest")?;
        layout.base_dir = base_dir.into();
        layout.validate()?;
        Ok(layout)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.parts.is_empty() {
            bail!("layout has no parts");
        }
        for (i, part) in self.parts.iter().enumerate() {
            match (&part.path, part.length) {
                (None, None) => bail!("part {i}: a hole needs a length"),
                (None, Some(0)) => bail!("part {i}: a hole must have a positive length"),
                (None, Some(_)) if part.offset != 0 => {
                    bail!("part {i}: a hole cannot have an offset")
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Absolute or `base_dir`-relative location of a part's file.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Open every distinct file once and assemble the virtual stream.
    ///
    /// Each file is wrapped in a [`SharedStream`] registered once in the
    /// part table, however many parts use it, so closing the stream closes
    /// each file exactly once.
    pub fn open(&self, mode: OpenMode) -> anyhow::Result<ConcatenatedStream<SharedStream<FileStream>>> {
        let mut table = PartTable::new();
        let mut opened = HashMap::new();

        for (i, spec) in self.parts.iter().enumerate() {
            let Some(path) = &spec.path else {
                let length = spec.length.unwrap_or_default();
                table.push_hole(length).with_context(|| format!("part {i}"))?;
                continue;
            };

            let resolved = self.resolve(path);
            let key = std::fs::canonicalize(&resolved)
                .with_context(|| format!("part {i}: resolving {}", resolved.display()))?;

            let id = match opened.get(&key) {
                Some(id) => *id,
                None => {
                    let file = FileStream::open(&key, mode).with_context(|| format!("part {i}"))?;
                    let id = table.add_source(SharedStream::new(file));
                    debug!(path = %key.display(), source = %id, "registered source");
                    opened.insert(key.clone(), id);
                    id
                }
            };

            let length = match spec.length {
                Some(length) => length,
                None => {
                    let file_len = table
                        .source(id)
                        .map(|s| s.length())
                        .transpose()?
                        .unwrap_or_default();
                    if spec.offset > file_len {
                        bail!(
                            "part {i}: offset {} is beyond the end of {} ({file_len} bytes)",
                            spec.offset,
                            key.display()
                        );
                    }
                    file_len - spec.offset
                }
            };

            table
                .push(Part::backed(id, spec.offset, length))
                .with_context(|| format!("part {i}"))?;
        }

        Ok(ConcatenatedStream::new(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vstream_io::{read_all, RandomAccessStream};

    #[test]
    fn parse_manifest() {
        let layout = Layout::from_toml_str(
            r#"
            [[part]]
            path = "a.bin"

            [[part]]
            length = 16

            [[part]]
            path = "/data/b.bin"
            offset = 512
            length = 1024
            "#,
            "/images",
        )
        .unwrap();

        assert_eq!(layout.parts.len(), 3);
        assert!(layout.parts[1].is_hole());
        assert_eq!(layout.parts[2].offset, 512);
        assert_eq!(layout.resolve(Path::new("a.bin")), PathBuf::from("/images/a.bin"));
        assert_eq!(layout.resolve(Path::new("/data/b.bin")), PathBuf::from("/data/b.bin"));
    }

    #[test]
    fn invalid_manifests_are_rejected() {
        for text in [
            "",
            "[[part]]\n",
            "[[part]]\nlength = 0\n",
            "[[part]]\nlength = 4\noffset = 2\n",
            "[[part]]\npath = \"a\"\ncolour = \"red\"\n",
        ] {
            assert!(Layout::from_toml_str(text, ".").is_err(), "accepted: {text:?}");
        }
    }

    #[test]
    fn open_assembles_stream_and_shares_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.bin"), b"xxABCDyy").unwrap();
        std::fs::write(dir.path().join("two.bin"), b"EFGH").unwrap();

        let layout = Layout::from_toml_str(
            r#"
            [[part]]
            path = "one.bin"
            offset = 2
            length = 4

            [[part]]
            length = 2

            [[part]]
            path = "two.bin"

            [[part]]
            path = "./one.bin"
            length = 2
            "#,
            dir.path(),
        )
        .unwrap();

        let mut stream = layout.open(OpenMode::ReadOnly).unwrap();
        assert_eq!(stream.table().source_count(), 2);
        assert_eq!(stream.length().unwrap(), 12);
        assert_eq!(read_all(&mut stream).unwrap(), b"ABCD\0\0EFGHxx");
        stream.close().unwrap();
    }

    #[test]
    fn open_read_write_patches_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        std::fs::write(&path, b"0000").unwrap();

        let layout = Layout::from_toml_str("[[part]]\npath = \"disk.img\"\n", dir.path()).unwrap();
        let mut stream = layout.open(OpenMode::ReadWrite).unwrap();
        stream.seek(1).unwrap();
        stream.write_all(b"12").unwrap();
        stream.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"0120");
    }

    #[test]
    fn offset_past_end_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.bin"), b"abc").unwrap();
        let layout =
            Layout::from_toml_str("[[part]]\npath = \"small.bin\"\noffset = 9\n", dir.path()).unwrap();
        assert!(layout.open(OpenMode::ReadOnly).is_err());
    }
}
