use std::io::{self, Read, Write};

use anyhow::{ensure, Context};
use colored::Colorize;
use tracing::info;
use vstream_io::{
    format_binary_size, Crc32Stream, OpenMode, RandomAccessStream, ReadOutcome, ReadableStream,
    StreamReader,
};

use crate::cli::*;
use crate::layout::Layout;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Info(args) => cmd_info(args),
        Command::Cat(args) => cmd_cat(args),
        Command::Crc(args) => cmd_crc(args),
        Command::Patch(args) => cmd_patch(args),
    }
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let layout = Layout::load(&args.layout)?;
    let mut stream = layout.open(OpenMode::ReadOnly)?;

    println!("{} {}", "Layout".bold(), args.layout.display());
    let mut start = 0u64;
    for (i, (part, spec)) in stream.table().parts().iter().zip(&layout.parts).enumerate() {
        let end = start + part.length;
        let range = format!("[{start:#x}, {end:#x})");
        if spec.is_hole() {
            println!("  {i:>3}  {}  {}", range.dimmed(), "hole".yellow());
        } else if let Some(path) = &spec.path {
            println!(
                "  {i:>3}  {}  {} @ {:#x}",
                range.dimmed(),
                layout.resolve(path).display().to_string().cyan(),
                part.start_offset
            );
        }
        start = end;
    }

    let length = stream.length()?;
    println!(
        "Total: {} bytes ({}), {} parts, {} files",
        length.to_string().bold(),
        format_binary_size(length),
        stream.table().len(),
        stream.table().source_count()
    );
    stream.close()?;
    Ok(())
}

fn cmd_cat(args: RangeArgs) -> anyhow::Result<()> {
    let layout = Layout::load(&args.layout)?;
    let mut stream = layout.open(OpenMode::ReadOnly)?;
    let stdout = io::stdout();
    let copied = copy_range(&mut stream, args.offset, args.length, &mut stdout.lock())?;
    info!(offset = args.offset, copied, "cat complete");
    stream.close()?;
    Ok(())
}

fn cmd_crc(args: CrcArgs) -> anyhow::Result<()> {
    ensure!(args.chunk_size > 0, "--chunk-size must be positive");
    let layout = Layout::load(&args.range.layout)?;
    let stream = layout.open(OpenMode::ReadOnly)?;
    let mut crc = Crc32Stream::new(stream);
    let hashed = checksum_range(&mut crc, args.range.offset, args.range.length, args.chunk_size)?;
    println!("{:08x}  {} bytes", crc.checksum(), hashed);
    crc.close()?;
    Ok(())
}

fn cmd_patch(args: PatchArgs) -> anyhow::Result<()> {
    let data = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let layout = Layout::load(&args.layout)?;
    let mut stream = layout.open(OpenMode::ReadWrite)?;
    stream.seek(args.offset)?;
    stream
        .write_all(&data)
        .with_context(|| format!("writing {} bytes at offset {}", data.len(), args.offset))?;
    stream.close()?;
    println!(
        "{} Wrote {} bytes at offset {:#x}",
        "✓".green().bold(),
        data.len(),
        args.offset
    );
    Ok(())
}

/// Copy `length` bytes (or everything) from `offset` into `out`.
pub fn copy_range<S: ReadableStream>(
    stream: &mut S,
    offset: u64,
    length: Option<u64>,
    out: &mut impl Write,
) -> anyhow::Result<u64> {
    stream.seek(offset)?;
    let limit = length.unwrap_or(u64::MAX);
    let mut reader = StreamReader::new(&mut *stream).take(limit);
    let copied = io::copy(&mut reader, out).context("copying stream range")?;
    out.flush()?;
    Ok(copied)
}

/// Feed `length` bytes (or everything) from `offset` through the checksum.
pub fn checksum_range<S: ReadableStream>(
    crc: &mut Crc32Stream<S>,
    offset: u64,
    length: Option<u64>,
    chunk_size: usize,
) -> anyhow::Result<u64> {
    crc.seek(offset)?;
    crc.reset_checksum();
    let mut remaining = length.unwrap_or(u64::MAX);
    let mut buf = vec![0u8; chunk_size];
    let mut hashed = 0u64;
    while remaining > 0 {
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        match crc.read(&mut buf[..want])? {
            ReadOutcome::Read(n) => {
                hashed += n as u64;
                remaining -= n as u64;
            }
            ReadOutcome::EndOfStream => break,
        }
    }
    Ok(hashed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vstream_concat::ConcatenatedStream;
    use vstream_io::MemoryStream;

    fn sample() -> ConcatenatedStream<MemoryStream> {
        let mut s = ConcatenatedStream::with_first_part(MemoryStream::new(b"hello ".to_vec()), 0, 6).unwrap();
        s.add_hole(3).unwrap();
        s.add_part(MemoryStream::new(b"world".to_vec()), 0, 5).unwrap();
        s
    }

    #[test]
    fn copy_whole_and_partial_ranges() {
        let mut s = sample();
        let mut out = Vec::new();
        assert_eq!(copy_range(&mut s, 0, None, &mut out).unwrap(), 14);
        assert_eq!(out, b"hello \0\0\0world");

        let mut out = Vec::new();
        assert_eq!(copy_range(&mut s, 4, Some(4), &mut out).unwrap(), 4);
        assert_eq!(out, b"o \0\0");

        let mut out = Vec::new();
        assert_eq!(copy_range(&mut s, 20, None, &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn checksum_of_range() {
        let mut crc = Crc32Stream::new(sample());
        let hashed = checksum_range(&mut crc, 0, None, 4).unwrap();
        assert_eq!(hashed, 14);
        assert_eq!(crc.checksum(), crc32fast::hash(b"hello \0\0\0world"));

        let hashed = checksum_range(&mut crc, 9, Some(3), 2).unwrap();
        assert_eq!(hashed, 3);
        assert_eq!(crc.checksum(), crc32fast::hash(b"wor"));
    }
}
