use std::io;

use crate::error::StreamResult;
use crate::stream::ReadableStream;

/// Read from the current file pointer to the end of the stream.
pub fn read_all<S: ReadableStream + ?Sized>(stream: &mut S) -> StreamResult<Vec<u8>> {
    let remaining = stream.remaining_length()?;
    let len = usize::try_from(remaining).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("stream remainder of {remaining} bytes does not fit in memory"),
        )
    })?;
    let mut buf = vec![0u8; len];
    stream.read_fully(&mut buf)?;
    Ok(buf)
}

const BINARY_UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Format a byte count with binary units, e.g. `1.50 MiB`.
pub fn format_binary_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < BINARY_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", BINARY_UNITS[unit])
}
