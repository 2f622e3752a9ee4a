use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vstream",
    about = "Assemble and inspect virtual streams built from file ranges and holes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the part table and total length of a layout
    Info(InfoArgs),
    /// Write a range of the virtual stream to stdout
    Cat(RangeArgs),
    /// Compute the CRC-32 of a range of the virtual stream
    Crc(CrcArgs),
    /// Overwrite virtual bytes with the contents of a file
    Patch(PatchArgs),
}

#[derive(Args)]
pub struct InfoArgs {
    /// Layout manifest (TOML)
    pub layout: PathBuf,
}

#[derive(Args)]
pub struct RangeArgs {
    /// Layout manifest (TOML)
    pub layout: PathBuf,
    /// Virtual offset to start at
    #[arg(long, default_value_t = 0)]
    pub offset: u64,
    /// Number of bytes (default: to the end of the stream)
    #[arg(long)]
    pub length: Option<u64>,
}

#[derive(Args)]
pub struct CrcArgs {
    #[command(flatten)]
    pub range: RangeArgs,
    /// Read buffer size in bytes
    #[arg(long, default_value_t = 64 * 1024)]
    pub chunk_size: usize,
}

#[derive(Args)]
pub struct PatchArgs {
    /// Layout manifest (TOML)
    pub layout: PathBuf,
    /// Virtual offset to write at
    #[arg(long)]
    pub offset: u64,
    /// File whose contents are written
    #[arg(long)]
    pub input: PathBuf,
}
