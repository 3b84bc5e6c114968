//! bzsplit CLI - streaming BZip2 decompression and block-boundary listing.

use bzsplit::{BzDecoder, BzReader, ReadEvent, ReadMode};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "bzsplit")]
#[command(
    author,
    version,
    about = "Streaming split-aware BZip2 decompressor"
)]
#[command(long_about = "
Decompress BZip2 data and inspect its block structure.

Examples:
  bzsplit decode data.bz2
  bzsplit decode data.bz2 -o data.txt
  cat data.bz2 | bzsplit decode -
  bzsplit blocks data.bz2
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompress a BZip2 file to stdout or a file
    #[command(alias = "d")]
    Decode {
        /// Input file (use "-" for stdin)
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List block boundaries with their compressed-byte offsets
    #[command(alias = "b")]
    Blocks {
        /// Input file (use "-" for stdin)
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Decode { input, output } => cmd_decode(&input, output.as_deref()),
        Commands::Blocks { input } => cmd_blocks(&input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bzsplit: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Open the input and consume its two `BZ` magic bytes.
fn open_input(path: &PathBuf) -> Result<Box<dyn Read>, Box<dyn std::error::Error>> {
    let mut reader: Box<dyn Read> = if path.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(path)?))
    };
    let mut magic = [0u8; 2];
    reader.read_exact(&mut magic)?;
    if &magic != b"BZ" {
        return Err(format!("{}: not a BZip2 stream", path.display()).into());
    }
    Ok(reader)
}

fn cmd_decode(
    input: &PathBuf,
    output: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = open_input(input)?;
    let mut decoder = BzReader::new(reader)?;

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    io::copy(&mut decoder, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn cmd_blocks(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let reader = open_input(input)?;
    let mut decoder = BzDecoder::new(reader, ReadMode::ByBlock)?;
    // offsets should match the on-disk file, magic included
    decoder.adjust_reported_bytes(2);

    println!("{:>6}  {:>12}  {:>14}", "block", "output bytes", "next boundary");
    let mut block_no = 0usize;
    let mut produced = 0u64;
    loop {
        match decoder.read_byte()? {
            ReadEvent::Byte(_) => produced += 1,
            ReadEvent::BlockEnd => {
                block_no += 1;
                println!(
                    "{:>6}  {:>12}  {:>14}",
                    block_no,
                    produced,
                    decoder.reported_bytes_consumed()
                );
                produced = 0;
            }
            ReadEvent::StreamEnd => break,
        }
    }
    Ok(())
}
