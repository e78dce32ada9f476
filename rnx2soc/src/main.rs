//! Command line tool to compress RINEX observation data
use clap::Parser;
use soc::prelude::*;

use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rnx2soc", about = "RINEX observation data compressor", version)]
struct Cli {
    /// Input RINEX observation file(s); "-" reads standard input.
    /// Gzip'ed input (.gz) is decompressed on the fly.
    #[arg(required = true)]
    files: Vec<String>,
    /// Output path; only meaningful with a single input
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Store SHA-256 digests instead of CRC32C
    #[arg(long)]
    sha256: bool,
    /// Store no digests at all
    #[arg(long)]
    no_digest: bool,
    /// Silence per-file reporting
    #[arg(short, long)]
    quiet: bool,
}

fn open_stream(input: &str) -> Result<Box<dyn Stream>, Error> {
    if input == "-" {
        return Ok(Box::new(BufferedStream::stdin()));
    }
    if input.ends_with(".gz") {
        let file = File::open(input)?;
        return Ok(Box::new(BufferedStream::gzip(file)));
    }
    Ok(Box::new(MappedStream::open(input)?))
}

/// `xyz.21o` becomes `xyz.21o.soc`, gzip suffixes are dropped first
fn output_path(input: &str) -> PathBuf {
    let stripped = input.strip_suffix(".gz").unwrap_or(input);
    PathBuf::from(format!("{}.soc", stripped))
}

fn convert(input: &str, output: &Path, digest: DigestKind) -> Result<u64, Error> {
    let stream = open_stream(input)?;
    let mut reader = ObsReader::new(stream)?;
    let mut writer = SocWriter::new(reader.header().clone()).with_digests(digest, digest);
    while reader.read()? {
        writer.add_record(&reader)?;
    }
    writer.write_to(File::create(output)?)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let digest = if cli.no_digest {
        DigestKind::None
    } else if cli.sha256 {
        DigestKind::Sha256
    } else {
        DigestKind::Crc32c
    };
    let mut failed = false;
    for input in &cli.files {
        let output = match (&cli.output, cli.files.len()) {
            (Some(path), 1) => path.clone(),
            _ => output_path(input),
        };
        match convert(input, &output, digest) {
            Ok(size) => {
                if !cli.quiet {
                    println!("{} generated ({} bytes)", output.display(), size);
                }
            },
            Err(error) => {
                eprintln!("rnx2soc failed: {}", error);
                failed = true;
            },
        }
    }
    if failed {
        std::process::exit(1);
    }
}
