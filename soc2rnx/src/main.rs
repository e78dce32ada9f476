//! Command line tool to expand SOC containers back to RINEX text
use clap::Parser;
use soc::prelude::*;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "soc2rnx", about = "SOC container expansion", version)]
struct Cli {
    /// Input container file(s)
    #[arg(required = true)]
    files: Vec<String>,
    /// Output path; only meaningful with a single input
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Validate every digest before expanding
    #[arg(long)]
    verify: bool,
    /// Silence per-file reporting
    #[arg(short, long)]
    quiet: bool,
}

/// `xyz.21o.soc` becomes `xyz.21o` again, anything else gains `.rnx`
fn output_path(input: &str) -> PathBuf {
    match input.strip_suffix(".soc") {
        Some(stripped) => PathBuf::from(stripped),
        None => PathBuf::from(format!("{}.rnx", input)),
    }
}

fn expand(input: &str, output: &Path, verify: bool) -> Result<(), Error> {
    let mut container = SocReader::open(input)?;
    if verify {
        container.verify()?;
    }
    let out = BufWriter::new(File::create(output)?);
    container.expand_to_text(out)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let mut failed = false;
    for input in &cli.files {
        let output = match (&cli.output, cli.files.len()) {
            (Some(path), 1) => path.clone(),
            _ => output_path(input),
        };
        match expand(input, &output, cli.verify) {
            Ok(()) => {
                if !cli.quiet {
                    println!("{} generated", output.display());
                }
            },
            Err(error) => {
                eprintln!("soc2rnx failed: {}", error);
                failed = true;
            },
        }
    }
    if failed {
        std::process::exit(1);
    }
}
