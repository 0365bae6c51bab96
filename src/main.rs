//! pngtail - recovers the image data a truncated PNG overwrite left behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use flate2::Compression;
use tracing::Level;

use pngtail::{CandidateFilter, RecoveryOptions, RecoveryRequest, recover_with_report};

#[derive(Parser, Debug)]
#[command(name = "pngtail")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Corrupted PNG file.
    input: PathBuf,

    /// Width of the original image, in pixels.
    #[arg(long)]
    width: u32,

    /// Height of the original image, in pixels.
    #[arg(long)]
    height: u32,

    /// Output file. Defaults to `<input stem>.recovered.png` next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// ASCII character filling the unknown history.
    #[arg(long, default_value_t = 'X', value_parser = parse_placeholder)]
    placeholder: char,

    /// Try every bit position instead of only plausible block headers.
    #[arg(long, default_value_t = false)]
    exhaustive: bool,

    /// Spread candidate trials over all cores.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// zlib compression level of the output.
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
    level: u32,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn options(&self) -> RecoveryOptions {
        let filter = if self.exhaustive {
            CandidateFilter::Exhaustive
        } else {
            CandidateFilter::DynamicHeader
        };

        RecoveryOptions::new()
            .with_placeholder(self.placeholder as u8)
            .with_candidate_filter(filter)
            .with_compression(Compression::new(self.level))
            .with_parallel_trials(self.parallel)
    }
}

fn parse_placeholder(value: &str) -> std::result::Result<char, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        _ => Err(format!("expected a single ASCII character, got {:?}", value)),
    }
}

/// `<dir>/<stem>.recovered.png` for an input at `<dir>/<stem>.<ext>`.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}.recovered.png", stem))
}

fn run(args: &Args) -> Result<PathBuf> {
    let input = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let report = recover_with_report(
        RecoveryRequest::new(&input, args.width, args.height),
        &args.options(),
    )
    .with_context(|| {
        format!(
            "Failed to recover {} as a {}x{} image",
            args.input.display(),
            args.width,
            args.height
        )
    })?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    std::fs::write(&output, &report.png)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Recovered {} of {} image bytes ({} trials, bit offset {}) -> {}",
        report.recovered,
        report.recovered + report.lost,
        report.trials,
        report.candidate.bit_offset(),
        output.display()
    );

    Ok(output)
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    run(&args)?;
    Ok(())
}
