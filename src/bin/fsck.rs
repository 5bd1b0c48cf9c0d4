//! `sfs-fsck`: check an SFS disk image for structural inconsistencies.
//!
//! Prints diagnostics to standard error and exits nonzero if anything is
//! wrong with the image. Unlike the Unix fsck, this tool repairs
//! nothing.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

/// Check an SFS disk image for structural inconsistencies.
#[derive(Parser)]
#[command(name = "sfs-fsck", version)]
struct Cli {
    /// Disk image to check
    image: PathBuf,

    /// Describe progress of the check (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Error,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let report = sfs::fsck::check_image(&cli.image)
        .with_context(|| format!("cannot check {}", cli.image.display()))?;

    if report.is_clean() {
        log::info!("{}: no errors found", cli.image.display());
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
