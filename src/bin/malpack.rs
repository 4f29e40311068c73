use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, warn};

use malpack::config::{desktop_dir, quarantine_dir};
use malpack::{pack, Error, PackConfig};

#[derive(Parser, Debug)]
#[command(name = "malpack", version)]
#[command(about = "Bundle quarantined samples into a single archive and clear the quarantine")]
struct Args {
    /// Quarantine directory (default: %LOCALAPPDATA%\ESET\ESET Security\Quarantine)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Directory receiving the archive (default: %USERPROFILE%\Desktop)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Archive file name prefix
    #[arg(long, default_value = malpack::DEFAULT_PREFIX)]
    prefix: String,

    /// Exit without waiting for Enter
    #[arg(long)]
    no_pause: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .init();
    let args = Args::parse();

    let code = match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(exit_status(&err))
        }
    };

    if !args.no_pause {
        pause();
    }
    code
}

/// Only a frame left half-written makes the archive unusable.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::PartialFrame { .. }) => 1,
        _ => 0,
    }
}

fn execute(args: &Args) -> Result<()> {
    let env = |var: &'static str| std::env::var_os(var);
    let source_dir = match &args.source {
        Some(path) => path.clone(),
        None => quarantine_dir(env)?,
    };
    let output_dir = match &args.output_dir {
        Some(path) => path.clone(),
        None => desktop_dir(env)?,
    };
    let mut config = PackConfig::new(source_dir, output_dir);
    config.prefix = args.prefix.clone();

    let outcome = pack(&config)?;
    let report = &outcome.report;

    if report.had_errors {
        warn!(
            "{} problem(s) during archiving; quarantine files were kept.",
            report.errors.len()
        );
    }
    if !outcome.cleanup.failed.is_empty() {
        warn!(
            "{} archived file(s) could not be removed.",
            outcome.cleanup.failed.len()
        );
    }

    let mut stdout = io::stdout().lock();
    if report.entries_written > 0 {
        writeln!(stdout, "Successfully archived {} files.", report.entries_written)?;
    } else {
        writeln!(stdout, "No file is found. Output archive is blank.")?;
    }
    writeln!(stdout, "{}", report.summary())?;
    writeln!(stdout, "Archive: {}", outcome.output_path.display())
        .context("write summary")?;
    Ok(())
}

fn pause() {
    println!("\nPress 'enter' to exit.");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
