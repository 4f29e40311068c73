use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use malpack::{is_quarantine_file, FrameReader, FrameSummary};

#[derive(Parser, Debug)]
#[command(name = "malpack-inspect", version)]
#[command(about = "List the frames of a malpack archive without decompressing them")]
struct Args {
    /// Archive produced by malpack
    archive: PathBuf,

    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();
    let args = Args::parse();

    let file = File::open(&args.archive)
        .with_context(|| format!("open archive {}", args.archive.display()))?;

    let mut frames: Vec<FrameSummary> = Vec::new();
    for frame in FrameReader::new(BufReader::new(file)) {
        let frame = frame.with_context(|| format!("frame #{}", frames.len()))?;
        let summary = frame.summary();
        if !is_quarantine_file(OsStr::new(&summary.name)) {
            warn!("frame #{} has unexpected name {:?}", frames.len(), summary.name);
        }
        frames.push(summary);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&frames)?);
        return Ok(());
    }

    let mut total = 0u64;
    for summary in &frames {
        println!("{:>10}  {}", summary.payload_len, summary.name);
        total += summary.payload_len;
    }
    println!("{} frame(s), {} payload bytes", frames.len(), total);
    Ok(())
}
