//! Diagnostic previewer: writes a 2×2 PNG sheet of one sample's quadrants.
//! Not part of the main pipeline.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sarprep_core::preview::preview_sample;

#[derive(Parser, Debug)]
#[command(name = "preview", about = "Compose the four quadrants of a sample into a 2x2 PNG")]
struct Args {
    /// Folder holding the quadrant files, e.g. split_images/train_SAR
    #[arg(short, long)]
    dir: PathBuf,

    /// Original file name the quadrants derive from, e.g. T112_1302.png
    #[arg(short, long)]
    sample: String,

    /// Output PNG path.
    #[arg(short, long, default_value = "data/debug/preview.png")]
    output: PathBuf,

    /// Gap between tiles in pixels.
    #[arg(long, default_value = "4")]
    gap: u32,

    /// Stretch mask labels 0–4 to visible gray levels.
    #[arg(long)]
    mask: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let sheet = preview_sample(&args.dir, &args.sample, args.gap, args.mask)
        .with_context(|| format!("Cannot preview {} in {}", args.sample, args.dir.display()))?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    sheet
        .save(&args.output)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;
    println!("Wrote {}", args.output.display());
    Ok(())
}
