//! Diagnostic: compare one original mask with its four expanded quadrants.
//! Not part of the pipeline.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sarprep_core::expand::Quadrant;
use sarprep_core::histogram::{count_pixels, count_pixels_batch, count_pixels_pair};
use sarprep_core::{ClassHistogram, LandClass};

#[derive(Parser, Debug)]
#[command(name = "inspect", about = "Class counts of an original mask versus its quadrant samples")]
struct Args {
    /// Original (pre-split) mask, e.g. original_images/val_mask/T112_1302.png
    #[arg(short, long)]
    original: PathBuf,

    /// Folder holding the expanded quadrants, e.g. split_images/val_mask
    #[arg(short, long)]
    split_dir: PathBuf,

    /// Tile edge in pixels of the original.
    #[arg(long, default_value = "512")]
    resolution: u64,

    /// Also print the combined count of the original and this one quadrant.
    #[arg(long, value_enum)]
    pair_with: Option<QuadrantArg>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QuadrantArg {
    Tl,
    Tr,
    Bl,
    Br,
}

impl From<QuadrantArg> for Quadrant {
    fn from(q: QuadrantArg) -> Self {
        match q {
            QuadrantArg::Tl => Quadrant::TopLeft,
            QuadrantArg::Tr => Quadrant::TopRight,
            QuadrantArg::Bl => Quadrant::BottomLeft,
            QuadrantArg::Br => Quadrant::BottomRight,
        }
    }
}

fn fmt_counts(h: &ClassHistogram) -> String {
    h.sorted()
        .iter()
        .map(|(c, n)| format!("{}: {n}", c.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_fractions(f: &[(LandClass, f64)]) -> String {
    f.iter()
        .map(|(c, v)| format!("{}: {v:.4}", c.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let total = args.resolution * args.resolution;

    let source = args
        .original
        .file_name()
        .and_then(|n| n.to_str())
        .context("original path has no file name")?
        .to_string();
    let quadrant_files: Vec<String> = Quadrant::ALL.iter().map(|q| q.file_name(&source)).collect();

    let pre = count_pixels(&args.original)
        .with_context(|| format!("Cannot count {}", args.original.display()))?;
    println!("Pre-split class count:      {}", fmt_counts(&pre));
    println!("Pre-split class fraction:   {}", fmt_fractions(&pre.fractions(total)));

    let post = count_pixels_batch(&args.split_dir, &quadrant_files)
        .with_context(|| format!("Cannot count quadrants in {}", args.split_dir.display()))?;
    println!("\nPost-split class count:     {}", fmt_counts(&post));
    println!("Post-split class fraction:  {}", fmt_fractions(&post.fractions_post_split(total)));

    for name in &quadrant_files {
        let h = count_pixels(&args.split_dir.join(name))?;
        println!("\n{name}");
        println!("  count:    {}", fmt_counts(&h));
        println!("  fraction: {}", fmt_fractions(&h.fractions(total)));
    }

    println!("\nIncrease in data points:");
    for (class, gain) in ClassHistogram::increase(&pre, &post) {
        println!("  {}: {gain:+}", class.name());
    }

    if let Some(q) = args.pair_with {
        let quadrant = args.split_dir.join(Quadrant::from(q).file_name(&source));
        let pair = count_pixels_pair(&quadrant, &args.original)?;
        println!("\nOriginal + {}: {}", quadrant.display(), fmt_counts(&pair));
    }

    Ok(())
}
