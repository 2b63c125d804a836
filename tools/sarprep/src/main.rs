//! Dataset preparation driver: partition, expand, report and filter a SAR
//! segmentation dump. Every stage reads and writes under `--root`.
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;
use sarprep_core::expand::{QuadrantExpander, ResampleFilter};
use sarprep_core::filter::ThresholdFilter;
use sarprep_core::layout::{Category, Modality};
use sarprep_core::partition::{partition_staging, SplitRatios};
use sarprep_core::report::{describe_folder, DatasetReporter, DistributionReport};
use sarprep_core::{DatasetRoot, Pipeline, PipelineConfig, Split, Stage};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sarprep", about = "Partition, expand and threshold-filter a SAR segmentation dataset")]
struct Args {
    /// JSON pipeline configuration; flags below override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset working directory (staging folders and stage outputs).
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the enabled stages in order (all of them with --auto).
    Run {
        #[arg(long)]
        auto: bool,
    },
    /// Move the staging dump into original_images/{train,val,test}.
    Partition {
        /// Train, val and test ratios; must sum to 1.0.
        #[arg(long, num_args = 3, value_names = ["TRAIN", "VAL", "TEST"])]
        ratios: Option<Vec<f64>>,

        /// Shuffle the staging listing first.
        #[arg(long)]
        shuffle: bool,

        /// Seed for --shuffle.
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Split every original into four quadrant samples under split_images.
    Expand {
        /// Resampling filter for SAR quadrants (masks always use nearest).
        #[arg(long, value_enum)]
        sar_filter: Option<FilterArg>,
    },
    /// Print class distributions of a stage's mask folders.
    Report {
        #[arg(long, value_enum, default_value = "split")]
        stage: StageArg,

        /// Generation index for --stage filtered.
        #[arg(short, long, default_value = "1")]
        generation: u32,

        /// Also append the reports to *_class_distribution.txt files.
        #[arg(long)]
        save: bool,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Build filtered_images1..k from split_images, one per threshold.
    Filter {
        /// Fractional thresholds, e.g. 0.10 0.12 0.14 0.16.
        #[arg(short, long, num_args = 1..)]
        thresholds: Option<Vec<f64>>,

        /// Apply the thresholds in ascending order.
        #[arg(long)]
        sort: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StageArg {
    Original,
    Split,
    Filtered,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<FilterArg> for ResampleFilter {
    fn from(f: FilterArg) -> Self {
        match f {
            FilterArg::Nearest => ResampleFilter::Nearest,
            FilterArg::Triangle => ResampleFilter::Triangle,
            FilterArg::CatmullRom => ResampleFilter::CatmullRom,
            FilterArg::Gaussian => ResampleFilter::Gaussian,
            FilterArg::Lanczos3 => ResampleFilter::Lanczos3,
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Cannot load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = &args.root {
        cfg.root = root.clone();
    }
    Ok(cfg)
}

fn print_reports(label: &str, reports: &[DistributionReport]) {
    if reports.is_empty() {
        println!("{label}: no images");
        return;
    }
    println!("\n{label}");
    for r in reports {
        println!("{}", r.render());
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let mut cfg = load_config(&args)?;
    let root = DatasetRoot::new(&cfg.root);

    match args.command {
        Command::Run { auto } => {
            cfg.auto |= auto;
            let summary = Pipeline::new(cfg)?.run()?;
            print_reports("Post-split class distribution", &summary.split_reports);
            for (generation, reports) in &summary.filtered_reports {
                print_reports(&format!("Filtered dataset {generation}"), reports);
            }
            for g in &summary.generations {
                eprintln!(
                    "[sarprep] generation {} (threshold {}) retained {} samples",
                    g.generation,
                    g.threshold,
                    g.retained_count()
                );
            }
        }

        Command::Partition { ratios, shuffle, seed } => {
            if let Some(r) = ratios {
                cfg.ratios = SplitRatios::new(r[0], r[1], r[2]);
            }
            let seed = shuffle.then_some(seed).or(cfg.shuffle_seed);
            let report = partition_staging(&root, &cfg.ratios, seed)
                .with_context(|| format!("Partition failed in {}", root.path().display()))?;
            eprintln!(
                "[sarprep] partitioned SAR {}/{}/{}, masks {}/{}/{} (train/val/test)",
                report.sar.train,
                report.sar.val,
                report.sar.test,
                report.masks.train,
                report.masks.val,
                report.masks.test
            );
            for mask in &report.unmatched_masks {
                warn!("unmatched mask left in staging: {mask}");
            }
            for f in &report.failures {
                warn!("{}: {}", f.path.display(), f.reason);
            }
        }

        Command::Expand { sar_filter } => {
            if let Some(f) = sar_filter {
                cfg.sar_filter = f.into();
            }
            let report = QuadrantExpander::new(&root, cfg.sar_filter).expand_all()?;
            eprintln!(
                "[sarprep] expanded {} images into {} quadrants ({} failed)",
                report.sources,
                report.written,
                report.failures.len()
            );
            for f in &report.failures {
                warn!("{}: {}", f.path.display(), f.reason);
            }
        }

        Command::Report { stage, generation, save, json } => {
            let stage = match stage {
                StageArg::Original => Stage::Original,
                StageArg::Split => Stage::Expanded,
                StageArg::Filtered if generation == 0 => bail!("generations start at 1"),
                StageArg::Filtered => Stage::Filtered(generation),
            };
            let reports = if matches!(stage, Stage::Original) {
                // Not persisted: the report file names would collide with split_images.
                let mut out = Vec::new();
                for split in Split::ALL {
                    let dir = root.category_dir(stage, Category::new(split, Modality::Mask));
                    if let Some(r) = describe_folder(&dir, split.name(), cfg.resolution)? {
                        out.push(r);
                    }
                }
                out
            } else {
                DatasetReporter::new(&root, cfg.resolution, save).report_stage(stage)?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                print_reports(&stage.to_string(), &reports);
            }
        }

        Command::Filter { thresholds, sort } => {
            if let Some(t) = thresholds {
                cfg.thresholds = t;
            }
            cfg.sort_thresholds |= sort;
            let reports = ThresholdFilter::new(&root, cfg.resolved_thresholds())?.run()?;
            for g in &reports {
                for f in &g.failures {
                    warn!("generation {}: {}: {}", g.generation, f.path.display(), f.reason);
                }
                for f in &g.folders {
                    eprintln!(
                        "[sarprep] generation {} {:<10} threshold {:.2}: {} → {}",
                        g.generation, f.folder, f.threshold, f.before, f.after
                    );
                }
            }
            eprintln!("[sarprep] dataset filtered into {} generations", reports.len());
        }
    }

    Ok(())
}
