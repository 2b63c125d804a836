//! Threshold ladder over dataset generations.
//!
//! Generation i is built from generation i-1 (`split_images` for i = 1) and
//! one threshold t_i: a sample survives when its mask's urban share or
//! peatland share is at least t_i. Survivors are copied, never moved, so
//! every parent generation stays intact.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::classes::{ClassHistogram, LandClass};
use crate::error::{ItemFailure, PrepError, Result};
use crate::histogram::count_pixels;
use crate::layout::{list_images, sample_stem, Category, DatasetRoot, Modality, Split, Stage};

pub const DEFAULT_THRESHOLDS: [f64; 4] = [0.10, 0.12, 0.14, 0.16];

/// Thresholds must be a non-empty list of fractions in [0, 1]; NaN is
/// rejected by the range check.
pub fn validate_thresholds(thresholds: &[f64]) -> Result<()> {
    if thresholds.is_empty() {
        return Err(PrepError::Config("at least one threshold is required".into()));
    }
    if let Some(bad) = thresholds.iter().find(|t| !(0.0..=1.0).contains(*t)) {
        return Err(PrepError::Config(format!("threshold {bad} is outside [0, 1]")));
    }
    Ok(())
}

/// Inclusive retention test. A mask with no pixels is never retained.
pub fn retains(hist: &ClassHistogram, threshold: f64) -> bool {
    if hist.total() == 0 {
        return false;
    }
    hist.share(LandClass::Urban) >= threshold || hist.share(LandClass::Peatland) >= threshold
}

/// Before/after counts for one mask folder in one generation.
#[derive(Debug, Clone, Serialize)]
pub struct FolderStats {
    pub folder: String,
    pub threshold: f64,
    pub before: usize,
    pub after: usize,
    /// True when the folder held no images and was not evaluated.
    pub skipped: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub generation: u32,
    pub parent: String,
    pub threshold: f64,
    pub folders: Vec<FolderStats>,
    /// Retained SAR filenames keyed by SAR folder name.
    pub retained: BTreeMap<String, Vec<String>>,
    pub failures: Vec<ItemFailure>,
}

impl GenerationReport {
    pub fn retained_count(&self) -> usize {
        self.folders.iter().map(|f| f.after).sum()
    }
}

/// Walks the threshold ladder one generation at a time.
pub struct ThresholdFilter<'a> {
    root: &'a DatasetRoot,
    thresholds: Vec<f64>,
    /// Number of generations already produced.
    done: usize,
}

impl<'a> ThresholdFilter<'a> {
    /// Thresholds must be non-empty fractions in [0, 1]. A decreasing step
    /// is allowed but logged, since it cannot narrow the parent any further.
    pub fn new(root: &'a DatasetRoot, thresholds: Vec<f64>) -> Result<Self> {
        validate_thresholds(&thresholds)?;
        for pair in thresholds.windows(2) {
            if pair[1] < pair[0] {
                warn!("Threshold {} follows larger threshold {}", pair[1], pair[0]);
            }
        }
        Ok(Self { root, thresholds, done: 0 })
    }

    /// Index of the last generation produced; 0 before the first step.
    pub fn generation(&self) -> u32 {
        self.done as u32
    }

    pub fn is_finished(&self) -> bool {
        self.done == self.thresholds.len()
    }

    /// Produce the next generation, or None once the ladder is exhausted.
    pub fn step(&mut self) -> Result<Option<GenerationReport>> {
        let Some(&threshold) = self.thresholds.get(self.done) else {
            return Ok(None);
        };
        let generation = self.done as u32 + 1;
        let report = filter_generation(self.root, generation, threshold)?;
        self.done += 1;
        info!(
            "Generation {generation} filtered at threshold {threshold}: {} samples retained",
            report.retained_count()
        );
        Ok(Some(report))
    }

    /// Run every remaining step.
    pub fn run(mut self) -> Result<Vec<GenerationReport>> {
        let mut reports = Vec::with_capacity(self.thresholds.len());
        while let Some(report) = self.step()? {
            reports.push(report);
        }
        Ok(reports)
    }
}

/// Build generation `generation` from its parent at `threshold`.
pub fn filter_generation(root: &DatasetRoot, generation: u32, threshold: f64) -> Result<GenerationReport> {
    let target = Stage::Filtered(generation);
    let parent = target.parent().unwrap_or(Stage::Expanded);
    root.ensure_stage(target)?;

    let mut report = GenerationReport {
        generation,
        parent: parent.dir_name(),
        threshold,
        folders: Vec::new(),
        retained: BTreeMap::new(),
        failures: Vec::new(),
    };

    for split in Split::ALL {
        let stats = filter_split(root, parent, target, split, threshold, &mut report)?;
        append_stats(root, generation, &stats)?;
        report.folders.push(stats);
    }

    write_listing(root, &report)?;
    write_manifest(root, &report)?;
    Ok(report)
}

fn filter_split(
    root: &DatasetRoot,
    parent: Stage,
    target: Stage,
    split: Split,
    threshold: f64,
    report: &mut GenerationReport,
) -> Result<FolderStats> {
    let mask_cat = Category::new(split, Modality::Mask);
    let sar_cat = mask_cat.paired();
    let mask_src = root.category_dir(parent, mask_cat);
    let sar_src = root.category_dir(parent, sar_cat);
    let mask_dst = root.category_dir(target, mask_cat);
    let sar_dst = root.category_dir(target, sar_cat);

    let masks = list_images(&mask_src)?;
    let mut stats = FolderStats {
        folder: mask_cat.dir_name(),
        threshold,
        before: masks.len(),
        after: 0,
        skipped: false,
    };
    if masks.is_empty() {
        info!("{} has no images, skipping", mask_src.display());
        stats.skipped = true;
        return Ok(stats);
    }

    let sar_files = list_images(&sar_src)?;
    let sar_by_stem: HashMap<&str, &str> =
        sar_files.iter().map(|f| (sample_stem(f), f.as_str())).collect();
    let sar_names: HashSet<&str> = sar_files.iter().map(String::as_str).collect();
    let kept = report.retained.entry(sar_cat.dir_name()).or_default();

    for mask in &masks {
        let mask_path = mask_src.join(mask);
        let hist = match count_pixels(&mask_path) {
            Ok(h) => h,
            Err(e) => {
                warn!("Dropping {}: {e}", mask_path.display());
                report.failures.push(ItemFailure::new(&mask_path, &e));
                continue;
            }
        };
        if hist.total() == 0 {
            warn!("Dropping {}: mask has no pixels", mask_path.display());
            continue;
        }
        if !retains(&hist, threshold) {
            continue;
        }
        // Same file name first, then same stem under another extension.
        let sar = sar_names
            .get(mask.as_str())
            .or_else(|| sar_by_stem.get(sample_stem(mask)))
            .copied();
        let Some(sar) = sar else {
            warn!("Dropping {}: no paired SAR image in {}", mask, sar_src.display());
            report.failures.push(ItemFailure::new(&mask_path, &"no paired SAR image"));
            continue;
        };

        match copy_pair(&sar_src.join(sar), &sar_dst.join(sar), &mask_path, &mask_dst.join(mask)) {
            Ok(()) => {
                stats.after += 1;
                kept.push(sar.to_string());
            }
            Err(e) => {
                warn!("Failed to copy sample {mask}: {e}");
                report.failures.push(ItemFailure::new(&mask_path, &e));
            }
        }
    }
    Ok(stats)
}

/// Copy SAR then mask. A half-copied sample is removed again so the
/// generation never holds a file without its partner.
fn copy_pair(sar_from: &Path, sar_to: &Path, mask_from: &Path, mask_to: &Path) -> Result<()> {
    fs::copy(sar_from, sar_to).map_err(PrepError::io(sar_from))?;
    if let Err(e) = fs::copy(mask_from, mask_to) {
        if let Err(cleanup) = fs::remove_file(sar_to) {
            warn!("Could not remove {}: {cleanup}", sar_to.display());
        }
        return Err(PrepError::io(mask_from)(e));
    }
    Ok(())
}

/// Append one block per folder to the running `filtration_stats.txt`.
fn append_stats(root: &DatasetRoot, generation: u32, stats: &FolderStats) -> Result<()> {
    let path = root.stats_log();
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(PrepError::io(&path))?;
    let mut block = format!("Generation {generation} | {}\n", stats.folder);
    block.push_str(&format!("  threshold: {:.4}\n", stats.threshold));
    if stats.skipped {
        block.push_str("  skipped: no images\n");
    } else {
        block.push_str(&format!("  before:    {}\n", stats.before));
        block.push_str(&format!("  after:     {}\n", stats.after));
    }
    block.push('\n');
    f.write_all(block.as_bytes()).map_err(PrepError::io(&path))
}

/// `filter_{i}.txt`: retained SAR filenames grouped by folder.
fn write_listing(root: &DatasetRoot, report: &GenerationReport) -> Result<()> {
    let mut out = String::new();
    for (folder, files) in &report.retained {
        out.push_str(&format!("[{folder}]\n"));
        for f in files {
            out.push_str(f);
            out.push('\n');
        }
        out.push('\n');
    }
    let path = root.filter_listing(report.generation);
    fs::write(&path, out).map_err(PrepError::io(&path))
}

fn write_manifest(root: &DatasetRoot, report: &GenerationReport) -> Result<()> {
    let path = root.stage_dir(Stage::Filtered(report.generation)).join("manifest.json");
    let json = serde_json::to_string_pretty(report)
        .map_err(|source| PrepError::Json { path: path.clone(), source })?;
    fs::write(&path, json).map_err(PrepError::io(&path))
}
