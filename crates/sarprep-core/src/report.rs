//! Class-distribution reports over mask folders.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::classes::{ClassHistogram, LandClass};
use crate::error::{PrepError, Result};
use crate::histogram::count_pixels_batch;
use crate::layout::{list_images, Category, DatasetRoot, Modality, Split, Stage};

/// Native tile edge in pixels. Expected pixel totals assume square tiles.
pub const DEFAULT_RESOLUTION: u32 = 512;

#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    pub label: String,
    pub source: PathBuf,
    pub image_count: usize,
    /// resolution² × image_count.
    pub expected_pixels: u64,
    pub histogram: ClassHistogram,
    /// Share of the histogram's own sum, 0–100, by descending count.
    pub percentages: Vec<(LandClass, f64)>,
}

impl DistributionReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let title = capitalize(&self.label);
        out.push_str(&format!("Total number of pixels in {}: {}\n", self.label, group(self.expected_pixels)));
        out.push_str(&format!("\n{title} class occurrences:\n"));
        for (class, count) in self.histogram.sorted() {
            out.push_str(&format!("{}: {}\n", class.name(), group(count)));
        }
        out.push_str(&format!("\n{title} class percentages:\n"));
        for (class, pct) in &self.percentages {
            out.push_str(&format!("{}: {pct:.3}%\n", class.name()));
        }
        out
    }
}

/// Measure one mask folder. Ok(None) when it holds no images.
pub fn describe_folder(dir: &Path, label: &str, resolution: u32) -> Result<Option<DistributionReport>> {
    let files = list_images(dir)?;
    if files.is_empty() {
        info!("{label}: no images in {}", dir.display());
        return Ok(None);
    }
    let histogram = count_pixels_batch(dir, &files)?;
    let per_image = resolution as u64 * resolution as u64;
    Ok(Some(DistributionReport {
        label: label.to_string(),
        source: dir.to_path_buf(),
        image_count: files.len(),
        expected_pixels: per_image * files.len() as u64,
        histogram,
        percentages: histogram.percentages(),
    }))
}

/// Report file for a mask folder: `filtered_{i}_class_distribution.txt`
/// when the path passes through `filtered_images{i}`, otherwise
/// `{split}_class_distribution.txt` from the folder name.
pub fn report_file_name(dir: &Path) -> Result<String> {
    let generation = dir.components().find_map(|c| {
        c.as_os_str()
            .to_str()
            .and_then(|s| s.strip_prefix("filtered_images"))
            .and_then(|n| n.parse::<u32>().ok())
    });
    match generation {
        Some(i) => Ok(format!("filtered_{i}_class_distribution.txt")),
        None => Ok(format!("{}_class_distribution.txt", Split::from_dir(dir)?.name())),
    }
}

/// Measures the mask folders of a stage and optionally writes the reports.
pub struct DatasetReporter<'a> {
    root: &'a DatasetRoot,
    resolution: u32,
    persist: bool,
}

impl<'a> DatasetReporter<'a> {
    pub fn new(root: &'a DatasetRoot, resolution: u32, persist: bool) -> Self {
        Self { root, resolution, persist }
    }

    /// One report per split with images; empty splits are noted and skipped.
    pub fn report_stage(&self, stage: Stage) -> Result<Vec<DistributionReport>> {
        let mut reports = Vec::new();
        for split in Split::ALL {
            let dir = self.root.category_dir(stage, Category::new(split, Modality::Mask));
            let Some(report) = describe_folder(&dir, split.name(), self.resolution)? else {
                continue;
            };
            if self.persist {
                self.write(&report)?;
            }
            reports.push(report);
        }
        Ok(reports)
    }

    /// Append a rendered report to its file in the dataset root.
    pub fn write(&self, report: &DistributionReport) -> Result<PathBuf> {
        let path = self.root.path().join(report_file_name(&report.source)?);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(PrepError::io(&path))?;
        writeln!(f, "{}", report.render()).map_err(PrepError::io(&path))?;
        Ok(path)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 1234567 → "1,234,567"
fn group(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelGrid;
    use approx::assert_relative_eq;

    #[test]
    fn thousands_grouping() {
        assert_eq!(group(0), "0");
        assert_eq!(group(999), "999");
        assert_eq!(group(262_144), "262,144");
        assert_eq!(group(1_048_576), "1,048,576");
    }

    #[test]
    fn report_names_follow_the_path() {
        let split = Path::new("/data/split_images/val_mask");
        assert_eq!(report_file_name(split).unwrap(), "val_class_distribution.txt");
        let filtered = Path::new("/data/filtered_images3/train_mask");
        assert_eq!(report_file_name(filtered).unwrap(), "filtered_3_class_distribution.txt");
    }

    #[test]
    fn empty_folder_reports_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(describe_folder(tmp.path(), "val", DEFAULT_RESOLUTION).unwrap().is_none());
    }

    #[test]
    fn folder_percentages_and_expected_pixels() {
        let tmp = tempfile::tempdir().unwrap();
        let mut g = LabelGrid::new(4, 4, 4);
        for c in 0..4 {
            g.set(0, c, 0);
        }
        g.save(&tmp.path().join("a.png")).unwrap();
        g.save(&tmp.path().join("b.png")).unwrap();

        let r = describe_folder(tmp.path(), "train", 4).unwrap().unwrap();
        assert_eq!(r.image_count, 2);
        assert_eq!(r.expected_pixels, 32);
        assert_eq!(r.histogram.urban, 8);
        assert_eq!(r.percentages[0].0, LandClass::Water);
        assert_relative_eq!(r.percentages[0].1, 75.0);
        assert_relative_eq!(r.percentages[1].1, 25.0);
        assert!(r.render().contains("water: 75.000%"));
    }

    #[test]
    fn stage_reports_skip_empty_splits_and_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let root = DatasetRoot::new(tmp.path());
        root.ensure_stage(Stage::Filtered(2)).unwrap();
        let dir = root.category_dir(Stage::Filtered(2), Category::new(Split::Test, Modality::Mask));
        LabelGrid::new(8, 8, 3).save(&dir.join("m.png")).unwrap();

        let reports = DatasetReporter::new(&root, 8, true).report_stage(Stage::Filtered(2)).unwrap();
        assert_eq!(reports.len(), 1);
        let written = std::fs::read_to_string(tmp.path().join("filtered_2_class_distribution.txt")).unwrap();
        assert!(written.contains("peatland: 64"));
        assert!(written.contains("Test class percentages:"));
    }
}
