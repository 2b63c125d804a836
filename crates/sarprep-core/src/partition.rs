//! Train/val/test partitioning of the staging dump.
//!
//! Splitting is a pure function of the listing order: the first
//! ⌊N·train⌋ files go to train, up to ⌊N·(train+val)⌋ to val, the rest to
//! test. Files are moved, so staging is consumed exactly once.
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ItemFailure, PrepError, Result};
use crate::layout::{list_images, sample_stem, Category, DatasetRoot, Modality, Split, Stage};

/// Tolerance on the ratio sum, for float representation only.
const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self { train: 0.6, val: 0.2, test: 0.2 }
    }
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Self {
        Self { train, val, test }
    }

    /// Non-negative, finite, summing to 1.0. Never normalised.
    pub fn validate(&self) -> Result<()> {
        let parts = [self.train, self.val, self.test];
        let sum: f64 = parts.iter().sum();
        let well_formed = parts.iter().all(|r| r.is_finite() && *r >= 0.0);
        if !well_formed || (sum - 1.0).abs() > RATIO_EPSILON {
            return Err(PrepError::InvalidRatios {
                train: self.train,
                val: self.val,
                test: self.test,
                sum,
            });
        }
        Ok(())
    }

    /// `(train_end, val_end)` for a listing of `n` files, truncating.
    pub fn boundaries(&self, n: usize) -> (usize, usize) {
        let train_end = (n as f64 * self.train) as usize;
        let val_end = ((n as f64 * (self.train + self.val)) as usize).clamp(train_end, n);
        (train_end.min(n), val_end)
    }

    /// Assign `files` to splits, keeping their order.
    pub fn plan(&self, files: Vec<String>) -> Result<PartitionPlan> {
        self.validate()?;
        let (train_end, val_end) = self.boundaries(files.len());
        let mut files = files;
        let test = files.split_off(val_end);
        let val = files.split_off(train_end);
        Ok(PartitionPlan { train: files, val, test })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionPlan {
    pub train: Vec<String>,
    pub val: Vec<String>,
    pub test: Vec<String>,
}

impl PartitionPlan {
    pub fn files(&self, split: Split) -> &[String] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl SplitCounts {
    fn bump(&mut self, split: Split) {
        match split {
            Split::Train => self.train += 1,
            Split::Val => self.val += 1,
            Split::Test => self.test += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PartitionReport {
    /// SAR files moved per split.
    pub sar: SplitCounts,
    /// Masks moved next to their SAR counterpart, per split.
    pub masks: SplitCounts,
    /// Masks with no partitioned SAR counterpart; left in staging.
    pub unmatched_masks: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

/// Partition the staging dump into `original_images`.
///
/// Preconditions (checked before anything moves): valid ratios, readable
/// staging folders holding the same number of SAR and mask files.
/// `shuffle_seed` reorders the SAR listing deterministically first.
pub fn partition_staging(
    root: &DatasetRoot,
    ratios: &SplitRatios,
    shuffle_seed: Option<u64>,
) -> Result<PartitionReport> {
    ratios.validate()?;

    let sar_dir = root.staging_sar();
    let mask_dir = root.staging_masks();
    let mut sar_files = list_images(&sar_dir)?;
    let mask_files = list_images(&mask_dir)?;
    if sar_files.len() != mask_files.len() {
        return Err(PrepError::StagingMismatch { sar: sar_files.len(), masks: mask_files.len() });
    }

    if let Some(seed) = shuffle_seed {
        sar_files.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    let plan = ratios.plan(sar_files)?;
    info!(
        "Partitioning {} SAR files: {} train, {} val, {} test",
        plan.train.len() + plan.val.len() + plan.test.len(),
        plan.train.len(),
        plan.val.len(),
        plan.test.len()
    );

    root.ensure_stage(Stage::Original)?;

    let mut report = PartitionReport::default();
    let mut landed: HashMap<String, Split> = HashMap::new();

    for split in Split::ALL {
        let dest = root.category_dir(Stage::Original, Category::new(split, Modality::Sar));
        for file in plan.files(split) {
            match move_file(&sar_dir.join(file), &dest.join(file)) {
                Ok(()) => {
                    report.sar.bump(split);
                    landed.insert(sample_stem(file).to_string(), split);
                }
                Err(e) => {
                    warn!("Failed to move {}: {e}", sar_dir.join(file).display());
                    report.failures.push(ItemFailure::new(sar_dir.join(file), &e));
                }
            }
        }
    }

    for mask in mask_files {
        let Some(&split) = landed.get(sample_stem(&mask)) else {
            report.unmatched_masks.push(mask);
            continue;
        };
        let dest = root.category_dir(Stage::Original, Category::new(split, Modality::Mask));
        match move_file(&mask_dir.join(&mask), &dest.join(&mask)) {
            Ok(()) => report.masks.bump(split),
            Err(e) => {
                warn!("Failed to move {}: {e}", mask_dir.join(&mask).display());
                report.failures.push(ItemFailure::new(mask_dir.join(&mask), &e));
            }
        }
    }

    if !report.unmatched_masks.is_empty() {
        warn!(
            "{} masks have no SAR counterpart and stay in {}",
            report.unmatched_masks.len(),
            mask_dir.display()
        );
    }
    Ok(report)
}

/// Relocate a file, falling back to copy + remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("img_{i:02}.png")).collect()
    }

    fn stage_dump(root: &DatasetRoot, sar: &[String], masks: &[String]) {
        fs::create_dir_all(root.staging_sar()).unwrap();
        fs::create_dir_all(root.staging_masks()).unwrap();
        for f in sar {
            fs::write(root.staging_sar().join(f), b"sar").unwrap();
        }
        for f in masks {
            fs::write(root.staging_masks().join(f), b"mask").unwrap();
        }
    }

    #[test]
    fn sixty_twenty_twenty_of_ten() {
        let plan = SplitRatios::default().plan(names(10)).unwrap();
        assert_eq!((plan.train.len(), plan.val.len(), plan.test.len()), (6, 2, 2));
        assert_eq!(plan.train[0], "img_00.png");
        assert_eq!(plan.val[0], "img_06.png");
        assert_eq!(plan.test[1], "img_09.png");
    }

    #[test]
    fn boundaries_truncate() {
        // 7 * 0.6 = 4.2 → 4; 7 * 0.8 = 5.6 → 5
        assert_eq!(SplitRatios::default().boundaries(7), (4, 5));
        assert_eq!(SplitRatios::default().boundaries(0), (0, 0));
    }

    #[test]
    fn representable_sums_pass() {
        assert!(SplitRatios::new(0.7, 0.2, 0.1).validate().is_ok());
        assert!(SplitRatios::new(1.0, 0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn bad_ratio_sum_fails_before_touching_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = DatasetRoot::new(tmp.path());
        stage_dump(&root, &names(4), &names(4));

        let err = partition_staging(&root, &SplitRatios::new(0.5, 0.3, 0.3), None).unwrap_err();
        assert!(matches!(err, PrepError::InvalidRatios { .. }));
        assert_eq!(list_images(&root.staging_sar()).unwrap().len(), 4);
        assert!(!root.stage_dir(Stage::Original).exists());
    }

    #[test]
    fn negative_ratio_is_rejected() {
        assert!(SplitRatios::new(1.2, -0.2, 0.0).validate().is_err());
    }

    #[test]
    fn count_mismatch_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let root = DatasetRoot::new(tmp.path());
        stage_dump(&root, &names(3), &names(2));
        let err = partition_staging(&root, &SplitRatios::default(), None).unwrap_err();
        assert!(matches!(err, PrepError::StagingMismatch { sar: 3, masks: 2 }));
        assert_eq!(list_images(&root.staging_sar()).unwrap().len(), 3);
    }

    #[test]
    fn masks_follow_their_sar_split() {
        let tmp = tempfile::tempdir().unwrap();
        let root = DatasetRoot::new(tmp.path());
        let sar = names(10);
        // Masks share base names but use another extension.
        let mut masks: Vec<String> = (0..9).map(|i| format!("img_{i:02}.tif")).collect();
        masks.push("orphan.tif".to_string());
        stage_dump(&root, &sar, &masks);
        fs::write(root.staging_sar().join("readme.txt"), b"drop files here").unwrap();

        let report = partition_staging(&root, &SplitRatios::default(), None).unwrap();
        assert_eq!(report.sar, SplitCounts { train: 6, val: 2, test: 2 });
        assert_eq!(report.masks, SplitCounts { train: 6, val: 2, test: 1 });
        assert_eq!(report.unmatched_masks, vec!["orphan.tif"]);

        let val_mask = root.category_dir(Stage::Original, Category::new(Split::Val, Modality::Mask));
        assert_eq!(list_images(&val_mask).unwrap(), vec!["img_06.tif", "img_07.tif"]);
        assert_eq!(list_images(&root.staging_masks()).unwrap(), vec!["orphan.tif"]);
        assert!(list_images(&root.staging_sar()).unwrap().is_empty());
        assert!(root.staging_sar().join("readme.txt").exists());
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let run = |seed| {
            let tmp = tempfile::tempdir().unwrap();
            let root = DatasetRoot::new(tmp.path());
            stage_dump(&root, &names(10), &names(10));
            partition_staging(&root, &SplitRatios::default(), Some(seed)).unwrap();
            let train = root.category_dir(Stage::Original, Category::new(Split::Train, Modality::Sar));
            list_images(&train).unwrap()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn dotted_names_pair_on_the_full_stem() {
        let tmp = tempfile::tempdir().unwrap();
        let root = DatasetRoot::new(tmp.path());
        let sar: Vec<String> = (0..5).map(|i| format!("scene.v{i}.tif")).collect();
        let masks: Vec<String> = (0..5).map(|i| format!("scene.v{i}.png")).collect();
        stage_dump(&root, &sar, &masks);

        let report = partition_staging(&root, &SplitRatios::new(0.6, 0.2, 0.2), None).unwrap();
        assert_eq!(report.masks, SplitCounts { train: 3, val: 1, test: 1 });
        assert!(report.unmatched_masks.is_empty());
        let test_mask = root.category_dir(Stage::Original, Category::new(Split::Test, Modality::Mask));
        assert_eq!(list_images(&test_mask).unwrap(), vec!["scene.v4.png"]);
    }
}
