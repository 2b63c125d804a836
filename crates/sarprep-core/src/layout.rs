//! Fixed on-disk layout shared by every stage.
//!
//! Each stage root (`original_images`, `split_images`, `filtered_images{i}`)
//! holds the same six category folders, `{train,val,test}_{SAR,mask}`.
//! Staging input lives in `dump_sar_here/` and `dump_masks_here/`.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

pub const STAGING_SAR: &str = "dump_sar_here";
pub const STAGING_MASKS: &str = "dump_masks_here";
pub const STATS_LOG: &str = "filtration_stats.txt";

/// Placeholder note shipped in each staging folder. Never processed.
const PLACEHOLDER: &str = "readme.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// The split named by a folder such as `train_SAR`. Exactly one split
    /// name must appear in the folder's own name.
    pub fn from_dir(dir: &Path) -> Result<Split> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut hits = Split::ALL.into_iter().filter(|s| name.contains(s.name()));
        match (hits.next(), hits.next()) {
            (Some(split), None) => Ok(split),
            _ => Err(PrepError::AmbiguousSplit(dir.to_path_buf())),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    Sar,
    Mask,
}

/// One of the six category folders of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Category {
    pub split: Split,
    pub modality: Modality,
}

impl Category {
    pub const fn new(split: Split, modality: Modality) -> Self {
        Self { split, modality }
    }

    pub fn all() -> impl Iterator<Item = Category> {
        Split::ALL.into_iter().flat_map(|s| {
            [Category::new(s, Modality::Sar), Category::new(s, Modality::Mask)]
        })
    }

    /// Folder name. Mask folders are lower-case `_mask` at every stage.
    pub fn dir_name(self) -> String {
        let suffix = match self.modality {
            Modality::Sar => "SAR",
            Modality::Mask => "mask",
        };
        format!("{}_{}", self.split.name(), suffix)
    }

    /// The other half of a sample: SAR ↔ mask within the same split.
    pub fn paired(self) -> Category {
        let modality = match self.modality {
            Modality::Sar => Modality::Mask,
            Modality::Mask => Modality::Sar,
        };
        Category::new(self.split, modality)
    }
}

/// A dataset snapshot directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// `original_images`: partitioned originals.
    Original,
    /// `split_images`: quadrant-expanded dataset, generation 0.
    Expanded,
    /// `filtered_images{i}`, i ≥ 1.
    Filtered(u32),
}

impl Stage {
    pub fn dir_name(self) -> String {
        match self {
            Stage::Original => "original_images".to_string(),
            Stage::Expanded => "split_images".to_string(),
            Stage::Filtered(i) => format!("filtered_images{i}"),
        }
    }

    /// The generation a filtered stage is derived from.
    pub fn parent(self) -> Option<Stage> {
        match self {
            Stage::Original => None,
            Stage::Expanded => Some(Stage::Original),
            Stage::Filtered(i) if i <= 1 => Some(Stage::Expanded),
            Stage::Filtered(i) => Some(Stage::Filtered(i - 1)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// The working directory every stage reads from and writes to.
#[derive(Debug, Clone)]
pub struct DatasetRoot {
    root: PathBuf,
}

impl DatasetRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn staging_sar(&self) -> PathBuf {
        self.root.join(STAGING_SAR)
    }

    pub fn staging_masks(&self) -> PathBuf {
        self.root.join(STAGING_MASKS)
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    pub fn category_dir(&self, stage: Stage, category: Category) -> PathBuf {
        self.stage_dir(stage).join(category.dir_name())
    }

    /// `split_images_{split}.txt`: SAR filenames written by the expander.
    pub fn split_manifest(&self, split: Split) -> PathBuf {
        self.root.join(format!("split_images_{}.txt", split.name()))
    }

    pub fn stats_log(&self) -> PathBuf {
        self.root.join(STATS_LOG)
    }

    /// `filter_{i}.txt`: SAR filenames retained by generation i.
    pub fn filter_listing(&self, generation: u32) -> PathBuf {
        self.root.join(format!("filter_{generation}.txt"))
    }

    /// Create all six category folders of `stage`. Safe to call repeatedly.
    pub fn ensure_stage(&self, stage: Stage) -> Result<()> {
        for category in Category::all() {
            let dir = self.category_dir(stage, category);
            fs::create_dir_all(&dir).map_err(PrepError::io(&dir))?;
        }
        Ok(())
    }
}

/// Image file names in `dir`, sorted by name. Subdirectories, hidden files
/// and the staging placeholder are left out.
pub fn list_images(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(PrepError::io(dir))? {
        let entry = entry.map_err(PrepError::io(dir))?;
        let file_type = entry.file_type().map_err(PrepError::io(&entry.path()))?;
        if !file_type.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.starts_with('.') || name.eq_ignore_ascii_case(PLACEHOLDER) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Sample identity: the file name without its last extension, so a SAR
/// `.tif` pairs with a `.png` mask and `scene.v1_TL` stays distinct from
/// `scene.v1_TR`.
pub fn sample_stem(file: &str) -> &str {
    Path::new(file).file_stem().and_then(|s| s.to_str()).unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_use_one_mask_casing() {
        let names: Vec<String> = Category::all().map(Category::dir_name).collect();
        assert_eq!(
            names,
            vec!["train_SAR", "train_mask", "val_SAR", "val_mask", "test_SAR", "test_mask"]
        );
    }

    #[test]
    fn split_from_dir_requires_exactly_one_match() {
        assert_eq!(Split::from_dir(Path::new("/x/split_images/val_SAR")).unwrap(), Split::Val);
        assert!(Split::from_dir(Path::new("/x/other")).is_err());
        assert!(Split::from_dir(Path::new("/x/train_test_SAR")).is_err());
    }

    #[test]
    fn stage_parents_form_a_chain() {
        assert_eq!(Stage::Filtered(3).parent(), Some(Stage::Filtered(2)));
        assert_eq!(Stage::Filtered(1).parent(), Some(Stage::Expanded));
        assert_eq!(Stage::Filtered(2).dir_name(), "filtered_images2");
    }

    #[test]
    fn sample_stem_drops_only_the_last_extension() {
        assert_eq!(sample_stem("scene.v1_TL.png"), "scene.v1_TL");
        assert_eq!(sample_stem("T112_1302.tif"), "T112_1302");
        assert_eq!(sample_stem("noext"), "noext");
    }

    #[test]
    fn ensure_stage_is_idempotent_and_listing_skips_placeholders() {
        let tmp = tempfile::tempdir().unwrap();
        let root = DatasetRoot::new(tmp.path());
        root.ensure_stage(Stage::Filtered(1)).unwrap();
        root.ensure_stage(Stage::Filtered(1)).unwrap();
        for category in Category::all() {
            assert!(root.category_dir(Stage::Filtered(1), category).is_dir());
        }

        let dir = root.category_dir(Stage::Filtered(1), Category::new(Split::Val, Modality::Sar));
        for name in ["b.png", "a.png", "readme.txt", ".DS_Store"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        assert_eq!(list_images(&dir).unwrap(), vec!["a.png", "b.png"]);
    }

    #[test]
    fn listing_a_missing_folder_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(list_images(&tmp.path().join("gone")), Err(PrepError::Io { .. })));
    }
}
