//! Per-image and batch class histograms over mask files.
use std::path::Path;

use log::debug;

use crate::classes::{ClassHistogram, LandClass};
use crate::error::{PrepError, Result};
use crate::labels::LabelGrid;

/// Counts keyed by raw pixel value, before any label is interpreted.
#[derive(Debug, Clone)]
pub struct RawLabelCounts {
    counts: [u64; 256],
}

impl Default for RawLabelCounts {
    fn default() -> Self {
        Self { counts: [0; 256] }
    }
}

impl RawLabelCounts {
    pub fn from_grid(grid: &LabelGrid) -> Self {
        let mut raw = Self::default();
        for &v in &grid.data {
            raw.counts[v as usize] += 1;
        }
        raw
    }

    pub fn count(&self, value: u8) -> u64 {
        self.counts[value as usize]
    }

    /// Map the five known labels to their classes. Any pixel outside 0..=4
    /// is an integrity error for `source`; the smallest offending value is
    /// reported.
    pub fn into_histogram(self, source: &Path) -> Result<ClassHistogram> {
        if let Some(bad) = (5..=255u8).find(|&v| self.counts[v as usize] > 0) {
            return Err(PrepError::InvalidLabel {
                path: source.to_path_buf(),
                value: bad as u16,
                pixels: self.counts[bad as usize],
            });
        }
        let mut hist = ClassHistogram::default();
        for class in LandClass::ALL {
            hist.add_count(class, self.counts[class.label() as usize]);
        }
        Ok(hist)
    }
}

/// Histogram of an in-memory grid. `source` only names the grid in errors.
pub fn count_grid(grid: &LabelGrid, source: &Path) -> Result<ClassHistogram> {
    RawLabelCounts::from_grid(grid).into_histogram(source)
}

/// Histogram of one mask image.
pub fn count_pixels(path: &Path) -> Result<ClassHistogram> {
    let grid = LabelGrid::load(path)?;
    count_grid(&grid, path)
}

/// One histogram accumulated over `files` inside `folder`. The first
/// unreadable or invalid image aborts the batch with its error.
pub fn count_pixels_batch<S: AsRef<str>>(folder: &Path, files: &[S]) -> Result<ClassHistogram> {
    let mut total = ClassHistogram::default();
    for name in files {
        let path = folder.join(name.as_ref());
        total += count_pixels(&path)?;
    }
    debug!("Counted {} images in {}", files.len(), folder.display());
    Ok(total)
}

/// Histogram accumulated over exactly two images, e.g. an original mask and
/// one of its derived quadrants.
pub fn count_pixels_pair(first: &Path, second: &Path) -> Result<ClassHistogram> {
    Ok(count_pixels(first)? + count_pixels(second)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sum_to_pixel_total() {
        let data = (0..7 * 5).map(|i| (i * 3 % 5) as u8).collect();
        let g = LabelGrid::from_raw(7, 5, data).unwrap();
        let h = count_grid(&g, Path::new("mem")).unwrap();
        assert_eq!(h.total(), g.pixel_count() as u64);
    }

    #[test]
    fn absent_classes_are_zero() {
        let g = LabelGrid::new(4, 4, 2);
        let h = count_grid(&g, Path::new("mem")).unwrap();
        assert_eq!(h.forest, 16);
        assert_eq!(h.urban + h.agriculture + h.peatland + h.water, 0);
    }

    #[test]
    fn unknown_label_is_surfaced() {
        let mut g = LabelGrid::new(3, 3, 1);
        g.set(1, 1, 7);
        g.set(2, 2, 7);
        assert_eq!(RawLabelCounts::from_grid(&g).count(7), 2);
        match count_grid(&g, Path::new("bad.png")) {
            Err(PrepError::InvalidLabel { value, pixels, .. }) => {
                assert_eq!(value, 7);
                assert_eq!(pixels, 2);
            }
            other => panic!("expected InvalidLabel, got {other:?}"),
        }
    }

    #[test]
    fn batch_and_pair_accumulate_files() {
        let dir = tempfile::tempdir().unwrap();
        LabelGrid::new(4, 4, 0).save(&dir.path().join("a.png")).unwrap();
        LabelGrid::new(4, 4, 3).save(&dir.path().join("b.png")).unwrap();

        let batch = count_pixels_batch(dir.path(), &["a.png", "b.png"]).unwrap();
        assert_eq!(batch.urban, 16);
        assert_eq!(batch.peatland, 16);

        let pair = count_pixels_pair(&dir.path().join("a.png"), &dir.path().join("a.png")).unwrap();
        assert_eq!(pair.urban, 32);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(count_pixels(&dir.path().join("nope.png")).is_err());
    }
}
