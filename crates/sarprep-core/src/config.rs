use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::expand::ResampleFilter;
use crate::filter::{validate_thresholds, DEFAULT_THRESHOLDS};
use crate::partition::SplitRatios;
use crate::report::DEFAULT_RESOLUTION;

/// Which stages a non-auto run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    pub partition: bool,
    pub expand: bool,
    pub report_split: bool,
    pub filter: bool,
    pub report_filtered: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            partition: true,
            expand: true,
            report_split: true,
            filter: true,
            report_filtered: true,
        }
    }
}

/// Everything the pipeline needs, resolved once before any stage runs.
/// Defaults match the reference workflow (0.6/0.2/0.2, four thresholds).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working directory holding staging folders and all stage outputs.
    pub root: PathBuf,
    pub ratios: SplitRatios,
    pub thresholds: Vec<f64>,
    /// Sort thresholds ascending before filtering.
    pub sort_thresholds: bool,
    /// Run every stage regardless of `stages`.
    pub auto: bool,
    pub stages: StageToggles,
    /// Shuffle the staging listing with this seed before partitioning.
    pub shuffle_seed: Option<u64>,
    pub sar_filter: ResampleFilter,
    /// Tile edge in pixels used for expected pixel totals.
    pub resolution: u32,
    /// Append class-distribution reports to text files in `root`.
    pub write_reports: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            ratios: SplitRatios::default(),
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            sort_thresholds: false,
            auto: false,
            stages: StageToggles::default(),
            shuffle_seed: None,
            sar_filter: ResampleFilter::default(),
            resolution: DEFAULT_RESOLUTION,
            write_reports: true,
        }
    }
}

impl PipelineConfig {
    /// Load from JSON. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(PrepError::io(path))?;
        serde_json::from_str(&text).map_err(|source| PrepError::Json { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<()> {
        self.ratios.validate()?;
        validate_thresholds(&self.thresholds)?;
        if self.resolution == 0 {
            return Err(PrepError::Config("resolution must be positive".into()));
        }
        Ok(())
    }

    /// Thresholds in the order they will be applied.
    pub fn resolved_thresholds(&self) -> Vec<f64> {
        let mut t = self.thresholds.clone();
        if self.sort_thresholds {
            t.sort_by(|a, b| a.total_cmp(b));
        }
        t
    }

    pub fn runs_partition(&self) -> bool {
        self.auto || self.stages.partition
    }

    pub fn runs_expand(&self) -> bool {
        self.auto || self.stages.expand
    }

    pub fn runs_report_split(&self) -> bool {
        self.auto || self.stages.report_split
    }

    pub fn runs_filter(&self) -> bool {
        self.auto || self.stages.filter
    }

    pub fn runs_report_filtered(&self) -> bool {
        self.auto || self.stages.report_filtered
    }
}
