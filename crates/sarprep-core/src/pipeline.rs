//! Pipeline orchestrator: runs the enabled stages in order.
use log::info;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::expand::{ExpansionReport, QuadrantExpander};
use crate::filter::{GenerationReport, ThresholdFilter};
use crate::layout::{DatasetRoot, Stage};
use crate::partition::{partition_staging, PartitionReport};
use crate::report::{DatasetReporter, DistributionReport};

/// What each executed stage produced. Skipped stages stay empty.
#[derive(Debug, Default, Serialize)]
pub struct PipelineSummary {
    pub partition: Option<PartitionReport>,
    pub expansion: Option<ExpansionReport>,
    pub split_reports: Vec<DistributionReport>,
    pub generations: Vec<GenerationReport>,
    /// Post-filter reports, one entry per generation.
    pub filtered_reports: Vec<(u32, Vec<DistributionReport>)>,
}

pub struct Pipeline {
    config: PipelineConfig,
    root: DatasetRoot,
}

impl Pipeline {
    /// Validates the configuration up front; nothing on disk is touched.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let root = DatasetRoot::new(&config.root);
        Ok(Self { config, root })
    }

    pub fn root(&self) -> &DatasetRoot {
        &self.root
    }

    /// Run the pipeline.
    ///
    /// Order:
    ///   1. Partition staging into `original_images`
    ///   2. Quadrant expansion into `split_images`
    ///   3. Class distribution of `split_images`
    ///   4. Threshold ladder into `filtered_images1..k`
    ///   5. Class distribution of every generation
    pub fn run(&self) -> Result<PipelineSummary> {
        let cfg = &self.config;
        let reporter = DatasetReporter::new(&self.root, cfg.resolution, cfg.write_reports);
        let mut summary = PipelineSummary::default();

        // ── 1. Partition ────────────────────────────────────────────────────
        if cfg.runs_partition() {
            info!("Partitioning staging folders in {}", self.root.path().display());
            summary.partition = Some(partition_staging(&self.root, &cfg.ratios, cfg.shuffle_seed)?);
        }

        // ── 2. Expansion ────────────────────────────────────────────────────
        if cfg.runs_expand() {
            let expander = QuadrantExpander::new(&self.root, cfg.sar_filter);
            summary.expansion = Some(expander.expand_all()?);
        }

        // ── 3. Post-split distribution ─────────────────────────────────────
        if cfg.runs_report_split() {
            summary.split_reports = reporter.report_stage(Stage::Expanded)?;
        }

        // ── 4. Threshold ladder ────────────────────────────────────────────
        let thresholds = cfg.resolved_thresholds();
        if cfg.runs_filter() {
            summary.generations = ThresholdFilter::new(&self.root, thresholds.clone())?.run()?;
        }

        // ── 5. Post-filter distribution ────────────────────────────────────
        if cfg.runs_report_filtered() {
            for generation in 1..=thresholds.len() as u32 {
                let stage = Stage::Filtered(generation);
                if !self.root.stage_dir(stage).is_dir() {
                    info!("{stage} does not exist, skipping its report");
                    continue;
                }
                let reports = reporter.report_stage(stage)?;
                summary.filtered_reports.push((generation, reports));
            }
        }

        Ok(summary)
    }
}
