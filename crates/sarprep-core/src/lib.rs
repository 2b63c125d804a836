//! Dataset preparation for SAR land-cover segmentation.
//!
//! Stages, in pipeline order: partition the staging dump into
//! train/val/test, expand every sample into four quadrant samples, then
//! narrow the expanded set through a ladder of urban/peatland coverage
//! thresholds. Class distributions are measured between stages.

pub mod classes;
pub mod config;
pub mod error;
pub mod expand;
pub mod filter;
pub mod histogram;
pub mod labels;
pub mod layout;
pub mod partition;
pub mod pipeline;
pub mod preview;
pub mod report;

pub use classes::{ClassHistogram, LandClass};
pub use config::PipelineConfig;
pub use error::{PrepError, Result};
pub use layout::{DatasetRoot, Split, Stage};
pub use pipeline::{Pipeline, PipelineSummary};
