//! Quadrant expansion: every original becomes four full-resolution samples.
//!
//! Quadrant bounds for a W×H source, hw = ⌊W/2⌋, hh = ⌊H/2⌋:
//!   TL [0,0]–[hw,hh]   TR [hw,0]–[W,hh]
//!   BL [0,hh]–[hw,H]   BR [hw,hh]–[W,H]
//! Each crop is rescaled back to W×H. Masks always use nearest-neighbour so
//! no interpolated labels appear; SAR images use the configured filter.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ItemFailure, PrepError, Result};
use crate::labels::LabelGrid;
use crate::layout::{list_images, Category, DatasetRoot, Modality, Split, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Quadrant::TopLeft => "TL",
            Quadrant::TopRight => "TR",
            Quadrant::BottomLeft => "BL",
            Quadrant::BottomRight => "BR",
        }
    }

    /// Half-open pixel box `(x0, y0, x1, y1)` inside a `width` × `height` image.
    pub fn bounds(self, width: usize, height: usize) -> (usize, usize, usize, usize) {
        let hw = width / 2;
        let hh = height / 2;
        match self {
            Quadrant::TopLeft => (0, 0, hw, hh),
            Quadrant::TopRight => (hw, 0, width, hh),
            Quadrant::BottomLeft => (0, hh, hw, height),
            Quadrant::BottomRight => (hw, hh, width, height),
        }
    }

    /// `X.png` → `X_TL.png`. The original extension is kept.
    pub fn file_name(self, source: &str) -> String {
        let path = Path::new(source);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(source);
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}_{}.{ext}", self.suffix()),
            None => format!("{stem}_{}", self.suffix()),
        }
    }
}

/// Resampling filter for SAR quadrants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(f: ResampleFilter) -> Self {
        match f {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// The four quadrants at their native, unscaled size.
pub fn crop_quadrants(grid: &LabelGrid) -> [(Quadrant, LabelGrid); 4] {
    Quadrant::ALL.map(|q| {
        let (x0, y0, x1, y1) = q.bounds(grid.width, grid.height);
        (q, grid.crop(x0, y0, x1, y1))
    })
}

/// The four quadrants of a mask, each rescaled to the source size.
pub fn expand_grid(grid: &LabelGrid) -> [(Quadrant, LabelGrid); 4] {
    crop_quadrants(grid).map(|(q, quad)| (q, quad.resize_nearest(grid.width, grid.height)))
}

/// The four quadrants of a SAR image, each rescaled to the source size.
pub fn expand_image(img: &DynamicImage, filter: FilterType) -> [(Quadrant, DynamicImage); 4] {
    let (w, h) = (img.width(), img.height());
    Quadrant::ALL.map(|q| {
        let (x0, y0, x1, y1) = q.bounds(w as usize, h as usize);
        let crop = img.crop_imm(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
        (q, crop.resize_exact(w, h, filter))
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpansionReport {
    /// Source images seen across all six folders.
    pub sources: usize,
    /// Quadrant files written.
    pub written: usize,
    pub failures: Vec<ItemFailure>,
}

/// Expands `original_images` into `split_images`.
pub struct QuadrantExpander<'a> {
    root: &'a DatasetRoot,
    sar_filter: FilterType,
}

impl<'a> QuadrantExpander<'a> {
    pub fn new(root: &'a DatasetRoot, sar_filter: ResampleFilter) -> Self {
        Self { root, sar_filter: sar_filter.into() }
    }

    /// Expand every category folder. A folder that cannot be listed aborts
    /// the stage; a single bad image is recorded and skipped.
    pub fn expand_all(&self) -> Result<ExpansionReport> {
        self.root.ensure_stage(Stage::Expanded)?;
        let mut report = ExpansionReport::default();
        for category in Category::all() {
            self.expand_category(category, &mut report)?;
        }
        info!(
            "Expansion complete: {} sources, {} quadrants written, {} failures",
            report.sources,
            report.written,
            report.failures.len()
        );
        Ok(report)
    }

    pub fn expand_category(&self, category: Category, report: &mut ExpansionReport) -> Result<()> {
        let src = self.root.category_dir(Stage::Original, category);
        let dst = self.root.category_dir(Stage::Expanded, category);
        let files = list_images(&src)?;
        info!("Expanding {:<10} {} images", category.dir_name(), files.len());

        for file in &files {
            report.sources += 1;
            match self.expand_one(category, &src.join(file), &dst, file) {
                Ok(n) => report.written += n,
                Err(e) => {
                    warn!("Failed to expand {}: {e}", src.join(file).display());
                    report.failures.push(ItemFailure::new(src.join(file), &e));
                }
            }
        }
        Ok(())
    }

    /// Write the four quadrants of one source. Returns how many were saved.
    fn expand_one(&self, category: Category, src: &Path, dst: &Path, file: &str) -> Result<usize> {
        match category.modality {
            Modality::Mask => {
                let grid = LabelGrid::load(src)?;
                if grid.width < 2 || grid.height < 2 {
                    return Err(PrepError::TooSmall {
                        path: src.to_path_buf(),
                        width: grid.width,
                        height: grid.height,
                    });
                }
                for (q, quad) in expand_grid(&grid) {
                    quad.save(&dst.join(q.file_name(file)))?;
                }
            }
            Modality::Sar => {
                let img = image::open(src)
                    .map_err(|source| PrepError::Decode { path: src.to_path_buf(), source })?;
                if img.width() < 2 || img.height() < 2 {
                    return Err(PrepError::TooSmall {
                        path: src.to_path_buf(),
                        width: img.width() as usize,
                        height: img.height() as usize,
                    });
                }
                let split = Split::from_dir(dst)?;
                for (q, quad) in expand_image(&img, self.sar_filter) {
                    let name = q.file_name(file);
                    let out = dst.join(&name);
                    quad.save(&out)
                        .map_err(|source| PrepError::Encode { path: out.clone(), source })?;
                    self.append_manifest(split, &name)?;
                }
            }
        }
        Ok(Quadrant::ALL.len())
    }

    fn append_manifest(&self, split: Split, name: &str) -> Result<()> {
        let path = self.root.split_manifest(split);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(PrepError::io(&path))?;
        writeln!(f, "{name}").map_err(PrepError::io(&path))
    }
}
