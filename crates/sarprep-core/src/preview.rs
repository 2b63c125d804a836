//! 2×2 preview sheet of a sample's four quadrants.
use std::path::Path;

use image::{Rgb, RgbImage};

use crate::error::{PrepError, Result};
use crate::expand::Quadrant;

/// Background between tiles.
const GAP_COLOUR: Rgb<u8> = Rgb([255, 255, 255]);

/// Lay out four images as TL, TR / BL, BR with a `gap`-pixel margin between
/// them. Tiles of different sizes are placed at the largest tile's pitch.
pub fn compose_grid(tiles: &[RgbImage; 4], gap: u32) -> RgbImage {
    let cell_w = tiles.iter().map(|t| t.width()).max().unwrap_or(0);
    let cell_h = tiles.iter().map(|t| t.height()).max().unwrap_or(0);
    let mut sheet = RgbImage::from_pixel(cell_w * 2 + gap, cell_h * 2 + gap, GAP_COLOUR);
    for (i, tile) in tiles.iter().enumerate() {
        let x = (i as u32 % 2) * (cell_w + gap);
        let y = (i as u32 / 2) * (cell_h + gap);
        image::imageops::replace(&mut sheet, tile, x as i64, y as i64);
    }
    sheet
}

/// Load the four `{stem}_{TL,TR,BL,BR}` files derived from `source` in
/// `dir` and compose them. Masks are stretched to the full 0–255 range so
/// labels 0–4 are distinguishable.
pub fn preview_sample(dir: &Path, source: &str, gap: u32, stretch_labels: bool) -> Result<RgbImage> {
    let mut tiles = Vec::with_capacity(4);
    for q in Quadrant::ALL {
        let path = dir.join(q.file_name(source));
        let img = image::open(&path).map_err(|source| PrepError::Decode { path: path.clone(), source })?;
        let mut rgb = img.to_rgb8();
        if stretch_labels {
            for px in rgb.pixels_mut() {
                for ch in px.0.iter_mut() {
                    *ch = ch.saturating_mul(63);
                }
            }
        }
        tiles.push(rgb);
    }
    let tiles: [RgbImage; 4] = tiles
        .try_into()
        .map_err(|_| PrepError::Config("expected exactly four quadrant tiles".into()))?;
    Ok(compose_grid(&tiles, gap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_places_tiles_in_reading_order() {
        let tiles = [10u8, 20, 30, 40].map(|v| RgbImage::from_pixel(3, 2, Rgb([v, v, v])));
        let sheet = compose_grid(&tiles, 1);
        assert_eq!(sheet.dimensions(), (7, 5));
        assert_eq!(sheet.get_pixel(0, 0).0[0], 10);
        assert_eq!(sheet.get_pixel(4, 0).0[0], 20);
        assert_eq!(sheet.get_pixel(0, 3).0[0], 30);
        assert_eq!(sheet.get_pixel(6, 4).0[0], 40);
        assert_eq!(*sheet.get_pixel(3, 0), GAP_COLOUR);
    }

    #[test]
    fn preview_reads_quadrant_files() {
        let tmp = tempfile::tempdir().unwrap();
        for (i, q) in Quadrant::ALL.iter().enumerate() {
            crate::labels::LabelGrid::new(4, 4, i as u8)
                .save(&tmp.path().join(q.file_name("x.png")))
                .unwrap();
        }
        let sheet = preview_sample(tmp.path(), "x.png", 2, true).unwrap();
        assert_eq!(sheet.dimensions(), (10, 10));
        assert_eq!(sheet.get_pixel(9, 9).0[0], 3 * 63);
    }
}
