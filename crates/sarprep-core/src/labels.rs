use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::DynamicImage;

use crate::error::{PrepError, Result};

/// A 2D grid of per-pixel class labels, row-major, one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGrid {
    /// Row-major label values.
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl LabelGrid {
    /// A `width` × `height` mask where every pixel carries `fill`.
    pub fn new(width: usize, height: usize, fill: u8) -> Self {
        Self { data: vec![fill; width * height], width, height }
    }

    /// Wrap existing row-major data. None if the length does not match.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width * height).then_some(Self { data, width, height })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: u8) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Copy out the half-open pixel rectangle [x0, x1) × [y0, y1).
    pub fn crop(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> LabelGrid {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        let w = x1.saturating_sub(x0);
        let h = y1.saturating_sub(y0);
        let mut data = Vec::with_capacity(w * h);
        for r in y0..y0 + h {
            let start = r * self.width + x0;
            data.extend_from_slice(&self.data[start..start + w]);
        }
        LabelGrid { data, width: w, height: h }
    }

    /// Nearest-neighbour resample to `width` × `height`. Never produces a
    /// label that is not already present in the source.
    pub fn resize_nearest(&self, width: usize, height: usize) -> LabelGrid {
        let mut out = LabelGrid::new(width, height, 0);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for r in 0..height {
            // Sample at the destination pixel centre.
            let sr = (((2 * r + 1) * self.height) / (2 * height)).min(self.height - 1);
            for c in 0..width {
                let sc = (((2 * c + 1) * self.width) / (2 * width)).min(self.width - 1);
                out.set(r, c, self.get(sr, sc));
            }
        }
        out
    }

    /// Load a mask as raw labels.
    ///
    /// PNG files are decoded without any colour transformation, so palette
    /// images yield their palette indices and grayscale images their sample
    /// values. Other formats go through `image` and must be 8- or 16-bit
    /// single-channel; samples are read as stored, never rescaled.
    pub fn load(path: &Path) -> Result<LabelGrid> {
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_png {
            if let Some(grid) = load_png_indices(path)? {
                return Ok(grid);
            }
        }
        let img = image::open(path).map_err(|source| PrepError::Decode { path: path.to_path_buf(), source })?;
        match img {
            DynamicImage::ImageLuma8(buf) => {
                let (w, h) = buf.dimensions();
                Ok(LabelGrid { data: buf.into_raw(), width: w as usize, height: h as usize })
            }
            DynamicImage::ImageLuma16(buf) => {
                let (w, h) = buf.dimensions();
                narrow_labels(path, w as usize, h as usize, buf.into_raw())
            }
            other => Err(PrepError::UnsupportedMask { path: path.to_path_buf(), color: other.color() }),
        }
    }

    pub fn to_gray_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Luma([self.get(y as usize, x as usize)])
        })
    }

    /// Save as a single-channel image; the format follows the extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_gray_image()
            .save(path)
            .map_err(|source| PrepError::Encode { path: path.to_path_buf(), source })
    }
}

/// Raw-sample PNG decode. Returns Ok(None) for colour types that do not map
/// to one label per pixel (RGB, RGBA, gray+alpha), leaving those to `image`.
fn load_png_indices(path: &Path) -> Result<Option<LabelGrid>> {
    let file = File::open(path).map_err(PrepError::io(path))?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let png_err = |source: png::DecodingError| PrepError::Png { path: path.to_path_buf(), source };

    let mut reader = decoder.read_info().map_err(png_err)?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(png_err)?;

    if !matches!(info.color_type, png::ColorType::Indexed | png::ColorType::Grayscale) {
        return Ok(None);
    }

    let width = info.width as usize;
    let height = info.height as usize;
    let depth = info.bit_depth as u8;
    let mut samples = Vec::with_capacity(width * height);
    for row in buf.chunks(info.line_size).take(height) {
        unpack_row(row, depth, width, &mut samples);
    }
    if samples.len() != width * height {
        return Ok(None);
    }
    narrow_labels(path, width, height, samples).map(Some)
}

/// Expand one packed scanline into one sample per pixel.
fn unpack_row(row: &[u8], depth: u8, width: usize, out: &mut Vec<u16>) {
    match depth {
        8 => out.extend(row[..width].iter().map(|&b| u16::from(b))),
        16 => out.extend(
            row.chunks_exact(2)
                .take(width)
                .map(|b| u16::from_be_bytes([b[0], b[1]])),
        ),
        d => {
            let per_byte = (8 / d) as usize;
            let mask = (1u8 << d) - 1;
            for x in 0..width {
                let byte = row[x / per_byte];
                let shift = 8 - d as usize * (x % per_byte + 1);
                out.push(u16::from((byte >> shift) & mask));
            }
        }
    }
}

/// Fit wide samples into one byte per pixel. A sample above 255 cannot be
/// a label and is reported as such; the smallest one wins.
fn narrow_labels(path: &Path, width: usize, height: usize, samples: Vec<u16>) -> Result<LabelGrid> {
    if let Some(bad) = samples.iter().copied().filter(|&v| v > 255).min() {
        let pixels = samples.iter().filter(|&&v| v == bad).count() as u64;
        return Err(PrepError::InvalidLabel { path: path.to_path_buf(), value: bad, pixels });
    }
    let data = samples.into_iter().map(|v| v as u8).collect();
    Ok(LabelGrid { data, width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: usize, h: usize) -> LabelGrid {
        let data = (0..w * h).map(|i| (i % 5) as u8).collect();
        LabelGrid::from_raw(w, h, data).unwrap()
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        assert!(LabelGrid::from_raw(3, 3, vec![0; 8]).is_none());
    }

    #[test]
    fn crop_copies_exact_rectangle() {
        let g = ramp(4, 4);
        let c = g.crop(2, 1, 4, 3);
        assert_eq!((c.width, c.height), (2, 2));
        assert_eq!(c.get(0, 0), g.get(1, 2));
        assert_eq!(c.get(1, 1), g.get(2, 3));
    }

    #[test]
    fn resize_nearest_doubles_blocks() {
        let mut g = LabelGrid::new(2, 2, 0);
        g.set(0, 1, 1);
        g.set(1, 0, 3);
        g.set(1, 1, 4);
        let up = g.resize_nearest(4, 4);
        assert_eq!(up.get(0, 0), 0);
        assert_eq!(up.get(1, 1), 0);
        assert_eq!(up.get(0, 3), 1);
        assert_eq!(up.get(3, 0), 3);
        assert_eq!(up.get(3, 3), 4);
        assert_eq!(up.get(2, 2), 4);
    }

    #[test]
    fn resize_nearest_never_invents_labels() {
        let g = ramp(5, 3);
        let up = g.resize_nearest(11, 7);
        assert!(up.data.iter().all(|v| g.data.contains(v)));
    }

    #[test]
    fn unpack_two_bit_row() {
        // 0b00_01_10_11 → 0, 1, 2, 3
        let mut out: Vec<u16> = Vec::new();
        unpack_row(&[0b0001_1011], 2, 4, &mut out);
        assert_eq!(out, vec![0, 1, 2, 3]);
    }

    #[test]
    fn png_round_trip_keeps_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let g = ramp(6, 4);
        g.save(&path).unwrap();
        assert_eq!(LabelGrid::load(&path).unwrap(), g);
    }

    #[test]
    fn palette_png_yields_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palette.png");
        {
            let file = File::create(&path).unwrap();
            let mut enc = png::Encoder::new(std::io::BufWriter::new(file), 4, 1);
            enc.set_color(png::ColorType::Indexed);
            enc.set_depth(png::BitDepth::Eight);
            enc.set_palette(vec![
                255, 0, 0, 0, 255, 0, 0, 0, 255, 9, 9, 9, 200, 200, 200,
            ]);
            let mut writer = enc.write_header().unwrap();
            writer.write_image_data(&[4, 3, 2, 0]).unwrap();
        }
        let g = LabelGrid::load(&path).unwrap();
        assert_eq!(g.data, vec![4, 3, 2, 0]);
    }

    fn gray16(path: &Path, samples: Vec<u16>) {
        let width = samples.len() as u32;
        image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(width, 1, samples)
            .unwrap()
            .save(path)
            .unwrap();
    }

    #[test]
    fn tiff_masks_keep_their_labels() {
        let dir = tempfile::tempdir().unwrap();
        let eight = dir.path().join("mask8.tif");
        let g = ramp(5, 2);
        g.save(&eight).unwrap();
        assert_eq!(LabelGrid::load(&eight).unwrap(), g);

        let sixteen = dir.path().join("mask16.tif");
        gray16(&sixteen, vec![0, 1, 2, 3, 4, 4]);
        assert_eq!(LabelGrid::load(&sixteen).unwrap().data, vec![0, 1, 2, 3, 4, 4]);
    }

    #[test]
    fn wide_samples_are_invalid_not_rescaled() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["wide.tif", "wide.png"] {
            let path = dir.path().join(name);
            gray16(&path, vec![0, 1, 2, 3, 4, 300]);
            match LabelGrid::load(&path) {
                Err(PrepError::InvalidLabel { value, pixels, .. }) => {
                    assert_eq!((value, pixels), (300, 1), "{name}");
                }
                other => panic!("{name}: expected InvalidLabel, got {other:?}"),
            }
        }
    }

    #[test]
    fn colour_masks_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([1, 1, 1])).save(&path).unwrap();
        assert!(matches!(LabelGrid::load(&path), Err(PrepError::UnsupportedMask { .. })));
    }
}
