//! Land-cover class set and the fixed five-counter class histogram.
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Land-cover class encoded per pixel in a mask. The discriminant is the
/// pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandClass {
    Urban = 0,
    Agriculture = 1,
    Forest = 2,
    Peatland = 3,
    Water = 4,
}

impl LandClass {
    /// Declaration order; also the tie-break order for presentation.
    pub const ALL: [LandClass; 5] = [
        LandClass::Urban,
        LandClass::Agriculture,
        LandClass::Forest,
        LandClass::Peatland,
        LandClass::Water,
    ];

    pub fn from_label(value: u8) -> Option<Self> {
        match value {
            0 => Some(LandClass::Urban),
            1 => Some(LandClass::Agriculture),
            2 => Some(LandClass::Forest),
            3 => Some(LandClass::Peatland),
            4 => Some(LandClass::Water),
            _ => None,
        }
    }

    #[inline]
    pub fn label(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            LandClass::Urban => "urban",
            LandClass::Agriculture => "agriculture",
            LandClass::Forest => "forest",
            LandClass::Peatland => "peatland",
            LandClass::Water => "water",
        }
    }
}

/// Pixel counts per class for one image or a set of images.
/// All five classes are always present; absent classes count zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassHistogram {
    pub urban: u64,
    pub agriculture: u64,
    pub forest: u64,
    pub peatland: u64,
    pub water: u64,
}

impl ClassHistogram {
    #[inline]
    pub fn get(&self, class: LandClass) -> u64 {
        match class {
            LandClass::Urban => self.urban,
            LandClass::Agriculture => self.agriculture,
            LandClass::Forest => self.forest,
            LandClass::Peatland => self.peatland,
            LandClass::Water => self.water,
        }
    }

    #[inline]
    pub fn add_count(&mut self, class: LandClass, n: u64) {
        let slot = match class {
            LandClass::Urban => &mut self.urban,
            LandClass::Agriculture => &mut self.agriculture,
            LandClass::Forest => &mut self.forest,
            LandClass::Peatland => &mut self.peatland,
            LandClass::Water => &mut self.water,
        };
        *slot += n;
    }

    pub fn total(&self) -> u64 {
        LandClass::ALL.iter().map(|&c| self.get(c)).sum()
    }

    /// Fraction of this histogram's pixels carrying `class`. 0.0 when empty.
    pub fn share(&self, class: LandClass) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.get(class) as f64 / total as f64
    }

    /// Classes by descending count, ties in declaration order.
    /// Presentation only: nothing downstream relies on this order.
    pub fn sorted(&self) -> Vec<(LandClass, u64)> {
        let mut entries: Vec<(LandClass, u64)> =
            LandClass::ALL.iter().map(|&c| (c, self.get(c))).collect();
        // sort_by is stable, so equal counts keep declaration order.
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }

    /// `count / total_pixels` per class, rounded to 4 decimals.
    pub fn fractions(&self, total_pixels: u64) -> Vec<(LandClass, f64)> {
        self.scaled_fractions(total_pixels, 1.0)
    }

    /// Like [`fractions`](Self::fractions) for the accumulated four quadrants
    /// of one source image: each share is further divided by 4 so it is
    /// comparable with the pre-split total.
    pub fn fractions_post_split(&self, total_pixels: u64) -> Vec<(LandClass, f64)> {
        self.scaled_fractions(total_pixels, 4.0)
    }

    fn scaled_fractions(&self, total_pixels: u64, divisor: f64) -> Vec<(LandClass, f64)> {
        self.sorted()
            .into_iter()
            .map(|(class, count)| {
                let frac = if total_pixels == 0 {
                    0.0
                } else {
                    count as f64 / total_pixels as f64 / divisor
                };
                (class, round4(frac))
            })
            .collect()
    }

    /// Percentage of the histogram's own sum per class (0–100), sorted.
    /// An empty histogram yields all zeros.
    pub fn percentages(&self) -> Vec<(LandClass, f64)> {
        let total = self.total();
        self.sorted()
            .into_iter()
            .map(|(class, count)| {
                let pct = if total == 0 { 0.0 } else { count as f64 / total as f64 * 100.0 };
                (class, pct)
            })
            .collect()
    }

    /// Per-class gain in pixel count from `pre` to `post`, declaration order.
    pub fn increase(pre: &ClassHistogram, post: &ClassHistogram) -> Vec<(LandClass, i64)> {
        LandClass::ALL
            .iter()
            .map(|&c| (c, post.get(c) as i64 - pre.get(c) as i64))
            .collect()
    }
}

impl AddAssign for ClassHistogram {
    fn add_assign(&mut self, rhs: Self) {
        for class in LandClass::ALL {
            self.add_count(class, rhs.get(class));
        }
    }
}

impl Add for ClassHistogram {
    type Output = ClassHistogram;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hist(u: u64, a: u64, f: u64, p: u64, w: u64) -> ClassHistogram {
        ClassHistogram { urban: u, agriculture: a, forest: f, peatland: p, water: w }
    }

    #[test]
    fn label_round_trip_covers_class_set() {
        for class in LandClass::ALL {
            assert_eq!(LandClass::from_label(class.label()), Some(class));
        }
        assert_eq!(LandClass::from_label(5), None);
        assert_eq!(LandClass::from_label(255), None);
    }

    #[test]
    fn sorted_is_descending_with_stable_ties() {
        let h = hist(5, 10, 5, 0, 10);
        let order: Vec<LandClass> = h.sorted().into_iter().map(|(c, _)| c).collect();
        assert_eq!(
            order,
            vec![
                LandClass::Agriculture,
                LandClass::Water,
                LandClass::Urban,
                LandClass::Forest,
                LandClass::Peatland,
            ]
        );
    }

    #[test]
    fn fractions_round_to_four_places() {
        let h = hist(1, 2, 0, 0, 0);
        let fr = h.fractions(3);
        assert_eq!(fr[0], (LandClass::Agriculture, 0.6667));
        assert_eq!(fr[1], (LandClass::Urban, 0.3333));
    }

    #[test]
    fn post_split_fractions_divide_by_four() {
        // Four 2x2 quadrants upscaled to 4x4 carry 4x the pixels of the source.
        let h = hist(64, 0, 0, 0, 0);
        let fr = h.fractions_post_split(16);
        assert_eq!(fr[0], (LandClass::Urban, 1.0));
    }

    #[test]
    fn percentages_sum_to_hundred() {
        let h = hist(3, 1, 4, 1, 5);
        let sum: f64 = h.percentages().iter().map(|(_, p)| p).sum();
        assert_relative_eq!(sum, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_histogram_has_zero_shares() {
        let h = ClassHistogram::default();
        assert_eq!(h.share(LandClass::Urban), 0.0);
        assert!(h.percentages().iter().all(|&(_, p)| p == 0.0));
    }

    #[test]
    fn addition_is_per_class() {
        let sum = hist(1, 2, 3, 4, 5) + hist(10, 0, 0, 0, 1);
        assert_eq!(sum, hist(11, 2, 3, 4, 6));
        assert_eq!(sum.total(), 26);
    }

    #[test]
    fn increase_is_post_minus_pre() {
        let inc = ClassHistogram::increase(&hist(10, 0, 0, 0, 0), &hist(40, 4, 0, 0, 0));
        assert_eq!(inc[0], (LandClass::Urban, 30));
        assert_eq!(inc[1], (LandClass::Agriculture, 4));
    }
}
