//! Chroma-key extraction: turn a flat key-colored background into real
//! transparency.
//!
//! Every pixel is classified by its weighted RGB distance from the key
//! color. Distances at or below the inner threshold become fully
//! transparent, distances at or above the outer threshold stay fully
//! opaque, and the band in between gets a linearly interpolated alpha
//! so silhouettes keep a soft edge.
//!
//! Soft-band pixels additionally have the key's dominant channel pulled
//! down to the mean of the other two channels, which removes the green
//! fringe that would otherwise show once a sticker is placed on a
//! non-green background.
//!
//! Classification is per pixel with no neighbourhood, so the work is
//! split across threads with `rayon`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError, RasterImage};

/// Pure green, the background color the generator is asked to paint.
pub const DEFAULT_KEY: [u8; 3] = [0, 255, 0];

/// Per-channel weights of the distance metric (R, G, B).
const CHANNEL_WEIGHTS: [f32; 3] = [2.0, 1.0, 2.0];

/// Sum of [`CHANNEL_WEIGHTS`]; dividing by it keeps distances in
/// `0.0..=255.0` for a primary key color.
const WEIGHT_SUM: f32 = 5.0;

/// Inner/outer distance thresholds for one keying mode.
///
/// Invariant: both finite, `0.0 <= inner < outer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyThresholds {
    /// At or below this distance a pixel becomes fully transparent.
    pub inner: f32,
    /// At or above this distance a pixel stays fully opaque.
    pub outer: f32,
}

impl KeyThresholds {
    /// Narrow thresholds for quick preview passes.
    pub const CONSERVATIVE: Self = Self {
        inner: 40.0,
        outer: 80.0,
    };

    /// Wide thresholds for the final pass; remove stronger spill on hair
    /// and fabric edges.
    pub const AGGRESSIVE: Self = Self {
        inner: 60.0,
        outer: 120.0,
    };

    /// Distance halfway between the two thresholds.
    #[must_use]
    pub fn midpoint(self) -> f32 {
        (self.inner + self.outer) / 2.0
    }

    /// Check the threshold invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming `which` if a
    /// threshold is not finite, negative, or `inner >= outer`.
    pub fn validate(self, which: &str) -> Result<(), PipelineError> {
        if !self.inner.is_finite() || !self.outer.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "{which} thresholds must be finite"
            )));
        }
        if self.inner < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "{which} inner threshold must not be negative, got {}",
                self.inner
            )));
        }
        if self.inner >= self.outer {
            return Err(PipelineError::InvalidConfig(format!(
                "{which} inner threshold {} must be below outer threshold {}",
                self.inner, self.outer
            )));
        }
        Ok(())
    }
}

/// Key color and threshold settings for extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaKeyConfig {
    /// Background color to remove, as `[r, g, b]`.
    pub key: [u8; 3],
    /// Thresholds used when `aggressive` is `false`.
    pub conservative: KeyThresholds,
    /// Thresholds used when `aggressive` is `true`.
    pub aggressive: KeyThresholds,
}

impl Default for ChromaKeyConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY,
            conservative: KeyThresholds::CONSERVATIVE,
            aggressive: KeyThresholds::AGGRESSIVE,
        }
    }
}

impl ChromaKeyConfig {
    /// The thresholds for the requested mode.
    #[must_use]
    pub const fn thresholds(&self, aggressive: bool) -> KeyThresholds {
        if aggressive {
            self.aggressive
        } else {
            self.conservative
        }
    }

    /// Check that both threshold pairs are valid and that the aggressive
    /// pair is at least as wide as the conservative one on both ends.
    ///
    /// The second condition guarantees that aggressive keying never
    /// keeps a pixel more opaque than conservative keying would.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated invariant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.conservative.validate("conservative")?;
        self.aggressive.validate("aggressive")?;
        if self.aggressive.inner < self.conservative.inner
            || self.aggressive.outer < self.conservative.outer
        {
            return Err(PipelineError::InvalidConfig(
                "aggressive thresholds must not be narrower than conservative thresholds"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Weighted Euclidean distance between `rgb` and `key`.
#[must_use]
pub fn key_distance(rgb: [u8; 3], key: [u8; 3]) -> f32 {
    let sum: f32 = rgb
        .iter()
        .zip(key)
        .zip(CHANNEL_WEIGHTS)
        .map(|((&c, k), w)| {
            let d = f32::from(c) - f32::from(k);
            w * d * d
        })
        .sum();
    (sum / WEIGHT_SUM).sqrt()
}

/// Alpha for a pixel at `distance` from the key.
///
/// 0 at or below `inner`, 255 at or above `outer`, linear in between
/// (rounded to nearest).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn alpha_for_distance(distance: f32, thresholds: KeyThresholds) -> u8 {
    if distance <= thresholds.inner {
        return 0;
    }
    if distance >= thresholds.outer {
        return 255;
    }
    let t = (distance - thresholds.inner) / (thresholds.outer - thresholds.inner);
    (t * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Index of the key's strongest channel (green for the default key).
fn dominant_channel(key: [u8; 3]) -> usize {
    let mut best = 0;
    for c in 1..3 {
        if key[c] > key[best] {
            best = c;
        }
    }
    best
}

/// Pull the dominant channel down to the mean of the other two.
///
/// Only applies while the channel is above that mean and not above the
/// key's own value, so the pixel only ever moves away from the key.
#[allow(clippy::cast_possible_truncation)]
fn suppress_spill(rgb: &mut [u8], dominant: usize, key_level: u8) {
    let (a, b) = match dominant {
        0 => (rgb[1], rgb[2]),
        1 => (rgb[0], rgb[2]),
        _ => (rgb[0], rgb[1]),
    };
    // Mean of two u8 values fits in u8.
    let mean = ((u16::from(a) + u16::from(b)) / 2) as u8;
    let level = rgb[dominant];
    if level > mean && level <= key_level {
        rgb[dominant] = mean;
    }
}

/// Key one RGBA pixel in place.
///
/// Only the pixel's color decides whether it is background or fringe.
/// Incoming alpha caps the result but never marks a pixel as fringe, so
/// a sheet without the key color passes through byte for byte.
fn key_pixel(pixel: &mut [u8], key: [u8; 3], thresholds: KeyThresholds, dominant: usize) {
    let distance = key_distance([pixel[0], pixel[1], pixel[2]], key);
    let keyed = alpha_for_distance(distance, thresholds);
    match keyed {
        0 => pixel.copy_from_slice(&[0, 0, 0, 0]),
        255 => {}
        _ => {
            suppress_spill(&mut pixel[..3], dominant, key[dominant]);
            // Never more opaque than the input.
            pixel[3] = keyed.min(pixel[3]);
        }
    }
}

/// Remove the default green key from `image`.
///
/// `aggressive` selects [`KeyThresholds::AGGRESSIVE`] (final pass)
/// over [`KeyThresholds::CONSERVATIVE`] (preview pass). The returned
/// image has the same dimensions; the input is not modified.
///
/// An image with no key-colored pixels comes back unchanged.
#[must_use = "returns the keyed image"]
pub fn extract(image: &RasterImage, aggressive: bool) -> RasterImage {
    extract_with(image, &ChromaKeyConfig::default(), aggressive)
}

/// Remove `config.key` from `image` using the thresholds for the
/// requested mode.
///
/// `config` is assumed valid (see [`ChromaKeyConfig::validate`]).
#[must_use = "returns the keyed image"]
pub fn extract_with(image: &RasterImage, config: &ChromaKeyConfig, aggressive: bool) -> RasterImage {
    let thresholds = config.thresholds(aggressive);
    let key = config.key;
    let dominant = dominant_channel(key);

    let mut keyed = image.clone();
    keyed
        .par_chunks_exact_mut(4)
        .for_each(|pixel| key_pixel(pixel, key, thresholds, dominant));

    if log::log_enabled!(log::Level::Debug) {
        let coverage = alpha_coverage(&keyed);
        log::debug!(
            "chroma key {:?} on {} (inner={:.1} outer={:.1}): {} transparent, {} partial, {} opaque",
            key,
            Dimensions::of(image),
            thresholds.inner,
            thresholds.outer,
            coverage.transparent,
            coverage.partial,
            coverage.opaque,
        );
    }

    keyed
}

/// Pixel counts per alpha class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlphaCoverage {
    /// Pixels with alpha 0.
    pub transparent: u64,
    /// Pixels with alpha strictly between 0 and 255.
    pub partial: u64,
    /// Pixels with alpha 255.
    pub opaque: u64,
}

impl AlphaCoverage {
    /// Total pixels counted.
    #[must_use]
    pub const fn total(self) -> u64 {
        self.transparent + self.partial + self.opaque
    }

    /// Fraction of pixels that are fully transparent (0.0 for an empty
    /// image).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn background_fraction(self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.transparent as f64 / total as f64
        }
    }
}

/// Count transparent, partial, and opaque pixels in `image`.
#[must_use]
pub fn alpha_coverage(image: &RasterImage) -> AlphaCoverage {
    image
        .pixels()
        .fold(AlphaCoverage::default(), |mut acc, p| {
            match p.0[3] {
                0 => acc.transparent += 1,
                255 => acc.opaque += 1,
                _ => acc.partial += 1,
            }
            acc
        })
}
