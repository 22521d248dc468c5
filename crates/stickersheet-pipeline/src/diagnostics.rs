//! Pipeline diagnostics: timing and counts for each stage.
//!
//! Time is read through the [`Clock`] trait so hosts can supply their
//! own source; [`SystemClock`] uses the `web-time` crate, which maps to
//! `performance.now()` on WASM and `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chroma::AlphaCoverage;
use crate::pipeline::Pipeline;
use crate::types::{Dimensions, GridLayout, PipelineConfig, PipelineError, RasterImage, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for diagnostics.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by `web_time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = web_time::Instant;

    fn now(&self) -> web_time::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &web_time::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from one sheet-splitting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 1: chroma-key extraction.
    pub extract: StageDiagnostics,
    /// Stage 2: grid slicing.
    pub slice: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Chroma-key extraction metrics.
    Extract {
        /// Whether the wide thresholds were used.
        aggressive: bool,
        /// Inner threshold used.
        inner: f32,
        /// Outer threshold used.
        outer: f32,
        /// Alpha classes of the keyed sheet.
        coverage: AlphaCoverage,
    },
    /// Grid slicing metrics.
    Slice {
        /// Grid used.
        layout: GridLayout,
        /// Size of each sticker.
        cell: Dimensions,
        /// Stickers produced.
        slot_count: usize,
    },
    /// Grid composition metrics.
    Compose {
        /// Grid used.
        layout: GridLayout,
        /// Size of the composed sheet.
        sheet: Dimensions,
        /// Slots placed.
        slot_count: usize,
    },
}

/// High-level summary for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source sheet width in pixels.
    pub image_width: u32,
    /// Source sheet height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Stickers produced.
    pub slot_count: usize,
    /// Fraction of the keyed sheet that is fully transparent.
    pub background_fraction: f64,
}

/// Run the splitting pipeline, timing every stage with `clock`.
///
/// # Errors
///
/// Same as [`crate::process_staged`].
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();

    let start = clock.now();
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let dimensions = Dimensions::of(decoded.original());
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: dimensions.width,
            height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
        },
    };

    let start = clock.now();
    let extracted = decoded.extract();
    let thresholds = config.chroma.thresholds(config.aggressive);
    let coverage = extracted.coverage();
    let extract = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Extract {
            aggressive: config.aggressive,
            inner: thresholds.inner,
            outer: thresholds.outer,
            coverage,
        },
    };

    let start = clock.now();
    let sliced = extracted.slice()?;
    let slot_count = sliced.slots().len();
    let cell = sliced
        .slots()
        .first()
        .map_or(Dimensions::new(0, 0), |slot| Dimensions::of(&slot.image));
    let slice = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Slice {
            layout: config.layout,
            cell,
            slot_count,
        },
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        extract,
        slice,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            slot_count,
            background_fraction: coverage.background_fraction(),
        },
    };

    Ok((sliced.into_result(), diagnostics))
}

/// Compose `slots` into a sheet, timing the operation with `clock`.
///
/// # Errors
///
/// Same as [`crate::compose::compose`].
pub fn compose_with_diagnostics<C: Clock>(
    slots: &[RasterImage],
    layout: GridLayout,
    clock: &C,
) -> Result<(RasterImage, StageDiagnostics), PipelineError> {
    let start = clock.now();
    let sheet = crate::compose::compose(slots, layout)?;
    let diagnostics = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Compose {
            layout,
            sheet: Dimensions::of(&sheet),
            slot_count: slots.len(),
        },
    };
    Ok((sheet, diagnostics))
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Sheet: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Extract", &self.extract),
            ("Slice", &self.slice),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "{name:<16} {ms:>8.3}ms {pct:>9.1}%  {}",
                format_metrics(&diag.metrics)
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Stickers: {}  |  Background: {:.1}%",
            self.summary.slot_count,
            self.summary.background_fraction * 100.0,
        ));

        lines.join("\n")
    }
}

impl StageDiagnostics {
    /// One-line summary of this stage.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{:.3}ms  {}",
            duration_ms(self.duration),
            format_metrics(&self.metrics)
        )
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Extract {
            aggressive,
            inner,
            outer,
            coverage,
        } => {
            let mode = if *aggressive { "aggressive" } else { "conservative" };
            format!(
                "{mode} inner={inner:.1} outer={outer:.1} transparent={} partial={} opaque={}",
                coverage.transparent, coverage.partial, coverage.opaque,
            )
        }
        StageMetrics::Slice {
            layout,
            cell,
            slot_count,
        } => format!("{layout} grid, {slot_count} stickers of {cell}"),
        StageMetrics::Compose {
            layout,
            sheet,
            slot_count,
        } => format!("{slot_count} slots on a {layout} grid -> {sheet}"),
    }
}
