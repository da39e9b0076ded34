//! Timing model and calibration
//!
//! Holds the expected durations (mean and standard deviation) of the five
//! Morse timing categories: dit, dah, element gap, character gap, and word
//! gap. The model follows a mutate-then-freeze lifecycle: a
//! [`TimingModelBuilder`] performs at most one calibration per decode
//! session and yields an immutable [`TimingModel`] snapshot consumed by the
//! classifier.
//!
//! Two calibration strategies exist:
//! - Offline density-peak estimation from a batch of observed tone durations
//! - Online unit-time measurement from a known calibration phrase, with a
//!   documented fallback when too few samples arrive in time

/// Number of evaluation points on the density-estimation grid
const KDE_GRID_POINTS: usize = 101;

/// Correction applied to the dit density peak (dit timing shows high dispersion)
const DIT_PEAK_CORRECTION: f64 = 0.85;

/// Correction applied to the dah density peak (dah timing shows low dispersion)
const DAH_PEAK_CORRECTION: f64 = 1.05;

/// Central estimate and dispersion for one timing category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationStats {
    /// Expected duration in seconds
    pub mean: f64,
    /// Standard deviation in seconds
    pub std: f64,
}

/// Timing category with hard plausibility bounds (used for dit and dah)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedStats {
    /// Expected duration in seconds
    pub mean: f64,
    /// Standard deviation in seconds
    pub std: f64,
    /// Shortest plausible duration; observations at or below are discarded
    pub min: f64,
    /// Longest plausible duration; bounds the density-peak search window
    pub max: f64,
}

/// Frozen timing model consumed by the classifier
///
/// Invariant: `dit.mean < dah.mean` and
/// `element_gap.mean < char_gap.mean < word_gap.mean`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingModel {
    pub dit: BoundedStats,
    pub dah: BoundedStats,
    pub element_gap: DurationStats,
    pub char_gap: DurationStats,
    pub word_gap: DurationStats,
}

impl Default for TimingModel {
    /// Default model for ~20 WPM keying: 60 ms unit, 3x dah, 3x character
    /// gap, 7x word gap.
    fn default() -> Self {
        Self {
            dit: BoundedStats {
                mean: 0.06,
                std: 0.02,
                min: 0.045,
                max: 0.075,
            },
            dah: BoundedStats {
                mean: 0.18,
                std: 0.02,
                min: 0.165,
                max: 0.195,
            },
            element_gap: DurationStats {
                mean: 0.06,
                std: 0.01,
            },
            char_gap: DurationStats {
                mean: 0.18,
                std: 0.02,
            },
            word_gap: DurationStats {
                mean: 0.42,
                std: 0.05,
            },
        }
    }
}

/// Builder performing the mutate-then-freeze calibration lifecycle
///
/// Construct from a base model (usually the default), apply at most one
/// calibration pass, then [`freeze`](Self::freeze) into an immutable
/// snapshot. This prevents accidental re-calibration mid-decode.
#[derive(Debug, Clone)]
pub struct TimingModelBuilder {
    model: TimingModel,
}

impl TimingModelBuilder {
    /// Start from the default timing model
    pub fn new() -> Self {
        Self {
            model: TimingModel::default(),
        }
    }

    /// Start from an existing model
    pub fn from_model(model: TimingModel) -> Self {
        Self { model }
    }

    /// Refine the dit and dah means by density-peak estimation from a batch
    /// of observed tone durations.
    ///
    /// Per category: durations at or below the hard minimum are discarded, a
    /// Gaussian kernel density estimate of the remainder is evaluated on a
    /// grid across `[min, max]`, and the peak location is corrected by 0.85
    /// (dit) or 1.05 (dah). A category with no surviving samples keeps its
    /// default mean. Standard deviations are kept unchanged.
    pub fn calibrate_tones(mut self, tone_durations: &[f64]) -> Self {
        let dit = self.model.dit;
        if let Some(peak) = density_peak(tone_durations, dit.min, dit.max) {
            self.model.dit.mean = peak * DIT_PEAK_CORRECTION;
        } else {
            tracing::warn!(
                "No tone durations above dit minimum; keeping default dit mean {:.3}s",
                dit.mean
            );
        }

        let dah = self.model.dah;
        if let Some(peak) = density_peak(tone_durations, dah.min, dah.max) {
            self.model.dah.mean = peak * DAH_PEAK_CORRECTION;
        } else {
            tracing::warn!(
                "No tone durations above dah minimum; keeping default dah mean {:.3}s",
                dah.mean
            );
        }

        tracing::debug!(
            dit_mean = self.model.dit.mean,
            dah_mean = self.model.dah.mean,
            samples = tone_durations.len(),
            "Density-peak calibration applied"
        );
        self
    }

    /// Freeze the model into an immutable snapshot
    pub fn freeze(self) -> TimingModel {
        self.model
    }
}

impl Default for TimingModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the probability-density peak of `durations` within `[min, max]`.
///
/// Durations at or below `min` are discarded first. Returns `None` when no
/// samples survive the filter. The density is a Gaussian KDE with
/// Scott's-rule bandwidth evaluated on a fixed grid.
fn density_peak(durations: &[f64], min: f64, max: f64) -> Option<f64> {
    let valid: Vec<f64> = durations.iter().copied().filter(|&d| d > min).collect();
    if valid.is_empty() {
        return None;
    }

    let n = valid.len() as f64;
    let mean = valid.iter().sum::<f64>() / n;
    let var = valid.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
    // Scott's rule; a degenerate spread still needs a usable kernel width
    let bandwidth = (var.sqrt() * n.powf(-0.2)).max(1e-4);

    let step = (max - min) / (KDE_GRID_POINTS - 1) as f64;
    let mut peak_x = min;
    let mut peak_density = f64::MIN;
    for i in 0..KDE_GRID_POINTS {
        let x = min + i as f64 * step;
        let density: f64 = valid
            .iter()
            .map(|&d| {
                let z = (x - d) / bandwidth;
                (-0.5 * z * z).exp()
            })
            .sum();
        if density > peak_density {
            peak_density = density;
            peak_x = x;
        }
    }
    Some(peak_x)
}

/// Outcome of the online unit-time calibration phase
///
/// Calibration never fails fatally: a shortfall degrades to the default
/// unit time and the branch taken is reported here for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitCalibration {
    /// Unit time measured from the calibration phrase
    Measured(f64),
    /// Too few valid samples arrived before the timeout; default in use
    Fallback(f64),
}

impl UnitCalibration {
    /// The unit time in seconds, whichever branch was taken
    pub fn unit(&self) -> f64 {
        match *self {
            UnitCalibration::Measured(u) | UnitCalibration::Fallback(u) => u,
        }
    }

    /// Whether calibration fell back to the default unit time
    pub fn is_fallback(&self) -> bool {
        matches!(self, UnitCalibration::Fallback(_))
    }
}

/// Derive the unit time from short-tone durations observed during the
/// calibration phrase.
///
/// Durations shorter than `min_unit` are discarded as implausible. With at
/// least `min_count` valid samples the unit is their median, floored at
/// `min_unit`; otherwise the result falls back to `fallback_unit`.
pub fn unit_from_tone_durations(
    durations: &[f64],
    min_count: usize,
    min_unit: f64,
    fallback_unit: f64,
) -> UnitCalibration {
    let mut valid: Vec<f64> = durations.iter().copied().filter(|&d| d >= min_unit).collect();
    if valid.len() < min_count {
        tracing::warn!(
            valid = valid.len(),
            required = min_count,
            "Unit-time calibration shortfall; falling back to {:.2}s",
            fallback_unit
        );
        return UnitCalibration::Fallback(fallback_unit);
    }

    valid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = valid[valid.len() / 2];
    let unit = median.max(min_unit);
    tracing::info!(unit_secs = unit, samples = valid.len(), "Unit time measured");
    UnitCalibration::Measured(unit)
}
