//! Envelope extraction and binarization
//!
//! Converts a raw amplitude sequence into a binary tone-presence sequence:
//! a centered moving RMS estimates the envelope, an adaptive (or preset)
//! threshold binarizes it, and a short median filter removes isolated
//! single-sample flips caused by noise.
//!
//! The live path uses [`FrameBinarizer`] instead: one RMS decision per
//! fixed-size frame against a measured noise floor, optionally smoothed by
//! a trailing-majority filter to suppress flicker.

use std::collections::VecDeque;

/// Fraction of the 75th RMS percentile used as the adaptive threshold
const ADAPTIVE_THRESHOLD_FACTOR: f32 = 0.7;

/// Kernel length of the de-noising median filter
const MEDIAN_KERNEL: usize = 5;

/// Compute the RMS of a single frame of samples.
///
/// Returns 0.0 for an empty frame.
pub fn frame_rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / frame.len() as f64).sqrt() as f32
}

/// Compute a centered moving-RMS envelope over the amplitude sequence.
///
/// The window length is `round(sample_rate / RMS_RESOLUTION_HZ)` so the
/// window's frequency resolution matches typical Morse element rates.
/// Edges are zero-padded, giving a same-length output. When the signal is
/// shorter than the window, the window falls back to the signal length.
pub fn rms_envelope(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut window = (sample_rate as f64 / crate::RMS_RESOLUTION_HZ).round() as usize;
    window = window.max(1).min(samples.len());

    // Prefix sums of squared samples for O(n) windowed energy
    let mut prefix = Vec::with_capacity(samples.len() + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in samples {
        acc += (s as f64) * (s as f64);
        prefix.push(acc);
    }

    let half = window / 2;
    let mut rms = Vec::with_capacity(samples.len());
    for i in 0..samples.len() {
        let hi = (i + half + 1).min(samples.len());
        let lo = (i + half + 1).saturating_sub(window);
        let energy = prefix[hi] - prefix[lo];
        // Divide by the full window length: out-of-range samples count as zero
        rms.push((energy / window as f64).sqrt() as f32);
    }
    rms
}

/// Interpolated percentile of a sample set (0.0 to 100.0).
///
/// Uses linear interpolation between the two nearest ranks. Returns 0.0 for
/// an empty input.
pub fn percentile(values: &[f32], pct: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (pct as f64 / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Compute the adaptive binarization threshold from an RMS envelope:
/// 75th percentile scaled by 0.7.
pub fn adaptive_threshold(rms: &[f32]) -> f32 {
    percentile(rms, 75.0) * ADAPTIVE_THRESHOLD_FACTOR
}

/// Apply a centered boolean median filter of the given kernel length.
///
/// Edges are false-padded. A kernel of 5 removes isolated single-sample
/// flips while preserving genuine runs.
pub fn median_filter(bits: &[bool], kernel: usize) -> Vec<bool> {
    if bits.is_empty() || kernel <= 1 {
        return bits.to_vec();
    }
    let half = kernel / 2;
    let mut filtered = Vec::with_capacity(bits.len());
    for i in 0..bits.len() {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(bits.len());
        let ones = bits[lo..hi].iter().filter(|&&b| b).count();
        // Out-of-range positions count as false
        filtered.push(ones * 2 > kernel);
    }
    filtered
}

/// Convert an amplitude sequence into a de-noised binary tone-presence
/// sequence of the same length.
///
/// When `preset_threshold` is `None`, the adaptive threshold is computed
/// from the RMS envelope.
pub fn binarize(samples: &[f32], sample_rate: u32, preset_threshold: Option<f32>) -> Vec<bool> {
    let rms = rms_envelope(samples, sample_rate);
    let threshold = preset_threshold.unwrap_or_else(|| adaptive_threshold(&rms));
    let binary: Vec<bool> = rms.iter().map(|&v| v > threshold).collect();
    median_filter(&binary, MEDIAN_KERNEL)
}

/// Per-frame tone binarizer for the live path
///
/// Each fixed-size frame produces one boolean tone decision: frame RMS
/// against `noise_floor x threshold_factor`, smoothed by a trailing-majority
/// vote over the most recent decisions so brief flicker does not toggle the
/// decoded state.
#[derive(Debug)]
pub struct FrameBinarizer {
    /// Measured background noise floor (frame RMS during silence)
    noise_floor: f32,
    /// Tone threshold as a multiple of the noise floor
    threshold_factor: f32,
    /// Recent raw frame decisions (bounded to `window_len`)
    window: VecDeque<bool>,
    /// Smoothing window length; 0 disables smoothing
    window_len: usize,
    /// Fraction of the window that must be above threshold to assert tone
    assert_ratio: f32,
}

impl FrameBinarizer {
    /// Create a binarizer with the given noise floor and configuration.
    pub fn new(noise_floor: f32, threshold_factor: f32, window_len: usize, assert_ratio: f32) -> Self {
        Self {
            noise_floor,
            threshold_factor,
            window: VecDeque::with_capacity(window_len),
            window_len,
            assert_ratio,
        }
    }

    /// Current detection threshold (noise floor x factor, with a small floor
    /// to avoid a zero threshold on perfectly silent calibrations).
    pub fn threshold(&self) -> f32 {
        self.noise_floor.max(1e-5) * self.threshold_factor
    }

    /// Process one frame and return the smoothed tone state.
    pub fn process_frame(&mut self, frame: &[f32]) -> bool {
        self.process_rms(frame_rms(frame))
    }

    /// Process a pre-computed frame RMS value and return the smoothed state.
    pub fn process_rms(&mut self, rms: f32) -> bool {
        let raw = rms > self.threshold();
        if self.window_len == 0 {
            return raw;
        }
        if self.window.len() == self.window_len {
            self.window.pop_front();
        }
        self.window.push_back(raw);
        let above = self.window.iter().filter(|&&b| b).count();
        above as f32 > self.assert_ratio * self.window.len() as f32
    }

    /// Reset the smoothing window
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Get the configured noise floor
    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }
}
