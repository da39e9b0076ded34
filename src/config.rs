//! Decoder and capture configuration
//!
//! Serde-derived configuration types with the documented defaults. Callers
//! embedding the decoder can deserialize these from their own config files;
//! the core never reads configuration from disk itself.

use serde::{Deserialize, Serialize};

/// Configuration for the offline batch decoder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Sample rate of the amplitude sequence in Hz
    pub sample_rate: u32,
    /// Preset binarization threshold. When `None`, an adaptive threshold
    /// (75th percentile of the RMS envelope x 0.7) is computed per decode.
    pub threshold: Option<f32>,
    /// Whether to refine the timing model via density-peak calibration
    /// from the observed tone durations before classification
    pub calibrate: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            threshold: None,
            calibrate: true,
        }
    }
}

/// Configuration for the live capture path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Samples per analysis frame (one binary tone decision per frame)
    pub frame_size: usize,
    /// Tone threshold as a multiple of the measured noise floor
    pub threshold_factor: f32,
    /// Duration of the background-noise measurement phase in seconds
    pub noise_window_secs: f64,
    /// Timeout for the unit-time calibration phase in seconds
    pub unit_timeout_secs: f64,
    /// Minimum number of valid short-tone samples for a measured unit time
    pub min_unit_samples: usize,
    /// Target number of short-tone samples before ending calibration early
    pub target_unit_samples: usize,
    /// Smallest plausible unit time in seconds (measured units are floored here)
    pub min_unit_secs: f64,
    /// Unit time used when calibration falls short
    pub fallback_unit_secs: f64,
    /// Number of recent frame decisions in the majority-smoothing window
    /// (0 disables smoothing)
    pub smoothing_frames: usize,
    /// Fraction of the smoothing window that must be above threshold
    /// for the tone state to be asserted
    pub smoothing_ratio: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_size: 1024,
            threshold_factor: 2.5,
            noise_window_secs: 3.0,
            unit_timeout_secs: 10.0,
            min_unit_samples: 3,
            target_unit_samples: 5,
            min_unit_secs: 0.05,
            fallback_unit_secs: 0.1,
            smoothing_frames: 20,
            smoothing_ratio: 0.7,
        }
    }
}

impl CaptureConfig {
    /// Duration of one analysis frame in seconds
    pub fn frame_period(&self) -> f64 {
        self.frame_size as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_defaults() {
        let config = DecoderConfig::default();
        assert_eq!(config.sample_rate, 8000);
        assert!(config.threshold.is_none());
        assert!(config.calibrate);
    }

    #[test]
    fn test_capture_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.threshold_factor, 2.5);
        assert_eq!(config.noise_window_secs, 3.0);
        assert_eq!(config.smoothing_frames, 20);
    }

    #[test]
    fn test_frame_period() {
        let config = CaptureConfig {
            sample_rate: 8000,
            frame_size: 800,
            ..Default::default()
        };
        assert!((config.frame_period() - 0.1).abs() < 1e-12);
    }
}
