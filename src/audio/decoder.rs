//! Offline batch decoder
//!
//! Runs the full pipeline over a finite mono amplitude slice:
//! envelope -> binarize -> segment -> (optional) density-peak calibration ->
//! z-score classification -> assembly -> Morse table resolution.
//!
//! Decoding is single-threaded, synchronous, and deterministic: the same
//! amplitude sequence and timing model always produce the same text.

use crate::audio::assembler::{assemble, Token};
use crate::audio::classify::ZScoreClassifier;
use crate::audio::envelope;
use crate::audio::segment::{segment, DurationRun};
use crate::audio::timing::{TimingModel, TimingModelBuilder};
use crate::config::DecoderConfig;
use crate::morse;

/// Offline Morse decoder over a frozen timing model
///
/// # Example
/// ```no_run
/// use morsedec::{DecoderConfig, MorseDecoder};
///
/// let decoder = MorseDecoder::new(DecoderConfig::default());
/// let samples: Vec<f32> = vec![]; // mono amplitude slice from a collaborator
/// let text = decoder.decode(&samples);
/// ```
pub struct MorseDecoder {
    config: DecoderConfig,
    model: TimingModel,
}

impl MorseDecoder {
    /// Create a decoder with the default timing model
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            model: TimingModel::default(),
        }
    }

    /// Create a decoder over a specific frozen timing model
    pub fn with_model(config: DecoderConfig, model: TimingModel) -> Self {
        Self { config, model }
    }

    /// Get the configured sample rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Get the base timing model (before any per-decode calibration)
    pub fn model(&self) -> &TimingModel {
        &self.model
    }

    /// Diagnostic hook: the raw duration-run sequence for an amplitude slice.
    ///
    /// Exposes the segmentation result without requiring any visualization
    /// collaborator to run.
    pub fn duration_runs(&self, samples: &[f32]) -> Vec<DurationRun> {
        let binary = envelope::binarize(samples, self.config.sample_rate, self.config.threshold);
        segment(&binary, self.config.sample_rate)
    }

    /// Decode an amplitude slice into text.
    ///
    /// Degenerate input (empty, all-silent, all-tone) decodes to an empty or
    /// near-empty string rather than failing. Unresolvable codes render as
    /// `'?'`; word boundaries render as single spaces.
    pub fn decode(&self, samples: &[f32]) -> String {
        let runs = self.duration_runs(samples);
        if runs.is_empty() {
            return String::new();
        }

        let tone_durations: Vec<f64> = runs
            .iter()
            .filter(|r| r.tone)
            .map(|r| r.duration)
            .collect();
        tracing::debug!(
            runs = runs.len(),
            tones = tone_durations.len(),
            "Segmented amplitude slice"
        );

        // Calibrate-then-freeze: the refined snapshot lives only for this
        // pass, so repeated decodes stay deterministic
        let model = if self.config.calibrate && !tone_durations.is_empty() {
            TimingModelBuilder::from_model(self.model.clone())
                .calibrate_tones(&tone_durations)
                .freeze()
        } else {
            self.model.clone()
        };

        let classifier = ZScoreClassifier::new(model);
        let tokens = assemble(&runs, &classifier);
        let text = render_tokens(&tokens);
        tracing::info!(chars = text.len(), "Offline decode complete");
        text
    }
}

/// Render assembled tokens to text: codes resolve through the Morse table,
/// word boundaries become spaces, doubled spaces collapse, and the result is
/// trimmed.
fn render_tokens(tokens: &[Token]) -> String {
    let mut text = String::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Code(code) => text.push(morse::decode_code(code)),
            Token::WordBoundary => text.push(' '),
        }
    }
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_input() {
        let decoder = MorseDecoder::new(DecoderConfig::default());
        assert_eq!(decoder.decode(&[]), "");
    }

    #[test]
    fn test_decode_all_silent() {
        let decoder = MorseDecoder::new(DecoderConfig::default());
        let samples = vec![0.0f32; 8000];
        assert_eq!(decoder.decode(&samples), "");
    }

    #[test]
    fn test_duration_runs_degenerate_single_run() {
        let decoder = MorseDecoder::new(DecoderConfig::default());
        let runs = decoder.duration_runs(&vec![0.0f32; 4000]);
        assert_eq!(runs.len(), 1);
        assert!(!runs[0].tone);
    }

    #[test]
    fn test_render_tokens() {
        let tokens = vec![
            Token::Code("...".into()),
            Token::WordBoundary,
            Token::Code("---".into()),
        ];
        assert_eq!(render_tokens(&tokens), "S O");
    }

    #[test]
    fn test_render_unknown_code_placeholder() {
        let tokens = vec![
            Token::Code("...".into()),
            Token::Code(".-.-.-.-".into()),
            Token::Code("...".into()),
        ];
        assert_eq!(render_tokens(&tokens), "S?S");
    }

    #[test]
    fn test_render_collapses_duplicate_spaces() {
        let tokens = vec![
            Token::WordBoundary,
            Token::Code(".".into()),
            Token::WordBoundary,
            Token::WordBoundary,
            Token::Code("-".into()),
        ];
        assert_eq!(render_tokens(&tokens), "E T");
    }
}
