//! E2E tests for the offline decoding pipeline
//!
//! Synthesizes keyed sine waves from known text and verifies the full
//! envelope -> segmentation -> calibration -> classification -> assembly
//! pipeline reproduces the source text.

use morsedec::{DecoderConfig, MorseDecoder};

const SAMPLE_RATE: u32 = 8000;
const UNIT_SECS: f64 = 0.06;
const TONE_HZ: f32 = 600.0;
const AMPLITUDE: f32 = 0.8;

fn push_tone(samples: &mut Vec<f32>, units: f64) {
    let n = (units * UNIT_SECS * SAMPLE_RATE as f64).round() as usize;
    let start = samples.len();
    for i in 0..n {
        let t = (start + i) as f32 / SAMPLE_RATE as f32;
        samples.push(AMPLITUDE * (2.0 * std::f32::consts::PI * TONE_HZ * t).sin());
    }
}

fn push_silence(samples: &mut Vec<f32>, units: f64) {
    let n = (units * UNIT_SECS * SAMPLE_RATE as f64).round() as usize;
    samples.extend(std::iter::repeat(0.0).take(n));
}

/// Key the given text as a sine wave with standard Morse timing:
/// dit 1 unit, dah 3, element gap 1, character gap 3, word gap 7.
fn keyed_wave(text: &str) -> Vec<f32> {
    let morse = morsedec::morse::text_to_morse(text);
    let mut samples = Vec::new();
    push_silence(&mut samples, 5.0);

    let mut prev_was_code = false;
    for token in morse.split(' ') {
        if token == "/" {
            push_silence(&mut samples, 7.0);
            prev_was_code = false;
            continue;
        }
        if prev_was_code {
            push_silence(&mut samples, 3.0);
        }
        for (i, symbol) in token.chars().enumerate() {
            if i > 0 {
                push_silence(&mut samples, 1.0);
            }
            push_tone(&mut samples, if symbol == '-' { 3.0 } else { 1.0 });
        }
        prev_was_code = true;
    }

    push_silence(&mut samples, 5.0);
    samples
}

/// A synthesized SOS must decode exactly, with zero unresolved characters
#[test]
fn test_decode_sos() {
    let decoder = MorseDecoder::new(DecoderConfig::default());
    let text = decoder.decode(&keyed_wave("SOS"));
    assert_eq!(text, "SOS");
}

/// A multi-word phrase must decode with the word boundary preserved
#[test]
fn test_decode_phrase_with_word_gap() {
    let decoder = MorseDecoder::new(DecoderConfig::default());
    let text = decoder.decode(&keyed_wave("HELLO WORLD"));
    assert_eq!(text, "HELLO WORLD");
}

/// Digits and punctuation must survive the acoustic round trip
#[test]
fn test_decode_mixed_alphabet() {
    let decoder = MorseDecoder::new(DecoderConfig::default());
    let text = decoder.decode(&keyed_wave("CQ DE 73"));
    assert_eq!(text, "CQ DE 73");
}

/// Decoding must also work without density-peak calibration
#[test]
fn test_decode_without_calibration() {
    let config = DecoderConfig {
        calibrate: false,
        ..Default::default()
    };
    let decoder = MorseDecoder::new(config);
    assert_eq!(decoder.decode(&keyed_wave("SOS")), "SOS");
}

/// A caller-preset threshold must bypass the adaptive estimate
#[test]
fn test_decode_preset_threshold() {
    let config = DecoderConfig {
        threshold: Some(0.3),
        ..Default::default()
    };
    let decoder = MorseDecoder::new(config);
    assert_eq!(decoder.decode(&keyed_wave("SOS")), "SOS");
}

/// Re-running decode on the same input must produce identical output:
/// calibration is frozen per pass and leaves no hidden mutable state
#[test]
fn test_decode_idempotent() {
    let decoder = MorseDecoder::new(DecoderConfig::default());
    let wave = keyed_wave("HELLO WORLD");
    let first = decoder.decode(&wave);
    let second = decoder.decode(&wave);
    assert_eq!(first, second);
    assert_eq!(first, "HELLO WORLD");
}

/// The diagnostic hook must expose the raw run sequence: alternating states
/// covering the full input, one tone run per keyed symbol
#[test]
fn test_duration_runs_diagnostic() {
    let decoder = MorseDecoder::new(DecoderConfig::default());
    let wave = keyed_wave("SOS");
    let runs = decoder.duration_runs(&wave);

    for pair in runs.windows(2) {
        assert_ne!(pair[0].tone, pair[1].tone, "Runs must alternate state");
    }

    let tone_runs = runs.iter().filter(|r| r.tone).count();
    assert_eq!(tone_runs, 9, "SOS keys nine tones");

    let total: f64 = runs.iter().map(|r| r.duration).sum();
    let expected = wave.len() as f64 / SAMPLE_RATE as f64;
    assert!(
        (total - expected).abs() <= 1.0 / SAMPLE_RATE as f64 + 1e-9,
        "Run durations must sum to the input duration, got {} vs {}",
        total,
        expected
    );
}

/// Degenerate input decodes to empty text rather than failing
#[test]
fn test_decode_degenerate_inputs() {
    let decoder = MorseDecoder::new(DecoderConfig::default());
    assert_eq!(decoder.decode(&[]), "");
    assert_eq!(decoder.decode(&vec![0.0; 16000]), "");

    // All-tone input: a single degenerate run, no panic
    let all_tone: Vec<f32> = (0..16000)
        .map(|i| AMPLITUDE * (2.0 * std::f32::consts::PI * TONE_HZ * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();
    let _ = decoder.decode(&all_tone);
}

/// Noise spikes shorter than the median filter kernel must not key symbols
#[test]
fn test_single_sample_spikes_removed() {
    let decoder = MorseDecoder::new(DecoderConfig {
        threshold: Some(0.1),
        ..Default::default()
    });
    let mut samples = vec![0.0f32; 16000];
    samples[4000] = 1.0;
    samples[9000] = -1.0;
    // An isolated sample cannot hold the envelope above threshold through
    // the median filter long enough to key a tone worth a symbol
    let runs = decoder.duration_runs(&samples);
    let tone_time: f64 = runs.iter().filter(|r| r.tone).map(|r| r.duration).sum();
    assert!(
        tone_time < 0.02,
        "Isolated spikes must not produce tone runs, got {}s of tone",
        tone_time
    );
}
