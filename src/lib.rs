//! Morsedec - Morse code signal decoder
//!
//! This library converts raw acoustic amplitude signals into text. It detects
//! tone presence via envelope extraction and adaptive thresholding, classifies
//! tone and silence durations against a timing model, and assembles the
//! classified symbols into characters and words.
//!
//! Two decoding paths are provided:
//! - Offline: a finite mono amplitude slice decoded in one batch pass
//!   ([`MorseDecoder`])
//! - Online: a live capture stream decoded frame by frame in the audio
//!   callback ([`CaptureEngine`])
//!
//! Audio file decoding, resampling, and visualization are out of scope;
//! collaborators hand this crate either a mono sample slice at a known rate
//! or a live stream of PCM frames.

pub mod audio;
pub mod config;
pub mod morse;

pub use audio::capture::{CaptureEngine, CaptureError, DecodedWord};
pub use audio::decoder::MorseDecoder;
pub use audio::segment::DurationRun;
pub use audio::timing::{TimingModel, TimingModelBuilder, UnitCalibration};
pub use config::{CaptureConfig, DecoderConfig};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate for offline decoding (Morse tones need little bandwidth)
pub const DEFAULT_SAMPLE_RATE: u32 = 8000;

/// Target frequency resolution of the moving RMS window in Hz.
///
/// The envelope window length is `round(sample_rate / RMS_RESOLUTION_HZ)`,
/// sized so the window matches typical Morse element rates.
pub const RMS_RESOLUTION_HZ: f64 = 187.5;
