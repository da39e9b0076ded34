//! Symbol and gap classification strategies
//!
//! Labels each tone run as dot or dash and each silence run as element,
//! character, or word gap. The offline and online paths use different
//! numeric strategies on the same problem, so both live behind one
//! [`ClassifyStrategy`] trait and share a single assembler:
//! - [`ZScoreClassifier`]: z-scores against the timing model's means and
//!   standard deviations (offline batch path)
//! - [`UnitTimeClassifier`]: direct multiples of a calibrated unit time with
//!   a deliberate dead zone between dot and dash (online live path)

use crate::audio::timing::TimingModel;

/// Classification of a tone run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    /// Render as the Morse code character
    pub fn as_char(self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
        }
    }
}

/// Classification of a silence run
///
/// `None` means the gap is too short to carry meaning and is absorbed into
/// intra-character spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapClass {
    Element,
    Char,
    Word,
    None,
}

/// Duration classification strategy shared by the batch and streaming
/// assemblers
pub trait ClassifyStrategy {
    /// Classify a tone run. `None` marks a dead-zone duration for which no
    /// symbol is emitted; this is deliberate, not an error.
    fn classify_tone(&self, duration: f64) -> Option<Symbol>;

    /// Classify a silence run. The highest-priority matching category wins:
    /// word over char over element.
    fn classify_gap(&self, duration: f64) -> GapClass;
}

/// Z-score classifier for the offline batch path
#[derive(Debug, Clone)]
pub struct ZScoreClassifier {
    model: TimingModel,
}

impl ZScoreClassifier {
    /// Create a classifier over a frozen timing model snapshot
    pub fn new(model: TimingModel) -> Self {
        Self { model }
    }

    /// The timing model snapshot in use
    pub fn model(&self) -> &TimingModel {
        &self.model
    }
}

impl ClassifyStrategy for ZScoreClassifier {
    fn classify_tone(&self, duration: f64) -> Option<Symbol> {
        let z_dit = (duration - self.model.dit.mean).abs() / self.model.dit.std;
        let z_dah = (duration - self.model.dah.mean).abs() / self.model.dah.std;
        Some(if z_dah < z_dit {
            Symbol::Dash
        } else {
            Symbol::Dot
        })
    }

    fn classify_gap(&self, duration: f64) -> GapClass {
        // Inclusive thresholds: a gap exactly at a boundary takes the
        // higher category
        if duration >= self.model.word_gap.mean * 0.8 {
            GapClass::Word
        } else if duration >= self.model.char_gap.mean * 0.7 {
            GapClass::Char
        } else if duration >= self.model.element_gap.mean * 1.2 {
            GapClass::Element
        } else {
            GapClass::None
        }
    }
}

/// Unit-time classifier for the online live path
///
/// Tones shorter than 1.2x the unit are dots, tones at or above 2.5x are
/// dashes, and durations strictly between are dropped as noise. Gaps above
/// 7x the unit are word boundaries, above 3x character boundaries.
#[derive(Debug, Clone, Copy)]
pub struct UnitTimeClassifier {
    unit: f64,
}

impl UnitTimeClassifier {
    /// Create a classifier from a calibrated unit time in seconds
    pub fn new(unit: f64) -> Self {
        Self { unit }
    }

    /// The unit time in use
    pub fn unit(&self) -> f64 {
        self.unit
    }
}

impl ClassifyStrategy for UnitTimeClassifier {
    fn classify_tone(&self, duration: f64) -> Option<Symbol> {
        if duration < 1.2 * self.unit {
            Some(Symbol::Dot)
        } else if duration >= 2.5 * self.unit {
            Some(Symbol::Dash)
        } else {
            // Dead zone between dot and dash; emit nothing
            None
        }
    }

    fn classify_gap(&self, duration: f64) -> GapClass {
        if duration > 7.0 * self.unit {
            GapClass::Word
        } else if duration > 3.0 * self.unit {
            GapClass::Char
        } else {
            GapClass::None
        }
    }
}
