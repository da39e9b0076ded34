//! Symbol assembly state machine
//!
//! Consumes classified duration runs and emits completed character codes and
//! word boundaries. Two drivers share the classification strategies:
//! - [`assemble`]: batch driver over an ordered run sequence; gap durations
//!   accumulate lazily and are classified when the next tone run arrives
//! - [`StreamAssembler`]: event-driven variant for the live path that flushes
//!   immediately on each observed gap

use crate::audio::classify::{ClassifyStrategy, GapClass};
use crate::audio::segment::DurationRun;
use crate::morse;

/// Output token of the batch assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A completed character code (sequence of `.`/`-`)
    Code(String),
    /// A word boundary, rendered as a space in text form
    WordBoundary,
}

/// Assemble an ordered run sequence into character codes and word boundaries.
///
/// Gap runs add to an accumulated gap counter; the accumulated gap is
/// classified lazily when the next tone run arrives. A word gap flushes the
/// pending character and emits a boundary marker, a character gap flushes the
/// pending character, and element/none gaps are absorbed. End of input
/// flushes a non-empty pending character.
pub fn assemble<C: ClassifyStrategy>(runs: &[DurationRun], classifier: &C) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pending = String::new();
    let mut accumulated_gap = 0.0f64;

    for run in runs {
        if run.tone {
            if accumulated_gap > 0.0 {
                match classifier.classify_gap(accumulated_gap) {
                    GapClass::Word => {
                        if !pending.is_empty() {
                            tokens.push(Token::Code(std::mem::take(&mut pending)));
                        }
                        tokens.push(Token::WordBoundary);
                    }
                    GapClass::Char => {
                        if !pending.is_empty() {
                            tokens.push(Token::Code(std::mem::take(&mut pending)));
                        }
                    }
                    GapClass::Element | GapClass::None => {}
                }
                accumulated_gap = 0.0;
            }

            if let Some(symbol) = classifier.classify_tone(run.duration) {
                pending.push(symbol.as_char());
            }
        } else {
            accumulated_gap += run.duration;
        }
    }

    if !pending.is_empty() {
        tokens.push(Token::Code(pending));
    }

    tokens
}

/// Event-driven assembler for the live path
///
/// Owned exclusively by the capture callback. Tone and gap events act
/// immediately: a character-class gap flushes the accumulated symbols into
/// the pending word, and a word-class gap additionally completes the word
/// and hands it to the caller.
#[derive(Debug)]
pub struct StreamAssembler<C: ClassifyStrategy> {
    classifier: C,
    /// Symbols accumulated since the last character flush
    pending_symbols: String,
    /// Resolved characters accumulated since the last word flush
    pending_word: String,
}

impl<C: ClassifyStrategy> StreamAssembler<C> {
    /// Create a streaming assembler over a classification strategy
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            pending_symbols: String::new(),
            pending_word: String::new(),
        }
    }

    /// Handle a completed tone of the given duration.
    ///
    /// Dead-zone durations emit no symbol and leave the state unchanged.
    pub fn on_tone(&mut self, duration: f64) {
        if let Some(symbol) = self.classifier.classify_tone(duration) {
            self.pending_symbols.push(symbol.as_char());
        }
    }

    /// Handle a completed gap of the given duration.
    ///
    /// Returns a finished word when the gap is word-class and a word was
    /// pending.
    pub fn on_gap(&mut self, duration: f64) -> Option<String> {
        match self.classifier.classify_gap(duration) {
            GapClass::Word => {
                self.flush_symbols();
                self.take_word()
            }
            GapClass::Char => {
                self.flush_symbols();
                None
            }
            GapClass::Element | GapClass::None => None,
        }
    }

    /// Flush all remaining state at stream end.
    ///
    /// Returns the final word when anything was pending.
    pub fn finish(&mut self) -> Option<String> {
        self.flush_symbols();
        self.take_word()
    }

    /// Whether any symbols or characters are currently pending
    pub fn has_pending(&self) -> bool {
        !self.pending_symbols.is_empty() || !self.pending_word.is_empty()
    }

    fn flush_symbols(&mut self) {
        if !self.pending_symbols.is_empty() {
            let code = std::mem::take(&mut self.pending_symbols);
            self.pending_word.push(morse::decode_code(&code));
        }
    }

    fn take_word(&mut self) -> Option<String> {
        if self.pending_word.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending_word))
        }
    }
}
