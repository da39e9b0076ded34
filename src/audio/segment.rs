//! Run-length segmentation
//!
//! Converts the binary tone-presence sequence into an ordered sequence of
//! maximal constant-state runs with durations in seconds. Consecutive runs
//! always alternate state and together cover the full input.

/// A maximal run of consecutive identical tone-presence samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationRun {
    /// Whether the run is tone (true) or silence (false)
    pub tone: bool,
    /// Run duration in seconds (sample count x sample period), always positive
    pub duration: f64,
}

/// Segment a binary sequence into alternating duration runs.
///
/// The final partial run at the end of input is included, so run durations
/// sum to the total input duration within one sample period of rounding.
/// An all-silent or all-tone input yields a single degenerate run.
pub fn segment(binary: &[bool], sample_rate: u32) -> Vec<DurationRun> {
    if binary.is_empty() {
        return Vec::new();
    }

    let period = 1.0 / sample_rate as f64;
    let mut runs = Vec::new();
    let mut state = binary[0];
    let mut count = 1usize;

    for &b in &binary[1..] {
        if b == state {
            count += 1;
        } else {
            runs.push(DurationRun {
                tone: state,
                duration: count as f64 * period,
            });
            state = b;
            count = 1;
        }
    }
    runs.push(DurationRun {
        tone: state,
        duration: count as f64 * period,
    });

    runs
}
