//! Soft takeover for externally driven controls
//!
//! A hardware knob and the logical value it drives drift apart whenever the
//! value changes without the operator (effect swap, preset load, automation).
//! The tracker remembers the last physical position it saw and suppresses a
//! write that jumps away from it, so the next touch can take over cleanly.

use tracing::trace;

/// Three MIDI steps of slack on a 7-bit controller
pub const DEFAULT_TAKEOVER_THRESHOLD: f64 = 3.0 / 128.0;

/// Per-control jump detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftTakeover {
    threshold: f64,
    last_physical: f64,
    primed: bool,
}

impl Default for SoftTakeover {
    fn default() -> Self {
        Self::new(DEFAULT_TAKEOVER_THRESHOLD)
    }
}

impl SoftTakeover {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.abs(),
            last_physical: 0.0,
            primed: false,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Last physical value seen, if any
    pub fn last_physical(&self) -> Option<f64> {
        self.primed.then_some(self.last_physical)
    }

    /// Decide whether `incoming` should be dropped.
    ///
    /// The first value after construction or [`reset`](Self::reset) is
    /// always accepted. The tracker moves to `incoming` either way.
    pub fn ignore(&mut self, incoming: f64) -> bool {
        let ignore = self.primed && (incoming - self.last_physical).abs() > self.threshold;
        if ignore {
            trace!(
                incoming,
                last_physical = self.last_physical,
                threshold = self.threshold,
                "Soft takeover suppressed jump"
            );
        }
        self.sync(incoming);
        ignore
    }

    /// Prime the tracker at `value` without deciding anything
    pub fn sync(&mut self, value: f64) {
        self.last_physical = value;
        self.primed = true;
    }

    /// Forget the physical position; the next value establishes a new baseline
    pub fn reset(&mut self) {
        self.primed = false;
        self.last_physical = 0.0;
    }
}
