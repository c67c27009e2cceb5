//! Input debounce scanner
//!
//! Samples every input on a fixed tick and requires a run of
//! consecutive differing samples before committing a state change -
//! any sample agreeing with the stable state resets that input's
//! counter, so electrical chatter faster than the debounce window
//! never produces an event.
//!
//! The scanner also owns the startup grace period: `system_ready`
//! stays false for a fixed time after boot so relays and sensors can
//! settle physically before any fault rule is allowed to trip.

use heapless::Vec;

use super::{InputId, InputSnapshot, INPUT_COUNT};
use crate::config::SafetyConfig;

/// One committed input transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputChange {
    pub input: InputId,
    /// The newly committed stable state
    pub state: bool,
}

/// Debounce state for the full input bank
#[derive(Debug, Clone)]
pub struct InputScanner {
    stable: InputSnapshot,
    mismatch_count: [u8; INPUT_COUNT],
    debounce_samples: u8,
    startup_grace_ms: u32,
    start_ms: u32,
    system_ready: bool,
}

impl InputScanner {
    /// Create a scanner seeded with the first raw read
    ///
    /// Stable states start at the boot-time levels so the first scan
    /// cycles do not report every pulled-up line as a change.
    pub fn new(initial: InputSnapshot, now_ms: u32, config: &SafetyConfig) -> Self {
        Self {
            stable: initial,
            mismatch_count: [0; INPUT_COUNT],
            debounce_samples: config.debounce_samples,
            startup_grace_ms: config.startup_grace_ms,
            start_ms: now_ms,
            system_ready: false,
        }
    }

    /// Process one raw sample of every input
    ///
    /// Returns the changes committed this tick, at most one per input.
    pub fn scan(&mut self, raw: &InputSnapshot, now_ms: u32) -> Vec<InputChange, INPUT_COUNT> {
        if !self.system_ready && now_ms.wrapping_sub(self.start_ms) >= self.startup_grace_ms {
            self.system_ready = true;
        }

        let mut changes = Vec::new();
        for id in InputId::ALL {
            let i = id.index();
            let sample = raw.get(id);

            if sample != self.stable.get(id) {
                self.mismatch_count[i] += 1;
                if self.mismatch_count[i] >= self.debounce_samples {
                    self.stable.set(id, sample);
                    self.mismatch_count[i] = 0;
                    // Capacity equals the input count, cannot overflow
                    let _ = changes.push(InputChange {
                        input: id,
                        state: sample,
                    });
                }
            } else {
                self.mismatch_count[i] = 0;
            }
        }
        changes
    }

    /// Current debounced states
    pub fn snapshot(&self) -> InputSnapshot {
        self.stable
    }

    /// True once the startup grace period has elapsed
    pub fn system_ready(&self) -> bool {
        self.system_ready
    }
}
