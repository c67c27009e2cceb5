//! Safety state and fault rules
//!
//! The software latch flags shared across the system, the actuation
//! seam to the latch/laser hardware, and the ordered fault-rule engine.

pub mod rules;

pub use rules::{EngineReport, RuleEngine, RuleEvent, RuleId};

/// Software latch flags
///
/// One explicit structure instead of free-floating globals: written by
/// the rule engine and the reset/force actions, read by everyone under
/// the same copy-in/copy-out discipline as the thermal snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SafetyState {
    /// Force the latch-error rule regardless of hardware inputs
    pub force_error: bool,
    /// A latch fault is currently latched in software
    pub fault_latched: bool,
    /// Laser held off in software until reset
    pub laser_latched_off: bool,
}

/// Actuation seam to the latch bank and laser-enable hardware
///
/// The rules are both detector and first responder: several drive
/// these outputs directly when they trip. Host tests substitute a
/// recording fake.
pub trait SafetyOutputs {
    /// Allow laser emission
    fn laser_enable(&mut self);

    /// Block laser emission
    fn laser_disable(&mut self);

    /// Clock the fault state into every hardware latch
    fn latches_to_fault(&mut self);

    /// Re-arm every hardware latch (data high, clock pulse)
    fn latches_reset(&mut self);
}

impl SafetyState {
    /// The reset action: clear the software flags and re-arm the
    /// hardware latches.
    ///
    /// This is a request to re-arm, not a guarantee - if a hardware
    /// line still asserts, the latch-error rule re-trips on the next
    /// scan.
    pub fn apply_reset(&mut self, outputs: &mut impl SafetyOutputs) {
        self.force_error = false;
        self.fault_latched = false;
        self.laser_latched_off = false;
        outputs.latches_reset();
    }

    /// The force action: latch the fault state in software and
    /// hardware and block the laser. Used for manual fault injection.
    pub fn apply_force(&mut self, outputs: &mut impl SafetyOutputs) {
        self.force_error = true;
        self.fault_latched = true;
        self.laser_latched_off = true;
        outputs.latches_to_fault();
        outputs.laser_disable();
    }
}
