//! Busy-wait delay for bit-banged sequences
//!
//! The latch clock pulses and the thermocouple SPI clock are produced by
//! short, bounded spins on the order of microseconds. These must not be
//! turned into scheduler yields - a suspension mid-pulse violates the
//! signal timing of the shift-register latches.

/// Bounded busy-wait delay source
pub trait BusyDelay {
    /// Spin for roughly `us` microseconds without yielding to the scheduler.
    fn busy_wait_us(&mut self, us: u32);
}
