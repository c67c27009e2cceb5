//! Configuration type definitions
//!
//! Timing and threshold tunables for the safety core. Stored as
//! postcard-serialized binary data when persisted; the defaults match
//! the shipped interlock hardware.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Safety core tunables
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SafetyConfig {
    /// Input scan period (ms)
    pub scan_tick_ms: u32,
    /// Consecutive differing samples required to commit an input change
    pub debounce_samples: u8,
    /// Fault evaluation suppressed for this long after boot (ms)
    pub startup_grace_ms: u32,
    /// Primary safeties must be stable this long before the door/relay
    /// rule arms (ms)
    pub door_arming_grace_ms: u32,
    /// Contact settle time after both relay coils assert (ms)
    pub relay_settle_ms: u32,
    /// Power rail transition report cadence (ms)
    pub power_report_ms: u32,
    /// Thermocouple sample period (ms)
    pub thermal_sample_ms: u32,
    /// Overtemperature trip threshold (°C)
    pub trip_high_c: f32,
    /// Overtemperature clear threshold (°C)
    pub clear_high_c: f32,
    /// Undertemperature trip threshold (°C)
    pub trip_low_c: f32,
    /// Undertemperature clear threshold (°C)
    pub clear_low_c: f32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            scan_tick_ms: 10,
            debounce_samples: 3,
            startup_grace_ms: 3000,
            door_arming_grace_ms: 1000,
            relay_settle_ms: 50,
            power_report_ms: 500,
            thermal_sample_ms: 5000,
            trip_high_c: 60.0,
            clear_high_c: 58.0,
            trip_low_c: 10.0,
            clear_low_c: 12.0,
        }
    }
}

impl SafetyConfig {
    /// Serialize into `buf` as postcard binary, returning the used slice.
    #[cfg(feature = "serde")]
    pub fn to_postcard<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], postcard::Error> {
        postcard::to_slice(self, buf)
    }

    /// Deserialize from postcard binary.
    #[cfg(feature = "serde")]
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
