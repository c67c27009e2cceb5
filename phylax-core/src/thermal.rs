//! Thermocouple guard with hysteresis
//!
//! The guard owns its own fault flag, independent of the rule engine's
//! edge bookkeeping: it trips on a sensor fault or a temperature
//! outside the trip band and clears only inside the narrower clear
//! band. The asymmetric thresholds keep the laser from chattering on a
//! reading that hovers at either boundary.

use heapless::Vec;

use crate::codes;
use crate::config::SafetyConfig;
use crate::log::LogRequest;
use crate::safety::{SafetyOutputs, SafetyState};

/// One published thermocouple sample
///
/// Owned by the sampling task and handed out as a copy under a
/// short-lived lock - never shared by reference.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermoSnapshot {
    /// Thermocouple temperature (°C)
    pub tc_c: f32,
    /// Cold-junction temperature (°C)
    pub cj_c: f32,
    /// Sensor internal fault flag
    pub fault: bool,
    /// Fault detail bits: bit0 open circuit, bit1 short to GND,
    /// bit2 short to VCC
    pub fault_bits: u8,
    /// Reading outside the plausible operating range
    pub range_fault: bool,
    /// Raw 32-bit sample as clocked off the sensor
    pub raw: u32,
}

impl Default for ThermoSnapshot {
    fn default() -> Self {
        Self {
            tc_c: 25.0,
            cj_c: 25.0,
            fault: false,
            fault_bits: 0,
            range_fault: false,
            raw: 0,
        }
    }
}

/// Guard state published for the console and status words
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GuardStatus {
    pub fault_active: bool,
    /// Temperature captured at the moment of the last trip (°C)
    pub last_trip_c: f32,
    pub bypass: bool,
}

/// Hysteretic over/under-temperature guard
#[derive(Debug)]
pub struct ThermalGuard {
    fault_active: bool,
    last_trip_c: f32,
    bypass: bool,
    trip_high_c: f32,
    clear_high_c: f32,
    trip_low_c: f32,
    clear_low_c: f32,
}

impl ThermalGuard {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            fault_active: false,
            last_trip_c: 0.0,
            bypass: false,
            trip_high_c: config.trip_high_c,
            clear_high_c: config.clear_high_c,
            trip_low_c: config.trip_low_c,
            clear_low_c: config.clear_low_c,
        }
    }

    /// Run one guard cycle against the latest sample
    ///
    /// Returns true while the guard is tripped. Trip captures the
    /// temperature, forces the error latch and blocks the laser; clear
    /// re-enables the laser. With the bypass set, all of this is
    /// skipped and the guard reports safe.
    pub fn update(
        &mut self,
        d: &ThermoSnapshot,
        state: &mut SafetyState,
        outputs: &mut impl SafetyOutputs,
        log: &mut Vec<LogRequest, 8>,
    ) -> bool {
        if self.bypass {
            return false;
        }

        if !self.fault_active {
            if d.fault || d.tc_c > self.trip_high_c || d.tc_c < self.trip_low_c {
                self.fault_active = true;
                self.last_trip_c = d.tc_c;
                state.force_error = true;
                state.laser_latched_off = true;
                outputs.laser_disable();
                let _ = log.push(LogRequest::with_temp(codes::OVERTEMP, 1, "Overtemp", d.tc_c));
            }
        } else if !d.fault && d.tc_c < self.clear_high_c && d.tc_c > self.clear_low_c {
            self.fault_active = false;
            outputs.laser_enable();
            let _ = log.push(LogRequest::with_temp(
                codes::TEMP_CLEAR,
                0,
                "Temp normal",
                d.tc_c,
            ));
        }

        self.fault_active
    }

    /// Set the debug bypass
    ///
    /// Idempotent: returns true only when the flag actually changed,
    /// so callers log the enter/leave edges and nothing else.
    pub fn set_bypass(&mut self, on: bool) -> bool {
        let changed = self.bypass != on;
        self.bypass = on;
        changed
    }

    /// True while the guard is tripped
    pub fn fault_active(&self) -> bool {
        self.fault_active
    }

    /// Copyable state for the console and status paths
    pub fn status(&self) -> GuardStatus {
        GuardStatus {
            fault_active: self.fault_active,
            last_trip_c: self.last_trip_c,
            bypass: self.bypass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SafetyOutputs;

    #[derive(Default)]
    struct Recorder {
        enables: usize,
        disables: usize,
    }

    impl SafetyOutputs for Recorder {
        fn laser_enable(&mut self) {
            self.enables += 1;
        }
        fn laser_disable(&mut self) {
            self.disables += 1;
        }
        fn latches_to_fault(&mut self) {}
        fn latches_reset(&mut self) {}
    }

    struct Bench {
        guard: ThermalGuard,
        state: SafetyState,
        outputs: Recorder,
        log: Vec<LogRequest, 8>,
    }

    impl Bench {
        fn new() -> Self {
            Self {
                guard: ThermalGuard::new(&SafetyConfig::default()),
                state: SafetyState::default(),
                outputs: Recorder::default(),
                log: Vec::new(),
            }
        }

        fn feed(&mut self, tc_c: f32) -> bool {
            let reading = ThermoSnapshot {
                tc_c,
                ..ThermoSnapshot::default()
            };
            self.log.clear();
            self.guard
                .update(&reading, &mut self.state, &mut self.outputs, &mut self.log)
        }

        fn feed_fault(&mut self) -> bool {
            let reading = ThermoSnapshot {
                fault: true,
                fault_bits: 0x1,
                ..ThermoSnapshot::default()
            };
            self.log.clear();
            self.guard
                .update(&reading, &mut self.state, &mut self.outputs, &mut self.log)
        }
    }

    #[test]
    fn high_trip_holds_through_dead_band() {
        let mut bench = Bench::new();
        assert!(!bench.feed(59.5));

        // Crossing 60.0 from below trips.
        assert!(bench.feed(60.5));
        assert!(bench.state.force_error);
        assert!(bench.state.laser_latched_off);
        assert_eq!(bench.outputs.disables, 1);
        assert_eq!(bench.log.len(), 1);
        assert_eq!(bench.log[0].code, codes::OVERTEMP);

        // Still tripped while rising and back inside the dead band.
        assert!(bench.feed(65.0));
        assert!(bench.feed(59.0));
        assert_eq!(bench.outputs.enables, 0);

        // Clears only below 58.0.
        assert!(!bench.feed(57.9));
        assert_eq!(bench.outputs.enables, 1);
        assert_eq!(bench.log.len(), 1);
        assert_eq!(bench.log[0].code, codes::TEMP_CLEAR);
    }

    #[test]
    fn low_trip_holds_through_dead_band() {
        let mut bench = Bench::new();
        assert!(!bench.feed(10.5));

        // Falling through 10.0 trips.
        assert!(bench.feed(9.5));
        assert_eq!(bench.guard.status().last_trip_c, 9.5);

        // Inside the dead band at 11 °C: still tripped.
        assert!(bench.feed(11.0));

        // Clears only above 12.0.
        assert!(!bench.feed(12.1));
    }

    #[test]
    fn sensor_fault_trips_and_blocks_clear() {
        let mut bench = Bench::new();
        assert!(bench.feed_fault());
        assert!(bench.state.force_error);

        // A fault flag in the clear band still holds the trip.
        assert!(bench.feed_fault());

        // Fault gone and temperature in band: clears.
        assert!(!bench.feed(25.0));
    }

    #[test]
    fn trip_edge_fires_once() {
        let mut bench = Bench::new();
        assert!(bench.feed(61.0));
        let first_disables = bench.outputs.disables;

        assert!(bench.feed(61.0));
        assert!(bench.feed(62.0));
        assert_eq!(bench.outputs.disables, first_disables);
        assert!(bench.log.is_empty());
    }

    #[test]
    fn bypass_reports_safe_and_toggles_idempotently() {
        let mut bench = Bench::new();
        assert!(bench.guard.set_bypass(true));
        // Repeating the same setting is not an edge.
        assert!(!bench.guard.set_bypass(true));

        // Wildly out-of-range readings are ignored under bypass.
        assert!(!bench.feed(120.0));
        assert!(bench.log.is_empty());
        assert!(!bench.state.force_error);

        assert!(bench.guard.set_bypass(false));
        assert!(!bench.guard.set_bypass(false));
        // With the bypass dropped the guard resumes tripping.
        assert!(bench.feed(120.0));
    }

    #[test]
    fn trip_captures_temperature() {
        let mut bench = Bench::new();
        bench.feed(63.25);
        let status = bench.guard.status();
        assert!(status.fault_active);
        assert_eq!(status.last_trip_c, 63.25);
    }
}
