//! MAX31855 thermocouple converter
//!
//! The BDO thermocouple hangs off three plain GPIOs, read as bit-banged
//! SPI mode 3 (clock idles high, sample on the rising edge). The whole
//! 32-bit conversion result is clocked out in one chip-select window;
//! the bit delays are bounded busy-waits on the order of a microsecond
//! and must not be preempted mid-transfer.
//!
//! Result word layout:
//! - `[31:18]` thermocouple temperature, 14-bit signed, 0.25 °C/bit
//! - `[16]` fault flag
//! - `[15:4]` cold-junction temperature, 12-bit signed, 0.0625 °C/bit
//! - `[2:0]` fault detail: short-to-VCC, short-to-GND, open circuit

use phylax_core::thermal::ThermoSnapshot;
use phylax_hal::{BusyDelay, InputPin, OutputPin};

/// Sample cadence of the thermal task (ms)
pub const SAMPLE_PERIOD_MS: u32 = 5000;

/// Plausible BDO temperature band; a valid reading outside it raises
/// the range-fault flag.
pub const RANGE_MIN_C: f32 = 0.0;
pub const RANGE_MAX_C: f32 = 60.0;

/// Half-period of the bit-banged clock (~500 kHz)
const BIT_DELAY_US: u32 = 1;

/// Bit-banged MAX31855 reader
pub struct Max31855<Sck, Cs, Miso, D> {
    sck: Sck,
    cs: Cs,
    miso: Miso,
    delay: D,
}

impl<Sck, Cs, Miso, D> Max31855<Sck, Cs, Miso, D>
where
    Sck: OutputPin,
    Cs: OutputPin,
    Miso: InputPin,
    D: BusyDelay,
{
    /// Take ownership of the pins and drive the SPI mode 3 idle levels
    pub fn new(mut sck: Sck, mut cs: Cs, miso: Miso, delay: D) -> Self {
        sck.set_high();
        cs.set_high();
        Self {
            sck,
            cs,
            miso,
            delay,
        }
    }

    /// Clock out one raw 32-bit conversion result
    pub fn read_raw(&mut self) -> u32 {
        let mut word = 0u32;

        self.cs.set_low();
        self.delay.busy_wait_us(BIT_DELAY_US);

        for _ in 0..32 {
            self.sck.set_low();
            self.delay.busy_wait_us(BIT_DELAY_US);

            // Rising edge: sample
            self.sck.set_high();
            self.delay.busy_wait_us(BIT_DELAY_US);

            word <<= 1;
            if self.miso.is_high() {
                word |= 1;
            }
        }

        self.cs.set_high();
        word
    }

    /// Read and decode one sample
    pub fn read(&mut self) -> ThermoSnapshot {
        decode(self.read_raw())
    }
}

/// Decode a raw conversion result
///
/// Temperatures stay zero when the fault flag is set; the range fault
/// is only meaningful for valid readings.
pub fn decode(raw: u32) -> ThermoSnapshot {
    let fault = (raw >> 16) & 0x1 != 0;
    let fault_bits = (raw & 0x7) as u8;

    let mut tc_c = 0.0;
    let mut cj_c = 0.0;
    if !fault {
        let mut tc = ((raw >> 18) & 0x3FFF) as i32;
        if tc & 0x2000 != 0 {
            tc -= 0x4000; // sign-extend 14 bits
        }
        tc_c = tc as f32 * 0.25;

        let mut cj = ((raw >> 4) & 0x0FFF) as i32;
        if cj & 0x0800 != 0 {
            cj -= 0x1000; // sign-extend 12 bits
        }
        cj_c = cj as f32 * 0.0625;
    }

    let range_fault = !fault && (tc_c < RANGE_MIN_C || tc_c > RANGE_MAX_C);

    ThermoSnapshot {
        tc_c,
        cj_c,
        fault,
        fault_bits,
        range_fault,
        raw,
    }
}
