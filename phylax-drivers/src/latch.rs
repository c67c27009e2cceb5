//! Safety latch bank and laser switch
//!
//! The interlock latches are shift-register output stages: the level on
//! a latch's data line is captured by a pulse on its clock line and
//! held until the next pulse. Data high re-arms a latch, data low
//! forces its fault state. The clock pulses are bounded busy-waits;
//! callers run the sequences inside a critical section so a pulse is
//! never stretched by preemption.

use phylax_core::safety::SafetyOutputs;
use phylax_hal::{BusyDelay, OutputPin};

/// Clock setup time before the rising edge (us)
const SETUP_US: u32 = 2;
/// Clock pulse width (us)
const PULSE_US: u32 = 6;
/// Hold time after the falling edge (us)
const HOLD_US: u32 = 2;

/// The three latch stages plus the laser-disable output
pub struct LatchBank<P: OutputPin, D: BusyDelay> {
    door_data: P,
    relay_data: P,
    mcu_data: P,
    door_clk: P,
    relay_clk: P,
    mcu_clk: P,
    laser_pin: P,
    delay: D,
}

impl<P: OutputPin, D: BusyDelay> LatchBank<P, D> {
    /// Take ownership of the output pins and drive the known startup
    /// state: data lines armed, clocks idle low, laser enabled.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        door_data: P,
        relay_data: P,
        mcu_data: P,
        door_clk: P,
        relay_clk: P,
        mcu_clk: P,
        laser_pin: P,
        delay: D,
    ) -> Self {
        let mut bank = Self {
            door_data,
            relay_data,
            mcu_data,
            door_clk,
            relay_clk,
            mcu_clk,
            laser_pin,
            delay,
        };
        bank.door_data.set_high();
        bank.relay_data.set_high();
        bank.mcu_data.set_high();
        bank.door_clk.set_low();
        bank.relay_clk.set_low();
        bank.mcu_clk.set_low();
        bank.laser_enable();
        bank
    }

    fn pulse(clk: &mut P, delay: &mut D) {
        // Clock idles low
        delay.busy_wait_us(SETUP_US);
        clk.set_high();
        delay.busy_wait_us(PULSE_US);
        clk.set_low();
        delay.busy_wait_us(HOLD_US);
    }

    fn set_data(&mut self, high: bool) {
        self.door_data.set_state(high);
        self.relay_data.set_state(high);
        self.mcu_data.set_state(high);
    }

    fn clock_all(&mut self) {
        Self::pulse(&mut self.door_clk, &mut self.delay);
        Self::pulse(&mut self.mcu_clk, &mut self.delay);
        Self::pulse(&mut self.relay_clk, &mut self.delay);
    }

    /// Live level of the laser-disable output (feeds the TRU word)
    pub fn laser_pin_high(&self) -> bool {
        self.laser_pin.is_set_high()
    }
}

impl<P: OutputPin, D: BusyDelay> SafetyOutputs for LatchBank<P, D> {
    fn laser_enable(&mut self) {
        // The remote unit's disable input is active high and the board
        // inverts the signal, so driving this line high permits
        // emission.
        self.laser_pin.set_high();
    }

    fn laser_disable(&mut self) {
        self.laser_pin.set_low();
    }

    fn latches_reset(&mut self) {
        self.set_data(true);
        self.laser_enable();
        self.clock_all();
    }

    fn latches_to_fault(&mut self) {
        self.set_data(false);
        self.clock_all();
        self.laser_disable();
    }
}
