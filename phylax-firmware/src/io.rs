//! Chip HAL adapters
//!
//! Thin wrappers mapping embassy-stm32 GPIO and a calibrated spin loop
//! onto the phylax-hal traits the drivers are written against.

use embassy_stm32::gpio::{Input, Output};

use phylax_hal::{BusyDelay, InputPin, OutputPin};

/// Output pin adapter
pub struct OutPin(pub Output<'static>);

impl OutputPin for OutPin {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }

    fn is_set_high(&self) -> bool {
        self.0.is_set_high()
    }
}

/// Input pin adapter
pub struct InPin(pub Input<'static>);

impl InputPin for InPin {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}

/// Core clock frequency the spin delay is calibrated for
const CPU_HZ: u32 = 180_000_000;

/// Busy-wait delay built on the cycle counter spin
///
/// Used only for the microsecond-scale bit-bang sequences; everything
/// else sleeps on embassy timers.
pub struct SpinDelay;

impl BusyDelay for SpinDelay {
    fn busy_wait_us(&mut self, us: u32) {
        cortex_m::asm::delay(us * (CPU_HZ / 1_000_000));
    }
}
