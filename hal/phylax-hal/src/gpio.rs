//! GPIO pin abstractions
//!
//! Digital I/O as the safety core sees it: interlock switch and feedback
//! inputs, latch data/clock outputs, the laser-disable line. Pins are
//! infallible - on the target, a GPIO register write cannot fail, and
//! the fault handling the core does care about lives above this layer.

/// Digital output pin
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip.
pub trait OutputPin {
    /// Drive the pin high (logic 1)
    fn set_high(&mut self);

    /// Drive the pin low (logic 0)
    fn set_low(&mut self);

    /// Drive the pin to a specific level
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Check the currently driven level
    fn is_set_high(&self) -> bool;
}

/// Digital input pin
///
/// Implementations should handle the actual hardware register reading
/// for the specific chip.
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}
