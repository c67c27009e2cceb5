//! Hardware drivers for the Phylax housekeeping controller
//!
//! Implementations of the HAL and safety seams:
//!
//! - MAX31855 thermocouple converter (bit-banged SPI read + decode)
//! - Safety latch bank and laser-enable switch
//! - W25Q-series SPI NOR flash for the event log

#![no_std]
#![deny(unsafe_code)]

pub mod latch;
pub mod max31855;
pub mod w25q;

pub use latch::LatchBank;
pub use max31855::Max31855;
pub use w25q::W25q;
