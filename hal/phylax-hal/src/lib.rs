//! Phylax Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the safety core is written
//! against. The firmware binary adapts the chip HAL (embassy-stm32) to
//! these traits; host tests substitute recording fakes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (phylax-firmware)          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  phylax-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ chip adapters │       │  test fakes   │
//! │ (firmware)    │       │ (host tests)  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`delay::BusyDelay`] - Bounded busy-wait for bit-banged timing
//! - [`flash::NorFlash`] - Raw sector-erasable NOR flash

#![no_std]
#![deny(unsafe_code)]

pub mod delay;
pub mod flash;
pub mod gpio;

// Re-export key traits at crate root for convenience
pub use delay::BusyDelay;
pub use flash::{FlashError, NorFlash};
pub use gpio::{InputPin, OutputPin};
