//! Latch reset and force handlers
//!
//! One waiting consumer per single-bit signal. Raising an already-set
//! signal is a no-op, so a burst of button bounces or repeated console
//! commands collapses into one action.

use defmt::*;

use phylax_core::events::Event;

use crate::channels::{
    copy_in, copy_out, publish_laser_pin, with_latches, EVENT_CHANNEL, FORCE_LATCH, RESET_LATCH,
    SAFETY_STATE,
};

/// Latch reset handler
///
/// Clears the software flags and pulses the hardware re-arm sequence.
/// If a hardware condition still asserts, the rule engine re-trips on
/// the next scan - reset is a request, not a guarantee.
#[embassy_executor::task]
pub async fn reset_latches_task() {
    loop {
        RESET_LATCH.wait().await;

        let mut state = copy_out(&SAFETY_STATE);
        with_latches(|bank| state.apply_reset(bank));
        copy_in(&SAFETY_STATE, state);
        publish_laser_pin();

        info!("Latch reset triggered");
        let _ = EVENT_CHANNEL.try_send(Event::Notice {
            message: "Latch reset triggered",
        });
    }
}

/// Force-fault handler
///
/// Drives every latch into the fault state and blocks the laser; used
/// for manual fault injection and the PLC test bit.
#[embassy_executor::task]
pub async fn force_latches_task() {
    loop {
        FORCE_LATCH.wait().await;

        let mut state = copy_out(&SAFETY_STATE);
        with_latches(|bank| state.apply_force(bank));
        copy_in(&SAFETY_STATE, state);
        publish_laser_pin();

        info!("Latch fault forced");
        let _ = EVENT_CHANNEL.try_send(Event::Notice {
            message: "Latch fault forced",
        });
    }
}
