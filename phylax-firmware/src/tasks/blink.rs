//! Heartbeat task
//!
//! 1 Hz liveness blink, plus the emission-fault indicator flashing
//! while the force-error flag is up.

use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Ticker};

use crate::channels::{copy_out, SAFETY_STATE};

/// Heartbeat task
#[embassy_executor::task]
pub async fn blink_task(mut heartbeat: Output<'static>, mut emission_fault: Output<'static>) {
    let mut ticker = Ticker::every(Duration::from_millis(1000));
    loop {
        ticker.next().await;
        heartbeat.toggle();

        if copy_out(&SAFETY_STATE).force_error {
            emission_fault.toggle();
        } else {
            emission_fault.set_low();
        }
    }
}
