//! Reset button task
//!
//! The physical latch-reset button on its EXTI line, with the 50 ms
//! software debounce the panel switch needs.

use defmt::*;
use embassy_stm32::exti::ExtiInput;
use embassy_time::{Duration, Instant};

use crate::channels::RESET_LATCH;

/// Minimum spacing between accepted presses (ms)
const DEBOUNCE_MS: u64 = 50;

/// Reset button task
#[embassy_executor::task]
pub async fn reset_button_task(mut button: ExtiInput<'static>) {
    info!("Reset button task started");

    let mut last_press: Option<Instant> = None;
    loop {
        button.wait_for_rising_edge().await;

        let now = Instant::now();
        let accepted = match last_press {
            Some(previous) => now - previous >= Duration::from_millis(DEBOUNCE_MS),
            None => true,
        };
        if accepted {
            last_press = Some(now);
            RESET_LATCH.signal(());
        }
    }
}
