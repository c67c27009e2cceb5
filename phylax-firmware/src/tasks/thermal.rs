//! Thermocouple sampling task
//!
//! Reads the MAX31855 every five seconds and publishes the decoded
//! snapshot for the guard and the console. The verbose classification
//! print follows the shared logging flag.

use core::sync::atomic::Ordering;

use defmt::*;
use embassy_time::{Duration, Ticker};

use phylax_drivers::max31855::SAMPLE_PERIOD_MS;
use phylax_drivers::Max31855;

use crate::channels::{copy_in, THERMO_READING, VERBOSE};
use crate::io::{InPin, OutPin, SpinDelay};

/// Thermal sampling task
#[embassy_executor::task]
pub async fn thermal_task(mut sensor: Max31855<OutPin, OutPin, InPin, SpinDelay>) {
    info!("Thermal task started");

    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_PERIOD_MS as u64));
    loop {
        let reading = sensor.read();
        copy_in(&THERMO_READING, reading);

        if VERBOSE.load(Ordering::Relaxed) {
            if reading.fault {
                warn!("Thermocouple fault 0x{:02x}", reading.fault_bits);
            } else if reading.range_fault {
                warn!("Temperature out of range: {} degC", reading.tc_c);
            } else {
                info!("Temperature normal: {} degC", reading.tc_c);
            }
        }

        ticker.next().await;
    }
}
