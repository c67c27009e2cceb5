//! Flash log writer task
//!
//! Single consumer of the log queue and, through the shared mutex, one
//! of the two users of the flash device. A failed append loses that
//! record; the log layer does not retry.

use defmt::*;
use embassy_time::Instant;

use crate::channels::{FLASH_LOG, LOG_CHANNEL};

/// Log writer task
#[embassy_executor::task]
pub async fn log_writer_task() {
    info!("Log writer task started");

    loop {
        let request = LOG_CHANNEL.receive().await;
        let now_ms = Instant::now().as_millis() as u32;

        let mut log = FLASH_LOG.lock().await;
        match log.as_mut() {
            Some(log) => {
                if log
                    .append(now_ms, request.code, request.flags, request.msg.as_str())
                    .is_err()
                {
                    warn!("Flash append failed, record lost (code {})", request.code);
                }
            }
            None => warn!("Flash log unavailable, record lost (code {})", request.code),
        }
    }
}
