//! Console input task
//!
//! Accumulates bytes from the console UART into lines and dispatches
//! recognized commands: flag toggles act immediately, latch actions
//! raise their signals, everything that prints goes through the event
//! queue to the reporter.

use core::sync::atomic::Ordering;

use defmt::*;
use embassy_stm32::usart::BufferedUartRx;
use embedded_io_async::Read;
use heapless::String;

use phylax_core::console::{self, ConsoleCommand};
use phylax_core::events::{Event, ECHO_LEN};

use crate::channels::{BYPASS_CMD, EVENT_CHANNEL, FORCE_LATCH, RESET_LATCH, VERBOSE};

/// Longest accepted console line
const LINE_LEN: usize = 64;

/// Console input task
#[embassy_executor::task]
pub async fn console_rx_task(mut rx: BufferedUartRx<'static>) {
    info!("Console task started");

    let mut line: String<LINE_LEN> = String::new();
    let mut chunk = [0u8; 32];

    loop {
        match rx.read(&mut chunk).await {
            Ok(n) if n > 0 => {
                for &byte in &chunk[..n] {
                    if byte == b'\r' || byte == b'\n' {
                        if !line.is_empty() {
                            dispatch(line.as_str()).await;
                            line.clear();
                        }
                    } else if line.push(byte as char).is_err() {
                        // Oversized line: discard it wholesale
                        line.clear();
                    }
                }
            }
            Ok(_) => {}
            Err(_) => warn!("Console RX error"),
        }
    }
}

async fn dispatch(line: &str) {
    match console::parse(line) {
        Ok(ConsoleCommand::Help) => EVENT_CHANNEL.send(Event::ShowHelp).await,
        Ok(ConsoleCommand::VerboseOn) => {
            VERBOSE.store(true, Ordering::Relaxed);
            notice("Verbose logging ENABLED").await;
        }
        Ok(ConsoleCommand::VerboseOff) => {
            VERBOSE.store(false, Ordering::Relaxed);
            notice("Verbose logging DISABLED").await;
        }
        Ok(ConsoleCommand::StatusDebug) => EVENT_CHANNEL.send(Event::ShowStatus).await,
        Ok(ConsoleCommand::TruPulse) => EVENT_CHANNEL.send(Event::ShowTruPulse).await,
        Ok(ConsoleCommand::BdoTemp) => EVENT_CHANNEL.send(Event::ShowTemperature).await,
        Ok(ConsoleCommand::LogDump) => EVENT_CHANNEL.send(Event::LogDump).await,
        Ok(ConsoleCommand::LogErase) => EVENT_CHANNEL.send(Event::LogErase).await,
        Ok(ConsoleCommand::FlashTest) => EVENT_CHANNEL.send(Event::FlashTest).await,
        Ok(ConsoleCommand::FlashId) => EVENT_CHANNEL.send(Event::FlashId).await,
        Ok(ConsoleCommand::FlashStatus) => EVENT_CHANNEL.send(Event::FlashStatus).await,
        Ok(ConsoleCommand::BypassThermo(Some(on))) => {
            BYPASS_CMD.signal(on);
            notice(if on {
                "Thermocouple check bypass ENABLED"
            } else {
                "Thermocouple check bypass DISABLED"
            })
            .await;
        }
        Ok(ConsoleCommand::BypassThermo(None)) => {
            notice("Usage: bypass_thermo <0|1>").await;
        }
        Ok(ConsoleCommand::Reset) => {
            notice("Latch reset command received").await;
            RESET_LATCH.signal(());
        }
        Ok(ConsoleCommand::ForceLatch) => {
            notice("Force latch command received").await;
            FORCE_LATCH.signal(());
        }
        Err(unknown) => {
            let mut echo: String<ECHO_LEN> = String::new();
            for c in unknown.chars().take(ECHO_LEN) {
                let _ = echo.push(c);
            }
            EVENT_CHANNEL.send(Event::UnknownCommand { line: echo }).await;
        }
    }
}

async fn notice(message: &'static str) {
    EVENT_CHANNEL.send(Event::Notice { message }).await;
}
