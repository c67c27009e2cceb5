//! Reporter task
//!
//! Single consumer of the event queue and owner of the console output.
//! Flash diagnostics run here too, under the same mutex the log writer
//! uses, so a log dump never interleaves with an append on the wire.

use core::fmt::Write as _;
use core::sync::atomic::Ordering;

use defmt::*;
use embassy_stm32::usart::BufferedUartTx;
use embassy_time::Instant;
use embedded_io_async::Write;
use heapless::String;

use phylax_core::events::Event;
use phylax_core::inputs::InputId;
use phylax_core::log::{LogRecord, LOG_CAPACITY, LOG_SECTORS, RECORDS_PER_SECTOR, RECORD_SIZE};
use phylax_core::status;
use phylax_drivers::w25q;
use phylax_hal::NorFlash;

use crate::channels::{
    copy_out, EVENT_CHANNEL, FLASH_LOG, GUARD_STATUS, INPUT_STATE, LASER_PIN_HIGH, THERMO_READING,
    VERBOSE,
};

/// Records shown by LOG DUMP
const DUMP_COUNT: usize = 10;

/// One formatted console line
type Line = String<128>;

async fn say(tx: &mut BufferedUartTx<'static>, text: &str) {
    // Console loss is tolerable; safety paths never block on it
    let _ = tx.write_all(text.as_bytes()).await;
}

async fn say_line(tx: &mut BufferedUartTx<'static>, text: &str) {
    say(tx, text).await;
    say(tx, "\r\n").await;
}

fn ms_now() -> u32 {
    Instant::now().as_millis() as u32
}

/// Reporter task
#[embassy_executor::task]
pub async fn reporter_task(mut tx: BufferedUartTx<'static>) {
    info!("Reporter task started");

    loop {
        let event = EVENT_CHANNEL.receive().await;
        match event {
            Event::InputChanged { input, state } => {
                if input.is_core() || VERBOSE.load(Ordering::Relaxed) {
                    let mut line = Line::new();
                    let _ = write!(
                        line,
                        "[{} ms] {} changed to {} ({})",
                        ms_now(),
                        input.name(),
                        input.state_label(state),
                        state as u8
                    );
                    say_line(&mut tx, &line).await;
                }
            }

            Event::RuleEdge { message } | Event::Notice { message } => {
                let mut line = Line::new();
                let _ = write!(line, "[{} ms] {}", ms_now(), message);
                say_line(&mut tx, &line).await;
            }

            Event::UnknownCommand { line: input } => {
                let mut line = Line::new();
                let _ = write!(line, "Unknown command: {}", input.as_str());
                say_line(&mut tx, &line).await;
                say_line(&mut tx, "Type HELP for list.").await;
            }

            Event::ShowHelp => show_help(&mut tx).await,
            Event::ShowStatus => show_status(&mut tx).await,
            Event::ShowTruPulse => show_trupulse(&mut tx).await,
            Event::ShowTemperature => show_temperature(&mut tx).await,
            Event::LogDump => log_dump(&mut tx).await,
            Event::LogErase => log_erase(&mut tx).await,
            Event::FlashTest => flash_test(&mut tx).await,
            Event::FlashId => flash_id(&mut tx).await,
            Event::FlashStatus => flash_status(&mut tx).await,
        }
    }
}

async fn show_help(tx: &mut BufferedUartTx<'static>) {
    for line in [
        "Available commands:",
        "  HELP            - Show this help menu",
        "  VERBOSE ON      - Enable detailed input logging",
        "  VERBOSE OFF     - Disable detailed input logging",
        "  STATUS DEBUG    - Print input states",
        "  TRUPULSE        - Display status of the TruPulse monitor pins",
        "  BDO TEMP        - Show current thermocouple temperature",
        "  LOG DUMP        - Last 10 stored error messages from flash",
        "  LOG ERASE       - Erase flash log",
        "  FLASH TEST      - Test flash memory (will erase current log)",
        "  FLASH ID        - Reply with id of fitted flash memory",
        "  FLASH STATUS    - Reply with memory info",
        "  BYPASS_THERMO X - Disable(1)/enable(0) TC range/fault checks",
        "  RESET           - Reset latch faults; hardware issues will re-trip",
        "  FORCE LATCH     - Force all latches into the fault state",
        "-----------------------------",
    ] {
        say_line(tx, line).await;
    }
}

async fn show_status(tx: &mut BufferedUartTx<'static>) {
    let snap = copy_out(&INPUT_STATE);
    let verbose = VERBOSE.load(Ordering::Relaxed);

    let mut line = Line::new();
    let _ = write!(line, "[{} ms] Current input states:", ms_now());
    say_line(tx, &line).await;

    for id in InputId::ALL {
        if id.is_core() || verbose {
            let state = snap.get(id);
            let mut line = Line::new();
            let _ = write!(
                line,
                "  {} = {} ({})",
                id.name(),
                id.state_label(state),
                state as u8
            );
            say_line(tx, &line).await;
        }
    }
}

async fn show_trupulse(tx: &mut BufferedUartTx<'static>) {
    let snap = copy_out(&INPUT_STATE);
    let word = status::tru_word(&snap, LASER_PIN_HIGH.load(Ordering::Relaxed));

    say_line(tx, "==== TruPulse STATUS WORD ====").await;
    let mut line = Line::new();
    let _ = write!(line, "Value: 0x{:04X}", word);
    say_line(tx, &line).await;

    let rows: [(InputId, &str); 7] = [
        (InputId::TruLasDeactivated, "0 = Laser deactivated"),
        (InputId::TruSysFault, "0 = System fault"),
        (InputId::TruBeamDelivery, "0 = Beam delivery fault"),
        (InputId::TruEmissWarn, "1 = Emission ON"),
        (InputId::TruAlarm, "0 = Alarm active"),
        (InputId::TruMonitor, "0 = Monitor err"),
        (InputId::TruTemperature, "1 = Temperature OK"),
    ];
    for (bit, (id, description)) in rows.iter().enumerate() {
        let mut line = Line::new();
        let _ = write!(
            line,
            "| {} | {} | {} | {} |",
            bit,
            id.name(),
            snap.get(*id) as u8,
            description
        );
        say_line(tx, &line).await;
    }

    let mut line = Line::new();
    let _ = write!(
        line,
        "Laser disable output: {}",
        LASER_PIN_HIGH.load(Ordering::Relaxed) as u8
    );
    say_line(tx, &line).await;
}

async fn show_temperature(tx: &mut BufferedUartTx<'static>) {
    let guard = copy_out(&GUARD_STATUS);
    let reading = copy_out(&THERMO_READING);

    if guard.fault_active {
        let mut line = Line::new();
        let _ = write!(line, "Last over-temp at {:.2} degC", guard.last_trip_c);
        say_line(tx, &line).await;
    }

    let mut line = Line::new();
    if reading.fault {
        let _ = write!(line, "TEMP: SENSOR FAULT (0x{:02X})", reading.fault_bits);
    } else {
        let _ = write!(
            line,
            "BDO Temperature: {:.2} degC [{}]",
            reading.tc_c,
            if reading.range_fault { "OUT OF RANGE" } else { "OK" }
        );
    }
    say_line(tx, &line).await;
}

async fn log_dump(tx: &mut BufferedUartTx<'static>) {
    let mut records = [LogRecord::decode(&[0; RECORD_SIZE]); DUMP_COUNT];
    let count = {
        let mut log = FLASH_LOG.lock().await;
        match log.as_mut() {
            Some(log) => log.read_last_n(DUMP_COUNT, &mut records).unwrap_or(0),
            None => 0,
        }
    };

    let mut line = Line::new();
    let _ = write!(line, "---- LAST {} LOG ENTRIES ----", count);
    say_line(tx, &line).await;
    // Oldest first, like the shipped controller prints them
    for record in records[..count].iter().rev() {
        let mut line = Line::new();
        let _ = write!(
            line,
            "#{}  t={}  code={}  flags=0x{:X}  msg={}",
            record.seq,
            record.ms,
            record.code,
            record.flags,
            record.message()
        );
        say_line(tx, &line).await;
    }
    say_line(tx, "-----------------------------").await;
}

async fn log_erase(tx: &mut BufferedUartTx<'static>) {
    let mut line = Line::new();
    let _ = write!(line, "[LOG] Erasing all {} sectors...", LOG_SECTORS);
    say_line(tx, &line).await;

    let result = {
        let mut log = FLASH_LOG.lock().await;
        match log.as_mut() {
            Some(log) => log.erase_all(),
            None => Ok(()),
        }
    };
    match result {
        Ok(()) => say_line(tx, "[LOG] Erase complete.").await,
        Err(_) => say_line(tx, "[LOG] Erase FAILED").await,
    }
}

async fn flash_test(tx: &mut BufferedUartTx<'static>) {
    say_line(tx, "=== FLASH SELF TEST ===").await;

    let mut log = FLASH_LOG.lock().await;
    let log = match log.as_mut() {
        Some(log) => log,
        None => {
            drop(log);
            say_line(tx, "Flash unavailable").await;
            return;
        }
    };
    let flash = log.flash_mut();

    let mut pattern = [0u8; 16];
    for (i, b) in pattern.iter_mut().enumerate() {
        *b = 0xA0 + i as u8;
    }

    let id = flash.jedec_id().unwrap_or(0);
    let erase_ok = flash.sector_erase_4k(0).is_ok();
    let write_ok = flash.page_program(0, &pattern).is_ok();
    let mut back = [0u8; 16];
    let read_ok = flash.read(0, &mut back).is_ok();
    let verified = read_ok && back == pattern;

    let mut line = Line::new();
    let _ = write!(line, "JEDEC ID = 0x{:06X}", id);
    say_line(tx, &line).await;
    say_line(tx, if erase_ok { "Erase: OK" } else { "Erase: FAIL" }).await;
    say_line(tx, if write_ok { "Write: OK" } else { "Write: FAIL" }).await;
    say_line(tx, if verified { "Verify: OK" } else { "Verify: MISMATCH" }).await;
    say_line(tx, "=======================").await;
}

async fn flash_id(tx: &mut BufferedUartTx<'static>) {
    let id = {
        let mut log = FLASH_LOG.lock().await;
        match log.as_mut() {
            Some(log) => log.flash_mut().jedec_id().unwrap_or(0),
            None => 0,
        }
    };

    let mut line = Line::new();
    let _ = write!(line, "[FLASH] JEDEC ID = 0x{:06X}", id);
    say_line(tx, &line).await;
    match w25q::part_name(id) {
        Some(name) => {
            let mut line = Line::new();
            let _ = write!(line, "[FLASH] Device OK ({})", name);
            say_line(tx, &line).await;
        }
        None => say_line(tx, "[FLASH] Unexpected ID! Check wiring or chip type.").await,
    }
}

async fn flash_status(tx: &mut BufferedUartTx<'static>) {
    let (id, write_index, next_seq, valid) = {
        let mut log = FLASH_LOG.lock().await;
        match log.as_mut() {
            Some(log) => (
                log.flash_mut().jedec_id().unwrap_or(0),
                log.write_index(),
                log.next_sequence(),
                log.count_valid().unwrap_or(0),
            ),
            None => (0, 0, 0, 0),
        }
    };

    say_line(tx, "==== FLASH STATUS ====").await;
    let mut line = Line::new();
    let _ = write!(line, "JEDEC ID      : 0x{:06X}", id);
    say_line(tx, &line).await;
    let mut line = Line::new();
    let _ = write!(
        line,
        "Device        : {}",
        w25q::part_name(id).unwrap_or("Unknown / not detected")
    );
    say_line(tx, &line).await;
    let mut line = Line::new();
    let _ = write!(line, "Sectors used  : {}", LOG_SECTORS);
    say_line(tx, &line).await;
    let mut line = Line::new();
    let _ = write!(line, "Records/sector: {}", RECORDS_PER_SECTOR);
    say_line(tx, &line).await;
    let mut line = Line::new();
    let _ = write!(line, "Capacity      : {} records", LOG_CAPACITY);
    say_line(tx, &line).await;
    let mut line = Line::new();
    let _ = write!(line, "Write index   : {}", write_index);
    say_line(tx, &line).await;
    let mut line = Line::new();
    let _ = write!(line, "Next sequence : {}", next_seq);
    say_line(tx, &line).await;
    let mut line = Line::new();
    let _ = write!(line, "Records valid : {}", valid);
    say_line(tx, &line).await;
    say_line(tx, "======================").await;
}
