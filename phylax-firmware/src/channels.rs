//! Inter-task communication
//!
//! Static channels, signals and shared snapshots connecting the
//! Embassy tasks. The snapshot statics follow one discipline: the
//! owning task copies a whole struct in under a short critical
//! section, readers copy it out - no references ever escape the lock.

use core::cell::{Cell, RefCell};
use core::sync::atomic::AtomicBool;

use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::Spi;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use phylax_core::events::Event;
use phylax_core::inputs::InputSnapshot;
use phylax_core::log::{FlashLog, LogRequest};
use phylax_core::safety::SafetyState;
use phylax_core::status::StatusWords;
use phylax_core::thermal::{GuardStatus, ThermoSnapshot};
use phylax_drivers::{LatchBank, W25q};

use crate::io::{OutPin, SpinDelay};

/// Queue depth for reporter events
const EVENT_CHANNEL_SIZE: usize = 10;

/// Queue depth for pending flash log entries
const LOG_CHANNEL_SIZE: usize = 16;

/// Queue depth for link reply frames
const LINK_CHANNEL_SIZE: usize = 8;

/// One decoded reply from the PLC link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VarValue {
    pub var_id: u8,
    pub value: u16,
}

/// Input changes, rule edges and console requests for the reporter
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Event, EVENT_CHANNEL_SIZE> =
    Channel::new();

/// Pending flash log entries for the log writer
pub static LOG_CHANNEL: Channel<CriticalSectionRawMutex, LogRequest, LOG_CHANNEL_SIZE> =
    Channel::new();

/// ACK frames received on the PLC link
pub static ACK_CHANNEL: Channel<CriticalSectionRawMutex, VarValue, LINK_CHANNEL_SIZE> =
    Channel::new();

/// READ-reply frames received on the PLC link
pub static DATA_CHANNEL: Channel<CriticalSectionRawMutex, VarValue, LINK_CHANNEL_SIZE> =
    Channel::new();

/// Latch reset request (button, console or PLC bit); one waiting
/// consumer, re-raising while set is a no-op
pub static RESET_LATCH: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Force-fault request; same single-consumer contract as reset
pub static FORCE_LATCH: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Thermal bypass setting from the console to the scan task
pub static BYPASS_CMD: Signal<CriticalSectionRawMutex, bool> = Signal::new();

/// Latest thermocouple sample, published by the thermal task
pub static THERMO_READING: BlockingMutex<CriticalSectionRawMutex, Cell<ThermoSnapshot>> =
    BlockingMutex::new(Cell::new(ThermoSnapshot {
        tc_c: 25.0,
        cj_c: 25.0,
        fault: false,
        fault_bits: 0,
        range_fault: false,
        raw: 0,
    }));

/// Software latch flags, written by the scan and latch tasks
pub static SAFETY_STATE: BlockingMutex<CriticalSectionRawMutex, Cell<SafetyState>> =
    BlockingMutex::new(Cell::new(SafetyState {
        force_error: false,
        fault_latched: false,
        laser_latched_off: false,
    }));

/// Debounced input states, published by the scan task each cycle
pub static INPUT_STATE: BlockingMutex<CriticalSectionRawMutex, Cell<InputSnapshot>> =
    BlockingMutex::new(Cell::new(InputSnapshot::new()));

/// The three PLC status words, rebuilt by the scan task each cycle
pub static STATUS_WORDS: BlockingMutex<CriticalSectionRawMutex, Cell<StatusWords>> =
    BlockingMutex::new(Cell::new(StatusWords {
        debug: 0,
        active: 0,
        tru: 0,
    }));

/// Thermal guard state for the console and status paths
///
/// The guard boots bypassed until commissioning flips it on; matches
/// the scan task's startup setting.
pub static GUARD_STATUS: BlockingMutex<CriticalSectionRawMutex, Cell<GuardStatus>> =
    BlockingMutex::new(Cell::new(GuardStatus {
        fault_active: false,
        last_trip_c: 0.0,
        bypass: true,
    }));

/// Verbose console logging, toggled by VERBOSE ON/OFF
pub static VERBOSE: AtomicBool = AtomicBool::new(false);

/// The flash device on the board
pub type BoardFlash = W25q<Spi<'static, Blocking>, OutPin>;

/// The event log, shared between the log writer and the flash
/// diagnostics in the reporter. One mutex serializes every flash
/// transaction system-wide.
pub static FLASH_LOG: Mutex<CriticalSectionRawMutex, Option<FlashLog<BoardFlash>>> =
    Mutex::new(None);

/// The latch bank and laser switch, shared between the scan task's
/// rule actuation and the latch reset/force handlers. The blocking
/// lock doubles as the critical section around the pulse sequences.
pub static LATCHES: BlockingMutex<
    CriticalSectionRawMutex,
    RefCell<Option<LatchBank<OutPin, SpinDelay>>>,
> = BlockingMutex::new(RefCell::new(None));

/// Put the latch bank into the shared slot at startup
pub fn install_latches(bank: LatchBank<OutPin, SpinDelay>) {
    LATCHES.lock(|cell| {
        *cell.borrow_mut() = Some(bank);
    });
}

/// Run a closure against the shared latch bank
pub fn with_latches<R>(f: impl FnOnce(&mut LatchBank<OutPin, SpinDelay>) -> R) -> Option<R> {
    LATCHES.lock(|cell| cell.borrow_mut().as_mut().map(f))
}

/// Helper: copy a snapshot out of a blocking-mutex cell
pub fn copy_out<T: Copy>(slot: &BlockingMutex<CriticalSectionRawMutex, Cell<T>>) -> T {
    slot.lock(|cell| cell.get())
}

/// Helper: copy a snapshot into a blocking-mutex cell
pub fn copy_in<T: Copy>(slot: &BlockingMutex<CriticalSectionRawMutex, Cell<T>>, value: T) {
    slot.lock(|cell| cell.set(value));
}

/// Live level of the laser-disable output, mirrored for the TRU word
pub static LASER_PIN_HIGH: AtomicBool = AtomicBool::new(true);

/// Refresh [`LASER_PIN_HIGH`] from the latch bank
pub fn publish_laser_pin() {
    if let Some(high) = with_latches(|bank| bank.laser_pin_high()) {
        LASER_PIN_HIGH.store(high, core::sync::atomic::Ordering::Relaxed);
    }
}
