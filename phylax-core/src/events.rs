//! Events for the reporter queue
//!
//! Input changes, rule edges and console requests all funnel through
//! one queue to the task that owns the console output (and, for the
//! flash diagnostics, the flash device).

use heapless::String;

use crate::inputs::InputId;

/// Longest console line echoed back in an unknown-command report
pub const ECHO_LEN: usize = 64;

/// One queued event
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A debounced input committed a new state
    InputChanged { input: InputId, state: bool },
    /// A fault rule activated or cleared
    RuleEdge { message: &'static str },
    /// A one-line command acknowledgement or status notice
    Notice { message: &'static str },
    /// Unrecognized console input, echoed back with a help pointer
    UnknownCommand { line: String<ECHO_LEN> },
    /// Print the command list
    ShowHelp,
    /// Print every input state
    ShowStatus,
    /// Print the remote laser-unit monitor table
    ShowTruPulse,
    /// Print the current thermocouple reading
    ShowTemperature,
    /// Print the most recent flash log records
    LogDump,
    /// Erase the whole flash log
    LogErase,
    /// Run the flash write/read/verify self-test
    FlashTest,
    /// Print the flash JEDEC id
    FlashId,
    /// Print flash geometry and log cursor state
    FlashStatus,
}
