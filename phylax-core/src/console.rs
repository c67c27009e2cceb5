//! Console command grammar
//!
//! Text commands from the operator console, parsed case-insensitively
//! with surrounding whitespace and line endings trimmed. Execution
//! lives in the firmware; this module only classifies the input so the
//! grammar is testable on the host.

/// A recognized console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleCommand {
    Help,
    VerboseOn,
    VerboseOff,
    StatusDebug,
    TruPulse,
    BdoTemp,
    LogDump,
    LogErase,
    FlashTest,
    FlashId,
    FlashStatus,
    /// `bypass_thermo <0|1>`; `None` means the argument was missing or
    /// malformed and the caller should print the usage line.
    BypassThermo(Option<bool>),
    Reset,
    ForceLatch,
}

/// Parse one console line
///
/// Returns the trimmed input text as the error so the caller can echo
/// the offending command back at the operator.
pub fn parse(line: &str) -> Result<ConsoleCommand, &str> {
    let line = line.trim();

    let simple = [
        ("HELP", ConsoleCommand::Help),
        ("VERBOSE ON", ConsoleCommand::VerboseOn),
        ("VERBOSE OFF", ConsoleCommand::VerboseOff),
        ("STATUS DEBUG", ConsoleCommand::StatusDebug),
        ("TRUPULSE", ConsoleCommand::TruPulse),
        ("BDO TEMP", ConsoleCommand::BdoTemp),
        ("LOG DUMP", ConsoleCommand::LogDump),
        ("LOG ERASE", ConsoleCommand::LogErase),
        ("FLASH TEST", ConsoleCommand::FlashTest),
        ("FLASH ID", ConsoleCommand::FlashId),
        ("FLASH STATUS", ConsoleCommand::FlashStatus),
        ("RESET", ConsoleCommand::Reset),
        ("FORCE LATCH", ConsoleCommand::ForceLatch),
    ];
    for (text, command) in simple {
        if line.eq_ignore_ascii_case(text) {
            return Ok(command);
        }
    }

    const BYPASS: &str = "BYPASS_THERMO";
    if line.len() >= BYPASS.len() && line[..BYPASS.len()].eq_ignore_ascii_case(BYPASS) {
        let arg = match line[BYPASS.len()..].trim() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        };
        return Ok(ConsoleCommand::BypassThermo(arg));
    }

    Err(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_case_insensitively() {
        assert_eq!(parse("help"), Ok(ConsoleCommand::Help));
        assert_eq!(parse("Log Dump"), Ok(ConsoleCommand::LogDump));
        assert_eq!(parse("TRUPULSE"), Ok(ConsoleCommand::TruPulse));
        assert_eq!(parse("force latch"), Ok(ConsoleCommand::ForceLatch));
    }

    #[test]
    fn line_endings_and_whitespace_are_trimmed() {
        assert_eq!(parse("  RESET\r\n"), Ok(ConsoleCommand::Reset));
        assert_eq!(parse("\tVERBOSE ON \r"), Ok(ConsoleCommand::VerboseOn));
    }

    #[test]
    fn bypass_takes_a_binary_argument() {
        assert_eq!(
            parse("bypass_thermo 1"),
            Ok(ConsoleCommand::BypassThermo(Some(true)))
        );
        assert_eq!(
            parse("BYPASS_THERMO 0"),
            Ok(ConsoleCommand::BypassThermo(Some(false)))
        );
        // Missing or malformed argument asks for the usage line.
        assert_eq!(parse("bypass_thermo"), Ok(ConsoleCommand::BypassThermo(None)));
        assert_eq!(
            parse("bypass_thermo ?"),
            Ok(ConsoleCommand::BypassThermo(None))
        );
    }

    #[test]
    fn unknown_input_is_echoed_back() {
        assert_eq!(parse("  START NOW \r\n"), Err("START NOW"));
        assert_eq!(parse("flash"), Err("flash"));
    }
}
