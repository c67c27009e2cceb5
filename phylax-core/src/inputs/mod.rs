//! Digital safety inputs
//!
//! Identity, display names and grouping for every monitored input line,
//! plus the debounce scanner that turns raw samples into stable states
//! and change events.

pub mod scanner;

pub use scanner::{InputChange, InputScanner};

/// Number of monitored input lines
pub const INPUT_COUNT: usize = 23;

/// Monitored input lines
///
/// Discriminants double as the index into state arrays, so the order
/// here is load-bearing for log output only, never for safety logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum InputId {
    /// Interlock door switch (1 = closed)
    Door = 0,
    DoorLatchErr,
    /// Emergency stop (1 = released)
    Estop,
    EstopLatchErr,
    /// Key switch (1 = on)
    Key,
    KeyLatchErr,
    /// Back-door interlock (1 = ok)
    Bdo,
    BdoLatchErr,
    /// Relay 1 coil feedback
    Relay1On,
    /// Relay 2 coil feedback
    Relay2On,
    RelayLatchErr,
    /// Contactor normally-open auxiliary contact
    No1,
    /// Contactor normally-closed auxiliary contact
    Nc1,
    Pwr12vGood,
    Pwr24vGood,
    Fuse12vGood,
    // Remote laser-unit monitor lines
    TruLasDeactivated,
    TruSysFault,
    TruBeamDelivery,
    TruEmissWarn,
    TruAlarm,
    TruMonitor,
    TruTemperature,
}

impl InputId {
    /// Every input, in index order
    pub const ALL: [InputId; INPUT_COUNT] = [
        InputId::Door,
        InputId::DoorLatchErr,
        InputId::Estop,
        InputId::EstopLatchErr,
        InputId::Key,
        InputId::KeyLatchErr,
        InputId::Bdo,
        InputId::BdoLatchErr,
        InputId::Relay1On,
        InputId::Relay2On,
        InputId::RelayLatchErr,
        InputId::No1,
        InputId::Nc1,
        InputId::Pwr12vGood,
        InputId::Pwr24vGood,
        InputId::Fuse12vGood,
        InputId::TruLasDeactivated,
        InputId::TruSysFault,
        InputId::TruBeamDelivery,
        InputId::TruEmissWarn,
        InputId::TruAlarm,
        InputId::TruMonitor,
        InputId::TruTemperature,
    ];

    /// Array index for this input
    pub fn index(self) -> usize {
        self as usize
    }

    /// Console name of this input
    pub fn name(self) -> &'static str {
        match self {
            InputId::Door => "DOOR",
            InputId::DoorLatchErr => "DOOR_LATCH_ERR",
            InputId::Estop => "ESTOP",
            InputId::EstopLatchErr => "ESTOP_LATCH_ERR",
            InputId::Key => "KEY",
            InputId::KeyLatchErr => "KEY_LATCH_ERR",
            InputId::Bdo => "BDO",
            InputId::BdoLatchErr => "BDO_LATCH_ERR",
            InputId::Relay1On => "RELAY1_ON",
            InputId::Relay2On => "RELAY2_ON",
            InputId::RelayLatchErr => "RELAY_LATCH_ERR",
            InputId::No1 => "NO1",
            InputId::Nc1 => "NC1",
            InputId::Pwr12vGood => "12V_PWR_GOOD",
            InputId::Pwr24vGood => "24V_PWR_GOOD",
            InputId::Fuse12vGood => "12V_FUSE_GOOD",
            InputId::TruLasDeactivated => "TRU_LAS_DEACTIVATED",
            InputId::TruSysFault => "TRU_SYS_FAULT",
            InputId::TruBeamDelivery => "TRU_BEAM_DELIVERY",
            InputId::TruEmissWarn => "TRU_EMISS_WARN",
            InputId::TruAlarm => "TRU_ALARM",
            InputId::TruMonitor => "TRU_MONITOR",
            InputId::TruTemperature => "TRU_TEMPERATURE",
        }
    }

    /// Human-readable label for a logic level on this input
    pub fn state_label(self, value: bool) -> &'static str {
        match self {
            InputId::Door => {
                if value {
                    "CLOSED"
                } else {
                    "OPEN"
                }
            }
            InputId::Estop => {
                if value {
                    "RELEASED"
                } else {
                    "PRESSED"
                }
            }
            InputId::Key | InputId::Relay1On | InputId::Relay2On => {
                if value {
                    "ON"
                } else {
                    "OFF"
                }
            }
            InputId::Bdo => {
                if value {
                    "ACTIVE"
                } else {
                    "INACTIVE"
                }
            }
            InputId::DoorLatchErr
            | InputId::EstopLatchErr
            | InputId::KeyLatchErr
            | InputId::BdoLatchErr
            | InputId::RelayLatchErr => {
                if value {
                    "ERROR"
                } else {
                    "OK"
                }
            }
            InputId::No1 => {
                if value {
                    "CLOSED"
                } else {
                    "OPEN"
                }
            }
            // NC contact: electrically inverted relative to NO
            InputId::Nc1 => {
                if value {
                    "OPEN"
                } else {
                    "CLOSED"
                }
            }
            _ => {
                if value {
                    "Ok"
                } else {
                    "Fault"
                }
            }
        }
    }

    /// Core inputs are always logged on change; the rest only when
    /// verbose logging is enabled.
    pub fn is_core(self) -> bool {
        matches!(
            self,
            InputId::Door
                | InputId::DoorLatchErr
                | InputId::Estop
                | InputId::EstopLatchErr
                | InputId::Key
                | InputId::KeyLatchErr
                | InputId::Bdo
                | InputId::BdoLatchErr
                | InputId::RelayLatchErr
                | InputId::Pwr12vGood
                | InputId::Pwr24vGood
                | InputId::Fuse12vGood
        )
    }
}

/// Debounced state of every input at one point in time
///
/// Written only by the scanner; everyone else reads copies. Readers
/// tolerate values from adjacent scan cycles - the rules only need
/// eventually-consistent levels, not a cross-input atomic snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputSnapshot {
    states: [bool; INPUT_COUNT],
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSnapshot {
    /// All inputs low
    pub const fn new() -> Self {
        Self {
            states: [false; INPUT_COUNT],
        }
    }

    /// Read one input's stable state
    pub fn get(&self, id: InputId) -> bool {
        self.states[id.index()]
    }

    /// Set one input's state
    pub fn set(&mut self, id: InputId, value: bool) {
        self.states[id.index()] = value;
    }

    /// Check the four primary safeties together: door closed, e-stop
    /// released, key on, back-door ok.
    pub fn all_safeties_active(&self) -> bool {
        self.get(InputId::Door)
            && self.get(InputId::Estop)
            && self.get(InputId::Key)
            && self.get(InputId::Bdo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_their_indices() {
        for (i, id) in InputId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
        assert_eq!(InputId::ALL.len(), INPUT_COUNT);
    }

    #[test]
    fn all_safeties_requires_every_primary() {
        let mut snap = InputSnapshot::new();
        for id in [InputId::Door, InputId::Estop, InputId::Key, InputId::Bdo] {
            snap.set(id, true);
        }
        assert!(snap.all_safeties_active());

        for id in [InputId::Door, InputId::Estop, InputId::Key, InputId::Bdo] {
            snap.set(id, false);
            assert!(!snap.all_safeties_active());
            snap.set(id, true);
        }
    }

    #[test]
    fn nc_contact_label_is_inverted() {
        assert_eq!(InputId::No1.state_label(true), "CLOSED");
        assert_eq!(InputId::Nc1.state_label(true), "OPEN");
    }
}
