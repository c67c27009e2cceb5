//! Link variable identifiers
//!
//! The integration contract with the cell PLC: every value exchanged
//! over the link is addressed by one of these ids.

/// Variables exchanged with the PLC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum VarId {
    /// Digital port A image (controller writes)
    PortA = 1,
    /// Digital port B image (controller reads)
    PortB = 2,
    /// Job-select outputs, port C image (controller reads)
    PortC = 3,
    /// Relay/fault debug status word (controller writes)
    StatusDebug = 4,
    /// PLC command word (controller reads; bit0 = latch reset, bit1 = force fault)
    StatusPlc = 5,
    /// Interlock/temperature status word (controller writes)
    StatusActive = 6,
    /// Remote laser-unit monitor word (controller writes)
    StatusDebugTru = 7,
}

impl VarId {
    /// Get the id as its wire byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a wire byte into a variable id
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(VarId::PortA),
            2 => Some(VarId::PortB),
            3 => Some(VarId::PortC),
            4 => Some(VarId::StatusDebug),
            5 => Some(VarId::StatusPlc),
            6 => Some(VarId::StatusActive),
            7 => Some(VarId::StatusDebugTru),
            _ => None,
        }
    }
}
