//! Flash log event codes
//!
//! Stable numeric codes recorded with each log entry so a dump can be
//! read without the firmware source at hand. 20xx = thermal, 21xx =
//! fault set, 22xx = fault clear.

pub const OVERTEMP: u16 = 2001;
pub const TEMP_CLEAR: u16 = 2002;

pub const RELAY_FAULT: u16 = 2101;
pub const DOOR_FAULT: u16 = 2102;
pub const POWER_FAULT: u16 = 2103;
pub const LATCH_FAULT: u16 = 2104;

pub const RELAY_CLEAR: u16 = 2201;
pub const DOOR_CLEAR: u16 = 2202;
pub const POWER_CLEAR: u16 = 2203;
pub const LATCH_CLEAR: u16 = 2204;
