//! PLC Link Communication Protocol
//!
//! This crate defines the byte-oriented link between the housekeeping
//! controller and the cell PLC, plus the receive-side plumbing shared by
//! both UART roles.
//!
//! # Protocol Overview
//!
//! All messages use a fixed-format binary frame:
//! ```text
//! ┌───────┬──────┬────────┬───────────────┬──────┐
//! │ START │ CMD  │ VAR_ID │ VALUE (LE)    │ END  │
//! │ 0xAA  │ 1B   │ 1B     │ 0 or 2 bytes  │ 0x55 │
//! └───────┴──────┴────────┴───────────────┴──────┘
//! ```
//!
//! WRITE and ACK frames always carry a value (6 bytes total). READ is
//! role-dependent: a request from the initiator is 4 bytes, the reply
//! carrying the value is 6. Framing errors are treated as line noise -
//! the parser silently drops the frame and resynchronizes on the next
//! start byte.

#![no_std]
#![deny(unsafe_code)]

pub mod frame;
pub mod ring;
pub mod vars;

pub use frame::{Command, FrameParser, LinkFrame, Role, FRAME_END, FRAME_START, MAX_FRAME_LEN};
pub use ring::RingBuffer;
pub use vars::VarId;
