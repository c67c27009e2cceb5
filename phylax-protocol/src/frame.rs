//! Frame parsing and building for the PLC link
//!
//! Frame format:
//! - START (1 byte): 0xAA synchronization byte
//! - CMD (1 byte): READ / WRITE / ACK
//! - VAR_ID (1 byte): variable identifier
//! - VALUE (0 or 2 bytes): little-endian u16, presence depends on
//!   command and role
//! - END (1 byte): 0x55 terminator
//!
//! The total length is derived purely from (role, command): WRITE and
//! ACK are always 6 bytes; READ is 4 bytes when received by the
//! responder (a request) and 6 bytes when received by the initiator
//! (a reply carrying the value). A frame with a bad end byte or an
//! unknown command is dropped without notice and the parser waits for
//! the next start byte - one corrupted byte can desynchronize the
//! stream until the next 0xAA, which is accepted as the cost of the
//! fixed-length format.

/// Frame synchronization byte
pub const FRAME_START: u8 = 0xAA;

/// Frame terminator byte
pub const FRAME_END: u8 = 0x55;

/// Largest frame the link ever carries
pub const MAX_FRAME_LEN: usize = 8;

/// Link commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Request (4 bytes) or reply with value (6 bytes)
    Read = 0x01,
    /// Write a variable value
    Write = 0x02,
    /// Acknowledge a write, echoing the value
    Ack = 0x06,
}

impl Command {
    /// Get the command as its wire byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a wire byte into a command
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Command::Read),
            0x02 => Some(Command::Write),
            0x06 => Some(Command::Ack),
            _ => None,
        }
    }
}

/// Which end of the link this parser sits on
///
/// The initiator sends READ requests and receives 6-byte READ replies;
/// the responder receives 4-byte READ requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Initiator,
    Responder,
}

/// A completely received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkFrame {
    pub command: Command,
    pub var_id: u8,
    /// Present on 6-byte frames, `None` on 4-byte READ requests
    pub value: Option<u16>,
}

/// Expected total frame length for (role, command)
fn frame_len(role: Role, command: Command) -> usize {
    match command {
        Command::Write | Command::Ack => 6,
        Command::Read => match role {
            Role::Responder => 4,
            Role::Initiator => 6,
        },
    }
}

/// State machine reassembling frames from a byte stream
///
/// Feed received bytes one at a time; a completed frame is returned as
/// soon as its last byte arrives. Internal state resets unconditionally
/// after every complete or failed frame.
#[derive(Debug, Clone)]
pub struct FrameParser {
    role: Role,
    buf: [u8; MAX_FRAME_LEN],
    idx: usize,
    expected: usize,
    command: Option<Command>,
}

impl FrameParser {
    /// Create a parser for the given link role
    pub fn new(role: Role) -> Self {
        Self {
            role,
            buf: [0; MAX_FRAME_LEN],
            idx: 0,
            expected: 0,
            command: None,
        }
    }

    /// Reset to waiting for a start byte
    pub fn reset(&mut self) {
        self.idx = 0;
        self.expected = 0;
        self.command = None;
    }

    /// Feed one received byte
    ///
    /// Returns the decoded frame when this byte completes one. Invalid
    /// data (unknown command, bad end byte) is dropped silently per the
    /// line-noise policy; the parser is left waiting for the next start
    /// byte.
    pub fn feed(&mut self, byte: u8) -> Option<LinkFrame> {
        if self.idx == 0 {
            if byte != FRAME_START {
                return None;
            }
            self.buf[0] = byte;
            self.idx = 1;
            return None;
        }

        self.buf[self.idx] = byte;
        self.idx += 1;

        if self.idx == 2 {
            match Command::from_u8(byte) {
                Some(command) => {
                    self.command = Some(command);
                    self.expected = frame_len(self.role, command);
                }
                None => {
                    self.reset();
                    return None;
                }
            }
        }

        if self.idx == self.expected {
            let command = self.command?;
            if self.buf[self.expected - 1] != FRAME_END {
                self.reset();
                return None;
            }

            let value = if self.expected == 6 {
                Some(u16::from_le_bytes([self.buf[3], self.buf[4]]))
            } else {
                None
            };
            let frame = LinkFrame {
                command,
                var_id: self.buf[2],
                value,
            };

            self.reset();
            return Some(frame);
        }

        None
    }

    /// Feed a slice of received bytes
    ///
    /// Returns the first complete frame found; bytes after it are not
    /// consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Option<LinkFrame> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte) {
                return Some(frame);
            }
        }
        None
    }
}

/// Build a WRITE frame into `out`, returning the encoded length
pub fn build_write(var_id: u8, value: u16, out: &mut [u8; MAX_FRAME_LEN]) -> usize {
    let [lsb, msb] = value.to_le_bytes();
    out[0] = FRAME_START;
    out[1] = Command::Write.as_u8();
    out[2] = var_id;
    out[3] = lsb;
    out[4] = msb;
    out[5] = FRAME_END;
    6
}

/// Build a READ request frame (no value), returning the encoded length
pub fn build_read_request(var_id: u8, out: &mut [u8; MAX_FRAME_LEN]) -> usize {
    out[0] = FRAME_START;
    out[1] = Command::Read.as_u8();
    out[2] = var_id;
    out[3] = FRAME_END;
    4
}

/// Build a READ reply frame carrying the value, returning the encoded length
pub fn build_read_reply(var_id: u8, value: u16, out: &mut [u8; MAX_FRAME_LEN]) -> usize {
    let [lsb, msb] = value.to_le_bytes();
    out[0] = FRAME_START;
    out[1] = Command::Read.as_u8();
    out[2] = var_id;
    out[3] = lsb;
    out[4] = msb;
    out[5] = FRAME_END;
    6
}

/// Build an ACK frame echoing the value, returning the encoded length
pub fn build_ack(var_id: u8, value: u16, out: &mut [u8; MAX_FRAME_LEN]) -> usize {
    let [lsb, msb] = value.to_le_bytes();
    out[0] = FRAME_START;
    out[1] = Command::Ack.as_u8();
    out[2] = var_id;
    out[3] = lsb;
    out[4] = msb;
    out[5] = FRAME_END;
    6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_frame_parses_byte_by_byte() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let n = build_write(3, 0xBEEF, &mut out);
        assert_eq!(n, 6);

        let mut parser = FrameParser::new(Role::Responder);
        for &b in &out[..n - 1] {
            assert_eq!(parser.feed(b), None);
        }
        let frame = parser.feed(out[n - 1]).unwrap();
        assert_eq!(frame.command, Command::Write);
        assert_eq!(frame.var_id, 3);
        assert_eq!(frame.value, Some(0xBEEF));
    }

    #[test]
    fn value_is_little_endian() {
        let mut out = [0u8; MAX_FRAME_LEN];
        build_write(1, 0x1234, &mut out);
        assert_eq!(out[3], 0x34);
        assert_eq!(out[4], 0x12);
    }

    #[test]
    fn garbage_before_start_is_ignored() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let n = build_ack(7, 42, &mut out);

        let mut parser = FrameParser::new(Role::Initiator);
        assert_eq!(parser.feed_bytes(&[0x00, 0xFF, 0x12, 0x55]), None);
        let frame = parser.feed_bytes(&out[..n]).unwrap();
        assert_eq!(frame.command, Command::Ack);
        assert_eq!(frame.value, Some(42));
    }

    #[test]
    fn bad_end_byte_discards_and_recovers() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let n = build_write(2, 0x0102, &mut out);
        let mut corrupted = out;
        corrupted[n - 1] = 0x00;

        let mut parser = FrameParser::new(Role::Responder);
        assert_eq!(parser.feed_bytes(&corrupted[..n]), None);

        // Parser state is fully reset: the very next valid frame parses.
        let frame = parser.feed_bytes(&out[..n]).unwrap();
        assert_eq!(frame.var_id, 2);
        assert_eq!(frame.value, Some(0x0102));
    }

    #[test]
    fn unknown_command_resets_parser() {
        let mut parser = FrameParser::new(Role::Responder);
        assert_eq!(parser.feed_bytes(&[FRAME_START, 0x7F, 0x01, FRAME_END]), None);

        let mut out = [0u8; MAX_FRAME_LEN];
        let n = build_read_request(5, &mut out);
        let frame = parser.feed_bytes(&out[..n]).unwrap();
        assert_eq!(frame.command, Command::Read);
        assert_eq!(frame.var_id, 5);
        assert_eq!(frame.value, None);
    }

    #[test]
    fn read_length_depends_on_role() {
        let mut out = [0u8; MAX_FRAME_LEN];

        // Responder sees the 4-byte request
        let n = build_read_request(6, &mut out);
        assert_eq!(n, 4);
        let mut responder = FrameParser::new(Role::Responder);
        let frame = responder.feed_bytes(&out[..n]).unwrap();
        assert_eq!(frame.value, None);

        // Initiator sees the 6-byte reply
        let n = build_read_reply(6, 0xA5A5, &mut out);
        assert_eq!(n, 6);
        let mut initiator = FrameParser::new(Role::Initiator);
        let frame = initiator.feed_bytes(&out[..n]).unwrap();
        assert_eq!(frame.value, Some(0xA5A5));
    }

    #[test]
    fn initiator_rejects_short_read() {
        // A 4-byte request arriving at the initiator has 0x55 where the
        // value LSB belongs; the parser keeps accumulating to 6 bytes
        // and then drops the frame on the end-byte check.
        let mut out = [0u8; MAX_FRAME_LEN];
        let n = build_read_request(1, &mut out);
        let mut parser = FrameParser::new(Role::Initiator);
        assert_eq!(parser.feed_bytes(&out[..n]), None);
        assert_eq!(parser.feed(0x00), None);
        assert_eq!(parser.feed(0x00), None);

        let n = build_ack(1, 1, &mut out);
        assert!(parser.feed_bytes(&out[..n]).is_some());
    }

    #[test]
    fn back_to_back_frames_parse_cleanly() {
        let mut a = [0u8; MAX_FRAME_LEN];
        let mut b = [0u8; MAX_FRAME_LEN];
        let na = build_write(1, 10, &mut a);
        let nb = build_ack(2, 20, &mut b);

        let mut parser = FrameParser::new(Role::Responder);
        assert!(parser.feed_bytes(&a[..na]).is_some());
        let frame = parser.feed_bytes(&b[..nb]).unwrap();
        assert_eq!(frame.command, Command::Ack);
        assert_eq!(frame.var_id, 2);
    }
}
