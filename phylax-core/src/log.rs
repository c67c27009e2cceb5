//! Persistent flash event log
//!
//! Circular log of fixed-size records in sector-erasable NOR flash,
//! used to record safety faults and clears for later retrieval over
//! the console. A record becomes visible only once its trailing commit
//! byte is programmed, which makes the sequence numbering consistent
//! across a power loss mid-write: a half-written slot reads as invalid
//! and is simply reused.
//!
//! Layout: records are packed contiguously inside 4 KiB sectors; a
//! sector is erased in bulk the moment the write cursor enters it.
//! Records are never individually overwritten.

use core::fmt::Write as _;

use heapless::String;

use phylax_hal::flash::{FlashError, NorFlash, SECTOR_SIZE};

/// Commit marker programmed after the record body
pub const COMMIT_VAL: u8 = 0x7E;

/// Log message text capacity
pub const MSG_LEN: usize = 20;

/// On-flash record size in bytes (packed, no padding)
pub const RECORD_SIZE: usize = 33;

/// Start address of the log area in flash
pub const LOG_BASE: u32 = 0x00_0000;

/// Number of 4 KiB sectors reserved for the log
pub const LOG_SECTORS: usize = 2;

/// Records stored per sector
pub const RECORDS_PER_SECTOR: usize = SECTOR_SIZE / RECORD_SIZE;

/// Total record capacity
pub const LOG_CAPACITY: usize = LOG_SECTORS * RECORDS_PER_SECTOR;

/// One log record
///
/// Wire layout: `seq:u32 | ms:u32 | code:u16 | flags:u16 | msg:[u8;20]
/// | commit:u8`, all little-endian. Valid iff `commit == COMMIT_VAL`;
/// an erased slot reads all-0xFF and is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    pub seq: u32,
    pub ms: u32,
    pub code: u16,
    pub flags: u16,
    pub msg: [u8; MSG_LEN],
    pub commit: u8,
}

impl LogRecord {
    /// Check the commit marker
    pub fn is_valid(&self) -> bool {
        self.commit == COMMIT_VAL
    }

    /// Message text up to the first NUL
    pub fn message(&self) -> &str {
        let end = self.msg.iter().position(|&b| b == 0).unwrap_or(MSG_LEN);
        core::str::from_utf8(&self.msg[..end]).unwrap_or("<invalid>")
    }

    /// Serialize to the on-flash layout
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..4].copy_from_slice(&self.seq.to_le_bytes());
        out[4..8].copy_from_slice(&self.ms.to_le_bytes());
        out[8..10].copy_from_slice(&self.code.to_le_bytes());
        out[10..12].copy_from_slice(&self.flags.to_le_bytes());
        out[12..32].copy_from_slice(&self.msg);
        out[32] = self.commit;
        out
    }

    /// Deserialize from the on-flash layout
    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Self {
        let mut msg = [0u8; MSG_LEN];
        msg.copy_from_slice(&bytes[12..32]);
        Self {
            seq: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            ms: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            code: u16::from_le_bytes([bytes[8], bytes[9]]),
            flags: u16::from_le_bytes([bytes[10], bytes[11]]),
            msg,
            commit: bytes[32],
        }
    }
}

/// A pending log entry queued to the writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    pub code: u16,
    pub flags: u16,
    pub msg: String<MSG_LEN>,
}

impl LogRequest {
    /// Build a request, truncating the message to capacity
    pub fn new(code: u16, flags: u16, msg: &str) -> Self {
        let mut text = String::new();
        for c in msg.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        Self {
            code,
            flags,
            msg: text,
        }
    }

    /// Build a request with a formatted temperature in the message
    pub fn with_temp(code: u16, flags: u16, prefix: &str, temp_c: f32) -> Self {
        let mut text: String<MSG_LEN> = String::new();
        // Truncation on overflow is acceptable for log text
        let _ = write!(text, "{} {:.1}C", prefix, temp_c);
        Self {
            code,
            flags,
            msg: text,
        }
    }
}

/// Circular commit-marked log over a NOR flash device
pub struct FlashLog<F: NorFlash> {
    flash: F,
    wr_index: usize,
    seq_next: u32,
}

impl<F: NorFlash> FlashLog<F> {
    fn slot_addr(index: usize) -> u32 {
        // Records never straddle an erase boundary: each sector holds
        // exactly RECORDS_PER_SECTOR slots, the leftover tail bytes
        // stay unused.
        let sector = index / RECORDS_PER_SECTOR;
        let offset = (index % RECORDS_PER_SECTOR) * RECORD_SIZE;
        LOG_BASE + (sector * SECTOR_SIZE + offset) as u32
    }

    fn slot_empty(&mut self, index: usize) -> Result<bool, FlashError> {
        let mut commit = [0u8; 1];
        self.flash
            .read(Self::slot_addr(index) + (RECORD_SIZE as u32 - 1), &mut commit)?;
        Ok(commit[0] == 0xFF)
    }

    fn read_slot(&mut self, index: usize) -> Result<LogRecord, FlashError> {
        let mut buf = [0u8; RECORD_SIZE];
        self.flash.read(Self::slot_addr(index), &mut buf)?;
        Ok(LogRecord::decode(&buf))
    }

    /// Open the log, recovering the write cursor and sequence number
    /// from persisted content.
    ///
    /// The cursor is the first slot whose commit byte is still erased;
    /// if every slot is occupied the cursor wraps to zero and the next
    /// append erases the first sector. The next sequence number comes
    /// from the most recently written valid record, so an interrupted
    /// append (body without commit) reuses both its slot and its
    /// sequence number.
    pub fn open(flash: F) -> Result<Self, FlashError> {
        let mut log = Self {
            flash,
            wr_index: 0,
            seq_next: 1,
        };

        while log.wr_index < LOG_CAPACITY && !log.slot_empty(log.wr_index)? {
            log.wr_index += 1;
        }

        if log.wr_index == 0 {
            return Ok(log);
        }

        let last = log.read_slot((log.wr_index - 1) % LOG_CAPACITY)?;
        log.seq_next = if last.is_valid() { last.seq + 1 } else { 1 };
        if log.wr_index == LOG_CAPACITY {
            log.wr_index = 0;
        }
        Ok(log)
    }

    /// Append one record
    ///
    /// The body is programmed first, the commit byte second; a power
    /// failure between the two leaves an invalid slot, never a
    /// corrupted-but-valid record. A failed program loses this record -
    /// retrying is the caller's decision.
    pub fn append(&mut self, now_ms: u32, code: u16, flags: u16, msg: &str) -> Result<(), FlashError> {
        if self.wr_index >= LOG_CAPACITY {
            self.wr_index = 0;
        }
        self.erase_sector_if_needed(self.wr_index)?;

        let mut record = LogRecord {
            seq: self.seq_next,
            ms: now_ms,
            code,
            flags,
            msg: [0; MSG_LEN],
            commit: 0xFF,
        };
        let text = msg.as_bytes();
        let n = text.len().min(MSG_LEN - 1);
        record.msg[..n].copy_from_slice(&text[..n]);
        self.seq_next += 1;

        let addr = Self::slot_addr(self.wr_index);
        let encoded = record.encode();
        self.flash.page_program(addr, &encoded[..RECORD_SIZE - 1])?;
        self.flash
            .page_program(addr + (RECORD_SIZE as u32 - 1), &[COMMIT_VAL])?;

        self.wr_index += 1;
        Ok(())
    }

    fn erase_sector_if_needed(&mut self, index: usize) -> Result<(), FlashError> {
        if index % RECORDS_PER_SECTOR == 0 {
            let addr = LOG_BASE + ((index / RECORDS_PER_SECTOR) * SECTOR_SIZE) as u32;
            self.flash.sector_erase_4k(addr)?;
        }
        Ok(())
    }

    /// Read up to `n` most recent records into `out`, newest first
    ///
    /// Walks backward from the write cursor and stops at the first
    /// invalid record - it never wraps past the oldest unwritten slot.
    /// Returns the count actually read.
    pub fn read_last_n(&mut self, n: usize, out: &mut [LogRecord]) -> Result<usize, FlashError> {
        if out.is_empty() {
            return Ok(0);
        }
        let n = n.min(LOG_CAPACITY);

        let mut end = self.wr_index;
        if end == 0 && !self.slot_empty(0)? {
            end = LOG_CAPACITY;
        }

        let mut count = 0;
        for _ in 0..n {
            if count == out.len() {
                break;
            }
            if end == 0 {
                end = LOG_CAPACITY;
            }
            let record = self.read_slot(end - 1)?;
            if !record.is_valid() {
                break;
            }
            out[count] = record;
            count += 1;
            end -= 1;
        }
        Ok(count)
    }

    /// Count valid records with a full linear scan
    ///
    /// O(capacity); operator diagnostic, not a hot path.
    pub fn count_valid(&mut self) -> Result<usize, FlashError> {
        let mut count = 0;
        for i in 0..LOG_CAPACITY {
            if self.read_slot(i)?.is_valid() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Erase every log sector and reset cursor and sequence
    pub fn erase_all(&mut self) -> Result<(), FlashError> {
        for sector in 0..LOG_SECTORS {
            self.flash
                .sector_erase_4k(LOG_BASE + (sector * SECTOR_SIZE) as u32)?;
        }
        self.wr_index = 0;
        self.seq_next = 1;
        Ok(())
    }

    /// Current write slot (0..capacity)
    pub fn write_index(&self) -> usize {
        self.wr_index
    }

    /// Sequence number the next append will use
    pub fn next_sequence(&self) -> u32 {
        self.seq_next
    }

    /// Access the underlying device for identification/self-test
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEM_SIZE: usize = LOG_SECTORS * SECTOR_SIZE;

    /// RAM-backed NOR flash with real erase/program semantics:
    /// erase sets 0xFF, programming only clears bits.
    struct MemFlash {
        data: [u8; MEM_SIZE],
        erase_count: usize,
    }

    impl MemFlash {
        fn new() -> Self {
            Self {
                data: [0xFF; MEM_SIZE],
                erase_count: 0,
            }
        }
    }

    impl NorFlash for MemFlash {
        fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
            let addr = addr as usize;
            buf.copy_from_slice(&self.data[addr..addr + buf.len()]);
            Ok(())
        }

        fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
            let addr = addr as usize;
            for (i, &b) in data.iter().enumerate() {
                self.data[addr + i] &= b;
            }
            Ok(())
        }

        fn sector_erase_4k(&mut self, addr: u32) -> Result<(), FlashError> {
            let base = (addr as usize / SECTOR_SIZE) * SECTOR_SIZE;
            self.data[base..base + SECTOR_SIZE].fill(0xFF);
            self.erase_count += 1;
            Ok(())
        }

        fn jedec_id(&mut self) -> Result<u32, FlashError> {
            Ok(0xEF4015)
        }
    }

    fn open_empty() -> FlashLog<MemFlash> {
        FlashLog::open(MemFlash::new()).unwrap()
    }

    #[test]
    fn append_then_read_round_trips() {
        let mut log = open_empty();
        log.append(1234, 2101, 1, "Relay contacts bad").unwrap();

        let mut out = [LogRecord::decode(&[0; RECORD_SIZE]); 4];
        let n = log.read_last_n(1, &mut out).unwrap();
        assert_eq!(n, 1);
        assert_eq!(out[0].seq, 1);
        assert_eq!(out[0].ms, 1234);
        assert_eq!(out[0].code, 2101);
        assert_eq!(out[0].flags, 1);
        assert_eq!(out[0].message(), "Relay contacts bad");
        assert!(out[0].is_valid());
    }

    #[test]
    fn read_last_n_returns_newest_first() {
        let mut log = open_empty();
        for i in 0..5u32 {
            log.append(i * 100, 2000 + i as u16, 0, "event").unwrap();
        }

        let mut out = [LogRecord::decode(&[0; RECORD_SIZE]); 3];
        let n = log.read_last_n(3, &mut out).unwrap();
        assert_eq!(n, 3);
        assert_eq!(out[0].seq, 5);
        assert_eq!(out[1].seq, 4);
        assert_eq!(out[2].seq, 3);
    }

    #[test]
    fn sector_boundary_triggers_exactly_one_erase() {
        let mut log = open_empty();
        // Opening an empty log costs no erase; the first append erases
        // sector 0.
        assert_eq!(log.flash_mut().erase_count, 0);
        for i in 0..RECORDS_PER_SECTOR as u32 {
            log.append(i, 1, 0, "fill").unwrap();
        }
        assert_eq!(log.flash_mut().erase_count, 1);

        // Crossing into sector 1 erases it, and only it.
        log.append(999, 1, 0, "next sector").unwrap();
        assert_eq!(log.flash_mut().erase_count, 2);

        // Records in sector 0 are untouched.
        let mut out = [LogRecord::decode(&[0; RECORD_SIZE]); 4];
        let n = log
            .read_last_n(RECORDS_PER_SECTOR + 1, &mut out)
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(out[0].seq, RECORDS_PER_SECTOR as u32 + 1);
        assert_eq!(out[1].seq, RECORDS_PER_SECTOR as u32);
    }

    #[test]
    fn wraparound_erases_first_sector_again() {
        let mut log = open_empty();
        for i in 0..LOG_CAPACITY as u32 {
            log.append(i, 1, 0, "fill").unwrap();
        }
        assert_eq!(log.flash_mut().erase_count, LOG_SECTORS);
        assert_eq!(log.write_index(), LOG_CAPACITY);

        // The next append wraps to slot 0 and erases sector 0.
        log.append(7777, 2, 0, "wrapped").unwrap();
        assert_eq!(log.flash_mut().erase_count, LOG_SECTORS + 1);
        assert_eq!(log.write_index(), 1);
        assert_eq!(log.next_sequence(), LOG_CAPACITY as u32 + 2);
    }

    #[test]
    fn reopen_recovers_cursor_and_sequence() {
        let mut log = open_empty();
        for i in 0..10u32 {
            log.append(i, 1, 0, "event").unwrap();
        }
        let flash = log.flash;

        let mut reopened = FlashLog::open(flash).unwrap();
        assert_eq!(reopened.write_index(), 10);
        assert_eq!(reopened.next_sequence(), 11);
        reopened.append(0, 1, 0, "after reboot").unwrap();
        let mut out = [LogRecord::decode(&[0; RECORD_SIZE]); 1];
        reopened.read_last_n(1, &mut out).unwrap();
        assert_eq!(out[0].seq, 11);
    }

    #[test]
    fn interrupted_append_is_invisible_and_slot_reused() {
        let mut log = open_empty();
        log.append(10, 1, 0, "first").unwrap();

        // Simulate power loss after the body write of record 2: program
        // the body directly, never the commit byte.
        let addr = FlashLog::<MemFlash>::slot_addr(1);
        let half = LogRecord {
            seq: 2,
            ms: 20,
            code: 9,
            flags: 0,
            msg: [0; MSG_LEN],
            commit: 0xFF,
        };
        let encoded = half.encode();
        log.flash_mut()
            .page_program(addr, &encoded[..RECORD_SIZE - 1])
            .unwrap();

        let mut reopened = FlashLog::open(log.flash).unwrap();
        // The half-written slot is the write cursor and its sequence
        // number is reissued.
        assert_eq!(reopened.write_index(), 1);
        assert_eq!(reopened.next_sequence(), 2);
        assert_eq!(reopened.count_valid().unwrap(), 1);

        reopened.append(30, 1, 0, "second try").unwrap();
        let mut out = [LogRecord::decode(&[0; RECORD_SIZE]); 2];
        let n = reopened.read_last_n(2, &mut out).unwrap();
        assert_eq!(n, 2);
        assert_eq!(out[0].seq, 2);
        assert_eq!(out[0].message(), "second try");
    }

    #[test]
    fn count_valid_scans_all_slots() {
        let mut log = open_empty();
        assert_eq!(log.count_valid().unwrap(), 0);
        for i in 0..7u32 {
            log.append(i, 1, 0, "event").unwrap();
        }
        assert_eq!(log.count_valid().unwrap(), 7);
    }

    #[test]
    fn erase_all_resets_log() {
        let mut log = open_empty();
        for i in 0..5u32 {
            log.append(i, 1, 0, "event").unwrap();
        }
        log.erase_all().unwrap();
        assert_eq!(log.write_index(), 0);
        assert_eq!(log.next_sequence(), 1);
        assert_eq!(log.count_valid().unwrap(), 0);
        let mut out = [LogRecord::decode(&[0; RECORD_SIZE]); 1];
        assert_eq!(log.read_last_n(1, &mut out).unwrap(), 0);
    }

    #[test]
    fn long_message_truncates_with_nul_terminator() {
        let mut log = open_empty();
        log.append(0, 1, 0, "this message is definitely longer than twenty bytes")
            .unwrap();
        let mut out = [LogRecord::decode(&[0; RECORD_SIZE]); 1];
        log.read_last_n(1, &mut out).unwrap();
        assert_eq!(out[0].message().len(), MSG_LEN - 1);
        assert_eq!(out[0].msg[MSG_LEN - 1], 0);
    }

    #[test]
    fn request_formats_temperature() {
        let req = LogRequest::with_temp(2001, 1, "Overtemp", 61.25);
        assert_eq!(req.msg.as_str(), "Overtemp 61.2C");
    }
}
