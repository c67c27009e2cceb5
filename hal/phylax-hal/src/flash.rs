//! Raw NOR flash abstraction
//!
//! The event log needs explicit control over erase/program ordering
//! (record body first, commit byte second), so this trait exposes the
//! raw NOR operations instead of a key-value store: sector erase turns
//! a 4 KiB region to 0xFF, page program only clears bits.

/// NOR flash erase granularity in bytes
pub const SECTOR_SIZE: usize = 4096;

/// NOR flash program granularity in bytes
///
/// A single program operation must not cross a page boundary.
pub const PAGE_SIZE: usize = 256;

/// Errors from flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Bus transfer failed
    Bus,
    /// Device stayed busy past the bounded wait
    Timeout,
    /// Address or length outside the device
    OutOfBounds,
}

/// Sector-erasable NOR flash device
///
/// Implementations serialize access themselves or are wrapped in a mutex
/// by the caller; the log layer assumes every call sees the device idle.
pub trait NorFlash {
    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Program bytes starting at `addr`.
    ///
    /// Implementations split writes that cross a page boundary into
    /// successive program operations. Programming only clears bits;
    /// the region must have been erased for the result to equal `data`.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Erase the 4 KiB sector containing `addr` to 0xFF.
    fn sector_erase_4k(&mut self, addr: u32) -> Result<(), FlashError>;

    /// Read the JEDEC manufacturer/device id.
    fn jedec_id(&mut self) -> Result<u32, FlashError>;
}
