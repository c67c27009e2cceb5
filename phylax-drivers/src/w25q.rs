//! W25Q-series SPI NOR flash
//!
//! Minimal command set for the event log: JEDEC id, read, page
//! program, 4 KiB sector erase. Every mutating command is preceded by
//! write-enable and followed by a bounded busy poll on status
//! register 1. Writes that cross a 256-byte page boundary are split
//! into successive program operations - the device would otherwise
//! wrap inside the page.
//!
//! Access serialization across tasks is the caller's job (the firmware
//! keeps the whole device behind one mutex); this driver assumes each
//! call sees the bus idle.

use embedded_hal::spi::SpiBus;

use phylax_hal::flash::{FlashError, NorFlash, PAGE_SIZE};
use phylax_hal::OutputPin;

const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_READ_STATUS1: u8 = 0x05;
const CMD_READ_DATA: u8 = 0x03;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_SECTOR_ERASE_4K: u8 = 0x20;
const CMD_JEDEC_ID: u8 = 0x9F;

/// BUSY bit of status register 1
const SR1_BUSY: u8 = 0x01;

/// Status poll iterations before declaring a timeout; covers the
/// ~45 ms typical sector erase with a wide margin.
const BUSY_POLL_LIMIT: u32 = 2_000_000;

pub const JEDEC_W25Q16JV: u32 = 0xEF4015;
pub const JEDEC_W25Q64JV: u32 = 0xEF4017;

/// Console-facing name for a known JEDEC id
pub fn part_name(id: u32) -> Option<&'static str> {
    match id {
        JEDEC_W25Q16JV => Some("W25Q16JV (2 MBytes)"),
        JEDEC_W25Q64JV => Some("W25Q64JV (8 MBytes)"),
        _ => None,
    }
}

/// W25Q flash on a shared SPI bus with a dedicated chip select
pub struct W25q<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS> W25q<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    /// Take the bus and chip select; the select line is parked high.
    pub fn new(spi: SPI, mut cs: CS) -> Self {
        cs.set_high();
        Self { spi, cs }
    }

    fn addressed(cmd: u8, addr: u32) -> [u8; 4] {
        [cmd, (addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
    }

    /// Run one chip-select window: write `tx`, then read into `rx`.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), FlashError> {
        self.cs.set_low();
        let result = self
            .spi
            .write(tx)
            .and_then(|_| if rx.is_empty() { Ok(()) } else { self.spi.read(rx) })
            .and_then(|_| self.spi.flush());
        self.cs.set_high();
        result.map_err(|_| FlashError::Bus)
    }

    fn write_enable(&mut self) -> Result<(), FlashError> {
        self.transfer(&[CMD_WRITE_ENABLE], &mut [])
    }

    fn wait_ready(&mut self) -> Result<(), FlashError> {
        for _ in 0..BUSY_POLL_LIMIT {
            let mut sr = [0u8; 1];
            self.transfer(&[CMD_READ_STATUS1], &mut sr)?;
            if sr[0] & SR1_BUSY == 0 {
                return Ok(());
            }
        }
        Err(FlashError::Timeout)
    }

    fn program_within_page(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        self.write_enable()?;

        self.cs.set_low();
        let result = self
            .spi
            .write(&Self::addressed(CMD_PAGE_PROGRAM, addr))
            .and_then(|_| self.spi.write(data))
            .and_then(|_| self.spi.flush());
        self.cs.set_high();
        result.map_err(|_| FlashError::Bus)?;

        self.wait_ready()
    }
}

impl<SPI, CS> NorFlash for W25q<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.transfer(&Self::addressed(CMD_READ_DATA, addr), buf)
    }

    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        let mut addr = addr;
        let mut data = data;
        while !data.is_empty() {
            let room = PAGE_SIZE - (addr as usize % PAGE_SIZE);
            let chunk = data.len().min(room);
            self.program_within_page(addr, &data[..chunk])?;
            addr += chunk as u32;
            data = &data[chunk..];
        }
        Ok(())
    }

    fn sector_erase_4k(&mut self, addr: u32) -> Result<(), FlashError> {
        self.write_enable()?;
        self.transfer(&Self::addressed(CMD_SECTOR_ERASE_4K, addr), &mut [])?;
        self.wait_ready()
    }

    fn jedec_id(&mut self) -> Result<u32, FlashError> {
        let mut id = [0u8; 3];
        self.transfer(&[CMD_JEDEC_ID], &mut id)?;
        Ok(((id[0] as u32) << 16) | ((id[1] as u32) << 8) | id[2] as u32)
    }
}
