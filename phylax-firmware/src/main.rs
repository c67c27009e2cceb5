//! Phylax - Laser Housekeeping Controller Firmware
//!
//! Main firmware binary for the STM32F4 housekeeping board: interlock
//! scanning, fault rules, safety latches, flash event log, PLC link
//! and operator console.
//!
//! Named after the Greek "phylax" (guard) - this controller's whole
//! job is to stand between the operator and the beam.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::bind_interrupts;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::peripherals;
use embassy_stm32::spi;
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{BufferedInterruptHandler, BufferedUart, Config as UartConfig};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use phylax_core::config::SafetyConfig;
use phylax_core::log::FlashLog;
use phylax_drivers::{LatchBank, Max31855, W25q};

use crate::io::{InPin, OutPin, SpinDelay};
use crate::tasks::inputs::InputBank;

mod channels;
mod io;
mod tasks;

bind_interrupts!(struct Irqs {
    USART2 => BufferedInterruptHandler<peripherals::USART2>;
    USART3 => BufferedInterruptHandler<peripherals::USART3>;
});

// UART buffers (must live forever)
static PLC_TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static PLC_RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static CON_TX_BUF: StaticCell<[u8; 512]> = StaticCell::new();
static CON_RX_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Phylax firmware starting...");

    let p = embassy_stm32::init(Default::default());
    let config = SafetyConfig::default();

    // Interlock inputs, ordered by InputId
    let input_bank = InputBank::new([
        Input::new(p.PA0, Pull::None),  // DOOR
        Input::new(p.PA1, Pull::None),  // DOOR_LATCH_ERR
        Input::new(p.PA4, Pull::None),  // ESTOP
        Input::new(p.PA8, Pull::None),  // ESTOP_LATCH_ERR
        Input::new(p.PA9, Pull::None),  // KEY
        Input::new(p.PA10, Pull::None), // KEY_LATCH_ERR
        Input::new(p.PA11, Pull::None), // BDO
        Input::new(p.PA12, Pull::None), // BDO_LATCH_ERR
        Input::new(p.PB2, Pull::None),  // RELAY1_ON
        Input::new(p.PB10, Pull::None), // RELAY2_ON
        Input::new(p.PB12, Pull::None), // RELAY_LATCH_ERR
        Input::new(p.PB13, Pull::None), // NO1
        Input::new(p.PB14, Pull::None), // NC1
        Input::new(p.PB15, Pull::None), // 12V_PWR_GOOD
        Input::new(p.PC0, Pull::None),  // 24V_PWR_GOOD
        Input::new(p.PC1, Pull::None),  // 12V_FUSE_GOOD
        Input::new(p.PC2, Pull::None),  // TRU_LAS_DEACTIVATED
        Input::new(p.PC3, Pull::None),  // TRU_SYS_FAULT
        Input::new(p.PC6, Pull::None),  // TRU_BEAM_DELIVERY
        Input::new(p.PC7, Pull::None),  // TRU_EMISS_WARN
        Input::new(p.PC13, Pull::None), // TRU_ALARM
        Input::new(p.PC14, Pull::None), // TRU_MONITOR
        Input::new(p.PC15, Pull::None), // TRU_TEMPERATURE
    ]);

    // Latch bank and laser switch; construction drives the known
    // startup state (data armed, clocks idle, laser enabled)
    let latches = LatchBank::new(
        OutPin(Output::new(p.PB3, Level::High, Speed::Low)), // door data
        OutPin(Output::new(p.PB4, Level::High, Speed::Low)), // relay data
        OutPin(Output::new(p.PB5, Level::High, Speed::Low)), // mcu data
        OutPin(Output::new(p.PB7, Level::Low, Speed::Low)),  // door clk
        OutPin(Output::new(p.PB8, Level::Low, Speed::Low)),  // relay clk
        OutPin(Output::new(p.PC4, Level::Low, Speed::Low)),  // mcu clk
        OutPin(Output::new(p.PC5, Level::High, Speed::Low)), // laser disable
        SpinDelay,
    );
    channels::install_latches(latches);
    channels::publish_laser_pin();

    // Thermocouple converter on bit-banged SPI
    let thermo = Max31855::new(
        OutPin(Output::new(p.PB6, Level::High, Speed::Medium)), // SCK
        OutPin(Output::new(p.PB1, Level::High, Speed::Medium)), // CS
        InPin(Input::new(p.PB9, Pull::None)),                   // MISO
        SpinDelay,
    );

    // Event log flash on SPI1
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(8_000_000);
    let bus = spi::Spi::new_blocking(p.SPI1, p.PA5, p.PA7, p.PA6, spi_config);
    let flash = W25q::new(bus, OutPin(Output::new(p.PB0, Level::High, Speed::VeryHigh)));
    match FlashLog::open(flash) {
        Ok(mut log) => {
            let id = log.flash_mut().jedec_id().unwrap_or(0);
            info!(
                "Flash JEDEC ID 0x{:06x}, log resumes at slot {} seq {}",
                id,
                log.write_index(),
                log.next_sequence()
            );
            *channels::FLASH_LOG.lock().await = Some(log);
        }
        // The controller runs without its log; faults still actuate
        Err(_) => warn!("Flash log unavailable"),
    }

    // PLC link on USART2
    let mut plc_config = UartConfig::default();
    plc_config.baudrate = 115_200;
    let plc = unwrap!(BufferedUart::new(
        p.USART2,
        Irqs,
        p.PA3,
        p.PA2,
        PLC_TX_BUF.init([0; 256]),
        PLC_RX_BUF.init([0; 256]),
        plc_config,
    ));
    let (plc_tx, plc_rx) = plc.split();

    // Operator console on USART3
    let mut con_config = UartConfig::default();
    con_config.baudrate = 115_200;
    let console = unwrap!(BufferedUart::new(
        p.USART3,
        Irqs,
        p.PC11,
        p.PC10,
        CON_TX_BUF.init([0; 512]),
        CON_RX_BUF.init([0; 64]),
        con_config,
    ));
    let (con_tx, con_rx) = console.split();

    // Panel reset button
    let button = ExtiInput::new(p.PA15, p.EXTI15, Pull::Up);

    // Indicators
    let heartbeat = Output::new(p.PD2, Level::Low, Speed::Low);
    let emission_fault = Output::new(p.PC12, Level::Low, Speed::Low);

    unwrap!(spawner.spawn(tasks::inputs::input_scan_task(input_bank, config)));
    unwrap!(spawner.spawn(tasks::thermal::thermal_task(thermo)));
    unwrap!(spawner.spawn(tasks::log_writer::log_writer_task()));
    unwrap!(spawner.spawn(tasks::link::link_rx_task(plc_rx)));
    unwrap!(spawner.spawn(tasks::link::plc_exchange_task(plc_tx)));
    unwrap!(spawner.spawn(tasks::reporter::reporter_task(con_tx)));
    unwrap!(spawner.spawn(tasks::console::console_rx_task(con_rx)));
    unwrap!(spawner.spawn(tasks::button::reset_button_task(button)));
    unwrap!(spawner.spawn(tasks::latch::reset_latches_task()));
    unwrap!(spawner.spawn(tasks::latch::force_latches_task()));
    unwrap!(spawner.spawn(tasks::blink::blink_task(heartbeat, emission_fault)));

    info!("All tasks running");
}
