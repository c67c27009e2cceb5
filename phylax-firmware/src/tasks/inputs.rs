//! Input scan and rule evaluation task
//!
//! The 10 ms heartbeat of the safety core: sample every interlock
//! input, debounce, run the fault rules, actuate the latches, and
//! publish the snapshots everything else reads.

use core::sync::atomic::Ordering;

use defmt::*;
use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Instant, Ticker};

use phylax_core::config::SafetyConfig;
use phylax_core::events::Event;
use phylax_core::inputs::{InputId, InputScanner, InputSnapshot, INPUT_COUNT};
use phylax_core::safety::{RuleEngine, RuleId};
use phylax_core::status::{self, StatusWords};
use phylax_core::thermal::ThermalGuard;

use crate::channels::{
    copy_in, copy_out, publish_laser_pin, with_latches, BYPASS_CMD, EVENT_CHANNEL, GUARD_STATUS,
    INPUT_STATE, LASER_PIN_HIGH, LOG_CHANNEL, SAFETY_STATE, STATUS_WORDS, THERMO_READING,
};

/// The physical input bank, ordered by [`InputId`]
pub struct InputBank {
    pins: [Input<'static>; INPUT_COUNT],
}

impl InputBank {
    pub fn new(pins: [Input<'static>; INPUT_COUNT]) -> Self {
        Self { pins }
    }

    fn read_all(&self) -> InputSnapshot {
        let mut snap = InputSnapshot::new();
        for id in InputId::ALL {
            snap.set(id, self.pins[id.index()].is_high());
        }
        snap
    }
}

/// Input scan task
#[embassy_executor::task]
pub async fn input_scan_task(bank: InputBank, config: SafetyConfig) {
    info!(
        "Input scan task started; fault checks enabled after {} ms",
        config.startup_grace_ms
    );

    let start = Instant::now();
    let mut scanner = InputScanner::new(bank.read_all(), 0, &config);
    let mut engine = RuleEngine::new(&config);
    let mut guard = ThermalGuard::new(&config);
    // Thermo checks ship bypassed until commissioning enables them
    guard.set_bypass(true);

    let mut was_ready = false;
    let mut last_power_check = 0u32;
    let mut prev_rails: Option<(bool, bool, bool)> = None;

    let mut ticker = Ticker::every(Duration::from_millis(config.scan_tick_ms as u64));
    loop {
        ticker.next().await;
        let now_ms = start.elapsed().as_millis() as u32;

        if let Some(on) = BYPASS_CMD.try_take() {
            if guard.set_bypass(on) {
                if on {
                    info!("Thermocouple monitoring bypassed");
                } else {
                    info!("Thermocouple monitoring resumed");
                }
            }
        }

        let raw = bank.read_all();
        let changes = scanner.scan(&raw, now_ms);
        if scanner.system_ready() && !was_ready {
            was_ready = true;
            info!("System ready. Enabling latch/error monitoring");
        }
        for change in &changes {
            // Queue full: drop the event, the stable state is published anyway
            let _ = EVENT_CHANNEL.try_send(Event::InputChanged {
                input: change.input,
                state: change.state,
            });
        }

        let snap = scanner.snapshot();
        let reading = copy_out(&THERMO_READING);
        let mut state = copy_out(&SAFETY_STATE);

        let report = with_latches(|latches| {
            engine.evaluate(
                &snap,
                &mut guard,
                &reading,
                &mut state,
                latches,
                now_ms,
                scanner.system_ready(),
            )
        })
        .unwrap_or_default();

        copy_in(&SAFETY_STATE, state);

        for event in &report.events {
            let _ = EVENT_CHANNEL.try_send(Event::RuleEdge {
                message: event.message,
            });
        }
        for request in report.log {
            if LOG_CHANNEL.try_send(request).is_err() {
                warn!("Log queue full, entry dropped");
            }
        }

        // Rail transition report on its own slower cadence
        if now_ms.wrapping_sub(last_power_check) >= config.power_report_ms {
            last_power_check = now_ms;
            let rails = (
                snap.get(InputId::Pwr12vGood),
                snap.get(InputId::Pwr24vGood),
                snap.get(InputId::Fuse12vGood),
            );
            if Some(rails) != prev_rails {
                info!(
                    "[{} ms] 12V_PWR_GOOD={} 24V_PWR_GOOD={} 12V_FUSE_GOOD={}",
                    now_ms, rails.0, rails.1, rails.2
                );
                prev_rails = Some(rails);
            }
        }

        // Publish this cycle's view of the world
        publish_laser_pin();
        copy_in(&INPUT_STATE, snap);
        copy_in(&GUARD_STATUS, guard.status());
        let words = StatusWords {
            debug: status::debug_word(
                &snap,
                engine.rule_active(RuleId::DoorRequiresRelays),
                engine.rule_active(RuleId::RelayContactsMatch),
                engine.rule_active(RuleId::LatchError),
            ),
            active: status::active_word(&snap, state.fault_latched, guard.fault_active(), reading.tc_c),
            tru: status::tru_word(&snap, LASER_PIN_HIGH.load(Ordering::Relaxed)),
        };
        copy_in(&STATUS_WORDS, words);
    }
}
