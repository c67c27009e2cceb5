//! PLC link tasks
//!
//! Two halves of the UART link to the cell PLC:
//!
//! - the receive bridge, draining UART bytes through the ring buffer
//!   into the frame parser and dispatching decoded replies; woken by
//!   reception with a 20 ms fallback poll
//! - the exchange loop, pushing status words on change and polling the
//!   PLC command word for the latch reset/force bits

use defmt::*;
use embassy_stm32::usart::{BufferedUartRx, BufferedUartTx};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_io_async::{Read, Write};

use phylax_protocol::frame::{self, Command, FrameParser, LinkFrame, Role, MAX_FRAME_LEN};
use phylax_protocol::{RingBuffer, VarId};

use crate::channels::{
    copy_out, VarValue, ACK_CHANNEL, DATA_CHANNEL, FORCE_LATCH, RESET_LATCH, STATUS_WORDS,
};

/// Receive chunk size per UART read
const RX_CHUNK: usize = 64;

/// Fallback poll period when no reception wakes the bridge (ms)
const LINK_POLL_MS: u64 = 20;

/// Bounded transmit timeout (ms)
const TX_TIMEOUT_MS: u64 = 20;

/// Reply wait after a request (ms)
const REPLY_TIMEOUT_MS: u64 = 50;

/// Exchange loop cadence (ms)
const EXCHANGE_PERIOD_MS: u64 = 100;

/// Link considered lost after this long without any reply (ms)
const LINK_LOST_MS: u64 = 2000;

/// Receive-to-parse bridge task
#[embassy_executor::task]
pub async fn link_rx_task(mut rx: BufferedUartRx<'static>) {
    info!("Link RX task started");

    let mut ring: RingBuffer<256> = RingBuffer::new();
    let mut parser = FrameParser::new(Role::Initiator);
    let mut chunk = [0u8; RX_CHUNK];

    loop {
        match with_timeout(Duration::from_millis(LINK_POLL_MS), rx.read(&mut chunk)).await {
            Ok(Ok(n)) if n > 0 => {
                let written = ring.extend(&chunk[..n]);
                if written < n {
                    warn!("Link RX overrun, {} bytes dropped", n - written);
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(_)) => warn!("Link RX error"),
            // Timeout: fall through and drain whatever is queued
            Err(_) => {}
        }

        while let Some(byte) = ring.pop() {
            if let Some(frame) = parser.feed(byte) {
                dispatch(frame);
            }
        }
    }
}

/// Route one decoded frame to its channel; full queues drop the frame.
fn dispatch(frame: LinkFrame) {
    let value = match frame.value {
        Some(value) => value,
        // Valueless frames are requests; the initiator side has no use
        // for them.
        None => return,
    };
    let var = VarValue {
        var_id: frame.var_id,
        value,
    };
    match frame.command {
        Command::Ack => {
            let _ = ACK_CHANNEL.try_send(var);
        }
        Command::Read => {
            let _ = DATA_CHANNEL.try_send(var);
        }
        Command::Write => {}
    }
}

async fn send(tx: &mut BufferedUartTx<'static>, bytes: &[u8]) -> Result<(), ()> {
    match with_timeout(Duration::from_millis(TX_TIMEOUT_MS), tx.write_all(bytes)).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}

/// Build and transmit a WRITE frame
async fn write_u16(tx: &mut BufferedUartTx<'static>, var: VarId, value: u16) -> Result<(), ()> {
    let mut buf = [0u8; MAX_FRAME_LEN];
    let n = frame::build_write(var.as_u8(), value, &mut buf);
    send(tx, &buf[..n]).await
}

/// Build and transmit a READ request frame
async fn read_u16(tx: &mut BufferedUartTx<'static>, var: VarId) -> Result<(), ()> {
    let mut buf = [0u8; MAX_FRAME_LEN];
    let n = frame::build_read_request(var.as_u8(), &mut buf);
    send(tx, &buf[..n]).await
}

/// Write one status word when it changed, confirming via ACK
async fn push_word(
    tx: &mut BufferedUartTx<'static>,
    var: VarId,
    value: u16,
    last: &mut Option<u16>,
    got_frame: &mut bool,
) {
    if *last == Some(value) {
        return;
    }
    if write_u16(tx, var, value).await.is_err() {
        return;
    }
    if let Ok(ack) = with_timeout(
        Duration::from_millis(REPLY_TIMEOUT_MS),
        ACK_CHANNEL.receive(),
    )
    .await
    {
        *got_frame = true;
        debug!("ACK: var {} = 0x{:04x}", ack.var_id, ack.value);
    }
    *last = Some(value);
}

/// PLC exchange task
#[embassy_executor::task]
pub async fn plc_exchange_task(mut tx: BufferedUartTx<'static>) {
    info!("PLC exchange task started");

    let mut last_debug: Option<u16> = None;
    let mut last_active: Option<u16> = None;
    let mut last_tru: Option<u16> = None;
    let mut reset_prev = false;
    let mut force_prev = false;
    let mut last_rx = Instant::now();
    let mut online = false;

    loop {
        Timer::after(Duration::from_millis(EXCHANGE_PERIOD_MS)).await;
        let mut got_frame = false;

        // Flush stale replies from the previous round
        while ACK_CHANNEL.try_receive().is_ok() {}
        while DATA_CHANNEL.try_receive().is_ok() {}

        let words = copy_out(&STATUS_WORDS);
        push_word(&mut tx, VarId::StatusDebug, words.debug, &mut last_debug, &mut got_frame).await;
        push_word(
            &mut tx,
            VarId::StatusActive,
            words.active,
            &mut last_active,
            &mut got_frame,
        )
        .await;
        push_word(
            &mut tx,
            VarId::StatusDebugTru,
            words.tru,
            &mut last_tru,
            &mut got_frame,
        )
        .await;

        // Poll the PLC command word
        if read_u16(&mut tx, VarId::StatusPlc).await.is_ok() {
            if let Ok(reply) = with_timeout(
                Duration::from_millis(REPLY_TIMEOUT_MS),
                DATA_CHANNEL.receive(),
            )
            .await
            {
                got_frame = true;

                let reset_now = reply.value & (1 << 0) != 0;
                if reset_now && !reset_prev {
                    RESET_LATCH.signal(());
                    info!("PLC bit0 rising edge: latch reset triggered");
                }
                reset_prev = reset_now;

                let force_now = reply.value & (1 << 1) != 0;
                if force_now && !force_prev {
                    FORCE_LATCH.signal(());
                    info!("PLC bit1 rising edge: latch fault forced");
                }
                force_prev = force_now;
            }
        }

        // Link supervision
        if got_frame {
            last_rx = Instant::now();
            if !online {
                online = true;
                info!("PLC link established");
            }
        } else if online && last_rx.elapsed() > Duration::from_millis(LINK_LOST_MS) {
            online = false;
            warn!("PLC link lost - no response");
        }
    }
}
