// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver task for an external 802.15.4 Radio Co-Processor speaking
//! Spinel-over-HDLC on a UART, the way `drv/stm32h7-usart` owns its
//! register block directly but with a framed, request/response protocol
//! layered on top instead of a raw byte pipe.
//!
//! Every `CmdClient` operation is a complete synchronous round trip handled
//! inside a single dispatch call: encode, transmit, then block (via
//! `sys_recv_closed` on the UART notification, the same wait-for-hardware
//! idiom `drv/stm32xx-i2c-server` uses) until either the matching response
//! frame arrives or a deadline computed from `sys_get_timer` passes. Frames
//! that arrive with no op waiting on them -- `STREAM_RAW` inbound packets,
//! unsolicited resets -- are handed to [`ot_rcp_core::RcpClient`] from
//! whichever context happens to observe them, the idle top-level receive
//! loop or a command's own wait loop.
//!
//! # IPC protocol
//!
//! See `drv-ot-rcp-api` for the operation catalogue.

#![no_std]
#![no_main]

#[cfg(feature = "h743")]
use stm32h7::stm32h743 as device;
#[cfg(feature = "h753")]
use stm32h7::stm32h753 as device;
#[cfg(feature = "h7b3")]
use stm32h7::stm32h7b3 as device;

use drv_ot_rcp_api::{ResponseCode, TransmitWire, TRANSMIT_WIRE_SIZE};
use drv_stm32xx_sys_api::{Peripheral, Sys};
use ot_rcp_core::hdlc::{self, Decoder};
use ot_rcp_core::radio::{self, Capabilities, MAX_PSDU};
use ot_rcp_core::spinel::{Command, Property};
use ot_rcp_core::{NotificationKind, RcpClient, RcpCore, MAX_PENDING_FRAME};
use ringbuf::*;
use userlib::*;

task_slot!(SYS, sys);

/// How long a `CmdClient` op waits for its matching response before giving
/// up and releasing the TID.
const RESPONSE_TIMEOUT_MS: u64 = 300;
/// Largest Spinel frame (header + command + property + payload) this task
/// builds or accepts.
const SPINEL_BUF_LEN: usize = 192;
/// HDLC framing can at most double a payload (worst-case byte-stuffing)
/// plus flags and CRC.
const HDLC_BUF_LEN: usize = 2 * SPINEL_BUF_LEN + 6;

include!(concat!(env!("OUT_DIR"), "/notifications.rs"));

#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
enum Operation {
    Reset = 1,
    IeeeEui64 = 2,
    Capabilities = 3,
    EnableSrcMatch = 4,
    AckFpbAddShort = 5,
    AckFpbAddExt = 6,
    AckFpbClearShort = 7,
    AckFpbClearExt = 8,
    MacFrameCounter = 9,
    SetPanId = 10,
    SetShortAddr = 11,
    SetExtAddr = 12,
    SetTxPower = 13,
    Enable = 14,
    ReceiveEnable = 15,
    SetChannel = 16,
    Transmit = 17,
    LinkMetrics = 18,
}

impl From<ResponseCode> for u32 {
    fn from(rc: ResponseCode) -> Self {
        rc as u32
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    FrameAccepted,
    FrameDropped,
    Notification,
    RequestTimeout,
}
ringbuf!(Trace, 16, Trace::None);

/// The single registered `RcpClient`: records the link quality of the most
/// recently received frame so `link_metrics` can answer it, and otherwise
/// just traces what arrived. There is no queue here (unlike the CAN
/// driver's `Subscriber`) because nothing downstream polls for inbound
/// packets yet; `on_notification` is where that hand-off would grow.
struct Listener {
    last_rssi: i8,
    last_lqi: u8,
}

impl RcpClient for Listener {
    fn on_notification(&mut self, kind: NotificationKind, payload: &[u8]) {
        ringbuf_entry!(Trace::Notification);
        if kind == NotificationKind::StreamRaw {
            if let Some(frame) = radio::decode_rx(payload) {
                self.last_rssi = frame.rssi;
                self.last_lqi = frame.lqi;
            }
        }
    }
}

#[export_name = "main"]
fn main() -> ! {
    let sys = Sys::from(SYS.get_task_id());
    turn_on_uart(&sys);
    configure_pins(&sys);

    // From thin air, pluck a pointer to the USART register block. Safety:
    // see `drv/stm32h7-usart`; the peripheral is effectively a static and we
    // only ever hold a shared reference to it.
    #[cfg(feature = "h7b3")]
    let usart = unsafe { &*device::USART1::ptr() };
    #[cfg(any(feature = "h743", feature = "h753"))]
    let usart = unsafe { &*device::USART6::ptr() };

    usart.cr1.write(|w| w.ue().enabled());
    #[cfg(feature = "h7b3")]
    const CLOCK_HZ: u32 = 280_000_000;
    #[cfg(any(feature = "h743", feature = "h753"))]
    const CLOCK_HZ: u32 = 200_000_000;
    const BAUDRATE: u32 = 460_800;
    const CYCLES_PER_BIT: u32 = (CLOCK_HZ + (BAUDRATE / 2)) / BAUDRATE;
    usart.brr.write(|w| w.brr().bits(CYCLES_PER_BIT as u16));
    usart.cr1.modify(|_, w| {
        w.ue().enabled().te().enabled().re().enabled()
    });
    usart.cr1.modify(|_, w| w.rxneie().enabled());

    sys_irq_control(notifications::UART_IRQ_MASK, true);

    // The decode buffer and its `Decoder` live here, in `main`'s frame,
    // which never returns: the decoder borrows `rx_scratch` for as long as
    // it exists, so it cannot be bundled into a state struct threaded
    // through `hl::recv` the way `drv/mcp251xfd` does. Register access
    // (`usart`) is captured the same way, directly from this scope, as
    // `drv/stm32h7-usart` does.
    let mut rx_scratch = [0u8; SPINEL_BUF_LEN];
    let mut decoder = Decoder::new(&mut rx_scratch);
    let mut tx_scratch = [0u8; HDLC_BUF_LEN];

    let mut core = RcpCore::new();
    let mut listener = Listener {
        last_rssi: 0,
        last_lqi: 0,
    };

    loop {
        // `decoder` and `tx_scratch` are mutably used by both closures
        // below, so per `hl::recv`'s contract they travel through `state`
        // rather than being captured directly -- only `usart`, a shared
        // reference, is free to be captured by both.
        hl::recv(
            &mut [],
            notifications::UART_IRQ_MASK,
            (&mut core, &mut listener, &mut decoder, &mut tx_scratch[..]),
            |(core, listener, decoder, _tx_scratch), bits| {
                if bits & notifications::UART_IRQ_MASK != 0 {
                    drain_rx(usart, decoder, core, listener);
                    sys_irq_control(notifications::UART_IRQ_MASK, true);
                }
            },
            |(core, listener, decoder, tx_scratch), op, msg| {
                dispatch(op, msg, usart, decoder, tx_scratch, core, listener)
            },
        );
    }
}

/// Drains every byte currently sitting in the receiver, feeding each into
/// `decoder` and routing completed frames into `core`.
fn drain_rx(
    usart: &device::usart1::RegisterBlock,
    decoder: &mut Decoder<'_>,
    core: &mut RcpCore,
    listener: &mut Listener,
) {
    while usart.isr.read().rxne().bit() {
        let byte = usart.rdr.read().rdr().bits() as u8;
        match decoder.push(byte) {
            Ok(Some(len)) => {
                ringbuf_entry!(Trace::FrameAccepted);
                core.on_frame(&decoder.buffer()[..len], listener);
            }
            Ok(None) => {}
            Err(()) => ringbuf_entry!(Trace::FrameDropped),
        }
    }
}

/// Busy-waits for room in the transmitter and writes `buf` out one byte at
/// a time. Control frames are short enough that a blocking write is
/// simpler than threading a `txeie`-driven state machine through the
/// command path, unlike `drv/stm32h7-usart`'s bulk lease transfers.
fn write_framed(usart: &device::usart1::RegisterBlock, buf: &[u8]) {
    for &byte in buf {
        while !usart.isr.read().txe().bit() {}
        usart.tdr.write(|w| unsafe { w.tdr().bits(u16::from(byte)) });
    }
}

/// Runs one full `CmdClient` request: pack and send, then await the
/// matching response (draining the UART and servicing unsolicited frames
/// while we wait) until it arrives or `RESPONSE_TIMEOUT_MS` elapses.
fn request(
    usart: &device::usart1::RegisterBlock,
    decoder: &mut Decoder<'_>,
    tx_scratch: &mut [u8],
    core: &mut RcpCore,
    listener: &mut Listener,
    command: Command,
    property: Property,
    payload: &[u8],
) -> Result<([u8; MAX_PENDING_FRAME], usize), ResponseCode> {
    let mut spinel_buf = [0u8; SPINEL_BUF_LEN];
    let (tid, n) = core
        .begin_request(0, command, property, payload, &mut spinel_buf)
        .map_err(ResponseCode::from)?;
    let framed_len =
        hdlc::encode(&spinel_buf[..n], tx_scratch).ok_or(ResponseCode::Io)?;
    write_framed(usart, &tx_scratch[..framed_len]);

    let deadline = sys_get_timer().now + RESPONSE_TIMEOUT_MS;
    loop {
        drain_rx(usart, decoder, core, listener);
        if let Ok(Some(resp)) = core.poll_response(tid) {
            let mut out = [0u8; MAX_PENDING_FRAME];
            let len = resp.len();
            out[..len].copy_from_slice(resp);
            return Ok((out, len));
        }
        if sys_get_timer().now >= deadline {
            core.abandon(tid);
            ringbuf_entry!(Trace::RequestTimeout);
            return Err(ResponseCode::Timeout);
        }
        sys_irq_control(notifications::UART_IRQ_MASK, true);
        let _ = sys_recv_closed(
            &mut [],
            notifications::UART_IRQ_MASK,
            TaskId::KERNEL,
        );
    }
}

fn dispatch(
    op: Operation,
    msg: hl::Message<'_>,
    usart: &device::usart1::RegisterBlock,
    decoder: &mut Decoder<'_>,
    tx_scratch: &mut [u8],
    core: &mut RcpCore,
    listener: &mut Listener,
) -> Result<(), ResponseCode> {
    macro_rules! req {
        ($command:expr, $property:expr, $payload:expr) => {
            request(
                usart, decoder, tx_scratch, core, listener, $command,
                $property, $payload,
            )?
        };
    }

    match op {
        Operation::Reset => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            req!(Command::Reset, Property::LastStatus, &[]);
            caller.reply(());
            Ok(())
        }
        Operation::IeeeEui64 => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            let (buf, len) = req!(Command::PropValueGet, Property::HwAddr, &[]);
            let mut eui = [0u8; 8];
            let n = len.min(8);
            eui[..n].copy_from_slice(&buf[..n]);
            caller.reply(eui);
            Ok(())
        }
        Operation::Capabilities => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            let (buf, len) =
                req!(Command::PropValueGet, Property::RadioCaps, &[]);
            let mut bits = 0u32;
            for (i, &b) in buf[..len.min(4)].iter().enumerate() {
                bits |= (b as u32) << (8 * i);
            }
            caller.reply(Capabilities::from_bits_truncate(bits).bits());
            Ok(())
        }
        Operation::EnableSrcMatch => {
            let (&on, caller) =
                msg.fixed::<u8, ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(
                Command::PropValueSet,
                Property::MacSrcMatchEnabled,
                &[on]
            );
            caller.reply(());
            Ok(())
        }
        Operation::AckFpbAddShort => {
            let (&addr, caller) =
                msg.fixed::<u16, ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(
                Command::PropValueSet,
                Property::MacSrcMatchShortAddresses,
                &addr.to_le_bytes()
            );
            caller.reply(());
            Ok(())
        }
        Operation::AckFpbAddExt => {
            let (addr, caller) =
                msg.fixed::<[u8; 8], ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(
                Command::PropValueSet,
                Property::MacSrcMatchExtendedAddresses,
                addr
            );
            caller.reply(());
            Ok(())
        }
        Operation::AckFpbClearShort => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            req!(
                Command::PropValueSet,
                Property::MacSrcMatchShortAddresses,
                &[]
            );
            caller.reply(());
            Ok(())
        }
        Operation::AckFpbClearExt => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            req!(
                Command::PropValueSet,
                Property::MacSrcMatchExtendedAddresses,
                &[]
            );
            caller.reply(());
            Ok(())
        }
        Operation::MacFrameCounter => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            let (buf, len) = req!(
                Command::PropValueGet,
                Property::RcpMacFrameCounter,
                &[]
            );
            let mut counter = 0u32;
            for (i, &b) in buf[..len.min(4)].iter().enumerate() {
                counter |= (b as u32) << (8 * i);
            }
            caller.reply(counter);
            Ok(())
        }
        Operation::SetPanId => {
            let (&panid, caller) =
                msg.fixed::<u16, ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(
                Command::PropValueSet,
                Property::Mac154Panid,
                &panid.to_le_bytes()
            );
            caller.reply(());
            Ok(())
        }
        Operation::SetShortAddr => {
            let (&addr, caller) =
                msg.fixed::<u16, ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(
                Command::PropValueSet,
                Property::Mac154Saddr,
                &addr.to_le_bytes()
            );
            caller.reply(());
            Ok(())
        }
        Operation::SetExtAddr => {
            let (addr, caller) =
                msg.fixed::<[u8; 8], ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(Command::PropValueSet, Property::Mac154Laddr, addr);
            caller.reply(());
            Ok(())
        }
        Operation::SetTxPower => {
            let (&dbm, caller) =
                msg.fixed::<u8, ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(Command::PropValueSet, Property::PhyTxPower, &[dbm]);
            caller.reply(());
            Ok(())
        }
        Operation::Enable => {
            let (&on, caller) =
                msg.fixed::<u8, ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(Command::PropValueSet, Property::PhyEnabled, &[on]);
            caller.reply(());
            Ok(())
        }
        Operation::ReceiveEnable => {
            let (&on, caller) =
                msg.fixed::<u8, ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(
                Command::PropValueSet,
                Property::MacRawStreamEnabled,
                &[on]
            );
            caller.reply(());
            Ok(())
        }
        Operation::SetChannel => {
            let (&channel, caller) =
                msg.fixed::<u8, ()>().ok_or(ResponseCode::InvalidArg)?;
            req!(Command::PropValueSet, Property::PhyChan, &[channel]);
            caller.reply(());
            Ok(())
        }
        Operation::Transmit => {
            let (raw, caller) = msg
                .fixed::<[u8; TRANSMIT_WIRE_SIZE], ()>()
                .ok_or(ResponseCode::InvalidArg)?;
            let wire = TransmitWire::unmarshal_from(raw)?;
            let len = wire.length as usize;
            if len > MAX_PSDU {
                return Err(ResponseCode::InvalidArg);
            }
            let mut payload = [0u8; 2 + MAX_PSDU];
            payload[0] = wire.channel;
            payload[1] = wire.length;
            payload[2..2 + len].copy_from_slice(&wire.data[..len]);
            req!(
                Command::PropValueSet,
                Property::StreamRaw,
                &payload[..2 + len]
            );
            caller.reply(());
            Ok(())
        }
        Operation::LinkMetrics => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            caller.reply([listener.last_rssi as u8, listener.last_lqi]);
            Ok(())
        }
    }
}

fn turn_on_uart(sys: &Sys) {
    #[cfg(any(feature = "h743", feature = "h753"))]
    const PORT: Peripheral = Peripheral::Usart6;
    #[cfg(feature = "h7b3")]
    const PORT: Peripheral = Peripheral::Usart1;

    sys.enable_clock(PORT);
    sys.leave_reset(PORT);
}

fn configure_pins(sys: &Sys) {
    use drv_stm32xx_sys_api::{Alternate, OutputType, PinSet, Port, Pull, Speed};

    #[cfg(any(feature = "h743", feature = "h753"))]
    const TX_RX_MASK: PinSet = Port::C.pin(6).and_pin(7);
    #[cfg(feature = "h7b3")]
    const TX_RX_MASK: PinSet = Port::B.pin(6).and_pin(7);

    sys.gpio_configure_alternate(
        TX_RX_MASK,
        OutputType::PushPull,
        Speed::High,
        Pull::None,
        Alternate::AF7,
    );
}
