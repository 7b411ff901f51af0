// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver task for the Microchip MCP251XFD CAN-FD controller.
//!
//! The chip signals an interrupt on a single level-active GPIO line
//! (logical OR of every condition in `INT`); this task masks that line at
//! the kernel on entry to each drain pass and re-enables it on exit,
//! following `drv/stm32h7-exti-server`'s notification-handler shape but
//! specialised to one line instead of sixteen.
//!
//! # IPC protocol
//!
//! See `drv-mcp251xfd-api` for the operation catalogue.

#![no_std]
#![no_main]

use drv_mcp251xfd_api::{BitTiming, Event, FrameWire, Marshal, ResponseCode, FRAME_WIRE_SIZE};
use drv_spi_api::{Spi, SpiServer};
use drv_stm32xx_sys_api::{Edge, IrqControl, Pull, Sys};
use mcp251xfd_core::fsm::{BusState, Mode};
use mcp251xfd_core::frame::CanFrame;
use mcp251xfd_core::mailbox::CanClient;
use mcp251xfd_core::ram::DEFAULT_RAM_MAP;
use mcp251xfd_core::spi_codec::SpiCodec;
use mcp251xfd_core::transport::Yield;
use mcp251xfd_core::{Controller, Error};
use ringbuf::*;
use userlib::*;

task_slot!(SYS, sys);
task_slot!(SPI, spi_driver);

const MCP_SPI_DEVICE: u8 = 0;
const MAX_MAILBOXES: usize = 8;
const MAX_FILTERS: usize = 32;
const CORE_CLOCK_HZ: u32 = 40_000_000;

/// Depth of the fixed-capacity event queue the one subscriber is handed;
/// events beyond this are dropped (counted), never heap-allocated.
const EVENT_QUEUE_DEPTH: usize = 16;
const EVENT_WIRE_SIZE: usize = 1 + FRAME_WIRE_SIZE;

include!(concat!(env!("OUT_DIR"), "/notifications.rs"));

#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
enum Operation {
    SetMode = 1,
    SetTiming = 2,
    SetTimingData = 3,
    Start = 4,
    Stop = 5,
    Send = 6,
    AddRxFilter = 7,
    RemoveRxFilter = 8,
    GetState = 9,
    GetMaxFilters = 10,
    GetCoreClock = 11,
    PollEvent = 12,
}

impl From<ResponseCode> for u32 {
    fn from(rc: ResponseCode) -> Self {
        rc as u32
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    IrqDrain,
    EventDropped,
}
ringbuf!(Trace, 16, Trace::None);

struct SysYield;
impl Yield for SysYield {
    fn yield_for(&mut self, millis: u32) {
        hl::sleep_for(millis as u64);
    }
}

/// Fixed-depth replacement for a per-subscriber event channel; overflow
/// drops the oldest entry rather than growing, the same backpressure
/// policy `mailbox.rs` uses for in-flight CAN transmissions.
struct EventQueue {
    slots: [Option<Event>; EVENT_QUEUE_DEPTH],
    head: usize,
    len: usize,
}

impl EventQueue {
    fn new() -> Self {
        Self {
            slots: [const { None }; EVENT_QUEUE_DEPTH],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, event: Event) {
        let tail = (self.head + self.len) % EVENT_QUEUE_DEPTH;
        if self.len == EVENT_QUEUE_DEPTH {
            self.head = (self.head + 1) % EVENT_QUEUE_DEPTH;
            self.len -= 1;
            ringbuf_entry!(Trace::EventDropped);
        }
        self.slots[tail] = Some(event);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<Event> {
        if self.len == 0 {
            return None;
        }
        let event = self.slots[self.head].take();
        self.head = (self.head + 1) % EVENT_QUEUE_DEPTH;
        self.len -= 1;
        event
    }
}

/// The single registered `CanClient`. Tracks the last known error counters
/// too, since `get_state` answers synchronously and the controller only
/// pushes them on change.
struct Subscriber {
    queue: EventQueue,
    tx_err_cnt: u8,
    rx_err_cnt: u8,
}

impl CanClient for Subscriber {
    fn tx_complete(&mut self, mailbox: u8, status: Result<(), Error>) {
        self.queue.push(Event::TxComplete {
            mailbox,
            status: status.map_err(ResponseCode::from),
        });
    }

    fn rx(&mut self, frame: CanFrame) {
        self.queue.push(Event::Rx(frame));
    }

    fn state_change(&mut self, state: BusState, tx_err_cnt: u8, rx_err_cnt: u8) {
        self.tx_err_cnt = tx_err_cnt;
        self.rx_err_cnt = rx_err_cnt;
        self.queue.push(Event::StateChange {
            state,
            tx_err_cnt,
            rx_err_cnt,
        });
    }
}

struct ServerState {
    controller: Controller,
    transport: SpiCodec<Spi>,
    yielder: SysYield,
    subscriber: Subscriber,
}

#[export_name = "main"]
fn main() -> ! {
    let sys = Sys::from(SYS.get_task_id());
    configure_irq_pin(&sys);

    let spi = Spi::from(SPI.get_task_id()).device(MCP_SPI_DEVICE);
    let mut state = ServerState {
        controller: Controller::new(DEFAULT_RAM_MAP, MAX_MAILBOXES, MAX_FILTERS),
        transport: SpiCodec::new(spi),
        yielder: SysYield,
        subscriber: Subscriber {
            queue: EventQueue::new(),
            tx_err_cnt: 0,
            rx_err_cnt: 0,
        },
    };

    sys.gpio_irq_control(notifications::MCP_IRQ_MASK, IrqControl::Enable);

    loop {
        hl::recv(
            &mut [],
            notifications::MCP_IRQ_MASK,
            &mut state,
            |state, bits| {
                if bits & notifications::MCP_IRQ_MASK != 0 {
                    ringbuf_entry!(Trace::IrqDrain);
                    for _ in 0..mcp251xfd_core::MAX_INT_HANDLER_CALLS {
                        match state.controller.service_interrupt(
                            &mut state.transport,
                            &mut state.yielder,
                            &mut state.subscriber,
                        ) {
                            Ok(true) => continue,
                            _ => break,
                        }
                    }
                    sys.gpio_irq_control(
                        notifications::MCP_IRQ_MASK,
                        IrqControl::Enable,
                    );
                }
            },
            |state, op, msg| dispatch(op, msg, state),
        );
    }
}

fn dispatch(
    op: Operation,
    msg: hl::Message<'_>,
    state: &mut ServerState,
) -> Result<(), ResponseCode> {
    let ServerState {
        controller,
        transport,
        yielder,
        subscriber,
    } = state;

    match op {
        Operation::SetMode => {
            let (&mode_byte, caller) =
                msg.fixed::<u8, ()>().ok_or(ResponseCode::InvalidArg)?;
            let mode = decode_mode(mode_byte).ok_or(ResponseCode::InvalidArg)?;
            controller
                .set_mode(transport, yielder, mode, 0)
                .map_err(ResponseCode::from)?;
            caller.reply(());
            Ok(())
        }
        Operation::SetTiming => {
            let (raw, caller) =
                msg.fixed::<[u8; 4], ()>().ok_or(ResponseCode::InvalidArg)?;
            let t = BitTiming::unmarshal(raw).map_err(|_| ResponseCode::InvalidArg)?;
            controller
                .set_timing(transport, t.brp, t.tseg1, t.tseg2, t.sjw)
                .map_err(ResponseCode::from)?;
            caller.reply(());
            Ok(())
        }
        Operation::SetTimingData => {
            let (raw, caller) =
                msg.fixed::<[u8; 4], ()>().ok_or(ResponseCode::InvalidArg)?;
            let t = BitTiming::unmarshal(raw).map_err(|_| ResponseCode::InvalidArg)?;
            controller
                .set_timing_data(transport, t.brp, t.tseg1, t.tseg2, t.sjw)
                .map_err(ResponseCode::from)?;
            caller.reply(());
            Ok(())
        }
        Operation::Start => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            controller
                .start(transport, yielder, Mode::Can2_0)
                .map_err(ResponseCode::from)?;
            caller.reply(());
            Ok(())
        }
        Operation::Stop => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            controller
                .stop(transport, yielder, subscriber)
                .map_err(ResponseCode::from)?;
            caller.reply(());
            Ok(())
        }
        Operation::Send => {
            let (raw, caller) = msg
                .fixed::<[u8; FRAME_WIRE_SIZE], u8>()
                .ok_or(ResponseCode::InvalidArg)?;
            let wire =
                FrameWire::unmarshal_from(raw).map_err(|_| ResponseCode::InvalidArg)?;
            let frame = wire.to_frame()?;
            let mailbox = controller
                .send(transport, &frame)
                .map_err(ResponseCode::from)?;
            caller.reply(mailbox);
            Ok(())
        }
        Operation::AddRxFilter => {
            let (raw, caller) =
                msg.fixed::<[u8; 9], u8>().ok_or(ResponseCode::InvalidArg)?;
            let id = u32::from_le_bytes(raw[0..4].try_into().unwrap());
            let mask = u32::from_le_bytes(raw[4..8].try_into().unwrap());
            let extended = raw[8] != 0;
            let spec = mcp251xfd_core::filters::FilterSpec { id, mask, extended };
            let idx = controller
                .add_rx_filter(transport, spec)
                .map_err(ResponseCode::from)?;
            caller.reply(idx);
            Ok(())
        }
        Operation::RemoveRxFilter => {
            let (&idx, caller) =
                msg.fixed::<u8, ()>().ok_or(ResponseCode::InvalidArg)?;
            controller
                .remove_rx_filter(transport, idx)
                .map_err(ResponseCode::from)?;
            caller.reply(());
            Ok(())
        }
        Operation::GetState => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            let reply = [
                controller.bus_state() as u8,
                subscriber.tx_err_cnt,
                subscriber.rx_err_cnt,
            ];
            caller.reply(reply);
            Ok(())
        }
        Operation::GetMaxFilters => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            caller.reply(controller.get_max_filters() as u32);
            Ok(())
        }
        Operation::GetCoreClock => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            caller.reply(CORE_CLOCK_HZ);
            Ok(())
        }
        Operation::PollEvent => {
            let ((), caller) = msg.fixed().ok_or(ResponseCode::InvalidArg)?;
            match subscriber.queue.pop() {
                Some(event) => {
                    let mut wire = [0u8; EVENT_WIRE_SIZE];
                    event.marshal_into(&mut wire);
                    caller.reply(wire);
                    Ok(())
                }
                None => Err(ResponseCode::QueueEmpty),
            }
        }
    }
}

fn decode_mode(byte: u8) -> Option<Mode> {
    Some(match byte {
        0b000 => Mode::FdMixed,
        0b001 => Mode::Sleep,
        0b010 => Mode::IntLoopback,
        0b011 => Mode::Listen,
        0b100 => Mode::Config,
        0b101 => Mode::ExtLoopback,
        0b110 => Mode::Can2_0,
        0b111 => Mode::Restricted,
        _ => return None,
    })
}

fn configure_irq_pin(sys: &Sys) {
    use drv_stm32xx_sys_api::{PinSet, Port};
    const MCP_IRQ_PIN: PinSet = Port::C.pin(4);
    sys.gpio_configure_input(MCP_IRQ_PIN, Pull::Up);
    sys.gpio_irq_configure(notifications::MCP_IRQ_MASK, Edge::Falling);
}
