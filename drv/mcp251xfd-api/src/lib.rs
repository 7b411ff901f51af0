// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the MCP251XFD CAN-FD controller driver.
//!
//! The driver itself runs in a disjoint task; this crate marshals requests
//! to it and unmarshals its replies, the way `drv-i2c-api` does for the I2C
//! server.

#![no_std]

use mcp251xfd_core::fsm::{BusState, Mode};
use mcp251xfd_core::frame::{CanFrame, FrameFlags, MAX_PAYLOAD};
use userlib::*;
use zerocopy::AsBytes;

#[derive(FromPrimitive, Eq, PartialEq)]
pub enum Op {
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
    /// Pops the oldest entry from the subscriber's fixed-depth completion
    /// queue (an `rx`, `tx_complete`, or `state_change` event).
    PollEvent = 12,
}

/// Response codes returned by the driver task over IPC. Mirrors
/// `mcp251xfd_core::Error` with the two IPC-specific additions appended.
#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[repr(u32)]
pub enum ResponseCode {
    InvalidArg = 1,
    NotSupported = 2,
    Busy = 3,
    Io = 4,
    FrameError = 5,
    Timeout = 6,
    NoMailbox = 7,
    NoSpace = 8,
    WouldBlock = 9,
    NetDown = 10,
    NetUnreachable = 11,
    /// Malformed reply from the driver task itself.
    BadResponse = 12,
    /// No event currently queued for `poll_event`.
    QueueEmpty = 13,
}

impl From<mcp251xfd_core::Error> for ResponseCode {
    fn from(e: mcp251xfd_core::Error) -> Self {
        use mcp251xfd_core::Error::*;
        match e {
            InvalidArg => ResponseCode::InvalidArg,
            NotSupported => ResponseCode::NotSupported,
            Busy => ResponseCode::Busy,
            Io => ResponseCode::Io,
            FrameError => ResponseCode::FrameError,
            Timeout => ResponseCode::Timeout,
            NoMailbox => ResponseCode::NoMailbox,
            NoSpace => ResponseCode::NoSpace,
            WouldBlock => ResponseCode::WouldBlock,
            NetDown => ResponseCode::NetDown,
            NetUnreachable => ResponseCode::NetUnreachable,
        }
    }
}

/// Nominal bit-timing parameters for the arbitration and (optionally) the
/// FD data phase, in time quanta.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BitTiming {
    pub brp: u8,
    pub tseg1: u8,
    pub tseg2: u8,
    pub sjw: u8,
}

pub trait Marshal<T> {
    fn marshal(&self) -> T;
    fn unmarshal(val: &T) -> Result<Self, ResponseCode>
    where
        Self: Sized;
}

impl Marshal<[u8; 4]> for BitTiming {
    fn marshal(&self) -> [u8; 4] {
        [self.brp, self.tseg1, self.tseg2, self.sjw]
    }
    fn unmarshal(val: &[u8; 4]) -> Result<Self, ResponseCode> {
        Ok(BitTiming {
            brp: val[0],
            tseg1: val[1],
            tseg2: val[2],
            sjw: val[3],
        })
    }
}

/// Fixed-size on-the-wire representation of a [`CanFrame`], sized for the
/// largest CAN-FD payload.
#[derive(Copy, Clone)]
pub struct FrameWire {
    pub id: u32,
    pub dlc: u8,
    pub flags: u8,
    pub payload_len: u8,
    pub payload: [u8; MAX_PAYLOAD],
}

impl FrameWire {
    pub fn from_frame(frame: &CanFrame) -> Self {
        Self {
            id: frame.id,
            dlc: frame.dlc,
            flags: frame.flags.bits(),
            payload_len: frame.payload_len as u8,
            payload: frame.payload,
        }
    }

    pub fn to_frame(&self) -> Result<CanFrame, ResponseCode> {
        let flags = FrameFlags::from_bits(self.flags)
            .ok_or(ResponseCode::BadResponse)?;
        CanFrame::new(
            self.id,
            self.dlc,
            flags,
            &self.payload[..self.payload_len as usize],
        )
        .map_err(ResponseCode::from)
    }

    pub fn marshal_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.id.to_le_bytes());
        buf[4] = self.dlc;
        buf[5] = self.flags;
        buf[6] = self.payload_len;
        buf[7..7 + MAX_PAYLOAD].copy_from_slice(&self.payload);
    }

    pub fn unmarshal_from(buf: &[u8]) -> Result<Self, ResponseCode> {
        if buf.len() < 7 + MAX_PAYLOAD {
            return Err(ResponseCode::BadResponse);
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        payload.copy_from_slice(&buf[7..7 + MAX_PAYLOAD]);
        Ok(Self {
            id: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            dlc: buf[4],
            flags: buf[5],
            payload_len: buf[6],
            payload,
        })
    }
}

pub const FRAME_WIRE_SIZE: usize = 7 + MAX_PAYLOAD;

/// One entry from the per-subscriber completion queue: the IPC-visible form
/// of a `CanClient` callback, since a driver task cannot invoke a function
/// pointer in another task's address space.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Rx(CanFrame),
    TxComplete { mailbox: u8, status: Result<(), ResponseCode> },
    StateChange { state: BusState, tx_err_cnt: u8, rx_err_cnt: u8 },
}

const EVENT_WIRE_SIZE: usize = 1 + FRAME_WIRE_SIZE;

impl Event {
    pub fn marshal_into(&self, buf: &mut [u8]) {
        match self {
            Event::Rx(frame) => {
                buf[0] = 0;
                FrameWire::from_frame(frame).marshal_into(&mut buf[1..]);
            }
            Event::TxComplete { mailbox, status } => {
                buf[0] = 1;
                buf[1] = *mailbox;
                buf[2] = match status {
                    Ok(()) => 0,
                    Err(rc) => *rc as u8,
                };
            }
            Event::StateChange { state, tx_err_cnt, rx_err_cnt } => {
                buf[0] = 2;
                buf[1] = *state as u8;
                buf[2] = *tx_err_cnt;
                buf[3] = *rx_err_cnt;
            }
        }
    }

    pub fn unmarshal_from(buf: &[u8]) -> Result<Self, ResponseCode> {
        match buf.first() {
            Some(0) => Ok(Event::Rx(
                FrameWire::unmarshal_from(&buf[1..]).and_then(|w| w.to_frame())?,
            )),
            Some(1) => {
                let status = match buf[2] {
                    0 => Ok(()),
                    code => Err(ResponseCode::from_u32(code as u32)
                        .ok_or(ResponseCode::BadResponse)?),
                };
                Ok(Event::TxComplete { mailbox: buf[1], status })
            }
            Some(2) => {
                let state = match buf[1] {
                    0 => BusState::ErrorActive,
                    1 => BusState::ErrorWarning,
                    2 => BusState::ErrorPassive,
                    3 => BusState::BusOff,
                    4 => BusState::Stopped,
                    _ => return Err(ResponseCode::BadResponse),
                };
                Ok(Event::StateChange {
                    state,
                    tx_err_cnt: buf[2],
                    rx_err_cnt: buf[3],
                })
            }
            _ => Err(ResponseCode::BadResponse),
        }
    }
}

/// Handle to the MCP251XFD driver task's single CAN channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CanDevice {
    task: TaskId,
}

impl CanDevice {
    pub fn new(task: TaskId) -> Self {
        Self { task }
    }

    pub fn set_mode(&self, mode: Mode) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::SetMode as u16,
            &[mode as u8],
            &mut [],
            &[],
        );
        ok_or(code)
    }

    /// Sets the arbitration-phase bit timing (used by every frame).
    pub fn set_timing(&self, nominal: BitTiming) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::SetTiming as u16,
            &nominal.marshal(),
            &mut [],
            &[],
        );
        ok_or(code)
    }

    /// Sets the CAN-FD data-phase bit timing (ignored outside `FdMixed`).
    pub fn set_timing_data(&self, data: BitTiming) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::SetTimingData as u16,
            &data.marshal(),
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn start(&self) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(self.task, Op::Start as u16, &[], &mut [], &[]);
        ok_or(code)
    }

    pub fn stop(&self) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(self.task, Op::Stop as u16, &[], &mut [], &[]);
        ok_or(code)
    }

    pub fn send(&self, frame: &CanFrame) -> Result<u8, ResponseCode> {
        let wire = FrameWire::from_frame(frame);
        let mut outgoing = [0u8; FRAME_WIRE_SIZE];
        wire.marshal_into(&mut outgoing);
        let mut mailbox = 0u8;
        let (code, _) = sys_send(
            self.task,
            Op::Send as u16,
            &outgoing,
            mailbox.as_bytes_mut(),
            &[],
        );
        if code != 0 {
            Err(ResponseCode::from_u32(code).ok_or(ResponseCode::BadResponse)?)
        } else {
            Ok(mailbox)
        }
    }

    /// Pops the oldest queued `CanClient` event for this subscriber, if any.
    pub fn poll_event(&self) -> Result<Option<Event>, ResponseCode> {
        let mut incoming = [0u8; EVENT_WIRE_SIZE];
        let (code, _) = sys_send(
            self.task,
            Op::PollEvent as u16,
            &[],
            &mut incoming,
            &[],
        );
        match code {
            0 => Ok(Some(Event::unmarshal_from(&incoming)?)),
            c if c == ResponseCode::QueueEmpty as u32 => Ok(None),
            c => Err(ResponseCode::from_u32(c).ok_or(ResponseCode::BadResponse)?),
        }
    }

    pub fn add_rx_filter(
        &self,
        id: u32,
        mask: u32,
        extended: bool,
    ) -> Result<u8, ResponseCode> {
        let mut buf = [0u8; 9];
        buf[0..4].copy_from_slice(&id.to_le_bytes());
        buf[4..8].copy_from_slice(&mask.to_le_bytes());
        buf[8] = extended as u8;
        let mut index = 0u8;
        let (code, _) = sys_send(
            self.task,
            Op::AddRxFilter as u16,
            &buf,
            index.as_bytes_mut(),
            &[],
        );
        if code != 0 {
            Err(ResponseCode::from_u32(code).ok_or(ResponseCode::BadResponse)?)
        } else {
            Ok(index)
        }
    }

    pub fn remove_rx_filter(&self, index: u8) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::RemoveRxFilter as u16,
            &[index],
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn get_state(&self) -> Result<(BusState, u8, u8), ResponseCode> {
        let mut response = [0u8; 3];
        let (code, _) = sys_send(
            self.task,
            Op::GetState as u16,
            &[],
            &mut response,
            &[],
        );
        if code != 0 {
            return Err(ResponseCode::from_u32(code)
                .ok_or(ResponseCode::BadResponse)?);
        }
        let state = match response[0] {
            0 => BusState::ErrorActive,
            1 => BusState::ErrorWarning,
            2 => BusState::ErrorPassive,
            3 => BusState::BusOff,
            4 => BusState::Stopped,
            _ => return Err(ResponseCode::BadResponse),
        };
        Ok((state, response[1], response[2]))
    }

    pub fn get_max_filters(&self) -> Result<usize, ResponseCode> {
        let mut n = 0u32;
        let (code, _) = sys_send(
            self.task,
            Op::GetMaxFilters as u16,
            &[],
            n.as_bytes_mut(),
            &[],
        );
        if code != 0 {
            return Err(ResponseCode::from_u32(code)
                .ok_or(ResponseCode::BadResponse)?);
        }
        Ok(n as usize)
    }

    pub fn get_core_clock(&self) -> Result<u32, ResponseCode> {
        let mut hz = 0u32;
        let (code, _) = sys_send(
            self.task,
            Op::GetCoreClock as u16,
            &[],
            hz.as_bytes_mut(),
            &[],
        );
        if code != 0 {
            return Err(ResponseCode::from_u32(code)
                .ok_or(ResponseCode::BadResponse)?);
        }
        Ok(hz)
    }
}

fn ok_or(code: u32) -> Result<(), ResponseCode> {
    if code == 0 {
        Ok(())
    } else {
        Err(ResponseCode::from_u32(code).unwrap_or(ResponseCode::BadResponse))
    }
}
