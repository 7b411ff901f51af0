// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the OpenThread Radio Co-Processor host driver.
//!
//! The driver runs in a disjoint task (`drv/ot-rcp`) that owns the UART and
//! speaks Spinel/HDLC to the external 802.15.4 radio; this crate marshals
//! the synchronous `CmdClient` surface over IPC, the way `drv-i2c-api` does
//! for the I2C server.

#![no_std]

use ot_rcp_core::radio::{Capabilities, RadioFrame, MAX_PSDU};
use userlib::*;
use zerocopy::AsBytes;

#[derive(FromPrimitive, Eq, PartialEq)]
pub enum Op {
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

/// Response codes returned by the driver task over IPC. Mirrors
/// `ot_rcp_core::Error` with one IPC-specific addition appended.
#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[repr(u32)]
pub enum ResponseCode {
    InvalidArg = 1,
    NotSupported = 2,
    Busy = 3,
    Io = 4,
    FrameError = 5,
    Timeout = 6,
    NoMemory = 7,
    NoSpace = 8,
    WouldBlock = 9,
    NetDown = 10,
    NetUnreachable = 11,
    /// Malformed reply from the driver task itself.
    BadResponse = 12,
}

impl From<ot_rcp_core::Error> for ResponseCode {
    fn from(e: ot_rcp_core::Error) -> Self {
        use ot_rcp_core::Error::*;
        match e {
            InvalidArg => ResponseCode::InvalidArg,
            NotSupported => ResponseCode::NotSupported,
            Busy => ResponseCode::Busy,
            Io => ResponseCode::Io,
            FrameError => ResponseCode::FrameError,
            Timeout => ResponseCode::Timeout,
            NoMemory => ResponseCode::NoMemory,
            NoSpace => ResponseCode::NoSpace,
            WouldBlock => ResponseCode::WouldBlock,
            NetDown => ResponseCode::NetDown,
            NetUnreachable => ResponseCode::NetUnreachable,
        }
    }
}

/// Fixed-size on-the-wire representation of a [`RadioFrame`] for `transmit`,
/// sized for the largest 802.15.4 PSDU.
#[derive(Copy, Clone)]
pub struct TransmitWire {
    pub channel: u8,
    pub csma_ca: u8,
    pub length: u8,
    pub data: [u8; MAX_PSDU],
}

pub const TRANSMIT_WIRE_SIZE: usize = 3 + MAX_PSDU;

impl TransmitWire {
    pub fn from_frame(frame: &RadioFrame) -> Self {
        Self {
            channel: frame.channel,
            csma_ca: frame.csma_ca as u8,
            length: frame.length,
            data: frame.data,
        }
    }

    pub fn marshal_into(&self, buf: &mut [u8]) {
        buf[0] = self.channel;
        buf[1] = self.csma_ca;
        buf[2] = self.length;
        buf[3..3 + MAX_PSDU].copy_from_slice(&self.data);
    }

    pub fn unmarshal_from(buf: &[u8]) -> Result<Self, ResponseCode> {
        if buf.len() < TRANSMIT_WIRE_SIZE {
            return Err(ResponseCode::BadResponse);
        }
        let mut data = [0u8; MAX_PSDU];
        data.copy_from_slice(&buf[3..3 + MAX_PSDU]);
        Ok(Self {
            channel: buf[0],
            csma_ca: buf[1],
            length: buf[2],
            data,
        })
    }
}

fn ok_or(code: u32) -> Result<(), ResponseCode> {
    if code == 0 {
        Ok(())
    } else {
        Err(ResponseCode::from_u32(code).unwrap_or(ResponseCode::BadResponse))
    }
}

/// Handle to the RCP driver task's single 802.15.4 radio channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RcpDevice {
    task: TaskId,
}

impl RcpDevice {
    pub fn new(task: TaskId) -> Self {
        Self { task }
    }

    pub fn reset(&self) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(self.task, Op::Reset as u16, &[], &mut [], &[]);
        ok_or(code)
    }

    pub fn ieee_eui64(&self) -> Result<[u8; 8], ResponseCode> {
        let mut eui = [0u8; 8];
        let (code, _) =
            sys_send(self.task, Op::IeeeEui64 as u16, &[], &mut eui, &[]);
        if code != 0 {
            Err(ResponseCode::from_u32(code).ok_or(ResponseCode::BadResponse)?)
        } else {
            Ok(eui)
        }
    }

    pub fn capabilities(&self) -> Result<Capabilities, ResponseCode> {
        let mut bits = 0u32;
        let (code, _) = sys_send(
            self.task,
            Op::Capabilities as u16,
            &[],
            bits.as_bytes_mut(),
            &[],
        );
        if code != 0 {
            return Err(ResponseCode::from_u32(code)
                .ok_or(ResponseCode::BadResponse)?);
        }
        Ok(Capabilities::from_bits_truncate(bits))
    }

    pub fn enable_src_match(&self, enabled: bool) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::EnableSrcMatch as u16,
            &[enabled as u8],
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn ack_fpb_add_short(&self, short_addr: u16) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::AckFpbAddShort as u16,
            &short_addr.to_le_bytes(),
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn ack_fpb_add_ext(&self, ext_addr: [u8; 8]) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::AckFpbAddExt as u16,
            &ext_addr,
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn ack_fpb_clear_short(&self) -> Result<(), ResponseCode> {
        let (code, _) =
            sys_send(self.task, Op::AckFpbClearShort as u16, &[], &mut [], &[]);
        ok_or(code)
    }

    pub fn ack_fpb_clear_ext(&self) -> Result<(), ResponseCode> {
        let (code, _) =
            sys_send(self.task, Op::AckFpbClearExt as u16, &[], &mut [], &[]);
        ok_or(code)
    }

    pub fn mac_frame_counter(&self) -> Result<u32, ResponseCode> {
        let mut counter = 0u32;
        let (code, _) = sys_send(
            self.task,
            Op::MacFrameCounter as u16,
            &[],
            counter.as_bytes_mut(),
            &[],
        );
        if code != 0 {
            return Err(ResponseCode::from_u32(code)
                .ok_or(ResponseCode::BadResponse)?);
        }
        Ok(counter)
    }

    pub fn set_panid(&self, panid: u16) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::SetPanId as u16,
            &panid.to_le_bytes(),
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn set_short_addr(&self, addr: u16) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::SetShortAddr as u16,
            &addr.to_le_bytes(),
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn set_ext_addr(&self, addr: [u8; 8]) -> Result<(), ResponseCode> {
        let (code, _) =
            sys_send(self.task, Op::SetExtAddr as u16, &addr, &mut [], &[]);
        ok_or(code)
    }

    pub fn set_tx_power(&self, dbm: i8) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::SetTxPower as u16,
            &[dbm as u8],
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn enable(&self, on: bool) -> Result<(), ResponseCode> {
        let (code, _) =
            sys_send(self.task, Op::Enable as u16, &[on as u8], &mut [], &[]);
        ok_or(code)
    }

    pub fn receive_enable(&self, on: bool) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::ReceiveEnable as u16,
            &[on as u8],
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn set_channel(&self, channel: u8) -> Result<(), ResponseCode> {
        let (code, _) = sys_send(
            self.task,
            Op::SetChannel as u16,
            &[channel],
            &mut [],
            &[],
        );
        ok_or(code)
    }

    pub fn transmit(&self, frame: &RadioFrame) -> Result<(), ResponseCode> {
        let wire = TransmitWire::from_frame(frame);
        let mut outgoing = [0u8; TRANSMIT_WIRE_SIZE];
        wire.marshal_into(&mut outgoing);
        let (code, _) =
            sys_send(self.task, Op::Transmit as u16, &outgoing, &mut [], &[]);
        ok_or(code)
    }

    /// RSSI and LQI of the most recently received frame.
    pub fn link_metrics(&self) -> Result<(i8, u8), ResponseCode> {
        let mut response = [0u8; 2];
        let (code, _) = sys_send(
            self.task,
            Op::LinkMetrics as u16,
            &[],
            &mut response,
            &[],
        );
        if code != 0 {
            return Err(ResponseCode::from_u32(code)
                .ok_or(ResponseCode::BadResponse)?);
        }
        Ok((response[0] as i8, response[1]))
    }
}
