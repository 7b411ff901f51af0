// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mode machine: CONFIG is the only state every other mode can be entered
//! and left from unrestricted; every other transition polls `OPMOD` against
//! `REQOP` with a bounded timeout.

use crate::regs::CON;
use crate::transport::{Transport, Yield};
use crate::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Mode {
    FdMixed = 0b000,
    Sleep = 0b001,
    IntLoopback = 0b010,
    Listen = 0b011,
    Config = 0b100,
    ExtLoopback = 0b101,
    Can2_0 = 0b110,
    Restricted = 0b111,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusState {
    ErrorActive,
    ErrorWarning,
    ErrorPassive,
    BusOff,
    Stopped,
}

/// Number of 2ms polling iterations before a mode-change request times out
/// (200ms total).
const MODE_TIMEOUT_ITERS: u32 = 100;
const MODE_POLL_INTERVAL_MS: u32 = 2;

pub struct Fsm {
    current: Mode,
    requested: Mode,
    tdco: i16,
}

impl Fsm {
    pub fn new() -> Self {
        Self {
            current: Mode::Config,
            requested: Mode::Config,
            tdco: 0,
        }
    }

    pub fn current(&self) -> Mode {
        self.current
    }

    pub fn requested(&self) -> Mode {
        self.requested
    }

    /// Requests a mode transition, blocking (via `yielder`) until `OPMOD`
    /// reads back as `mode` or the 200ms timeout elapses.
    ///
    /// Transitions originating in `Config` are unrestricted; any other
    /// transition is equally permitted by the chip but goes through the same
    /// poll loop, since only the origin state being `Config` is privileged
    /// per the datasheet's mode-change rules.
    pub fn request_mode(
        &mut self,
        transport: &mut impl Transport,
        yielder: &mut impl Yield,
        mode: Mode,
        tdco: i16,
    ) -> Result<(), Error> {
        if mode == self.current {
            // Idempotent: no extra SPI traffic beyond the readback check.
            return self.confirm(transport, mode);
        }

        self.requested = mode;
        self.tdco = tdco;
        self.program_tdc(transport, mode)?;

        let mut word = [0u8; 4];
        transport.read(CON, &mut word)?;
        let mut con = u32::from_le_bytes(word);
        con &= !(0x7 << 24);
        con |= (mode as u32 & 0x7) << 24;
        transport.write(CON, &con.to_le_bytes())?;

        for _ in 0..MODE_TIMEOUT_ITERS {
            transport.read(CON, &mut word)?;
            let opmod = (u32::from_le_bytes(word) >> 21) & 0x7;
            if opmod == mode as u32 & 0x7 {
                self.current = mode;
                return Ok(());
            }
            yielder.yield_for(MODE_POLL_INTERVAL_MS);
        }
        Err(Error::Timeout)
    }

    /// Called from `MODIF` handling: if the chip's mode has drifted from
    /// what was requested (e.g. an unexpected drop to Config), attempt once
    /// to drive it back.
    pub fn reassert_on_modif(
        &mut self,
        transport: &mut impl Transport,
        yielder: &mut impl Yield,
    ) -> Result<(), Error> {
        let requested = self.requested;
        let tdco = self.tdco;
        self.request_mode(transport, yielder, requested, tdco)
    }

    fn confirm(
        &mut self,
        transport: &mut impl Transport,
        mode: Mode,
    ) -> Result<(), Error> {
        let mut word = [0u8; 4];
        transport.read(CON, &mut word)?;
        let opmod = (u32::from_le_bytes(word) >> 21) & 0x7;
        if opmod == mode as u32 & 0x7 {
            Ok(())
        } else {
            Err(Error::Timeout)
        }
    }

    fn program_tdc(
        &self,
        transport: &mut impl Transport,
        mode: Mode,
    ) -> Result<(), Error> {
        // AUTO with offset in FD-mixed mode, DISABLED otherwise.
        let tdc_mode: u32 = if mode == Mode::FdMixed { 0b10 } else { 0b00 };
        let word = (tdc_mode << 16) | (self.tdco as u16 as u32 & 0xFFFF);
        transport.write(crate::regs::TDC, &word.to_le_bytes())
    }
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeChip {
        regs: HashMap<u16, u32>,
        opmod_follows_reqop: bool,
    }

    impl Transport for FakeChip {
        fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error> {
            let mut val = *self.regs.get(&addr).unwrap_or(&0);
            if addr == CON && self.opmod_follows_reqop {
                let reqop = (val >> 24) & 0x7;
                val = (val & !(0x7 << 21)) | (reqop << 21);
            }
            buf[..4].copy_from_slice(&val.to_le_bytes());
            Ok(())
        }
        fn read_crc(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error> {
            self.read(addr, buf)
        }
        fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), Error> {
            let mut word = [0u8; 4];
            word[..data.len().min(4)].copy_from_slice(&data[..data.len().min(4)]);
            self.regs.insert(addr, u32::from_le_bytes(word));
            Ok(())
        }
        fn reset(&mut self) -> Result<(), Error> {
            self.regs.clear();
            Ok(())
        }
    }

    struct CountingYield(u32);
    impl Yield for CountingYield {
        fn yield_for(&mut self, _millis: u32) {
            self.0 += 1;
        }
    }

    #[test]
    fn mode_change_times_out_if_chip_never_confirms() {
        let mut chip = FakeChip::default();
        let mut y = CountingYield(0);
        let mut fsm = Fsm::new();
        let err = fsm
            .request_mode(&mut chip, &mut y, Mode::Can2_0, 0)
            .unwrap_err();
        assert_eq!(err, Error::Timeout);
        assert_eq!(y.0, MODE_TIMEOUT_ITERS);
    }

    #[test]
    fn mode_change_succeeds_when_chip_confirms() {
        let mut chip = FakeChip {
            opmod_follows_reqop: true,
            ..Default::default()
        };
        let mut y = CountingYield(0);
        let mut fsm = Fsm::new();
        fsm.request_mode(&mut chip, &mut y, Mode::Can2_0, 0).unwrap();
        assert_eq!(fsm.current(), Mode::Can2_0);
    }

    #[test]
    fn mode_change_is_idempotent() {
        let mut chip = FakeChip {
            opmod_follows_reqop: true,
            ..Default::default()
        };
        let mut y = CountingYield(0);
        let mut fsm = Fsm::new();
        fsm.request_mode(&mut chip, &mut y, Mode::Listen, 0).unwrap();
        let writes_before = chip.regs.len();
        fsm.request_mode(&mut chip, &mut y, Mode::Listen, 0).unwrap();
        assert_eq!(chip.regs.len(), writes_before);
    }
}
