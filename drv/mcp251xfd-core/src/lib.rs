// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure chip logic for the Microchip MCP251XFD CAN-FD controller: SPI
//! command framing, RAM layout, mode FSM, mailbox bookkeeping, and
//! acceptance filters. No IPC lives here; `drv/mcp251xfd` wraps this in a
//! Hubris task, and `drv/mcp251xfd-api` is the client side of that task.

#![cfg_attr(not(test), no_std)]

pub mod crc;
pub mod filters;
pub mod fsm;
pub mod frame;
pub mod mailbox;
pub mod ram;
pub mod regs;
pub mod spi_codec;
pub mod transport;

use fsm::{BusState, Fsm, Mode};
use mailbox::{CanClient, Mailboxes};
use ram::RamMap;
use regs::IntFlags;
use ringbuf::*;
use transport::{Transport, Yield};

/// Maximum number of consecutive drain iterations the IRQ worker will run
/// before cooperatively yielding, bounding an interrupt storm.
pub const MAX_INT_HANDLER_CALLS: u32 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    InvalidArg,
    NotSupported,
    Busy,
    Io,
    FrameError,
    Timeout,
    NoMailbox,
    NoSpace,
    WouldBlock,
    NetDown,
    NetUnreachable,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    ModeChange(Mode),
    BusOff,
    FilterAdded(u8),
    TxComplete(u8),
}
ringbuf!(Trace, 16, Trace::None);

/// Packs bit-timing quanta into the `NBTCFG`/`DBTCFG` word layout: SJW at
/// bits 24..31, TSEG2 at 16..22, TSEG1 at 8..15, BRP at 0..7.
fn encode_timing(brp: u8, tseg1: u8, tseg2: u8, sjw: u8) -> u32 {
    (u32::from(sjw) << 24)
        | (u32::from(tseg2 & 0x7F) << 16)
        | (u32::from(tseg1) << 8)
        | u32::from(brp)
}

/// Top-level controller state: the FSM, mailbox table, filter table, and
/// RAM layout. Generic over the transport and a single client that receives
/// `tx_complete`/`rx`/`state_change` events, following the `Client`-trait
/// shape used throughout this tree's Tock-derived HIL enrichment rather
/// than a heap of boxed closures (MCP allocates nothing).
pub struct Controller {
    fsm: Fsm,
    mailboxes: Mailboxes,
    filters: filters::Filters,
    ram: RamMap,
    started: bool,
    bus_state: BusState,
}

impl Controller {
    pub fn new(ram: RamMap, num_mailboxes: usize, num_filters: usize) -> Self {
        Self {
            fsm: Fsm::new(),
            mailboxes: Mailboxes::new(num_mailboxes),
            filters: filters::Filters::new(num_filters),
            ram,
            started: false,
            bus_state: BusState::Stopped,
        }
    }

    pub fn ram_map(&self) -> &RamMap {
        &self.ram
    }

    pub fn bus_state(&self) -> BusState {
        self.bus_state
    }

    pub fn mode(&self) -> Mode {
        self.fsm.current()
    }

    /// `set_mode`: only permitted while stopped, matching the upper CAN
    /// driver contract (`start`/`stop` bracket configuration changes).
    pub fn set_mode(
        &mut self,
        transport: &mut impl Transport,
        yielder: &mut impl Yield,
        mode: Mode,
        tdco: i16,
    ) -> Result<(), Error> {
        if self.started && mode != Mode::Config {
            return Err(Error::Busy);
        }
        self.fsm.request_mode(transport, yielder, mode, tdco)?;
        ringbuf_entry!(Trace::ModeChange(mode));
        Ok(())
    }

    /// Programs the arbitration-phase `NBTCFG` register from `(brp, tseg1,
    /// tseg2, sjw)`, each already expressed in time quanta.
    pub fn set_timing(
        &mut self,
        transport: &mut impl Transport,
        brp: u8,
        tseg1: u8,
        tseg2: u8,
        sjw: u8,
    ) -> Result<(), Error> {
        let word = encode_timing(brp, tseg1, tseg2, sjw);
        transport.write(regs::NBTCFG, &word.to_le_bytes())
    }

    /// Programs the CAN-FD data-phase `DBTCFG` register. Only meaningful in
    /// [`Mode::FdMixed`]; the chip ignores it otherwise.
    pub fn set_timing_data(
        &mut self,
        transport: &mut impl Transport,
        brp: u8,
        tseg1: u8,
        tseg2: u8,
        sjw: u8,
    ) -> Result<(), Error> {
        let word = encode_timing(brp, tseg1, tseg2, sjw);
        transport.write(regs::DBTCFG, &word.to_le_bytes())
    }

    pub fn start(
        &mut self,
        transport: &mut impl Transport,
        yielder: &mut impl Yield,
        mode: Mode,
    ) -> Result<(), Error> {
        self.fsm.request_mode(transport, yielder, mode, 0)?;
        self.started = true;
        self.bus_state = BusState::ErrorActive;
        Ok(())
    }

    /// Aborts all pending transmissions (`ABAT`) and flushes mailboxes, the
    /// only cancellation mechanism this driver offers.
    pub fn stop(
        &mut self,
        transport: &mut impl Transport,
        yielder: &mut impl Yield,
        client: &mut impl CanClient,
    ) -> Result<(), Error> {
        let mut word = [0u8; 4];
        transport.read(regs::CON, &mut word)?;
        let mut con = u32::from_le_bytes(word);
        con |= 1 << 27; // ABAT
        transport.write(regs::CON, &con.to_le_bytes())?;
        for _ in 0..100 {
            transport.read(regs::CON, &mut word)?;
            if u32::from_le_bytes(word) & (1 << 27) == 0 {
                break;
            }
            yielder.yield_for(2);
        }
        self.mailboxes.flush_all(client);
        self.fsm.request_mode(transport, yielder, Mode::Config, 0)?;
        self.started = false;
        self.bus_state = BusState::Stopped;
        Ok(())
    }

    pub fn send(
        &mut self,
        transport: &mut impl Transport,
        frame: &frame::CanFrame,
    ) -> Result<u8, Error> {
        let mailbox = self.mailboxes.reserve()?;
        let mut tail = [0u8; 4];
        transport.read_crc(regs::TXQCON, &mut tail).map_err(|_| {
            self.mailboxes.release(mailbox);
            Error::Io
        })?;
        let txqcon = u32::from_le_bytes(tail);
        if txqcon & (1 << 0) == 0 {
            // TXQNIF clear: queue full.
            self.mailboxes.release(mailbox);
            return Err(Error::NoSpace);
        }

        let slot_addr = self.ram.tx_queue.slot_addr(mailbox as usize);
        let mut buf = [0u8; 8 + frame::MAX_PAYLOAD];
        let used = frame::canframe_to_txobj(frame, mailbox, &mut buf);
        if let Err(e) = transport.write(slot_addr, &buf[..used]) {
            self.mailboxes.release(mailbox);
            return Err(e);
        }

        // UINC | TXREQ.
        let ctrl = [0b11u8, 0, 0, 0];
        if let Err(e) = transport.write(regs::TXQCON, &ctrl) {
            self.mailboxes.release(mailbox);
            return Err(e);
        }
        Ok(mailbox)
    }

    pub fn add_rx_filter(
        &mut self,
        transport: &mut impl Transport,
        spec: filters::FilterSpec,
    ) -> Result<u8, Error> {
        let idx = self.filters.add(transport, spec)?;
        ringbuf_entry!(Trace::FilterAdded(idx));
        Ok(idx)
    }

    pub fn remove_rx_filter(
        &mut self,
        transport: &mut impl Transport,
        idx: u8,
    ) -> Result<(), Error> {
        self.filters.remove(transport, idx)
    }

    pub fn get_max_filters(&self) -> usize {
        self.filters.max_filters()
    }

    /// Services one pass of the interrupt drain: reads and acknowledges
    /// `INT`, then dispatches RXIF -> TEFIF -> IVMIF -> MODIF -> CERRIF.
    /// Returns whether any condition was actually serviced, so the caller
    /// (the task's IRQ worker loop) knows whether to re-check the pin.
    pub fn service_interrupt(
        &mut self,
        transport: &mut impl Transport,
        yielder: &mut impl Yield,
        client: &mut impl CanClient,
    ) -> Result<bool, Error> {
        let mut raw = [0u8; 2];
        transport.read_crc(regs::INT, &mut raw)?;
        let flags = IntFlags::from_bits_truncate(u16::from_le_bytes(raw));
        if flags.is_empty() {
            return Ok(false);
        }

        // Acknowledge latched bits up front; level bits (RXIF/TEFIF) clear
        // themselves once their FIFO is drained.
        let ack = flags & IntFlags::LATCHED;
        if !ack.is_empty() {
            let cleared = flags & !ack;
            transport.write(regs::INT, &cleared.bits().to_le_bytes())?;
        }

        if flags.contains(IntFlags::RXIF) {
            self.drain_rx(transport, client)?;
        }
        if flags.contains(IntFlags::TEFIF) {
            self.drain_tef(transport, client)?;
        }
        if flags.contains(IntFlags::IVMIF) {
            self.handle_bus_off(client);
        }
        if flags.contains(IntFlags::MODIF) {
            self.fsm.reassert_on_modif(transport, yielder)?;
        }
        if flags.contains(IntFlags::CERRIF) {
            self.handle_error_state_change(transport, client)?;
        }
        Ok(true)
    }

    fn drain_tef(
        &mut self,
        transport: &mut impl Transport,
        client: &mut impl CanClient,
    ) -> Result<(), Error> {
        // TEF has no FIFOCI; drain one element per pass.
        let addr = self.ram.tef.ram_base;
        let mut buf = [0u8; 8];
        transport.read(addr, &mut buf)?;
        let mailbox = frame::tefobj_mailbox(&buf)?;
        ringbuf_entry!(Trace::TxComplete(mailbox));
        self.mailboxes.complete(mailbox, Ok(()), client);
        transport.write(regs::TEFCON, &[0b1, 0, 0, 0])
    }

    fn drain_rx(
        &mut self,
        transport: &mut impl Transport,
        client: &mut impl CanClient,
    ) -> Result<(), Error> {
        let addr = self.ram.rx_fifo.ram_base;
        let mut buf = [0u8; 8 + 4 + frame::MAX_PAYLOAD];
        transport.read(addr, &mut buf)?;
        if let Ok(frame) = frame::rxobj_to_canframe(&buf, true) {
            client.rx(frame);
        }
        transport.write(regs::fifocon(1), &[0b1, 0, 0, 0])
    }

    fn handle_bus_off(&mut self, client: &mut impl CanClient) {
        self.bus_state = BusState::BusOff;
        self.mailboxes.flush_all(client);
        ringbuf_entry!(Trace::BusOff);
        client.state_change(BusState::BusOff, 0, 0);
    }

    fn handle_error_state_change(
        &mut self,
        transport: &mut impl Transport,
        client: &mut impl CanClient,
    ) -> Result<(), Error> {
        let mut trec = [0u8; 4];
        transport.read_crc(regs::TREC, &mut trec)?;
        let word = u32::from_le_bytes(trec);
        let rx_err = (word & 0xFF) as u8;
        let tx_err = ((word >> 8) & 0xFF) as u8;
        let state = if word & (1 << 21) != 0 {
            BusState::BusOff
        } else if word & (1 << 20) != 0 {
            BusState::ErrorPassive
        } else if word & (1 << 19) != 0 {
            BusState::ErrorWarning
        } else {
            BusState::ErrorActive
        };
        if state == BusState::BusOff {
            self.mailboxes.flush_all(client);
        }
        self.bus_state = state;
        client.state_change(state, tx_err, rx_err);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CanFrame, FrameFlags};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeChip {
        regs: HashMap<u16, Vec<u8>>,
        opmod_follows_reqop: bool,
    }

    impl Transport for FakeChip {
        fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error> {
            if let Some(bytes) = self.regs.get(&addr) {
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
            }
            if addr == regs::CON && self.opmod_follows_reqop {
                let mut word = [0u8; 4];
                word[..buf.len().min(4)].copy_from_slice(&buf[..buf.len().min(4)]);
                let mut val = u32::from_le_bytes(word);
                let reqop = (val >> 24) & 0x7;
                val = (val & !(0x7 << 21)) | (reqop << 21);
                buf[..4].copy_from_slice(&val.to_le_bytes());
            }
            Ok(())
        }
        fn read_crc(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error> {
            self.read(addr, buf)
        }
        fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), Error> {
            self.regs.insert(addr, data.to_vec());
            Ok(())
        }
        fn reset(&mut self) -> Result<(), Error> {
            self.regs.clear();
            Ok(())
        }
    }

    struct NoopYield;
    impl Yield for NoopYield {
        fn yield_for(&mut self, _millis: u32) {}
    }

    #[derive(Default)]
    struct Recorder {
        tx: Vec<(u8, bool)>,
        rx: Vec<CanFrame>,
        state: Vec<BusState>,
    }
    impl CanClient for Recorder {
        fn tx_complete(&mut self, mailbox: u8, status: Result<(), Error>) {
            self.tx.push((mailbox, status.is_ok()));
        }
        fn rx(&mut self, frame: CanFrame) {
            self.rx.push(frame);
        }
        fn state_change(&mut self, s: BusState, _t: u8, _r: u8) {
            self.state.push(s);
        }
    }

    fn test_ram() -> RamMap {
        RamMap::new(4, 4, 4, 64, true).unwrap()
    }

    #[test]
    fn send_then_tef_drain_completes_mailbox() {
        let mut chip = FakeChip {
            opmod_follows_reqop: true,
            ..Default::default()
        };
        // TXQCON must report queue-not-full.
        chip.regs.insert(regs::TXQCON, vec![0b1, 0, 0, 0]);
        let mut y = NoopYield;
        let mut client = Recorder::default();
        let mut ctrl = Controller::new(test_ram(), 8, 8);
        ctrl.start(&mut chip, &mut y, Mode::Can2_0).unwrap();

        let frame = CanFrame::new(0x123, 8, FrameFlags::empty(), &[1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();
        let mailbox = ctrl.send(&mut chip, &frame).unwrap();
        assert_eq!(mailbox, 0);

        // Simulate the TEF slot echoing this mailbox's SEQ.
        let mut tef = vec![0u8; 8];
        tef[4..8].copy_from_slice(&((mailbox as u32) << 9).to_le_bytes());
        chip.regs.insert(ctrl.ram_map().tef.ram_base, tef);

        ctrl.drain_tef(&mut chip, &mut client).unwrap();
        assert_eq!(client.tx.len(), 1);
        assert_eq!(client.tx[0], (0, true));
    }

    #[test]
    fn bus_off_flushes_mailboxes_with_net_down() {
        let mut chip = FakeChip {
            opmod_follows_reqop: true,
            ..Default::default()
        };
        chip.regs.insert(regs::TXQCON, vec![0b1, 0, 0, 0]);
        let mut y = NoopYield;
        let mut client = Recorder::default();
        let mut ctrl = Controller::new(test_ram(), 8, 8);
        ctrl.start(&mut chip, &mut y, Mode::Can2_0).unwrap();

        let frame = CanFrame::new(0x1, 0, FrameFlags::empty(), &[]).unwrap();
        ctrl.send(&mut chip, &frame).unwrap();

        ctrl.handle_bus_off(&mut client);
        assert_eq!(ctrl.bus_state(), BusState::BusOff);
        assert_eq!(client.tx, vec![(0, false)]);
        assert_eq!(client.state, vec![BusState::BusOff]);
    }
}
