// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bitmap of in-flight TX mailboxes and the client callback contract.
//!
//! Unlike the original driver, there is no separate mutex/semaphore pair
//! here: the owning task's run loop is the only mutator (see
//! `drv/mcp251xfd`), so the bitmap itself is the admission gate, and a full
//! table is an ordinary `Err` return rather than a blocking wait.

use crate::fsm::BusState;
use crate::frame::CanFrame;
use crate::Error;

pub const MAX_MAILBOXES: usize = 8;

/// Receives the asynchronous events the upper CAN driver contract promises:
/// per-mailbox completion, received frames, and bus state changes.
pub trait CanClient {
    fn tx_complete(&mut self, mailbox: u8, status: Result<(), Error>);
    fn rx(&mut self, frame: CanFrame);
    fn state_change(&mut self, state: BusState, tx_err_cnt: u8, rx_err_cnt: u8);
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Slot {
    in_use: bool,
}

pub struct Mailboxes {
    slots: [Slot; MAX_MAILBOXES],
    n: usize,
}

impl Mailboxes {
    pub fn new(n: usize) -> Self {
        assert!(n <= MAX_MAILBOXES);
        Self {
            slots: [Slot { in_use: false }; MAX_MAILBOXES],
            n,
        }
    }

    pub fn live_count(&self) -> usize {
        self.slots[..self.n].iter().filter(|s| s.in_use).count()
    }

    pub fn free_count(&self) -> usize {
        self.n - self.live_count()
    }

    /// Finds the lowest-clear bit and reserves it, or `NoMailbox` if the
    /// table is full. This is the translation of "take the counting
    /// semaphore" into a run-to-completion task: admission failure is
    /// reported immediately rather than awaited.
    pub fn reserve(&mut self) -> Result<u8, Error> {
        for (i, slot) in self.slots[..self.n].iter_mut().enumerate() {
            if !slot.in_use {
                slot.in_use = true;
                return Ok(i as u8);
            }
        }
        Err(Error::NoMailbox)
    }

    pub fn release(&mut self, mailbox: u8) {
        if let Some(slot) = self.slots.get_mut(mailbox as usize) {
            slot.in_use = false;
        }
    }

    pub fn is_in_use(&self, mailbox: u8) -> bool {
        self.slots
            .get(mailbox as usize)
            .map(|s| s.in_use)
            .unwrap_or(false)
    }

    /// Completes a mailbox (status delivered via `client`) and frees the
    /// slot, as happens on a TEF drain.
    pub fn complete(
        &mut self,
        mailbox: u8,
        status: Result<(), Error>,
        client: &mut impl CanClient,
    ) {
        if self.is_in_use(mailbox) {
            self.release(mailbox);
            client.tx_complete(mailbox, status);
        }
    }

    /// Global error path: flush every live mailbox with `NetDown` and clear
    /// the bitmap in one pass, used on bus-off detection and on `stop()`.
    pub fn flush_all(&mut self, client: &mut impl CanClient) {
        for i in 0..self.n {
            if self.slots[i].in_use {
                self.slots[i].in_use = false;
                client.tx_complete(i as u8, Err(Error::NetDown));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        completions: Vec<(u8, bool)>,
    }
    impl CanClient for Recorder {
        fn tx_complete(&mut self, mailbox: u8, status: Result<(), Error>) {
            self.completions.push((mailbox, status.is_ok()));
        }
        fn rx(&mut self, _frame: CanFrame) {}
        fn state_change(&mut self, _s: BusState, _t: u8, _r: u8) {}
    }

    #[test]
    fn reserve_picks_lowest_clear_bit() {
        let mut mb = Mailboxes::new(4);
        assert_eq!(mb.reserve().unwrap(), 0);
        assert_eq!(mb.reserve().unwrap(), 1);
        mb.release(0);
        assert_eq!(mb.reserve().unwrap(), 0);
    }

    #[test]
    fn exhaustion_returns_no_mailbox() {
        let mut mb = Mailboxes::new(2);
        mb.reserve().unwrap();
        mb.reserve().unwrap();
        assert_eq!(mb.reserve().unwrap_err(), Error::NoMailbox);
    }

    #[test]
    fn conservation_holds_at_quiescence() {
        let mut mb = Mailboxes::new(8);
        let mut client = Recorder::default();
        let a = mb.reserve().unwrap();
        let b = mb.reserve().unwrap();
        mb.complete(a, Ok(()), &mut client);
        assert_eq!(mb.live_count() + mb.free_count(), 8);
        mb.complete(b, Ok(()), &mut client);
        assert_eq!(mb.live_count(), 0);
        assert_eq!(mb.free_count(), 8);
    }

    #[test]
    fn flush_all_reports_net_down_and_frees_every_slot() {
        let mut mb = Mailboxes::new(4);
        let mut client = Recorder::default();
        mb.reserve().unwrap();
        mb.reserve().unwrap();
        mb.flush_all(&mut client);
        assert_eq!(mb.live_count(), 0);
        assert_eq!(client.completions.len(), 2);
        assert!(client.completions.iter().all(|(_, ok)| !ok));
    }
}
