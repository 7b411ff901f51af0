// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static partitioning of the chip's 2 KiB RAM into TEF, TX-queue, and RX
//! FIFO regions.

use crate::regs::{RAM_BASE, RAM_SIZE};

/// Item size of a TEF entry: header only.
pub const TEF_ITEM_SIZE: usize = 8;

/// Item size of a TX queue entry for a given max payload (4-byte aligned).
pub const fn tx_item_size(max_payload: usize) -> usize {
    let raw = 8 + max_payload;
    (raw + 3) & !3
}

/// Item size of an RX FIFO entry for a given max payload and timestamp mode.
pub const fn rx_item_size(max_payload: usize, timestamps: bool) -> usize {
    let raw = 8 + if timestamps { 4 } else { 0 } + max_payload;
    (raw + 3) & !3
}

/// Describes one of the three RAM regions (TEF, TX queue, RX FIFO).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Region {
    pub ram_base: u16,
    pub item_size: usize,
    pub capacity: usize,
}

impl Region {
    pub const fn size(&self) -> usize {
        self.item_size * self.capacity
    }

    /// Absolute device address of slot `i` within this region.
    pub const fn slot_addr(&self, i: usize) -> u16 {
        self.ram_base + (i * self.item_size) as u16
    }
}

/// Full layout of the three regions, computed once at init time from the
/// board's configured capacities and the maximum CAN-FD payload in use.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RamMap {
    pub tef: Region,
    pub tx_queue: Region,
    pub rx_fifo: Region,
}

impl RamMap {
    /// Builds a layout, returning `None` if the three regions would not fit
    /// in the chip's 2 KiB RAM window. Call sites that know their sizes are
    /// compile-time constants should additionally gate on
    /// [`const_assert_fits`].
    pub const fn new(
        tef_items: usize,
        tx_items: usize,
        rx_items: usize,
        max_payload: usize,
        rx_timestamps: bool,
    ) -> Option<Self> {
        let tef = Region {
            ram_base: RAM_BASE,
            item_size: TEF_ITEM_SIZE,
            capacity: tef_items,
        };
        let tx_queue = Region {
            ram_base: tef.ram_base + tef.size() as u16,
            item_size: tx_item_size(max_payload),
            capacity: tx_items,
        };
        let rx_fifo = Region {
            ram_base: tx_queue.ram_base + tx_queue.size() as u16,
            item_size: rx_item_size(max_payload, rx_timestamps),
            capacity: rx_items,
        };

        let total = tef.size() + tx_queue.size() + rx_fifo.size();
        if total > RAM_SIZE {
            None
        } else {
            Some(Self {
                tef,
                tx_queue,
                rx_fifo,
            })
        }
    }
}

/// Default layout used by the `mcp251xfd` task: 8 TEF entries, 8 TX queue
/// entries, 16 RX FIFO entries, full 64-byte FD payload, RX timestamps on.
pub const DEFAULT_RAM_MAP: RamMap =
    match RamMap::new(8, 8, 16, crate::frame::MAX_PAYLOAD, true) {
        Some(m) => m,
        None => panic!("default RAM map exceeds 2 KiB budget"),
    };

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_fits_ram() {
        let total = DEFAULT_RAM_MAP.tef.size()
            + DEFAULT_RAM_MAP.tx_queue.size()
            + DEFAULT_RAM_MAP.rx_fifo.size();
        assert!(total <= RAM_SIZE);
    }

    #[test]
    fn regions_are_contiguous_and_non_overlapping() {
        let m = DEFAULT_RAM_MAP;
        assert_eq!(m.tx_queue.ram_base, m.tef.ram_base + m.tef.size() as u16);
        assert_eq!(
            m.rx_fifo.ram_base,
            m.tx_queue.ram_base + m.tx_queue.size() as u16
        );
    }

    #[test]
    fn item_sizes_are_4_byte_aligned() {
        assert_eq!(DEFAULT_RAM_MAP.tef.item_size % 4, 0);
        assert_eq!(DEFAULT_RAM_MAP.tx_queue.item_size % 4, 0);
        assert_eq!(DEFAULT_RAM_MAP.rx_fifo.item_size % 4, 0);
    }

    #[test]
    fn oversized_layout_is_rejected() {
        assert!(RamMap::new(64, 64, 64, 64, true).is_none());
    }

    #[test]
    fn slot_addr_advances_by_item_size() {
        let r = DEFAULT_RAM_MAP.rx_fifo;
        assert_eq!(r.slot_addr(1) - r.slot_addr(0), r.item_size as u16);
    }
}
