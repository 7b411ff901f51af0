// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register and RAM offsets for the MCP251XFD, as a typed table rather than
//! the C driver's address macros.

/// Start of the on-chip RAM window, in the chip's flat address space.
pub const RAM_BASE: u16 = 0x400;
/// End of the on-chip RAM window (exclusive).
pub const RAM_END: u16 = 0xC00;
/// Total usable RAM, in bytes.
pub const RAM_SIZE: usize = (RAM_END - RAM_BASE) as usize;

pub const CON: u16 = 0x00;
pub const NBTCFG: u16 = 0x04;
pub const DBTCFG: u16 = 0x08;
pub const TDC: u16 = 0x0C;
pub const INT: u16 = 0x1C;
pub const TREC: u16 = 0x34;
pub const BDIAG1: u16 = 0x3C;
pub const TEFCON: u16 = 0x40;
pub const TXQCON: u16 = 0x50;
pub const FLTCON: u16 = 0x1D0;
pub const OSC: u16 = 0xE00;
pub const IOCON: u16 = 0xE04;

/// `FIFOCONn` for RX FIFO index `n` (1-based, per the datasheet).
pub const fn fifocon(n: u16) -> u16 {
    0x50 + 12 * n
}

/// `FIFOSTAn` for RX FIFO index `n`.
pub const fn fifosta(n: u16) -> u16 {
    0x54 + 12 * n
}

/// `FIFOUAn` for RX FIFO index `n`.
pub const fn fifoua(n: u16) -> u16 {
    0x58 + 12 * n
}

/// Byte address of filter `n`'s control/enable byte within the `FLTCON`
/// register bank (four byte-addressable filters per 32-bit register).
pub const fn fltcon_byte_addr(n: u8) -> u16 {
    FLTCON + n as u16
}

/// `FLTOBJn` for filter index `n`.
pub const fn fltobj(n: u16) -> u16 {
    0x1F0 + 8 * n
}

/// `FLTMASKn` for filter index `n`.
pub const fn fltmask(n: u16) -> u16 {
    0x1F4 + 8 * n
}

bitflags::bitflags! {
    /// Latched bits in the `INT` register that must be written back as zero
    /// to acknowledge.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct IntFlags: u16 {
        const RXIF   = 1 << 0;
        const TEFIF  = 1 << 1;
        const MODIF  = 1 << 3;
        const IVMIF  = 1 << 11;
        const WAKIF  = 1 << 12;
        const CERRIF = 1 << 13;
        const SERRIF = 1 << 14;
    }
}

impl IntFlags {
    /// Bits that are "clearable" -- latched status, as opposed to level
    /// flags like RXIF/TEFIF that merely mirror FIFO occupancy.
    pub const LATCHED: Self = Self::MODIF
        .union(Self::IVMIF)
        .union(Self::WAKIF)
        .union(Self::CERRIF)
        .union(Self::SERRIF);
}
