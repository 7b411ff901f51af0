// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Abstraction over the SPI-codec layer, so that [`crate::fsm::Fsm`],
//! [`crate::mailbox::Mailboxes`] and [`crate::filters::Filters`] can be
//! exercised on the host against a fake chip rather than real SPI.

use crate::Error;

/// Register/RAM access primitives the rest of the core logic is built on.
/// `drv/mcp251xfd`'s [`crate::spi_codec::SpiCodec`] is the production
/// implementor; tests use a small in-memory fake.
pub trait Transport {
    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error>;
    fn read_crc(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error>;
    fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), Error>;
    fn reset(&mut self) -> Result<(), Error>;
}

/// Cooperative yield point, standing in for `userlib::hl::sleep_for` outside
/// the driver task.
pub trait Yield {
    fn yield_for(&mut self, millis: u32);
}
