// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Acceptance filter/mask allocation and RAM programming.

use crate::regs::{fltcon_byte_addr, fltmask, fltobj};
use crate::transport::Transport;
use crate::Error;

pub const MAX_FILTERS: usize = 32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FilterSpec {
    pub id: u32,
    pub mask: u32,
    pub extended: bool,
}

pub struct Filters {
    bitmap: u32,
    n: usize,
}

impl Filters {
    pub fn new(n: usize) -> Self {
        assert!(n <= MAX_FILTERS);
        Self { bitmap: 0, n }
    }

    pub fn max_filters(&self) -> usize {
        self.n
    }

    /// Allocates the lowest-clear index, programs `FLTOBJ`/`FLTMASK`/`FLTCON`
    /// for it, and returns the index. Returns `NoSpace` if none are free.
    pub fn add(
        &mut self,
        transport: &mut impl Transport,
        spec: FilterSpec,
    ) -> Result<u8, Error> {
        let idx = (0..self.n)
            .find(|i| self.bitmap & (1 << i) == 0)
            .ok_or(Error::NoSpace)?;

        let obj = if spec.extended {
            spec.id & 0x1FFF_FFFF | (1 << 29)
        } else {
            (spec.id & 0x7FF) << 18
        };
        transport.write(fltobj(idx as u16), &obj.to_le_bytes())?;

        let mask = if spec.extended {
            spec.mask & 0x1FFF_FFFF | (1 << 29)
        } else {
            (spec.mask & 0x7FF) << 18
        };
        transport.write(fltmask(idx as u16), &mask.to_le_bytes())?;

        self.set_enabled(transport, idx as u8, true)?;
        self.bitmap |= 1 << idx;
        Ok(idx as u8)
    }

    /// Disables and frees a previously allocated filter index.
    pub fn remove(
        &mut self,
        transport: &mut impl Transport,
        idx: u8,
    ) -> Result<(), Error> {
        if idx as usize >= self.n || self.bitmap & (1 << idx) == 0 {
            return Err(Error::InvalidArg);
        }
        self.set_enabled(transport, idx, false)?;
        self.bitmap &= !(1 << idx);
        Ok(())
    }

    fn set_enabled(
        &self,
        transport: &mut impl Transport,
        idx: u8,
        enabled: bool,
    ) -> Result<(), Error> {
        // Each FLTCONn register holds four byte-addressable filter control
        // bytes; bit 0 of each byte is FLTEN.
        let byte_addr = fltcon_byte_addr(idx);
        let mut byte = [0u8; 1];
        transport.read(byte_addr, &mut byte)?;
        if enabled {
            byte[0] |= 0b1;
        } else {
            byte[0] &= !0b1;
        }
        transport.write(byte_addr, &byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeChip(HashMap<u16, u8>);
    impl Transport for FakeChip {
        fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error> {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = *self.0.get(&(addr + i as u16)).unwrap_or(&0);
            }
            Ok(())
        }
        fn read_crc(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error> {
            self.read(addr, buf)
        }
        fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), Error> {
            for (i, &b) in data.iter().enumerate() {
                self.0.insert(addr + i as u16, b);
            }
            Ok(())
        }
        fn reset(&mut self) -> Result<(), Error> {
            self.0.clear();
            Ok(())
        }
    }

    #[test]
    fn allocation_returns_nonnegative_index_until_full() {
        let mut chip = FakeChip::default();
        let mut filters = Filters::new(2);
        let spec = FilterSpec {
            id: 0x100,
            mask: 0x7FF,
            extended: false,
        };
        assert_eq!(filters.add(&mut chip, spec).unwrap(), 0);
        assert_eq!(filters.add(&mut chip, spec).unwrap(), 1);
        assert_eq!(filters.add(&mut chip, spec).unwrap_err(), Error::NoSpace);
    }

    #[test]
    fn remove_frees_index_for_reuse() {
        let mut chip = FakeChip::default();
        let mut filters = Filters::new(1);
        let spec = FilterSpec {
            id: 0x100,
            mask: 0x7FF,
            extended: false,
        };
        let idx = filters.add(&mut chip, spec).unwrap();
        filters.remove(&mut chip, idx).unwrap();
        assert_eq!(filters.add(&mut chip, spec).unwrap(), idx);
    }

    #[test]
    fn scenario_2_filter_index_programs_correct_object() {
        let mut chip = FakeChip::default();
        let mut filters = Filters::new(8);
        let spec = FilterSpec {
            id: 0x321,
            mask: 0x7FF,
            extended: false,
        };
        filters.add(&mut chip, spec).unwrap();
        filters.add(&mut chip, spec).unwrap();
        let idx = filters.add(&mut chip, spec).unwrap();
        assert_eq!(idx, 2);
    }
}
