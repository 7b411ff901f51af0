// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spinel header encoding, the variable-length integer pack format, and the
//! 15-slot TID ring used to match responses to outstanding requests.

use crate::Error;

pub const HEADER_FLAG: u8 = 0x80;

/// Command IDs used by this driver (subset of the upstream Spinel command
/// space).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Command {
    PropValueGet = 0x02,
    PropValueSet = 0x03,
    Reset = 0x01,
}

/// Property catalogue this driver reads or writes, using the upstream
/// Spinel wire-level property IDs (not locally invented ordinals) so a
/// captured byte stream matches what a real host/RCP pair exchanges.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Property {
    LastStatus = 0x00,
    HwAddr = 0x08,
    PhyEnabled = 0x20,
    PhyChan = 0x21,
    PhyTxPower = 0x25,
    MacScanState = 0x30,
    Mac154Laddr = 0x34,
    Mac154Saddr = 0x35,
    Mac154Panid = 0x36,
    MacRawStreamEnabled = 0x38,
    RadioCaps = 0x43,
    MacSrcMatchEnabled = 0x46,
    MacSrcMatchShortAddresses = 0x47,
    MacSrcMatchExtendedAddresses = 0x48,
    StreamRaw = 0x71,
    /// OpenThread vendor extension range (`SPINEL_PROP_VENDOR__BEGIN` =
    /// 0x3C00); the RCP-specific counters live here, not in the core
    /// Spinel property space.
    RcpMacFrameCounter = 0x3C00 + 6,
    RcpEnhAckProbing = 0x3C00 + 7,
}

pub fn encode_header(iid: u8, tid: u8) -> u8 {
    HEADER_FLAG | ((iid & 0x3) << 4) | (tid & 0xF)
}

pub fn decode_header(byte: u8) -> Option<(u8, u8)> {
    if byte & HEADER_FLAG == 0 {
        return None;
    }
    Some(((byte >> 4) & 0x3, byte & 0xF))
}

/// Packs a variable-length unsigned integer (7 data bits per byte, LE,
/// continuation bit in the MSB of all but the last byte).
pub fn pack_uint(mut value: u32, out: &mut [u8]) -> Option<usize> {
    let mut i = 0;
    loop {
        if i >= out.len() {
            return None;
        }
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out[i] = byte;
        i += 1;
        if value == 0 {
            return Some(i);
        }
    }
}

pub fn unpack_uint(data: &[u8]) -> Option<(u32, usize)> {
    let mut value = 0u32;
    for (i, &byte) in data.iter().enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        if i == 4 {
            return None;
        }
    }
    None
}

/// Encodes `header | command | property | payload` into `out`, returning
/// the number of bytes written.
pub fn encode_frame(
    iid: u8,
    tid: u8,
    command: Command,
    property: Property,
    payload: &[u8],
    out: &mut [u8],
) -> Option<usize> {
    let mut pos = 0;
    out[pos] = encode_header(iid, tid);
    pos += 1;
    pos += pack_uint(command as u32, &mut out[pos..])?;
    pos += pack_uint(property as u32, &mut out[pos..])?;
    if pos + payload.len() > out.len() {
        return None;
    }
    out[pos..pos + payload.len()].copy_from_slice(payload);
    Some(pos + payload.len())
}

pub struct DecodedFrame<'a> {
    pub iid: u8,
    pub tid: u8,
    pub command: u32,
    pub property: u32,
    pub payload: &'a [u8],
}

pub fn decode_frame(data: &[u8]) -> Result<DecodedFrame<'_>, Error> {
    if data.is_empty() {
        return Err(Error::FrameError);
    }
    let (iid, tid) = decode_header(data[0]).ok_or(Error::FrameError)?;
    let (command, n1) = unpack_uint(&data[1..]).ok_or(Error::FrameError)?;
    let (property, n2) =
        unpack_uint(&data[1 + n1..]).ok_or(Error::FrameError)?;
    let payload = &data[1 + n1 + n2..];
    Ok(DecodedFrame {
        iid,
        tid,
        command,
        property,
        payload,
    })
}

/// 15-slot TID ring (slots 1..=15; 0 is reserved for async notifications).
/// Each reserved slot remembers the property it is awaiting so an
/// unsolicited `LAST_STATUS` can still be routed to the right waiter.
pub struct TidTable {
    awaited: [Option<u32>; 16],
    next: u8,
}

impl TidTable {
    pub fn new() -> Self {
        Self {
            awaited: [None; 16],
            next: 1,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.awaited[1..].iter().filter(|p| p.is_some()).count()
    }

    /// Allocates the next free TID (rotating over 1..=15), recording the
    /// property it awaits. Returns `NoMemory` if all 15 are outstanding.
    pub fn allocate(&mut self, property: u32) -> Result<u8, Error> {
        for _ in 0..15 {
            let candidate = self.next;
            self.next = if self.next == 15 { 1 } else { self.next + 1 };
            if self.awaited[candidate as usize].is_none() {
                self.awaited[candidate as usize] = Some(property);
                return Ok(candidate);
            }
        }
        Err(Error::NoMemory)
    }

    pub fn release(&mut self, tid: u8) {
        if tid != 0 && (tid as usize) < self.awaited.len() {
            self.awaited[tid as usize] = None;
        }
    }

    pub fn is_outstanding(&self, tid: u8) -> bool {
        tid != 0 && self.awaited.get(tid as usize).copied().flatten().is_some()
    }

    pub fn awaited_property(&self, tid: u8) -> Option<u32> {
        self.awaited.get(tid as usize).copied().flatten()
    }

    /// Matches a response frame against the outstanding TID table: the
    /// frame's own TID must be reserved and its property must match what
    /// that slot is awaiting, OR (for a late `LAST_STATUS`) the frame's TID
    /// is non-zero and matches any slot awaiting that property.
    pub fn matches(&self, tid: u8, property: u32, last_status: bool) -> bool {
        if tid == 0 {
            return false;
        }
        match self.awaited_property(tid) {
            Some(p) if p == property => true,
            Some(_) if last_status => true,
            _ => false,
        }
    }
}

impl Default for TidTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let byte = encode_header(1, 7);
        assert_eq!(decode_header(byte), Some((1, 7)));
    }

    #[test]
    fn varint_round_trips_small_and_large() {
        for value in [0u32, 1, 127, 128, 300, 0x1FFFF] {
            let mut buf = [0u8; 5];
            let n = pack_uint(value, &mut buf).unwrap();
            let (decoded, used) = unpack_uint(&buf[..n]).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(used, n);
        }
    }

    #[test]
    fn tid_allocation_and_reuse() {
        let mut table = TidTable::new();
        let tid = table.allocate(Property::PhyChan as u32).unwrap();
        assert!(table.is_outstanding(tid));
        table.release(tid);
        assert!(!table.is_outstanding(tid));
        // Reusable within the next 15 requests.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..15 {
            let t = table.allocate(Property::PhyChan as u32).unwrap();
            seen.insert(t);
            table.release(t);
        }
        assert!(seen.contains(&tid));
    }

    #[test]
    fn scenario_6_tid_exhaustion_at_16th_request() {
        let mut table = TidTable::new();
        for _ in 0..15 {
            table.allocate(Property::PhyChan as u32).unwrap();
        }
        assert_eq!(table.outstanding(), 15);
        assert_eq!(
            table.allocate(Property::PhyChan as u32).unwrap_err(),
            Error::NoMemory
        );
    }

    #[test]
    fn late_last_status_matches_awaited_slot() {
        let mut table = TidTable::new();
        let tid = table.allocate(Property::PhyChan as u32).unwrap();
        assert!(table.matches(tid, Property::LastStatus as u32, true));
        assert!(!table.matches(tid, Property::LastStatus as u32, false));
    }

    #[test]
    fn scenario_5_set_channel_byte_exact() {
        let mut out = [0u8; 8];
        let n = encode_frame(
            0,
            1,
            Command::PropValueSet,
            Property::PhyChan,
            &[15],
            &mut out,
        )
        .unwrap();
        assert_eq!(&out[..n], &[0x81, 0x03, 0x21, 0x0F]);
    }
}
