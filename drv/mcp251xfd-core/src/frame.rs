// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire shapes for CAN frames as they appear in MCP251XFD RAM: `TxObject`,
//! `RxObject`, and `TefObject`, plus the chip-agnostic [`CanFrame`] the upper
//! CAN driver contract deals in.

/// Largest payload a CAN-FD frame can carry.
pub const MAX_PAYLOAD: usize = 64;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct FrameFlags: u8 {
        /// Extended (29-bit) identifier.
        const IDE = 0b0001;
        /// Bit-rate switch (CAN-FD data phase runs faster).
        const BRS = 0b0010;
        /// FD frame format (as opposed to CAN 2.0).
        const FDF = 0b0100;
        /// Remote transmission request.
        const RTR = 0b1000;
    }
}

/// DLC -> payload length table per ISO 11898-1 (for DLC 9..15, which encode
/// lengths greater than 8 only in FD frames).
const DLC_LEN: [u8; 16] =
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

pub fn dlc_to_len(dlc: u8) -> usize {
    DLC_LEN[(dlc & 0xF) as usize] as usize
}

pub fn len_to_dlc(len: usize) -> Option<u8> {
    DLC_LEN.iter().position(|&l| l as usize == len).map(|i| i as u8)
}

/// A decoded CAN (or CAN-FD) frame, independent of MCP251XFD RAM layout.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CanFrame {
    pub id: u32,
    pub dlc: u8,
    pub flags: FrameFlags,
    pub payload: [u8; MAX_PAYLOAD],
    pub payload_len: usize,
    /// Index of the acceptance filter that matched, for received frames.
    pub filhit: Option<u8>,
    /// Chip timestamp captured at reception, if the RX FIFO is so configured.
    pub timestamp: Option<u32>,
}

impl CanFrame {
    pub fn new(
        id: u32,
        dlc: u8,
        flags: FrameFlags,
        data: &[u8],
    ) -> Result<Self, super::Error> {
        if dlc > 15 {
            return Err(super::Error::InvalidArg);
        }
        let max_len = dlc_to_len(dlc);
        if data.len() > max_len || data.len() > MAX_PAYLOAD {
            return Err(super::Error::InvalidArg);
        }
        if !flags.contains(FrameFlags::FDF) && max_len > 8 {
            return Err(super::Error::InvalidArg);
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        payload[..data.len()].copy_from_slice(data);
        Ok(Self {
            id,
            dlc,
            flags,
            payload,
            payload_len: data.len(),
            filhit: None,
            timestamp: None,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.payload[..self.payload_len]
    }
}

/// Header common to TxObject/RxObject: SID11|EID18, DLC+flags, SEQ.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct ObjHeader {
    id_word: u32,
    ctrl_word: u32,
}

fn encode_header(frame: &CanFrame, seq: u8) -> ObjHeader {
    let id_word = if frame.flags.contains(FrameFlags::IDE) {
        let sid11 = (frame.id >> 18) & 0x7FF;
        let eid18 = frame.id & 0x3_FFFF;
        (sid11 << 18) | eid18
    } else {
        (frame.id & 0x7FF) << 18
    };

    let mut ctrl: u32 = (frame.dlc as u32 & 0xF) << 0;
    if frame.flags.contains(FrameFlags::IDE) {
        ctrl |= 1 << 4;
    }
    if frame.flags.contains(FrameFlags::RTR) {
        ctrl |= 1 << 5;
    }
    if frame.flags.contains(FrameFlags::BRS) {
        ctrl |= 1 << 6;
    }
    if frame.flags.contains(FrameFlags::FDF) {
        ctrl |= 1 << 7;
    }
    ctrl |= (seq as u32 & 0x7F) << 9;

    ObjHeader {
        id_word,
        ctrl_word: ctrl,
    }
}

fn decode_header(id_word: u32, ctrl_word: u32) -> (u32, u8, FrameFlags, u8) {
    let dlc = (ctrl_word & 0xF) as u8;
    let mut flags = FrameFlags::empty();
    if ctrl_word & (1 << 4) != 0 {
        flags |= FrameFlags::IDE;
    }
    if ctrl_word & (1 << 5) != 0 {
        flags |= FrameFlags::RTR;
    }
    if ctrl_word & (1 << 6) != 0 {
        flags |= FrameFlags::BRS;
    }
    if ctrl_word & (1 << 7) != 0 {
        flags |= FrameFlags::FDF;
    }
    let seq = ((ctrl_word >> 9) & 0x7F) as u8;

    let id = if flags.contains(FrameFlags::IDE) {
        let sid11 = (id_word >> 18) & 0x7FF;
        let eid18 = id_word & 0x3_FFFF;
        (sid11 << 18) | eid18
    } else {
        (id_word >> 18) & 0x7FF
    };

    (id, dlc, flags, seq)
}

/// 4-byte-aligned on-chip TX object: header then payload, little-endian.
pub fn canframe_to_txobj(frame: &CanFrame, mailbox: u8, buf: &mut [u8]) -> usize {
    let header = encode_header(frame, mailbox);
    buf[0..4].copy_from_slice(&header.id_word.to_le_bytes());
    buf[4..8].copy_from_slice(&header.ctrl_word.to_le_bytes());
    let data = frame.data();
    buf[8..8 + data.len()].copy_from_slice(data);
    let padded = (data.len() + 3) & !3;
    8 + padded
}

/// Parses a RAM-resident RX object (header, optional timestamp, payload)
/// back into a [`CanFrame`].
pub fn rxobj_to_canframe(
    buf: &[u8],
    has_timestamp: bool,
) -> Result<CanFrame, super::Error> {
    if buf.len() < 8 {
        return Err(super::Error::Io);
    }
    let id_word = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let ctrl_word = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    let (id, dlc, flags, _seq) = decode_header(id_word, ctrl_word);
    let filhit = ((ctrl_word >> 5) & 0x1F) as u8;

    let mut offset = 8;
    let timestamp = if has_timestamp {
        if buf.len() < offset + 4 {
            return Err(super::Error::Io);
        }
        let ts = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
        offset += 4;
        Some(ts)
    } else {
        None
    };

    let len = dlc_to_len(dlc);
    if buf.len() < offset + len {
        return Err(super::Error::Io);
    }
    let mut frame = CanFrame::new(id, dlc, flags, &buf[offset..offset + len])?;
    frame.filhit = Some(filhit);
    frame.timestamp = timestamp;
    Ok(frame)
}

/// Parses a TEF object, returning only the mailbox index (SEQ) it echoes.
pub fn tefobj_mailbox(buf: &[u8]) -> Result<u8, super::Error> {
    if buf.len() < 8 {
        return Err(super::Error::Io);
    }
    let ctrl_word = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    Ok(((ctrl_word >> 9) & 0x7F) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_classic_frame() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let dlc = len_to_dlc(data.len()).unwrap();
        let frame = CanFrame::new(0x123, dlc, FrameFlags::empty(), &data).unwrap();

        let mut buf = [0u8; 72];
        let used = canframe_to_txobj(&frame, 0, &mut buf);
        assert!(used <= buf.len());

        let decoded = rxobj_to_canframe(&buf[..used], false).unwrap();
        assert_eq!(decoded.id, frame.id);
        assert_eq!(decoded.dlc, frame.dlc);
        assert_eq!(decoded.flags, frame.flags);
        assert_eq!(decoded.data(), frame.data());
    }

    #[test]
    fn round_trip_extended_fd_frame() {
        let data = [0xAAu8; 32];
        let dlc = len_to_dlc(data.len()).unwrap();
        let flags = FrameFlags::IDE | FrameFlags::FDF | FrameFlags::BRS;
        let frame = CanFrame::new(0x1ABCDE, dlc, flags, &data).unwrap();

        let mut buf = [0u8; 72];
        let used = canframe_to_txobj(&frame, 3, &mut buf);
        let decoded = rxobj_to_canframe(&buf[..used], false).unwrap();
        assert_eq!(decoded.id, frame.id);
        assert_eq!(decoded.flags, frame.flags);
        assert_eq!(decoded.data(), frame.data());
    }

    #[test]
    fn mailbox_seq_round_trips_through_tef() {
        let frame = CanFrame::new(0x42, 0, FrameFlags::empty(), &[]).unwrap();
        let mut buf = [0u8; 8];
        canframe_to_txobj(&frame, 5, &mut buf);
        assert_eq!(tefobj_mailbox(&buf).unwrap(), 5);
    }

    #[test]
    fn oversized_payload_for_non_fd_is_rejected() {
        let data = [0u8; 16];
        assert!(CanFrame::new(0x1, 10, FrameFlags::empty(), &data).is_err());
    }

    #[test]
    fn scenario_1_classic_frame_0x123() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let frame = CanFrame::new(0x123, 8, FrameFlags::empty(), &data).unwrap();
        let mut buf = [0u8; 72];
        canframe_to_txobj(&frame, 0, &mut buf);
        let id_word = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        assert_eq!(id_word >> 18, 0x123);
    }
}
