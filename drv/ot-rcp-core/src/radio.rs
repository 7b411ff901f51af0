// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 802.15.4 radio frame shape and capability set exchanged with the RCP.

pub const MAX_PSDU: usize = 127;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RadioFrame {
    pub data: [u8; MAX_PSDU],
    pub length: u8,
    pub channel: u8,
    pub rssi: i8,
    pub lqi: u8,
    pub csma_ca: bool,
    pub header_updated: bool,
    pub is_retx: bool,
    pub security_processed: bool,
    pub time_base: u64,
    pub time_offset: u32,
    pub frame_pending: bool,
}

impl RadioFrame {
    pub fn psdu(&self) -> &[u8] {
        &self.data[..self.length as usize]
    }
}

/// Encodes a frame for transmission as this driver's `STREAM_RAW` payload:
/// channel, PSDU length, then the PSDU itself. RSSI/LQI are receive-only and
/// carried the other direction by [`decode_rx`].
pub fn encode_tx(frame: &RadioFrame, out: &mut [u8]) -> Option<usize> {
    let len = frame.length as usize;
    if out.len() < 2 + len {
        return None;
    }
    out[0] = frame.channel;
    out[1] = frame.length;
    out[2..2 + len].copy_from_slice(frame.psdu());
    Some(2 + len)
}

/// Decodes a `STREAM_RAW` payload received from the RCP: channel, PSDU
/// length, PSDU, then trailing `rssi:i8, lqi:u8` appended by the co-processor.
pub fn decode_rx(data: &[u8]) -> Option<RadioFrame> {
    if data.len() < 2 {
        return None;
    }
    let channel = data[0];
    let len = data[1] as usize;
    if len > MAX_PSDU || data.len() < 2 + len + 2 {
        return None;
    }
    let mut payload = [0u8; MAX_PSDU];
    payload[..len].copy_from_slice(&data[2..2 + len]);
    let rssi = data[2 + len] as i8;
    let lqi = data[2 + len + 1];
    Some(RadioFrame {
        data: payload,
        length: len as u8,
        channel,
        rssi,
        lqi,
        csma_ca: false,
        header_updated: false,
        is_retx: false,
        security_processed: false,
        time_base: 0,
        time_offset: 0,
        frame_pending: false,
    })
}

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Capabilities: u32 {
        const ENERGY_SCAN      = 1 << 0;
        const CSMA             = 1 << 1;
        const ACK_TIMEOUT      = 1 << 2;
        const SLEEP_TO_TX      = 1 << 3;
        const TX_SEC           = 1 << 4;
        const TXTIME           = 1 << 5;
        const RXTIME           = 1 << 6;
        const RX_ON_WHEN_IDLE  = 1 << 7;
        const RETRANSMISSION   = 1 << 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psdu_is_bounded_by_length() {
        let mut frame = RadioFrame {
            data: [0u8; MAX_PSDU],
            length: 3,
            channel: 11,
            rssi: -40,
            lqi: 200,
            csma_ca: true,
            header_updated: false,
            is_retx: false,
            security_processed: false,
            time_base: 0,
            time_offset: 0,
            frame_pending: false,
        };
        frame.data[0..3].copy_from_slice(&[1, 2, 3]);
        assert_eq!(frame.psdu(), &[1, 2, 3]);
    }

    #[test]
    fn capability_set_round_trips_through_bits() {
        let caps = Capabilities::CSMA | Capabilities::ACK_TIMEOUT;
        assert!(caps.contains(Capabilities::CSMA));
        assert!(!caps.contains(Capabilities::ENERGY_SCAN));
    }

    #[test]
    fn stream_raw_rx_round_trips_with_link_quality() {
        let mut wire = [0u8; 16];
        wire[0] = 11; // channel
        wire[1] = 3; // PSDU length
        wire[2..5].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
        wire[5] = (-62i8) as u8; // rssi
        wire[6] = 200; // lqi

        let frame = decode_rx(&wire[..7]).unwrap();
        assert_eq!(frame.psdu(), &[0xAA, 0xBB, 0xCC]);
        assert_eq!(frame.channel, 11);
        assert_eq!(frame.rssi, -62);
        assert_eq!(frame.lqi, 200);
    }

    #[test]
    fn encode_tx_then_decode_rx_preserves_psdu() {
        let mut frame = RadioFrame {
            data: [0u8; MAX_PSDU],
            length: 4,
            channel: 15,
            rssi: 0,
            lqi: 0,
            csma_ca: true,
            header_updated: false,
            is_retx: false,
            security_processed: false,
            time_base: 0,
            time_offset: 0,
            frame_pending: false,
        };
        frame.data[0..4].copy_from_slice(&[1, 2, 3, 4]);

        let mut out = [0u8; 8];
        let n = encode_tx(&frame, &mut out).unwrap();

        let mut rx_wire = [0u8; 10];
        rx_wire[..n].copy_from_slice(&out[..n]);
        rx_wire[n] = 0; // rssi
        rx_wire[n + 1] = 0; // lqi
        let decoded = decode_rx(&rx_wire[..n + 2]).unwrap();
        assert_eq!(decoded.psdu(), frame.psdu());
        assert_eq!(decoded.channel, frame.channel);
    }
}
