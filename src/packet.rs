// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Packet framing: the 15 byte header, CRC-32 trailer and Reed-Solomon parity.
//!
//! ```text
//!  0      sync (0x55)
//!  1      0x66 + packet type
//!  2..6   callsign (base-40, big endian)
//!  6      image id
//!  7..9   packet id
//!  9      width / 16
//!  10     height / 16
//!  11     quality << 3 | eoi << 2 | MCU mode
//!  12     offset of the first MCU starting in the payload (0xFF: none)
//!  13..15 id of that MCU (0xFFFF: none)
//!  15..   payload, CRC-32 of bytes 1..payload end, [32 parity bytes]
//! ```

use byteorder::{BigEndian, ByteOrder};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    callsign,
    error::{Error, Result},
    frame::McuMode,
    reed_solomon,
    tables::Quality,
};

pub const SYNC_BYTE: u8 = 0x55;
pub const TYPE_BASE: u8 = 0x66;
pub const HEADER_SIZE: usize = 15;
pub const CRC_SIZE: usize = 4;
pub const PARITY_SIZE: usize = reed_solomon::NROOTS;
pub const MAX_PACKET_SIZE: usize = 256;
pub const MIN_PAYLOAD_SIZE: usize = 2;

const NO_MCU_OFFSET: u8 = 0xFF;
const NO_MCU_ID: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum PacketType {
    /// CRC and Reed-Solomon parity.
    Normal = 0,
    /// CRC only, leaving more room for payload.
    NoFec = 1,
}

impl PacketType {
    fn overhead(self) -> usize {
        match self {
            PacketType::Normal => HEADER_SIZE + CRC_SIZE + PARITY_SIZE,
            PacketType::NoFec => HEADER_SIZE + CRC_SIZE,
        }
    }
}

/// Where things live inside a packet of a given type and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketLayout {
    pub packet_type: PacketType,
    pub packet_size: usize,
    pub payload_len: usize,
    /// Bytes covered by the CRC, starting after the sync byte.
    pub crc_data_len: usize,
}

impl PacketLayout {
    pub fn new(packet_type: PacketType, packet_size: usize) -> Result<PacketLayout> {
        if packet_size > MAX_PACKET_SIZE || packet_size < packet_type.overhead() + MIN_PAYLOAD_SIZE
        {
            return Err(Error::InvalidPacketSize(packet_size));
        }
        let payload_len = packet_size - packet_type.overhead();
        Ok(PacketLayout {
            packet_type,
            packet_size,
            payload_len,
            crc_data_len: HEADER_SIZE + payload_len - 1,
        })
    }

    pub fn payload_range(&self) -> std::ops::Range<usize> {
        HEADER_SIZE..HEADER_SIZE + self.payload_len
    }

    fn crc_offset(&self) -> usize {
        1 + self.crc_data_len
    }

    fn crc_matches(&self, packet: &[u8]) -> bool {
        let offset = self.crc_offset();
        crc32fast::hash(&packet[1..offset]) == BigEndian::read_u32(&packet[offset..offset + 4])
    }

    /// Fills in the CRC, and the parity for [`PacketType::Normal`] packets, of a packet whose
    /// header and payload are already in place.
    pub fn seal(&self, packet: &mut [u8]) {
        let offset = self.crc_offset();
        let crc = crc32fast::hash(&packet[1..offset]);
        BigEndian::write_u32(&mut packet[offset..offset + 4], crc);
        if self.packet_type == PacketType::Normal {
            let data_end = self.packet_size - PARITY_SIZE;
            let parity = reed_solomon::encode(&packet[1..data_end]);
            packet[data_end..self.packet_size].copy_from_slice(&parity);
        }
    }
}

/// Fills unused payload with a fixed pseudo-random sequence.
pub fn whiten(buf: &mut [u8]) {
    let mut l: u8 = 0;
    for b in buf {
        l = l.wrapping_mul(245).wrapping_add(45);
        *b = l;
    }
}

/// Decoded packet header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketInfo {
    pub packet_type: PacketType,
    pub callsign: u32,
    pub image_id: u8,
    pub packet_id: u16,
    pub width: u16,
    pub height: u16,
    pub eoi: bool,
    pub quality: Quality,
    pub mcu_mode: McuMode,
    /// Payload offset of the first MCU that starts in this packet.
    pub mcu_offset: Option<u8>,
    pub mcu_id: Option<u16>,
}

impl PacketInfo {
    pub fn callsign_text(&self) -> String {
        callsign::decode(self.callsign)
    }

    pub fn mcu_count(&self) -> u32 {
        self.mcu_mode.mcu_count(self.width as u32, self.height as u32)
    }

    /// Writes the 15 header bytes.
    pub fn write(&self, out: &mut [u8]) {
        out[0] = SYNC_BYTE;
        out[1] = TYPE_BASE + self.packet_type as u8;
        BigEndian::write_u32(&mut out[2..6], self.callsign);
        out[6] = self.image_id;
        BigEndian::write_u16(&mut out[7..9], self.packet_id);
        out[9] = (self.width >> 4) as u8;
        out[10] = (self.height >> 4) as u8;
        out[11] = self.quality.to_flags() | (self.eoi as u8) << 2 | self.mcu_mode as u8;
        out[12] = self.mcu_offset.unwrap_or(NO_MCU_OFFSET);
        BigEndian::write_u16(&mut out[13..15], self.mcu_id.unwrap_or(NO_MCU_ID));
    }
}

/// Parses the header of a packet. The packet must have been validated first for the fields to
/// be trustworthy.
pub fn decode_header(packet: &[u8]) -> Result<PacketInfo> {
    if packet.len() < HEADER_SIZE {
        return Err(Error::PacketTooShort(packet.len(), HEADER_SIZE));
    }
    let packet_type = PacketType::from_u8(packet[1].wrapping_sub(TYPE_BASE))
        .ok_or(Error::UnknownPacketType(packet[1]))?;
    let flags = packet[11];
    let mcu_mode = McuMode::from_u8(flags & 0x03).ok_or(Error::UnknownPacketType(packet[1]))?;
    let mcu_offset = match packet[12] {
        NO_MCU_OFFSET => None,
        offset => Some(offset),
    };
    let mcu_id = match BigEndian::read_u16(&packet[13..15]) {
        NO_MCU_ID => None,
        id => Some(id),
    };
    Ok(PacketInfo {
        packet_type,
        callsign: BigEndian::read_u32(&packet[2..6]),
        image_id: packet[6],
        packet_id: BigEndian::read_u16(&packet[7..9]),
        width: (packet[9] as u16) << 4,
        height: (packet[10] as u16) << 4,
        eoi: (flags >> 2) & 1 != 0,
        quality: Quality::from_flags(flags),
        mcu_mode,
        mcu_offset,
        mcu_id,
    })
}

/// Checks a received packet and repairs it with the parity if needed.
///
/// The CRC is tried first for the type the packet claims. If that fails the packet is decoded
/// as a [`PacketType::Normal`] packet, since a damaged type byte can make a FEC packet look
/// like something else. The header is then sanity checked. On success the repaired packet
/// (with a clean sync byte) is written back and the number of corrected bytes is returned;
/// otherwise `packet` is left as it was.
pub fn validate_packet(packet: &mut [u8], packet_size: usize) -> Result<usize> {
    if packet_size > MAX_PACKET_SIZE || packet_size < PacketType::NoFec.overhead() + MIN_PAYLOAD_SIZE
    {
        return Err(Error::InvalidPacketSize(packet_size));
    }
    if packet.len() < packet_size {
        return Err(Error::PacketTooShort(packet.len(), packet_size));
    }

    let mut copy = [0u8; MAX_PACKET_SIZE];
    let pkt = &mut copy[..packet_size];
    pkt.copy_from_slice(&packet[..packet_size]);
    pkt[0] = SYNC_BYTE;

    let claimed = PacketType::from_u8(pkt[1].wrapping_sub(TYPE_BASE))
        .and_then(|packet_type| PacketLayout::new(packet_type, packet_size).ok())
        .filter(|layout| layout.crc_matches(pkt));

    let (layout, errors) = match claimed {
        Some(layout) => (layout, 0),
        None => {
            let layout = PacketLayout::new(PacketType::Normal, packet_size)
                .map_err(|_| Error::Uncorrectable)?;
            pkt[1] = TYPE_BASE + PacketType::Normal as u8;
            let errors = reed_solomon::decode(&mut pkt[1..])?;
            if !layout.crc_matches(pkt) {
                return Err(Error::Uncorrectable);
            }
            (layout, errors)
        }
    };

    let info = decode_header(pkt).map_err(|_| Error::Uncorrectable)?;
    if info.packet_type != layout.packet_type || info.width == 0 || info.height == 0 {
        return Err(Error::Uncorrectable);
    }
    if let Some(mcu_id) = info.mcu_id {
        let offset_ok = info
            .mcu_offset
            .is_some_and(|offset| (offset as usize) < layout.payload_len);
        if mcu_id as u32 >= info.mcu_count() || !offset_ok {
            return Err(Error::Uncorrectable);
        }
    }

    packet[..packet_size].copy_from_slice(pkt);
    Ok(errors)
}
