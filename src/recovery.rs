// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Packet sequencing for the decoder.
//!
//! Packets are consumed strictly in order of their packet id. When ids are skipped the decoder
//! can only pick the stream up again at an MCU boundary that a packet declares in its header;
//! everything between the last decoded MCU and that boundary is filled with flat MCUs by the
//! coefficient engine.

use crate::packet::{PacketInfo, PacketLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    /// Already seen, or no way to resynchronise on it.
    Drop,
    /// The packet that was expected next.
    InOrder,
    /// Packets were lost. Decoding resumes with MCU `mcu_id`, which starts `offset` bytes into
    /// the payload.
    Resync { mcu_id: u16, offset: u8 },
}

/// Decides what to do with a packet given the id of the packet expected next.
pub fn sequence(expected_id: u16, info: &PacketInfo) -> Sequence {
    if info.packet_id < expected_id {
        return Sequence::Drop;
    }
    if info.packet_id == expected_id {
        return Sequence::InOrder;
    }
    match (info.mcu_id, info.mcu_offset) {
        (Some(mcu_id), Some(offset)) => Sequence::Resync { mcu_id, offset },
        _ => Sequence::Drop,
    }
}

/// Whether a packet belongs to the image described by `first`, the first packet accepted.
pub fn same_image(first: &PacketInfo, layout: &PacketLayout, info: &PacketInfo) -> bool {
    info.image_id == first.image_id
        && info.packet_type == layout.packet_type
        && info.width == first.width
        && info.height == first.height
        && info.mcu_mode == first.mcu_mode
        && info.quality == first.quality
}
