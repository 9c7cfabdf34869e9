// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Canonical JPEG tables and the bounded per-session table store.

use crate::error::{Error, Result};

/// Largest supported image dimension in pixels (255 * 16).
pub const MAX_DIMENSION: u16 = 4080;

/// Two DQT segments plus the four standard DHT segments.
pub const DEST_TABLE_CAPACITY: usize = 2 * 65 + 2 * 29 + 2 * 179;
/// Source images may carry slightly larger tables than the standard ones.
pub const SOURCE_TABLE_CAPACITY: usize = DEST_TABLE_CAPACITY + 16;

/// JFIF APP0 body: version 1.1, 72x72 dpi, no thumbnail.
pub const JFIF_APP0: [u8; 14] = [
    0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01, 0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
];

/// SOS body for an interleaved Y'CbCr baseline scan using tables 0 (Y) and 1 (Cb, Cr).
pub const SCAN_HEADER: [u8; 10] = [0x03, 0x01, 0x00, 0x02, 0x11, 0x03, 0x11, 0x00, 0x3F, 0x00];

/// Quantisation scale per quality level, in percent.
pub const DQT_SCALES: [u16; 8] = [5000, 357, 172, 116, 100, 58, 28, 0];

// DQT segment bodies in zigzag order, prefixed by Pq/Tq.
pub const STD_DQT_LUMA: [u8; 65] = [
    0x00, 0x10, 0x0C, 0x0C, 0x0E, 0x0C, 0x0A, 0x10, 0x0E, 0x0E, 0x0E, 0x12, 0x12, 0x10, 0x14, 0x18,
    0x28, 0x1A, 0x18, 0x16, 0x16, 0x18, 0x32, 0x24, 0x26, 0x1E, 0x28, 0x3A, 0x34, 0x3E, 0x3C, 0x3A,
    0x34, 0x38, 0x38, 0x40, 0x48, 0x5C, 0x4E, 0x40, 0x44, 0x58, 0x46, 0x38, 0x38, 0x50, 0x6E, 0x52,
    0x58, 0x60, 0x62, 0x68, 0x68, 0x68, 0x3E, 0x4E, 0x72, 0x7A, 0x70, 0x64, 0x78, 0x5C, 0x66, 0x68,
    0x64,
];

pub const STD_DQT_CHROMA: [u8; 65] = [
    0x01, 0x12, 0x12, 0x12, 0x16, 0x16, 0x16, 0x30, 0x1A, 0x1A, 0x30, 0x64, 0x42, 0x38, 0x42, 0x64,
    0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64,
    0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64,
    0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64, 0x64,
    0x64,
];

// DHT segment bodies prefixed by Tc/Th, followed by the 16 code length counts and the symbols.
pub const STD_DHT_DC_LUMA: [u8; 29] = [
    0x00, 0x00, 0x01, 0x05, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
];

pub const STD_DHT_DC_CHROMA: [u8; 29] = [
    0x01, 0x00, 0x03, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
];

pub const STD_DHT_AC_LUMA: [u8; 179] = [
    0x10, 0x00, 0x02, 0x01, 0x03, 0x03, 0x02, 0x04, 0x03, 0x05, 0x05, 0x04, 0x04, 0x00, 0x00, 0x01,
    0x7D, 0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
    0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, 0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52, 0xD1,
    0xF0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27,
    0x28, 0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88,
    0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6,
    0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4,
    0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1,
    0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
    0xF8, 0xF9, 0xFA,
];

pub const STD_DHT_AC_CHROMA: [u8; 179] = [
    0x11, 0x00, 0x02, 0x01, 0x02, 0x04, 0x04, 0x03, 0x04, 0x07, 0x05, 0x04, 0x04, 0x00, 0x01, 0x02,
    0x77, 0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61,
    0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xA1, 0xB1, 0xC1, 0x09, 0x23, 0x33, 0x52,
    0xF0, 0x15, 0x62, 0x72, 0xD1, 0x0A, 0x16, 0x24, 0x34, 0xE1, 0x25, 0xF1, 0x17, 0x18, 0x19, 0x1A,
    0x26, 0x27, 0x28, 0x29, 0x2A, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47,
    0x48, 0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67,
    0x68, 0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x82, 0x83, 0x84, 0x85, 0x86,
    0x87, 0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4,
    0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2,
    0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9,
    0xDA, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
    0xF8, 0xF9, 0xFA,
];

/// Quality level 0 (coarsest) to 7 (quantisation step 1 everywhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 7;

    /// Clamps any level into 0..=7.
    pub fn new(level: i32) -> Quality {
        Quality(level.clamp(0, Self::MAX as i32) as u8)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn scale_factor(self) -> u16 {
        DQT_SCALES[self.0 as usize]
    }

    /// Position of the level inside the packet flags byte. The field is biased so that the
    /// default level 4 encodes as zero.
    pub fn to_flags(self) -> u8 {
        (self.0.wrapping_sub(4) & 7) << 3
    }

    pub fn from_flags(flags: u8) -> Quality {
        Quality(((flags >> 3) & 7) ^ 4)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality(4)
    }
}

/// Scales a base DQT body (Pq/Tq byte followed by 64 values) to a quality level.
pub fn scale_dqt(base: &[u8; 65], quality: Quality) -> [u8; 65] {
    let scale = quality.scale_factor() as u32;
    let mut table = [0u8; 65];
    table[0] = base[0];
    for (dst, &value) in table[1..].iter_mut().zip(base[1..].iter()) {
        *dst = ((value as u32 * scale + 50) / 100).clamp(1, 255) as u8;
    }
    table
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableClass {
    Dc = 0,
    Ac = 1,
}

impl TableClass {
    pub fn for_coefficient(k: usize) -> TableClass {
        if k == 0 {
            TableClass::Dc
        } else {
            TableClass::Ac
        }
    }
}

/// Components sharing a set of tables: Y on its own, Cb and Cr together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentGroup {
    Luma = 0,
    Chroma = 1,
}

impl ComponentGroup {
    pub fn for_component(component: usize) -> ComponentGroup {
        if component == 0 {
            ComponentGroup::Luma
        } else {
            ComponentGroup::Chroma
        }
    }
}

/// Location of a table inside a [`TableArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRef {
    offset: u16,
    len: u16,
}

/// Fixed capacity byte store for table segments. It never grows past its capacity: a table
/// that does not fit is an error, since the wire format bounds the legal table set.
#[derive(Debug, Clone)]
pub struct TableArena {
    data: Vec<u8>,
    capacity: usize,
}

impl TableArena {
    pub fn with_capacity(capacity: usize) -> TableArena {
        TableArena {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<TableRef> {
        let needed = self.data.len() + bytes.len();
        if needed > self.capacity {
            return Err(Error::TableOverflow(needed, self.capacity));
        }
        let table = TableRef {
            offset: self.data.len() as u16,
            len: bytes.len() as u16,
        };
        self.data.extend_from_slice(bytes);
        Ok(table)
    }

    pub fn get(&self, table: TableRef) -> &[u8] {
        let start = table.offset as usize;
        &self.data[start..start + table.len as usize]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The Huffman and quantisation tables of one side of a transcode.
///
/// Tables are stored by JPEG table id (0..=3); the frame and scan headers then select which
/// id each component group uses. DHT entries keep their Tc/Th byte and DQT entries their
/// Pq/Tq byte so they can be written back out as segments unchanged.
#[derive(Debug, Clone)]
pub struct TableSet {
    arena: TableArena,
    dht: [[Option<TableRef>; 4]; 2],
    dqt: [Option<TableRef>; 4],
    dht_select: [[usize; 2]; 2],
    dqt_select: [usize; 2],
}

impl TableSet {
    pub fn new(capacity: usize) -> TableSet {
        TableSet {
            arena: TableArena::with_capacity(capacity),
            dht: [[None; 4]; 2],
            dqt: [None; 4],
            dht_select: [[0, 1], [0, 1]],
            dqt_select: [0, 1],
        }
    }

    /// The standard Huffman tables and the standard quantisation tables scaled to `quality`.
    pub fn standard(quality: Quality) -> Result<TableSet> {
        let mut set = TableSet::new(DEST_TABLE_CAPACITY);
        set.define_dqt(&scale_dqt(&STD_DQT_LUMA, quality))?;
        set.define_dqt(&scale_dqt(&STD_DQT_CHROMA, quality))?;
        for table in [
            &STD_DHT_DC_LUMA[..],
            &STD_DHT_DC_CHROMA[..],
            &STD_DHT_AC_LUMA[..],
            &STD_DHT_AC_CHROMA[..],
        ] {
            set.define_dht(table)?;
        }
        Ok(set)
    }

    /// Stores a DHT table (Tc/Th byte, counts, symbols). The caller has validated its layout.
    pub fn define_dht(&mut self, table: &[u8]) -> Result<()> {
        let class = (table[0] >> 4) as usize;
        let id = (table[0] & 0x0F) as usize;
        if class > 1 || id > 3 {
            return Err(Error::InvalidTableId(table[0]));
        }
        self.dht[class][id] = Some(self.arena.push(table)?);
        Ok(())
    }

    /// Stores a 65 byte DQT table (Pq/Tq byte and 64 values).
    pub fn define_dqt(&mut self, table: &[u8]) -> Result<()> {
        let id = table[0] as usize;
        if id > 3 {
            return Err(Error::InvalidTableId(table[0]));
        }
        self.dqt[id] = Some(self.arena.push(table)?);
        Ok(())
    }

    pub fn select_dht(&mut self, class: TableClass, group: ComponentGroup, id: usize) {
        self.dht_select[class as usize][group as usize] = id;
    }

    pub fn select_dqt(&mut self, group: ComponentGroup, id: usize) {
        self.dqt_select[group as usize] = id;
    }

    pub fn dht(&self, class: TableClass, group: ComponentGroup) -> Option<&[u8]> {
        let id = self.dht_select[class as usize][group as usize];
        self.dht[class as usize]
            .get(id)
            .copied()
            .flatten()
            .map(|table| self.arena.get(table))
    }

    /// The full DQT entry for a group, including its Pq/Tq byte.
    pub fn dqt(&self, group: ComponentGroup) -> Option<&[u8]> {
        let id = self.dqt_select[group as usize];
        self.dqt
            .get(id)
            .copied()
            .flatten()
            .map(|table| self.arena.get(table))
    }

    /// Quantisation step for coefficient `k` (zigzag order) of a group.
    pub fn quant(&self, group: ComponentGroup, k: usize) -> Result<i32> {
        self.dqt(group)
            .and_then(|table| table.get(1 + k))
            .map(|&q| q as i32)
            .ok_or(Error::MissingQuantTable)
    }
}
