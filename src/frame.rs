// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;

/// Luma sampling layout of an MCU, as carried in the low two bits of the packet flags byte.
/// The name gives the horizontal and vertical sampling factors of the Y component; both chroma
/// components are always sampled 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum McuMode {
    H2V2 = 0,
    H1V2 = 1,
    H2V1 = 2,
    H1V1 = 3,
}

impl McuMode {
    /// Maps a JPEG SOF sampling factor byte (`H << 4 | V`) to a mode.
    pub fn from_sampling(factor: u8) -> Option<McuMode> {
        match factor {
            0x22 => Some(McuMode::H2V2),
            0x12 => Some(McuMode::H1V2),
            0x21 => Some(McuMode::H2V1),
            0x11 => Some(McuMode::H1V1),
            _ => None,
        }
    }

    pub fn sampling(self) -> u8 {
        match self {
            McuMode::H2V2 => 0x22,
            McuMode::H1V2 => 0x12,
            McuMode::H2V1 => 0x21,
            McuMode::H1V1 => 0x11,
        }
    }

    /// Number of luma blocks in one MCU.
    pub fn y_parts(self) -> usize {
        match self {
            McuMode::H2V2 => 4,
            McuMode::H1V2 | McuMode::H2V1 => 2,
            McuMode::H1V1 => 1,
        }
    }

    /// MCU width and height in pixels.
    pub fn mcu_size(self) -> (u32, u32) {
        match self {
            McuMode::H2V2 => (16, 16),
            McuMode::H1V2 => (8, 16),
            McuMode::H2V1 => (16, 8),
            McuMode::H1V1 => (8, 8),
        }
    }

    pub fn mcu_count(self, width: u32, height: u32) -> u32 {
        let (w, h) = self.mcu_size();
        (width / w) * (height / h)
    }
}

/// Image layout shared by both directions of a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
    pub mode: McuMode,
    /// The source has a single component; chroma blocks are synthesized flat.
    pub greyscale: bool,
    pub mcu_count: u32,
}

impl Geometry {
    pub fn new(width: u16, height: u16, mode: McuMode, greyscale: bool) -> Geometry {
        Geometry {
            width,
            height,
            mode,
            greyscale,
            mcu_count: mode.mcu_count(width as u32, height as u32),
        }
    }

    pub fn y_parts(&self) -> usize {
        self.mode.y_parts()
    }

    /// Blocks per MCU: the luma blocks followed by one Cb and one Cr block.
    pub fn parts(&self) -> usize {
        self.y_parts() + 2
    }

    /// Component index (0 = Y, 1 = Cb, 2 = Cr) of an MCU part.
    pub fn component_of(&self, part: usize) -> usize {
        if part < self.y_parts() {
            0
        } else {
            part - self.y_parts() + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use num_traits::FromPrimitive;
    use test_log::test;

    use super::*;

    #[test]
    fn sampling_round_trip() {
        for value in 0..4u8 {
            let mode = McuMode::from_u8(value).unwrap();
            assert_eq!(McuMode::from_sampling(mode.sampling()), Some(mode));
            assert_eq!(mode as u8, value);
        }
        assert_eq!(McuMode::from_sampling(0x31), None);
    }

    #[test]
    fn counts_match_header_multipliers() {
        // Packets carry width/16 and height/16; the count is that product times 1, 2, 2, 4.
        for (mode, factor) in [
            (McuMode::H2V2, 1),
            (McuMode::H1V2, 2),
            (McuMode::H2V1, 2),
            (McuMode::H1V1, 4),
        ] {
            let g = Geometry::new(320, 240, mode, false);
            assert_eq!(g.mcu_count, 20 * 15 * factor);
        }
    }

    #[test]
    fn components_of_parts() {
        let g = Geometry::new(16, 16, McuMode::H2V2, false);
        let components: Vec<usize> = (0..g.parts()).map(|p| g.component_of(p)).collect();
        assert_eq!(components, vec![0, 0, 0, 0, 1, 2]);
    }
}
