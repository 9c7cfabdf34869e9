// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Largest DC difference category the standard tables can code.
pub const MAX_DC_CATEGORY: u8 = 11;
/// Largest AC category the standard tables can code.
pub const MAX_AC_CATEGORY: u8 = 10;

pub const MAX_DC_MAGNITUDE: i32 = (1 << MAX_DC_CATEGORY) - 1;
pub const MAX_AC_MAGNITUDE: i32 = (1 << MAX_AC_CATEGORY) - 1;

/// Integer division rounding half away from zero.
/// ```
/// # use ssdv::entropy_coding::coefficients::round_div;
/// assert_eq!(round_div(7, 2), 4);
/// assert_eq!(round_div(-7, 2), -4);
/// assert_eq!(round_div(5, 3), 2);
/// ```
pub fn round_div(value: i32, divisor: i32) -> i32 {
    let mut i = value as i64 * 2 / divisor as i64;
    if i & 1 != 0 {
        i += i.signum();
    }
    (i / 2) as i32
}

/// Extends the `size` magnitude bits that follow a Huffman symbol into a signed value.
pub fn decode_magnitude(bits: u32, size: usize) -> i32 {
    if size == 0 {
        return 0;
    }
    let mask = (1i32 << size) - 1;
    let bits = bits as i32 & mask;
    if bits <= mask >> 1 {
        -(bits ^ mask)
    } else {
        bits
    }
}

/// Splits a value into its magnitude category and the bits written after the symbol.
pub fn encode_magnitude(value: i32) -> (u16, u8) {
    let size = (32 - value.unsigned_abs().leading_zeros()) as u8;
    let bits = if value < 0 {
        (-value) ^ ((1 << size) - 1)
    } else {
        value
    };
    (bits as u16, size)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_div(0, 5), 0);
        assert_eq!(round_div(4, 8), 1);
        assert_eq!(round_div(3, 8), 0);
        assert_eq!(round_div(-4, 8), -1);
        assert_eq!(round_div(-3, 8), 0);
        assert_eq!(round_div(100, 1), 100);
        assert_eq!(round_div(i32::MAX, 1), i32::MAX);
    }

    #[test]
    fn categories() {
        assert_eq!(encode_magnitude(0), (0, 0));
        assert_eq!(encode_magnitude(1), (1, 1));
        assert_eq!(encode_magnitude(-1), (0, 1));
        assert_eq!(encode_magnitude(-3), (0, 2));
        assert_eq!(encode_magnitude(5), (5, 3));
        assert_eq!(encode_magnitude(MAX_AC_MAGNITUDE), (1023, 10));
        assert_eq!(encode_magnitude(-MAX_DC_MAGNITUDE), (0, 11));
    }

    #[test]
    fn magnitudes_round_trip() {
        for value in -MAX_DC_MAGNITUDE..=MAX_DC_MAGNITUDE {
            let (bits, size) = encode_magnitude(value);
            assert_eq!(decode_magnitude(bits as u32, size as usize), value);
        }
    }
}
