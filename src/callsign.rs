// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Packing of amateur radio callsigns into 32 bits.
//!
//! A callsign is written as base-40 digits with the last character in the most significant
//! position. Trailing spaces therefore pack to leading zero digits and are not preserved.

use crate::error::{Error, Result};

pub const MAX_CALLSIGN_LEN: usize = 6;

/// Largest valid packed value, `40^6 - 1`. Anything above is reserved.
pub const MAX_PACKED_CALLSIGN: u32 = 0xF423_FFFF;

const BASE: u32 = 40;

fn char_to_digit(c: char) -> Option<u32> {
    match c {
        ' ' => Some(0),
        '0'..='9' => Some(c as u32 - '0' as u32 + 1),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 14),
        'a'..='z' => Some(c as u32 - 'a' as u32 + 14),
        _ => None,
    }
}

fn digit_to_char(digit: u32) -> char {
    match digit {
        0 => ' ',
        1..=10 => (b'0' + (digit - 1) as u8) as char,
        11..=13 => '-',
        _ => (b'A' + (digit - 14) as u8) as char,
    }
}

/// Packs `callsign` into its 32-bit form.
/// ```
/// # use ssdv::callsign;
/// let packed = callsign::encode("M0ABC").unwrap();
/// assert_eq!(callsign::decode(packed), "M0ABC");
/// ```
pub fn encode(callsign: &str) -> Result<u32> {
    if callsign.chars().count() > MAX_CALLSIGN_LEN {
        return Err(Error::InvalidCallsign(callsign.to_string()));
    }
    callsign.chars().rev().try_fold(0u32, |acc, c| {
        let digit = char_to_digit(c).ok_or_else(|| Error::InvalidCallsign(callsign.to_string()))?;
        Ok(acc * BASE + digit)
    })
}

/// Unpacks a 32-bit callsign. Reserved values decode to an empty string.
pub fn decode(mut code: u32) -> String {
    let mut callsign = String::with_capacity(MAX_CALLSIGN_LEN);
    if code > MAX_PACKED_CALLSIGN {
        return callsign;
    }
    while code != 0 {
        callsign.push(digit_to_char(code % BASE));
        code /= BASE;
    }
    callsign
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn known_values() {
        assert_eq!(encode("").unwrap(), 0);
        assert_eq!(encode("A").unwrap(), 14);
        assert_eq!(encode("0A").unwrap(), 1 + 14 * 40);
        assert_eq!(encode("ZZZZZZ").unwrap(), MAX_PACKED_CALLSIGN);
        assert_eq!(decode(MAX_PACKED_CALLSIGN), "ZZZZZZ");
    }

    #[test]
    fn lower_case_is_normalized() {
        assert_eq!(encode("m0abc").unwrap(), encode("M0ABC").unwrap());
        assert_eq!(decode(encode("m0abc").unwrap()), "M0ABC");
    }

    #[test]
    fn reserved_values_decode_empty() {
        assert_eq!(decode(MAX_PACKED_CALLSIGN + 1), "");
        assert_eq!(decode(u32::MAX), "");
    }

    #[test]
    fn reserved_digits_decode_as_dash() {
        assert_eq!(decode(11 + 40 * 14), "-A");
    }

    #[test]
    fn rejects_invalid() {
        assert_eq!(
            encode("TOOLONG").unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
        assert_eq!(encode("AB-1").unwrap_err().kind(), ErrorKind::InvalidConfig);
        assert_eq!(encode("ÄB").unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn round_trip() {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";
        arbtest::arbtest(|u| {
            let len = u.int_in_range(0..=MAX_CALLSIGN_LEN)?;
            let mut s = String::new();
            for _ in 0..len {
                s.push(*u.choose(ALPHABET)? as char);
            }
            let packed = encode(&s).unwrap();
            assert!(packed <= MAX_PACKED_CALLSIGN);
            assert_eq!(decode(packed), s.to_ascii_uppercase().trim_end_matches(' '));
            Ok(())
        });
    }
}
