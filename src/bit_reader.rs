// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::error::{Error, Result};

/// Accumulates entropy-coded bits one byte at a time and hands them out MSB-first.
///
/// Unlike a slice-backed reader, the bytes are pushed by the caller's byte loop: scan data
/// arrives either as a JPEG stream with stuffing bytes or as packet payloads, and in both
/// cases the caller decides which bytes belong to the scan.
#[derive(Clone, Default)]
pub struct BitReader {
    bit_buf: u64,
    bits_in_buf: usize,
}

impl Debug for BitReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BitReader{{ bit_buf: {:0width$b} }}",
            self.bit_buf,
            width = self.bits_in_buf
        )
    }
}

/// Number of bits that can be buffered. Callers push a byte only after the pending bits
/// failed to decode, so at most 16 + 8 bits are ever held.
pub const MAX_BUFFERED_BITS: usize = 56;

impl BitReader {
    pub fn new() -> BitReader {
        BitReader::default()
    }

    /// Appends a byte below the bits already buffered. Fails without changing the buffer if
    /// that would exceed [`MAX_BUFFERED_BITS`].
    pub fn push_byte(&mut self, byte: u8) -> Result<()> {
        if self.bits_in_buf + 8 > MAX_BUFFERED_BITS {
            return Err(Error::BitBufferOverflow(self.bits_in_buf));
        }
        self.bit_buf = (self.bit_buf << 8) | byte as u64;
        self.bits_in_buf += 8;
        Ok(())
    }

    pub fn bits_in_buf(&self) -> usize {
        self.bits_in_buf
    }

    /// Returns the oldest `num` bits without consuming them, or `None` if fewer are buffered.
    /// ```
    /// # use ssdv::bit_reader::BitReader;
    /// let mut br = BitReader::new();
    /// br.push_byte(0b1010_0000)?;
    /// assert_eq!(br.peek(3), Some(0b101));
    /// assert_eq!(br.peek(9), None);
    /// # Ok::<(), ssdv::error::Error>(())
    /// ```
    pub fn peek(&self, num: usize) -> Option<u32> {
        debug_assert!(num <= 32);
        if num > self.bits_in_buf {
            return None;
        }
        if num == 0 {
            return Some(0);
        }
        Some((self.bit_buf >> (self.bits_in_buf - num)) as u32 & (u32::MAX >> (32 - num)))
    }

    /// Drops the oldest `num` bits. They must be buffered.
    pub fn consume(&mut self, num: usize) {
        debug_assert!(num <= self.bits_in_buf);
        self.bits_in_buf -= num;
        self.bit_buf &= (1u64 << self.bits_in_buf) - 1;
    }

    /// Discards every buffered bit. Used when the stream is realigned on a byte boundary.
    pub fn clear(&mut self) {
        self.bit_buf = 0;
        self.bits_in_buf = 0;
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn reads_msb_first_across_bytes() {
        let mut br = BitReader::new();
        br.push_byte(0xA5).unwrap();
        br.push_byte(0x3C).unwrap();
        assert_eq!(br.peek(4), Some(0xA));
        br.consume(4);
        assert_eq!(br.peek(8), Some(0x53));
        br.consume(8);
        assert_eq!(br.bits_in_buf(), 4);
        assert_eq!(br.peek(4), Some(0xC));
        assert_eq!(br.peek(5), None);
    }

    #[test]
    fn clear_drops_pending_bits() {
        let mut br = BitReader::new();
        br.push_byte(0xFF).unwrap();
        br.consume(3);
        br.clear();
        assert_eq!(br.bits_in_buf(), 0);
        br.push_byte(0x01).unwrap();
        assert_eq!(br.peek(8), Some(1));
    }

    #[test]
    fn full_buffer_rejects_bytes() {
        let mut br = BitReader::new();
        for b in 0..(MAX_BUFFERED_BITS / 8) as u8 {
            br.push_byte(b).unwrap();
        }
        assert!(matches!(
            br.push_byte(0xAA),
            Err(Error::BitBufferOverflow(MAX_BUFFERED_BITS))
        ));
        assert_eq!(br.bits_in_buf(), MAX_BUFFERED_BITS);
        assert_eq!(br.peek(8), Some(0));
        br.consume(8);
        br.push_byte(0xAA).unwrap();
        br.consume(MAX_BUFFERED_BITS - 8);
        assert_eq!(br.peek(8), Some(0xAA));
    }
}
