// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Outcome of a write. `BufferFull` is not an error: the bytes are kept and the caller is
/// expected to hand out the current buffer before more data is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    BufferFull,
}

/// Writes bits MSB-first into a byte buffer, optionally inserting a 0x00 after every 0xFF
/// as JPEG entropy-coded segments require.
#[derive(Debug)]
pub struct BitWriter {
    bytes: Vec<u8>,
    limit: usize,
    bit_buf: u32,
    bits_in_buf: usize,
    stuffing: bool,
}

impl BitWriter {
    /// Creates a writer that reports `BufferFull` once `limit` bytes are pending.
    pub fn new(limit: usize) -> BitWriter {
        BitWriter {
            bytes: Vec::with_capacity(limit.min(1 << 16)),
            limit,
            bit_buf: 0,
            bits_in_buf: 0,
            stuffing: false,
        }
    }

    pub fn set_stuffing(&mut self, stuffing: bool) {
        self.stuffing = stuffing;
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Replaces the byte storage, keeping the bytes written so far.
    pub fn set_storage(&mut self, mut storage: Vec<u8>) {
        storage.clear();
        storage.extend_from_slice(&self.bytes);
        self.bytes = storage;
    }

    /// Appends the low `width` bits of `value`, most significant first.
    /// ```
    /// # use ssdv::bit_writer::BitWriter;
    /// let mut bw = BitWriter::new(16);
    /// bw.push_bits(0b101, 3);
    /// bw.push_bits(0b00001, 5);
    /// assert_eq!(bw.bytes(), &[0b1010_0001]);
    /// ```
    pub fn push_bits(&mut self, value: u16, width: usize) -> WriteStatus {
        debug_assert!(width <= 16);
        if width > 0 {
            self.bit_buf = (self.bit_buf << width) | (value as u32 & ((1 << width) - 1));
            self.bits_in_buf += width;
        }
        while self.bits_in_buf >= 8 {
            self.bits_in_buf -= 8;
            let byte = (self.bit_buf >> self.bits_in_buf) as u8;
            self.bit_buf &= (1 << self.bits_in_buf) - 1;
            self.bytes.push(byte);
            if self.stuffing && byte == 0xFF {
                self.bytes.push(0x00);
            }
        }
        self.status()
    }

    /// Pads with 1 bits up to the next byte boundary.
    pub fn sync_to_byte(&mut self) -> WriteStatus {
        match self.bits_in_buf % 8 {
            0 => self.status(),
            used => self.push_bits(0xFF, 8 - used),
        }
    }

    /// Writes whole bytes, going through the stuffing logic.
    pub fn push_bytes(&mut self, data: &[u8]) -> WriteStatus {
        for &b in data {
            self.push_bits(b as u16, 8);
        }
        self.status()
    }

    pub fn status(&self) -> WriteStatus {
        if self.bytes.len() >= self.limit {
            WriteStatus::BufferFull
        } else {
            WriteStatus::Written
        }
    }

    pub fn is_full(&self) -> bool {
        self.status() == WriteStatus::BufferFull
    }

    /// Complete bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes written so far, counting a partial byte as a whole one.
    pub fn len_with_pending(&self) -> usize {
        self.bytes.len() + self.bits_in_buf.div_ceil(8)
    }

    /// Moves up to `dst.len()` leading bytes into `dst`, returning how many were moved.
    pub fn take_front(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.bytes.len());
        dst[..n].copy_from_slice(&self.bytes[..n]);
        self.bytes.drain(..n);
        n
    }
}
