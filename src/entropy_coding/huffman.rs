// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Canonical Huffman codes stored as JPEG DHT table bodies: one Tc/Th byte, sixteen code
//! counts (for lengths 1 to 16) and the symbols in code order.

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};

const COUNTS: std::ops::Range<usize> = 1..17;
const SYMBOLS_START: usize = 17;
const MAX_CODE_LEN: usize = 16;

/// Checks the table starting at `data[0]` and returns its total length in bytes.
pub fn table_len(data: &[u8]) -> Result<usize> {
    let counts = data.get(COUNTS).ok_or(Error::InvalidHuffman)?;
    let mut code_space = 1usize;
    let mut total = 0usize;
    for &count in counts {
        code_space <<= 1;
        if count as usize > code_space {
            return Err(Error::InvalidHuffman);
        }
        code_space -= count as usize;
        total += count as usize;
    }
    if total == 0 || total > 256 || data.len() < SYMBOLS_START + total {
        return Err(Error::InvalidHuffman);
    }
    Ok(SYMBOLS_START + total)
}

/// Reads the next code from the buffered bits of `br` without consuming them.
///
/// Returns the symbol and its code length, or `None` if more bits are needed to decide.
pub fn decode_symbol(table: &[u8], br: &BitReader) -> Result<Option<(u8, usize)>> {
    let mut code = 0u32;
    let mut index = 0usize;
    for len in 1..=MAX_CODE_LEN {
        let Some(bits) = br.peek(len) else {
            return Ok(None);
        };
        let count = table[len] as u32;
        if bits >= code && bits - code < count {
            let symbol = table
                .get(SYMBOLS_START + index + (bits - code) as usize)
                .ok_or(Error::InvalidHuffman)?;
            return Ok(Some((*symbol, len)));
        }
        index += count as usize;
        code = (code + count) << 1;
    }
    Err(Error::InvalidHuffman)
}

/// Finds the code for `symbol`, as (code, length).
pub fn encode_symbol(table: &[u8], symbol: u8) -> Option<(u16, usize)> {
    let mut code = 0u32;
    let mut index = SYMBOLS_START;
    for len in 1..=MAX_CODE_LEN {
        let count = table[len] as usize;
        let symbols = table.get(index..index + count)?;
        if let Some(pos) = symbols.iter().position(|&s| s == symbol) {
            return Some(((code + pos as u32) as u16, len));
        }
        index += count;
        code = (code + count as u32) << 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bit_writer::BitWriter;
    use crate::tables::{STD_DHT_AC_CHROMA, STD_DHT_AC_LUMA, STD_DHT_DC_CHROMA, STD_DHT_DC_LUMA};

    fn reader_for(code: u16, len: usize) -> BitReader {
        let mut bw = BitWriter::new(usize::MAX);
        bw.push_bits(code, len);
        bw.sync_to_byte();
        let mut br = BitReader::new();
        for &b in bw.bytes() {
            br.push_byte(b).unwrap();
        }
        br
    }

    #[test]
    fn standard_tables_are_valid() {
        assert_eq!(table_len(&STD_DHT_DC_LUMA).unwrap(), 29);
        assert_eq!(table_len(&STD_DHT_DC_CHROMA).unwrap(), 29);
        assert_eq!(table_len(&STD_DHT_AC_LUMA).unwrap(), 179);
        assert_eq!(table_len(&STD_DHT_AC_CHROMA).unwrap(), 179);
    }

    #[test]
    fn known_codes() {
        // DC luma: category 0 is "00", category 11 is "111111110".
        assert_eq!(encode_symbol(&STD_DHT_DC_LUMA, 0), Some((0b00, 2)));
        assert_eq!(encode_symbol(&STD_DHT_DC_LUMA, 11), Some((0b1_1111_1110, 9)));
        // AC luma: EOB is "1010", ZRL is "11111111001".
        assert_eq!(encode_symbol(&STD_DHT_AC_LUMA, 0x00), Some((0b1010, 4)));
        assert_eq!(encode_symbol(&STD_DHT_AC_LUMA, 0xF0), Some((0b111_1111_1001, 11)));
        assert_eq!(encode_symbol(&STD_DHT_DC_LUMA, 12), None);
    }

    #[test]
    fn every_symbol_decodes_back() {
        for table in [
            &STD_DHT_DC_LUMA[..],
            &STD_DHT_DC_CHROMA[..],
            &STD_DHT_AC_LUMA[..],
            &STD_DHT_AC_CHROMA[..],
        ] {
            for &symbol in &table[17..] {
                let (code, len) = encode_symbol(table, symbol).unwrap();
                let br = reader_for(code, len);
                assert_eq!(decode_symbol(table, &br).unwrap(), Some((symbol, len)));
            }
        }
    }

    #[test]
    fn needs_more_bits() {
        let mut br = BitReader::new();
        assert_eq!(decode_symbol(&STD_DHT_AC_LUMA, &br).unwrap(), None);
        // ZRL is 11 bits long; one byte of its prefix is not enough.
        br.push_byte(0xFF).unwrap();
        assert_eq!(decode_symbol(&STD_DHT_AC_LUMA, &br).unwrap(), None);
    }

    #[test]
    fn all_ones_is_not_a_code() {
        let mut br = BitReader::new();
        br.push_byte(0xFF).unwrap();
        br.push_byte(0xFF).unwrap();
        assert!(matches!(
            decode_symbol(&STD_DHT_DC_LUMA, &br),
            Err(Error::InvalidHuffman)
        ));
    }

    #[test]
    fn rejects_oversubscribed_tables() {
        let mut table = [0u8; 20];
        table[1] = 3;
        assert!(table_len(&table).is_err());
        // Truncated symbol list.
        let mut table = [0u8; 18];
        table[2] = 2;
        assert!(table_len(&table).is_err());
    }
}
