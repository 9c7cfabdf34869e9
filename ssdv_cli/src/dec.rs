// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use color_eyre::eyre::{Result, WrapErr, eyre};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use ssdv::{DecodeStatus, Decoder, validate_packet};

/// Finds valid packets in a received byte stream.
///
/// Packets are expected back to back. When the bytes at the current position do not form a
/// valid packet, even after FEC, the scanner moves on by one byte and tries again, so noise or
/// truncated packets in the capture only cost the packets they overlap.
pub struct PacketScanner<'a> {
    data: &'a [u8],
    packet_size: usize,
    pos: usize,
    skipped: usize,
}

impl<'a> PacketScanner<'a> {
    pub fn new(data: &'a [u8], packet_size: usize) -> Result<PacketScanner<'a>> {
        // Reject sizes the library rejects before scanning anything.
        Decoder::new(packet_size).wrap_err("Invalid packet length")?;
        Ok(PacketScanner {
            data,
            packet_size,
            pos: 0,
            skipped: 0,
        })
    }

    /// The next repaired packet and the number of bytes FEC corrected in it.
    pub fn next_packet(&mut self) -> Option<(Vec<u8>, usize)> {
        while self.pos + self.packet_size <= self.data.len() {
            let mut packet = self.data[self.pos..self.pos + self.packet_size].to_vec();
            match validate_packet(&mut packet, self.packet_size) {
                Ok(corrected) => {
                    self.pos += self.packet_size;
                    return Some((packet, corrected));
                }
                Err(_) => {
                    self.pos += 1;
                    self.skipped += 1;
                }
            }
        }
        self.skipped += self.data.len() - self.pos;
        self.pos = self.data.len();
        None
    }

    /// Bytes that were not part of any valid packet so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub packet_size: usize,
    /// Percentage of valid packets thrown away before decoding, to test loss recovery.
    pub drop_percent: u32,
    pub seed: u64,
}

impl DecodeOptions {
    pub fn new(packet_size: usize) -> DecodeOptions {
        DecodeOptions {
            packet_size,
            drop_percent: 0,
            seed: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    /// Packets taken by the decoder.
    pub decoded: usize,
    /// Packets discarded by the drop test.
    pub dropped: usize,
    /// Valid packets the decoder did not use: other images, duplicates, late arrivals.
    pub ignored: usize,
    /// Bytes repaired by FEC.
    pub corrected: usize,
    /// Bytes outside any valid packet.
    pub skipped: usize,
}

/// Decodes every packet found in `data` into a JPEG.
pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<(Vec<u8>, DecodeStats)> {
    let mut scanner = PacketScanner::new(data, options.packet_size)?;
    let mut decoder = Decoder::new(options.packet_size)?;
    let mut rng = XorShiftRng::seed_from_u64(options.seed);
    let mut stats = DecodeStats::default();

    while let Some((packet, corrected)) = scanner.next_packet() {
        if options.drop_percent > 0 && rng.random_range(0..100) < options.drop_percent {
            stats.dropped += 1;
            continue;
        }
        stats.corrected += corrected;
        match decoder.feed_packet(&packet) {
            Ok(DecodeStatus::Ok) => stats.decoded += 1,
            Ok(DecodeStatus::FeedMe) => stats.ignored += 1,
            Ok(DecodeStatus::EndOfImage) => {
                stats.decoded += 1;
                break;
            }
            Ok(DecodeStatus::BufferFull) => {
                return Err(eyre!("Decoded image does not fit in the output buffer"));
            }
            // One bad packet only costs its own part of the image.
            Err(err) => {
                eprintln!("Warning: ignoring packet: {err}");
                stats.ignored += 1;
            }
        }
    }
    stats.skipped = scanner.skipped();

    let image = decoder
        .get_image()
        .wrap_err("No usable packets in the input")?;
    Ok((image.to_vec(), stats))
}
