// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use color_eyre::eyre::{Result, WrapErr, eyre};
use ssdv::{EncodeStatus, Encoder, EncoderOptions};

/// Bytes handed to the encoder at a time, so its input queue stays small.
const CHUNK_SIZE: usize = 4096;

/// Transcodes a whole JPEG file and returns the packets back to back.
pub fn encode(jpeg: &[u8], options: EncoderOptions) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(options).wrap_err("Invalid encoder options")?;
    let mut chunks = jpeg.chunks(CHUNK_SIZE);
    let mut packets = vec![];
    loop {
        match encoder
            .get_next_packet()
            .wrap_err("Failed to encode the image")?
        {
            EncodeStatus::Packet => packets.extend_from_slice(encoder.packet()),
            EncodeStatus::FeedMe => match chunks.next() {
                Some(chunk) => encoder.feed_input(chunk),
                None => return Err(eyre!("Premature end of file")),
            },
            EncodeStatus::EndOfImage => return Ok(packets),
        }
    }
}
