// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::Write;

use color_eyre::eyre::Result;

use crate::dec::PacketScanner;

/// Prints one line per valid packet found in `data`. Returns the number of packets.
pub fn describe(data: &[u8], packet_size: usize, out: &mut impl Write) -> Result<usize> {
    let mut scanner = PacketScanner::new(data, packet_size)?;
    let mut count = 0;
    while let Some((packet, corrected)) = scanner.next_packet() {
        let info = ssdv::decode_header(&packet)?;
        let mcu = match (info.mcu_id, info.mcu_offset) {
            (Some(id), Some(offset)) => format!("MCU {id} at {offset}"),
            _ => "no MCU".to_string(),
        };
        writeln!(
            out,
            "{:>5} {:<6} image {:3} {}x{} {:?} q{} {:?}{}{} {mcu}",
            info.packet_id,
            info.callsign_text(),
            info.image_id,
            info.width,
            info.height,
            info.packet_type,
            info.quality.level(),
            info.mcu_mode,
            if info.eoi { " EOI" } else { "" },
            if corrected > 0 {
                format!(" ({corrected} bytes corrected)")
            } else {
                String::new()
            },
        )?;
        count += 1;
    }
    if scanner.skipped() > 0 {
        writeln!(out, "{} bytes between packets skipped", scanner.skipped())?;
    }
    Ok(count)
}
