// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use test_log::test;

use crate::{
    encode::EncoderOptions,
    error::ErrorKind,
    packet::{PARITY_SIZE, PacketType, validate_packet},
    util::test::{JpegBuilder, collect_packets, decode_packets},
};

fn encode(packet_type: PacketType, packet_size: usize) -> Vec<Vec<u8>> {
    let jpeg = JpegBuilder::new(64, 48).detail(30).build();
    let options = EncoderOptions {
        packet_type,
        packet_size,
        ..Default::default()
    };
    collect_packets(options, &jpeg).unwrap()
}

#[test]
fn single_bit_flips_are_repaired() {
    for packet_size in [256, 128, 60] {
        let packets = encode(PacketType::Normal, packet_size);
        let clean = decode_packets(packet_size, &packets).unwrap();
        arbtest::arbtest(|u| {
            let mut damaged = packets.clone();
            for packet in &mut damaged {
                // Damage to the parity alone leaves the CRC intact and needs no repair.
                let byte = u.int_in_range(2..=packet_size - PARITY_SIZE - 1)?;
                let bit = u.int_in_range(0..=7u8)?;
                packet[byte] ^= 1 << bit;
                assert_eq!(validate_packet(packet, packet_size).unwrap(), 1);
            }
            assert_eq!(damaged, packets);
            assert_eq!(decode_packets(packet_size, &damaged).unwrap(), clean);
            Ok(())
        });
    }
}

#[test]
fn burst_errors() {
    let packets = encode(PacketType::Normal, 256);
    let mut rng = XorShiftRng::seed_from_u64(7);
    for packet in &packets {
        // Sixteen damaged bytes can be corrected, seventeen cannot.
        for (count, repairable) in [(16, true), (17, false)] {
            let mut damaged = packet.clone();
            let start = rng.random_range(2..=256 - PARITY_SIZE - count);
            for byte in &mut damaged[start..start + count] {
                *byte ^= rng.random_range(1..=255u8);
            }
            let result = validate_packet(&mut damaged, 256);
            if repairable {
                assert_eq!(result.unwrap(), count);
                assert_eq!(&damaged, packet);
            } else {
                assert_eq!(result.unwrap_err().kind(), ErrorKind::Uncorrectable);
            }
        }
    }
}

#[test]
fn damaged_packets_without_fec_are_dropped() {
    let packets = encode(PacketType::NoFec, 128);
    let mut rng = XorShiftRng::seed_from_u64(11);
    let mut kept = vec![];
    for packet in &packets {
        let mut packet = packet.clone();
        if rng.random_bool(0.3) {
            let byte = rng.random_range(1..128);
            packet[byte] ^= 1 << rng.random_range(0..8u8);
            assert_eq!(
                validate_packet(&mut packet, 128).unwrap_err().kind(),
                ErrorKind::Uncorrectable
            );
            continue;
        }
        assert_eq!(validate_packet(&mut packet, 128).unwrap(), 0);
        kept.push(packet);
    }
    let jpeg = decode_packets(128, &kept).unwrap();
    assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
}
