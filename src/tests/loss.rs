// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use test_log::test;

use crate::{
    decode::{DecodeStatus, Decoder},
    encode::EncoderOptions,
    error::Error,
    frame::McuMode,
    util::test::{JpegBuilder, collect_packets, decode_packets, frame_of},
};

const PACKET_SIZE: usize = 64;

fn small_packets(builder: JpegBuilder) -> Vec<Vec<u8>> {
    let options = EncoderOptions {
        packet_size: PACKET_SIZE,
        ..Default::default()
    };
    collect_packets(options, &builder.build()).unwrap()
}

/// A decoded image must parse again and hold every MCU of the original.
fn assert_complete(jpeg: &[u8], width: u16, height: u16, mcus: usize) {
    assert_eq!(frame_of(jpeg), Some((width, height, 3)));
    let options = EncoderOptions {
        packet_size: PACKET_SIZE,
        ..Default::default()
    };
    let packets = collect_packets(options, jpeg).unwrap();
    let last = crate::decode_header(packets.last().unwrap()).unwrap();
    assert!(last.eoi);
    assert_eq!(last.mcu_count() as usize, mcus);
}

#[test]
fn any_subset_in_order_decodes() {
    let packets = small_packets(JpegBuilder::new(96, 48).detail(30));
    assert!(packets.len() > 20);
    arbtest::arbtest(|u| {
        let mut kept = vec![];
        for packet in &packets {
            if u.arbitrary()? {
                kept.push(packet);
            }
        }
        match decode_packets(PACKET_SIZE, kept.iter().copied()) {
            Ok(jpeg) => assert_complete(&jpeg, 96, 48, 18),
            Err(err) => {
                assert!(kept.is_empty());
                assert!(matches!(err, Error::NothingDecoded));
            }
        }
        Ok(())
    });
}

#[test]
fn random_drops() {
    for (seed, mode) in [
        (1, McuMode::H2V2),
        (2, McuMode::H1V2),
        (3, McuMode::H2V1),
        (4, McuMode::H1V1),
    ] {
        let packets = small_packets(JpegBuilder::new(64, 64).mode(mode).detail(40).seed(seed));
        let mut rng = XorShiftRng::seed_from_u64(seed);
        for drop_rate in [0.1, 0.3, 0.6] {
            let kept: Vec<_> = packets
                .iter()
                .filter(|_| !rng.random_bool(drop_rate))
                .collect();
            let jpeg = decode_packets(PACKET_SIZE, kept).unwrap();
            assert_complete(&jpeg, 64, 64, mode.mcu_count(64, 64) as usize);
        }
    }
}

#[test]
fn lost_first_packet() {
    let packets = small_packets(JpegBuilder::new(64, 32).detail(30));
    let jpeg = decode_packets(PACKET_SIZE, &packets[1..]).unwrap();
    assert_complete(&jpeg, 64, 32, 8);
}

#[test]
fn only_the_last_packet() {
    let packets = small_packets(JpegBuilder::new(64, 32).detail(30));
    let jpeg = decode_packets(PACKET_SIZE, packets.last()).unwrap();
    assert_complete(&jpeg, 64, 32, 8);
}

#[test]
fn reordered_packets_are_dropped() {
    let packets = small_packets(JpegBuilder::new(64, 32).detail(30));
    // The first packet after packet 1 that starts an MCU.
    let resync = (2..packets.len())
        .find(|&i| crate::decode_header(&packets[i]).unwrap().mcu_id.is_some())
        .unwrap();
    let mut decoder = Decoder::new(PACKET_SIZE).unwrap();
    assert_eq!(decoder.feed_packet(&packets[0]).unwrap(), DecodeStatus::Ok);
    assert_eq!(
        decoder.feed_packet(&packets[resync]).unwrap(),
        DecodeStatus::Ok
    );
    // Too late: the packets in between are already accounted for as lost.
    assert_eq!(
        decoder.feed_packet(&packets[1]).unwrap(),
        DecodeStatus::FeedMe
    );
    let jpeg = decoder.get_image().unwrap().to_vec();
    assert_complete(&jpeg, 64, 32, 8);
}

#[test]
fn losses_only_affect_their_region() {
    let packets = small_packets(JpegBuilder::new(128, 64).detail(30));
    let full = decode_packets(PACKET_SIZE, &packets).unwrap();
    let mut kept = packets.clone();
    kept.remove(packets.len() / 2);
    let damaged = decode_packets(PACKET_SIZE, &kept).unwrap();
    assert_ne!(full, damaged);
    // Everything up to the first MCU of the lost packet's predecessor is untouched.
    let prefix = full.iter().zip(&damaged).take_while(|(a, b)| a == b).count();
    assert!(prefix > full.len() / 4);
}
