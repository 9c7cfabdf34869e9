// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    bit_writer::BitWriter,
    entropy_coding::transcoder::{Direction, ScanState, StepStatus, Transcoder},
    error::{Error, Result},
    frame::Geometry,
    markers,
    packet::{self, PacketInfo, PacketLayout, PacketType},
    recovery::{self, Sequence},
    tables::TableSet,
    util::tracing_wrappers::{debug, warn},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The packet was decoded.
    Ok,
    /// The packet was dropped or abandoned; more packets are needed.
    FeedMe,
    /// The last MCU of the image has been decoded. Later packets are ignored.
    EndOfImage,
    /// The output passed the length given to [`Decoder::set_output_buffer`]. Decoding went on
    /// regardless; the limit only signals that the buffer has grown past it.
    BufferFull,
}

/// State fixed by the first packet of an image.
#[derive(Debug)]
struct Image {
    first: PacketInfo,
    layout: PacketLayout,
    engine: Transcoder,
}

/// Rebuilds a baseline JPEG from SSDV packets.
///
/// Packets should be checked with [`packet::validate_packet`] before they are fed. Missing
/// packets are tolerated: the image regions they covered are filled with flat blocks.
#[derive(Debug)]
pub struct Decoder {
    packet_size: usize,
    image: Option<Image>,
    packet_id: u16,
    storage: Option<Vec<u8>>,
    limit: usize,
    closed: bool,
}

impl Decoder {
    pub fn new(packet_size: usize) -> Result<Decoder> {
        // The smallest layout decides whether the size can hold a packet at all.
        PacketLayout::new(PacketType::NoFec, packet_size)?;
        Ok(Decoder {
            packet_size,
            image: None,
            packet_id: 0,
            storage: None,
            limit: usize::MAX,
            closed: false,
        })
    }

    /// Uses `buffer` as storage for the image, and reports [`DecodeStatus::BufferFull`] once
    /// `length` bytes have been produced.
    pub fn set_output_buffer(&mut self, buffer: Vec<u8>, length: usize) {
        self.limit = length;
        match &mut self.image {
            Some(image) => {
                image.engine.writer.set_storage(buffer);
                image.engine.writer.set_limit(length);
            }
            None => self.storage = Some(buffer),
        }
    }

    /// Packet info of the first packet accepted.
    pub fn image_info(&self) -> Option<&PacketInfo> {
        self.image.as_ref().map(|image| &image.first)
    }

    fn start_image(&mut self, info: &PacketInfo, layout: PacketLayout) -> Result<Image> {
        let geometry = Geometry::new(info.width, info.height, info.mcu_mode, false);
        debug!(
            "Image {:02X} from {}: {}x{}, MCU mode {:?}, {} MCUs, quality {}",
            info.image_id,
            info.callsign_text(),
            geometry.width,
            geometry.height,
            geometry.mode,
            geometry.mcu_count,
            info.quality.level()
        );
        let tables = TableSet::standard(info.quality)?;
        let mut writer = BitWriter::new(self.limit);
        if let Some(storage) = self.storage.take() {
            writer.set_storage(storage);
        }
        markers::write_headers(&mut writer, &geometry, &tables)?;
        writer.set_stuffing(true);
        let mut engine = Transcoder::new(Direction::Decoding, tables.clone(), tables, writer);
        engine.geometry = geometry;
        Ok(Image {
            first: info.clone(),
            layout,
            engine,
        })
    }

    pub fn feed_packet(&mut self, packet: &[u8]) -> Result<DecodeStatus> {
        if packet.len() < self.packet_size {
            return Err(Error::PacketTooShort(packet.len(), self.packet_size));
        }
        let packet = &packet[..self.packet_size];
        let info = packet::decode_header(packet)?;
        let Ok(layout) = PacketLayout::new(info.packet_type, self.packet_size) else {
            warn!(
                "Dropping packet {}: type {:?} does not fit {} bytes",
                info.packet_id, info.packet_type, self.packet_size
            );
            return Ok(DecodeStatus::FeedMe);
        };
        if info.width == 0 || info.height == 0 {
            warn!("Dropping packet {}: empty image", info.packet_id);
            return Ok(DecodeStatus::FeedMe);
        }
        if self.image.is_none() {
            let image = self.start_image(&info, layout)?;
            self.image = Some(image);
        }
        let Some(image) = self.image.as_mut() else {
            return Ok(DecodeStatus::FeedMe);
        };

        if !recovery::same_image(&image.first, &image.layout, &info) {
            warn!(
                "Dropping packet {} of image {:02X}",
                info.packet_id, info.image_id
            );
            return Ok(DecodeStatus::FeedMe);
        }
        let engine = &mut image.engine;
        if self.closed || engine.state == ScanState::EndOfImage {
            return Ok(DecodeStatus::EndOfImage);
        }
        if info.mcu_id.is_some_and(|id| id as u32 >= engine.geometry.mcu_count)
            || info
                .mcu_offset
                .is_some_and(|offset| offset as usize >= image.layout.payload_len)
        {
            warn!("Dropping packet {}: MCU marker out of range", info.packet_id);
            return Ok(DecodeStatus::FeedMe);
        }

        let mut start = 0;
        match recovery::sequence(self.packet_id, &info) {
            Sequence::Drop => {
                warn!(
                    "Dropping packet {}, expected {}",
                    info.packet_id, self.packet_id
                );
                return Ok(DecodeStatus::FeedMe);
            }
            Sequence::InOrder => (),
            Sequence::Resync { mcu_id, offset } => {
                warn!(
                    "Gap between packets {} and {}, filling up to MCU {mcu_id}",
                    self.packet_id as i32 - 1,
                    info.packet_id
                );
                engine.fill_gap(mcu_id as u32)?;
                start = offset as usize;
                self.packet_id = info.packet_id;
            }
        }
        if let Some(mcu_id) = info.mcu_id {
            engine.next_reset_mcu = mcu_id as u32;
        }

        let payload = &packet[image.layout.payload_range()];
        match feed_payload(engine, &info, payload, start) {
            Ok(PayloadEnd::Consumed) => (),
            Ok(PayloadEnd::Misaligned) => return Ok(DecodeStatus::FeedMe),
            Ok(PayloadEnd::EndOfImage) => {
                self.packet_id = info.packet_id.wrapping_add(1);
                return Ok(DecodeStatus::EndOfImage);
            }
            Err(err) => {
                // The packet id is left behind, so only a packet with an MCU marker resyncs.
                warn!("Abandoning packet {}: {err}", info.packet_id);
                engine.reader.clear();
                engine.fill_gap(engine.mcu_id)?;
                return Ok(DecodeStatus::FeedMe);
            }
        }

        self.packet_id = info.packet_id.wrapping_add(1);
        if engine.writer.is_full() {
            Ok(DecodeStatus::BufferFull)
        } else {
            Ok(DecodeStatus::Ok)
        }
    }

    /// Finishes the image, filling any MCUs not yet decoded, and returns the JPEG.
    pub fn get_image(&mut self) -> Result<&[u8]> {
        let image = self.image.as_mut().ok_or(Error::NothingDecoded)?;
        let engine = &mut image.engine;
        if !self.closed {
            if engine.mcu_id < engine.geometry.mcu_count {
                engine.fill_gap(engine.geometry.mcu_count)?;
            }
            engine.writer.sync_to_byte();
            engine.writer.set_stuffing(false);
            markers::write_marker(&mut engine.writer, markers::EOI, &[]);
            engine.state = ScanState::EndOfImage;
            self.closed = true;
        }
        Ok(engine.writer.bytes())
    }
}

enum PayloadEnd {
    Consumed,
    /// The packet's first MCU is not the one the engine expects.
    Misaligned,
    EndOfImage,
}

fn feed_payload(
    engine: &mut Transcoder,
    info: &PacketInfo,
    payload: &[u8],
    start: usize,
) -> Result<PayloadEnd> {
    let mcu_offset = info.mcu_offset.map(usize::from);
    for (i, &b) in payload.iter().enumerate().skip(start) {
        if mcu_offset == Some(i) {
            // The first MCU in a packet is byte aligned; leftover bits are padding.
            engine.reader.clear();
            if info.mcu_id.map(u32::from) != Some(engine.mcu_id) || !engine.at_mcu_start() {
                warn!(
                    "Abandoning packet {}: expected MCU {}, packet has {:?}",
                    info.packet_id, engine.mcu_id, info.mcu_id
                );
                return Ok(PayloadEnd::Misaligned);
            }
        }
        engine.reader.push_byte(b)?;
        loop {
            match engine.step()? {
                StepStatus::Continue | StepStatus::BufferFull => (),
                StepStatus::FeedMe => break,
                StepStatus::EndOfImage => return Ok(PayloadEnd::EndOfImage),
            }
        }
    }
    Ok(PayloadEnd::Consumed)
}
