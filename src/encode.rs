// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::VecDeque;

use crate::{
    bit_writer::BitWriter,
    callsign,
    entropy_coding::transcoder::{Direction, ScanState, StepStatus, Transcoder},
    error::{Error, Result},
    markers::{self, FrameHeader, MarkerKind},
    packet::{HEADER_SIZE, PacketInfo, PacketLayout, PacketType, whiten},
    tables::{ComponentGroup, Quality, SOURCE_TABLE_CAPACITY, TableClass, TableSet},
    util::tracing_wrappers::{debug, trace},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    pub packet_type: PacketType,
    /// Up to six characters of A-Z, 0-9 and space.
    pub callsign: String,
    pub image_id: u8,
    /// Quality of the tables the image is requantised to.
    pub quality: Quality,
    pub packet_size: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            packet_type: PacketType::Normal,
            callsign: String::new(),
            image_id: 0,
            quality: Quality::default(),
            packet_size: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    /// A packet is ready in [`Encoder::packet`].
    Packet,
    /// All input has been consumed; call [`Encoder::feed_input`].
    FeedMe,
    /// The packet carrying the end of the image has already been returned.
    EndOfImage,
}

/// Turns a baseline JPEG byte stream into SSDV packets.
///
/// ```no_run
/// # use ssdv::encode::{Encoder, EncoderOptions, EncodeStatus};
/// # fn send(_: &[u8]) {}
/// # let jpeg: Vec<u8> = vec![];
/// let mut encoder = Encoder::new(EncoderOptions::default())?;
/// encoder.feed_input(&jpeg);
/// while encoder.get_next_packet()? == EncodeStatus::Packet {
///     send(encoder.packet());
/// }
/// # Ok::<(), ssdv::error::Error>(())
/// ```
#[derive(Debug)]
pub struct Encoder {
    layout: PacketLayout,
    callsign: u32,
    image_id: u8,
    quality: Quality,
    packet_id: u16,
    engine: Transcoder,
    input: VecDeque<u8>,
    packet: Vec<u8>,
    /// The last two bytes seen while looking for a marker.
    marker: u16,
    segment_marker: u16,
    segment_len: usize,
    length_bytes: usize,
    /// The current segment is skipped rather than buffered.
    skip_segment: bool,
    segment: Vec<u8>,
    /// A 0xFF was read inside scan data.
    pending_ff: bool,
    frame: Option<FrameHeader>,
    scan_started: bool,
    finished: bool,
    eoi_sent: bool,
}

impl Encoder {
    pub fn new(options: EncoderOptions) -> Result<Encoder> {
        let layout = PacketLayout::new(options.packet_type, options.packet_size)?;
        let callsign = callsign::encode(&options.callsign)?;
        let engine = Transcoder::new(
            Direction::Encoding,
            TableSet::new(SOURCE_TABLE_CAPACITY),
            TableSet::standard(options.quality)?,
            BitWriter::new(layout.payload_len),
        );
        Ok(Encoder {
            layout,
            callsign,
            image_id: options.image_id,
            quality: options.quality,
            packet_id: 0,
            engine,
            input: VecDeque::new(),
            packet: vec![0; layout.packet_size],
            marker: 0,
            segment_marker: 0,
            segment_len: 0,
            length_bytes: 0,
            skip_segment: false,
            segment: Vec::new(),
            pending_ff: false,
            frame: None,
            scan_started: false,
            finished: false,
            eoi_sent: false,
        })
    }

    /// Uses `buffer` as storage for the packets returned by [`Encoder::packet`].
    pub fn set_output_buffer(&mut self, mut buffer: Vec<u8>) {
        buffer.clear();
        buffer.resize(self.layout.packet_size, 0);
        self.packet = buffer;
    }

    pub fn feed_input(&mut self, data: &[u8]) {
        self.input.extend(data);
    }

    /// The most recent packet.
    pub fn packet(&self) -> &[u8] {
        &self.packet
    }

    pub fn get_next_packet(&mut self) -> Result<EncodeStatus> {
        loop {
            if self.finished {
                if self.eoi_sent {
                    return Ok(EncodeStatus::EndOfImage);
                }
                self.emit_packet();
                return Ok(EncodeStatus::Packet);
            }
            if self.engine.writer.bytes().len() >= self.layout.payload_len {
                self.emit_packet();
                return Ok(EncodeStatus::Packet);
            }
            if self.engine.state.in_scan() {
                match self.engine.step()? {
                    StepStatus::Continue | StepStatus::BufferFull => continue,
                    StepStatus::EndOfImage => {
                        self.finished = true;
                        continue;
                    }
                    StepStatus::FeedMe => (),
                }
            }
            let Some(byte) = self.input.pop_front() else {
                return Ok(EncodeStatus::FeedMe);
            };
            self.feed_byte(byte)?;
        }
    }

    fn feed_byte(&mut self, b: u8) -> Result<()> {
        match self.engine.state {
            ScanState::Marker => {
                self.marker = (self.marker << 8) | b as u16;
                match markers::classify(self.marker) {
                    MarkerKind::None => (),
                    MarkerKind::Standalone => {
                        let marker = std::mem::take(&mut self.marker);
                        self.standalone_marker(marker)?;
                    }
                    kind @ (MarkerKind::Segment | MarkerKind::Ignored) => {
                        self.segment_marker = std::mem::take(&mut self.marker);
                        self.skip_segment = kind == MarkerKind::Ignored;
                        self.segment_len = 0;
                        self.length_bytes = 0;
                        self.segment.clear();
                        self.engine.state = ScanState::MarkerLength;
                    }
                }
            }
            ScanState::MarkerLength => {
                self.segment_len = (self.segment_len << 8) | b as usize;
                self.length_bytes += 1;
                if self.length_bytes == 2 {
                    if self.segment_len < 2 {
                        return Err(Error::InvalidMarkerLength(
                            self.segment_marker,
                            self.segment_len,
                        ));
                    }
                    self.segment_len -= 2;
                    if self.segment_len == 0 {
                        self.end_segment()?;
                    } else {
                        self.engine.state = ScanState::MarkerData;
                    }
                }
            }
            ScanState::MarkerData => {
                if !self.skip_segment {
                    self.segment.push(b);
                }
                self.segment_len -= 1;
                if self.segment_len == 0 {
                    self.end_segment()?;
                }
            }
            ScanState::Huffman | ScanState::Integer { .. } => {
                if self.pending_ff {
                    match b {
                        0x00 => {
                            self.pending_ff = false;
                            self.engine.reader.push_byte(0xFF)?;
                        }
                        // Fill bytes.
                        0xFF => (),
                        _ => return Err(Error::UnexpectedMarker(b)),
                    }
                } else if b == 0xFF {
                    self.pending_ff = true;
                } else {
                    self.engine.reader.push_byte(b)?;
                }
            }
            ScanState::EndOfImage => (),
        }
        Ok(())
    }

    fn standalone_marker(&mut self, marker: u16) -> Result<()> {
        match marker {
            markers::RST0..=markers::RST7 => {
                if !self.scan_started {
                    return Err(Error::UnexpectedMarker(marker as u8));
                }
                self.pending_ff = false;
                self.engine.start_scan();
            }
            markers::EOI => {
                return Err(if self.scan_started {
                    Error::UnexpectedMarker(marker as u8)
                } else {
                    Error::MissingScan
                });
            }
            _ => (),
        }
        Ok(())
    }

    fn end_segment(&mut self) -> Result<()> {
        self.engine.state = ScanState::Marker;
        if self.skip_segment {
            trace!("Skipping segment {:04X}", self.segment_marker);
            return Ok(());
        }
        let data = std::mem::take(&mut self.segment);
        let result = self.dispatch_segment(self.segment_marker, &data);
        self.segment = data;
        result
    }

    fn dispatch_segment(&mut self, marker: u16, data: &[u8]) -> Result<()> {
        match marker {
            markers::DHT => {
                for table in markers::parse_dht(data)? {
                    self.engine.source.define_dht(table)?;
                }
            }
            markers::DQT => {
                for table in markers::parse_dqt(data)? {
                    self.engine.source.define_dqt(table)?;
                }
            }
            markers::DRI => {
                let interval = markers::parse_dri(data)?;
                debug!("Restart interval {interval}");
                self.engine.set_restart_interval(interval);
            }
            markers::SOS => self.start_scan(data)?,
            _ => self.start_frame(marker, data)?,
        }
        Ok(())
    }

    fn start_frame(&mut self, marker: u16, data: &[u8]) -> Result<()> {
        let frame = markers::parse_frame(marker, data)?;
        let geometry = frame.geometry;
        debug!(
            "Frame {}x{}, {} components, MCU mode {:?}, {} MCUs",
            geometry.width,
            geometry.height,
            frame.components.len(),
            geometry.mode,
            geometry.mcu_count
        );
        for group in [ComponentGroup::Luma, ComponentGroup::Chroma] {
            if let Some(id) = frame.quant_table(group) {
                self.engine.source.select_dqt(group, id as usize);
            }
        }
        self.engine.geometry = geometry;
        self.frame = Some(frame);
        Ok(())
    }

    fn start_scan(&mut self, data: &[u8]) -> Result<()> {
        let frame = self.frame.as_ref().ok_or(Error::MissingFrame)?;
        let scan = markers::parse_scan(data, frame)?;
        let source = &mut self.engine.source;
        let mut groups = vec![(ComponentGroup::Luma, scan.luma)];
        if let Some(chroma) = scan.chroma {
            groups.push((ComponentGroup::Chroma, chroma));
        }
        for (group, (dc, ac)) in groups {
            source.select_dht(TableClass::Dc, group, dc as usize);
            source.select_dht(TableClass::Ac, group, ac as usize);
            if source.dht(TableClass::Dc, group).is_none()
                || source.dht(TableClass::Ac, group).is_none()
            {
                return Err(Error::MissingHuffmanTable);
            }
            if source.dqt(group).is_none() {
                return Err(Error::MissingQuantTable);
            }
        }
        debug!("Scan data begins");
        self.scan_started = true;
        self.pending_ff = false;
        self.engine.start_scan();
        Ok(())
    }

    fn emit_packet(&mut self) {
        let payload_len = self.layout.payload_len;
        let eoi = self.finished && self.engine.writer.len_with_pending() <= payload_len;
        let (mcu_offset, mcu_id) = match self.engine.packet_mcu {
            Some((mcu_id, offset)) if offset < payload_len => {
                self.engine.packet_mcu = None;
                (Some(offset as u8), Some(mcu_id as u16))
            }
            Some((mcu_id, offset)) => {
                // The MCU starts in a later packet.
                self.engine.packet_mcu = Some((mcu_id, offset - payload_len));
                (None, None)
            }
            None => (None, None),
        };
        let geometry = self.engine.geometry;
        let info = PacketInfo {
            packet_type: self.layout.packet_type,
            callsign: self.callsign,
            image_id: self.image_id,
            packet_id: self.packet_id,
            width: geometry.width,
            height: geometry.height,
            eoi,
            quality: self.quality,
            mcu_mode: geometry.mode,
            mcu_offset,
            mcu_id,
        };
        info.write(&mut self.packet[..HEADER_SIZE]);
        let payload = &mut self.packet[self.layout.payload_range()];
        let written = self.engine.writer.take_front(payload);
        whiten(&mut payload[written..]);
        self.layout.seal(&mut self.packet);
        trace!(
            "Packet {} with {written} bytes, MCU {mcu_id:?} at {mcu_offset:?}, eoi {eoi}",
            self.packet_id
        );
        if eoi {
            self.eoi_sent = true;
        }
        self.packet_id = self.packet_id.wrapping_add(1);
    }
}
