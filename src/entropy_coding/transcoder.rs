// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The coefficient engine shared by [`crate::encode::Encoder`] and [`crate::decode::Decoder`].
//!
//! Scan data is Huffman decoded with the source tables, requantised and Huffman coded again
//! with the destination tables, one symbol per [`Transcoder::step`]. The two directions differ
//! only in how DC values are coded at reset blocks: packets carry an absolute DC value for the
//! first MCU of each packet so that decoding can restart after a lost packet, while JPEG
//! always codes DC differences.

use crate::{
    bit_reader::BitReader,
    bit_writer::BitWriter,
    entropy_coding::{
        EOB, ZRL,
        coefficients::{
            MAX_AC_MAGNITUDE, MAX_DC_CATEGORY, MAX_DC_MAGNITUDE, decode_magnitude,
            encode_magnitude, round_div,
        },
        huffman,
    },
    error::{Error, Result},
    frame::{Geometry, McuMode},
    tables::{ComponentGroup, TableClass, TableSet},
};

const BLOCK_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// JPEG in, packets out.
    Encoding,
    /// Packets in, JPEG out.
    Decoding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Looking for the next marker.
    Marker,
    MarkerLength,
    MarkerData,
    /// Expecting a Huffman code.
    Huffman,
    /// Expecting `size` magnitude bits of a coefficient preceded by `run` zeros.
    Integer { size: u8, run: u8 },
    EndOfImage,
}

impl ScanState {
    pub fn in_scan(self) -> bool {
        matches!(self, ScanState::Huffman | ScanState::Integer { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Continue,
    /// More input bits are needed, or a restart marker is due.
    FeedMe,
    /// The output reached its limit. Nothing was lost.
    BufferFull,
    EndOfImage,
}

#[derive(Debug)]
pub struct Transcoder {
    direction: Direction,
    pub state: ScanState,
    pub geometry: Geometry,
    pub source: TableSet,
    pub dest: TableSet,
    pub reader: BitReader,
    pub writer: BitWriter,
    pub mcu_id: u32,
    mcu_part: usize,
    component: usize,
    ac_part: usize,
    /// DC predictors in the source domain.
    dc: [i32; 3],
    /// DC predictors in the destination domain (encoder only).
    adc: [i32; 3],
    /// AC zeros read but not yet written.
    zero_run: usize,
    reset_mcu: u32,
    pub next_reset_mcu: u32,
    restart_interval: u16,
    restart_countdown: u16,
    /// First MCU starting in the packet being assembled and its offset from the start of that
    /// packet's payload (encoder only).
    pub packet_mcu: Option<(u32, usize)>,
}

impl Transcoder {
    pub fn new(
        direction: Direction,
        source: TableSet,
        dest: TableSet,
        writer: BitWriter,
    ) -> Transcoder {
        Transcoder {
            direction,
            state: match direction {
                Direction::Encoding => ScanState::Marker,
                Direction::Decoding => ScanState::Huffman,
            },
            geometry: Geometry::new(0, 0, McuMode::H2V2, false),
            source,
            dest,
            reader: BitReader::new(),
            writer,
            mcu_id: 0,
            mcu_part: 0,
            component: 0,
            ac_part: 0,
            dc: [0; 3],
            adc: [0; 3],
            zero_run: 0,
            reset_mcu: 0,
            next_reset_mcu: 0,
            restart_interval: 0,
            restart_countdown: 0,
            // The first packet always starts with MCU 0.
            packet_mcu: match direction {
                Direction::Encoding => Some((0, 0)),
                Direction::Decoding => None,
            },
        }
    }

    pub fn set_restart_interval(&mut self, interval: u16) {
        self.restart_interval = interval;
        self.restart_countdown = interval;
    }

    /// Enters scan data, at the start of the scan or after a restart marker. Source DC
    /// predictors restart from zero; the position in the image is kept.
    pub fn start_scan(&mut self) {
        self.dc = [0; 3];
        self.reader.clear();
        self.zero_run = 0;
        self.restart_countdown = self.restart_interval;
        self.state = ScanState::Huffman;
    }

    pub fn at_mcu_start(&self) -> bool {
        self.mcu_part == 0 && self.ac_part == 0 && self.state == ScanState::Huffman
    }

    fn is_reset_block(&self) -> bool {
        self.mcu_id == self.reset_mcu
            && (self.mcu_part == 0 || self.mcu_part >= self.geometry.y_parts())
    }

    /// Processes one Huffman code or one magnitude field.
    pub fn step(&mut self) -> Result<StepStatus> {
        match self.state {
            ScanState::Huffman => {
                if self.mcu_part == 0 && self.ac_part == 0 && self.next_reset_mcu > self.reset_mcu
                {
                    self.reset_mcu = self.next_reset_mcu;
                }
                let class = TableClass::for_coefficient(self.ac_part);
                let table = self
                    .source
                    .dht(class, ComponentGroup::for_component(self.component))
                    .ok_or(Error::MissingHuffmanTable)?;
                let Some((symbol, len)) = huffman::decode_symbol(table, &self.reader)? else {
                    return Ok(StepStatus::FeedMe);
                };
                self.reader.consume(len);
                if self.ac_part == 0 {
                    if symbol > MAX_DC_CATEGORY {
                        return Err(Error::InvalidHuffman);
                    }
                    self.state = ScanState::Integer {
                        size: symbol,
                        run: 0,
                    };
                    return Ok(StepStatus::Continue);
                }
                match symbol {
                    EOB => {
                        self.zero_run += BLOCK_SIZE - self.ac_part;
                        self.ac_part = BLOCK_SIZE;
                    }
                    ZRL => {
                        self.zero_run += 16;
                        self.ac_part += 16;
                        if self.ac_part > BLOCK_SIZE {
                            return Err(Error::CoefficientOverflow(self.ac_part as u8));
                        }
                    }
                    _ => {
                        let run = symbol >> 4;
                        self.ac_part += run as usize;
                        if self.ac_part >= BLOCK_SIZE {
                            return Err(Error::CoefficientOverflow(self.ac_part as u8));
                        }
                        self.state = ScanState::Integer {
                            size: symbol & 0x0F,
                            run,
                        };
                        return Ok(StepStatus::Continue);
                    }
                }
            }
            ScanState::Integer { size, run } => {
                let Some(bits) = self.reader.peek(size as usize) else {
                    return Ok(StepStatus::FeedMe);
                };
                self.reader.consume(size as usize);
                let value = decode_magnitude(bits, size as usize);
                self.state = ScanState::Huffman;
                if self.ac_part == 0 {
                    self.code_dc(value)?;
                } else {
                    self.code_ac(value, run as usize)?;
                }
                self.ac_part += 1;
            }
            ScanState::EndOfImage => return Ok(StepStatus::EndOfImage),
            ScanState::Marker | ScanState::MarkerLength | ScanState::MarkerData => {
                return Ok(StepStatus::FeedMe);
            }
        }

        if self.ac_part >= BLOCK_SIZE {
            let status = self.finish_block()?;
            if status != StepStatus::Continue {
                return Ok(status);
            }
        }
        if self.writer.is_full() {
            return Ok(StepStatus::BufferFull);
        }
        Ok(StepStatus::Continue)
    }

    fn code_dc(&mut self, value: i32) -> Result<()> {
        let c = self.component;
        let reset = self.is_reset_block();
        let delta = match self.direction {
            Direction::Encoding => {
                let group = ComponentGroup::for_component(c);
                let sq = self.source.quant(group, 0)?;
                let dq = self.dest.quant(group, 0)?;
                let adjusted = if sq == dq {
                    self.dc[c] = self.dc[c].saturating_add(value);
                    self.dc[c]
                } else {
                    self.dc[c] = self.dc[c].saturating_add(value * sq);
                    round_div(self.dc[c], dq)
                };
                let delta = if reset {
                    adjusted
                } else {
                    adjusted.saturating_sub(self.adc[c])
                };
                let delta = delta.clamp(-MAX_DC_MAGNITUDE, MAX_DC_MAGNITUDE);
                self.adc[c] = if reset { delta } else { self.adc[c] + delta };
                delta
            }
            Direction::Decoding => {
                let delta = if reset {
                    value.saturating_sub(self.dc[c])
                } else {
                    value
                };
                let delta = delta.clamp(-MAX_DC_MAGNITUDE, MAX_DC_MAGNITUDE);
                self.dc[c] = self.dc[c].saturating_add(delta);
                delta
            }
        };
        self.emit(TableClass::Dc, c, 0, delta)
    }

    fn code_ac(&mut self, value: i32, run: usize) -> Result<()> {
        let c = self.component;
        let group = ComponentGroup::for_component(c);
        let sq = self.source.quant(group, self.ac_part)?;
        let dq = self.dest.quant(group, self.ac_part)?;
        let value = if sq == dq {
            value
        } else {
            round_div(value * sq, dq)
        };
        let value = value.clamp(-MAX_AC_MAGNITUDE, MAX_AC_MAGNITUDE);
        if value == 0 {
            self.zero_run += run + 1;
            return Ok(());
        }
        self.zero_run += run;
        while self.zero_run >= 16 {
            self.emit(TableClass::Ac, c, 15, 0)?;
            self.zero_run -= 16;
        }
        self.emit(TableClass::Ac, c, self.zero_run, value)?;
        self.zero_run = 0;
        Ok(())
    }

    fn emit(&mut self, class: TableClass, component: usize, run: usize, value: i32) -> Result<()> {
        let (bits, size) = encode_magnitude(value);
        let symbol = (run as u8) << 4 | size;
        let table = self
            .dest
            .dht(class, ComponentGroup::for_component(component))
            .ok_or(Error::MissingHuffmanTable)?;
        let (code, len) =
            huffman::encode_symbol(table, symbol).ok_or(Error::MissingHuffmanSymbol(symbol))?;
        self.writer.push_bits(code, len);
        if size > 0 {
            self.writer.push_bits(bits, size as usize);
        }
        Ok(())
    }

    /// A block with an unchanged DC value and no AC coefficients.
    fn emit_flat_block(&mut self, component: usize) -> Result<()> {
        self.emit(TableClass::Dc, component, 0, 0)?;
        self.emit(TableClass::Ac, component, 0, 0)
    }

    fn finish_block(&mut self) -> Result<StepStatus> {
        if self.zero_run > 0 {
            self.emit(TableClass::Ac, self.component, 0, 0)?;
            self.zero_run = 0;
        }
        self.mcu_part += 1;

        let y_parts = self.geometry.y_parts();
        let parts = self.geometry.parts();
        // Restart intervals count source MCUs, which are single blocks for greyscale images.
        let source_mcu_done = if self.geometry.greyscale {
            self.mcu_part <= y_parts
        } else {
            self.mcu_part == parts
        };

        if self.geometry.greyscale && self.mcu_part == y_parts {
            for component in 1..=2 {
                self.emit_flat_block(component)?;
            }
            self.mcu_part = parts;
        }

        if self.mcu_part == parts {
            self.mcu_part = 0;
            self.mcu_id += 1;
            if self.mcu_id >= self.geometry.mcu_count {
                self.writer.sync_to_byte();
                self.state = ScanState::EndOfImage;
                return Ok(StepStatus::EndOfImage);
            }
            if self.direction == Direction::Encoding && self.packet_mcu.is_none() {
                // The first MCU of each packet is byte aligned and starts a reset block.
                self.writer.sync_to_byte();
                self.next_reset_mcu = self.mcu_id;
                self.packet_mcu = Some((self.mcu_id, self.writer.len_with_pending()));
            }
        }

        self.component = self.geometry.component_of(self.mcu_part);
        self.ac_part = 0;

        if source_mcu_done && self.restart_interval > 0 {
            self.restart_countdown = self.restart_countdown.saturating_sub(1);
            if self.restart_countdown == 0 {
                self.state = ScanState::Marker;
                return Ok(StepStatus::FeedMe);
            }
        }
        Ok(StepStatus::Continue)
    }

    /// Writes flat blocks from the current position up to the start of MCU `next_mcu` and
    /// leaves the engine at the start of that MCU.
    pub fn fill_gap(&mut self, next_mcu: u32) -> Result<()> {
        let parts = self.geometry.parts();
        if self.mcu_part > 0 || self.ac_part > 0 {
            if self.ac_part > 0 {
                self.emit(TableClass::Ac, self.component, 0, 0)?;
                self.mcu_part += 1;
            }
            for part in self.mcu_part..parts {
                self.emit_flat_block(self.geometry.component_of(part))?;
            }
            self.mcu_id += 1;
        }
        while self.mcu_id < next_mcu {
            for part in 0..parts {
                self.emit_flat_block(self.geometry.component_of(part))?;
            }
            self.mcu_id += 1;
        }
        self.mcu_part = 0;
        self.component = 0;
        self.ac_part = 0;
        self.zero_run = 0;
        self.state = ScanState::Huffman;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::tables::Quality;

    fn decoder(geometry: Geometry) -> Transcoder {
        let tables = TableSet::standard(Quality::default()).unwrap();
        let mut t = Transcoder::new(
            Direction::Decoding,
            tables.clone(),
            tables,
            BitWriter::new(usize::MAX),
        );
        t.geometry = geometry;
        t
    }

    fn run(t: &mut Transcoder, input: &[u8]) -> StepStatus {
        for &b in input {
            t.reader.push_byte(b).unwrap();
            loop {
                match t.step().unwrap() {
                    StepStatus::Continue | StepStatus::BufferFull => (),
                    StepStatus::FeedMe => break,
                    StepStatus::EndOfImage => return StepStatus::EndOfImage,
                }
            }
        }
        StepStatus::FeedMe
    }

    #[test]
    fn flat_mcu_bits() {
        let mut t = decoder(Geometry::new(16, 16, McuMode::H2V2, false));
        t.fill_gap(1).unwrap();
        t.writer.sync_to_byte();
        // Four luma blocks of DC "00" + EOB "1010", then two chroma blocks of "00" + "00".
        assert_eq!(t.writer.bytes(), &[0x28, 0xA2, 0x8A, 0x00]);
        assert_eq!(t.mcu_id, 1);
    }

    #[test]
    fn decoding_flat_data_reproduces_it() {
        let geometry = Geometry::new(32, 16, McuMode::H2V2, false);
        let mut flat = decoder(geometry);
        flat.fill_gap(2).unwrap();
        flat.writer.sync_to_byte();
        let input = flat.writer.bytes().to_vec();

        let mut t = decoder(geometry);
        assert_eq!(run(&mut t, &input), StepStatus::EndOfImage);
        assert_eq!(t.writer.bytes(), &input[..]);
        assert_eq!(t.state, ScanState::EndOfImage);
    }

    #[test]
    fn partial_mcu_is_closed() {
        let geometry = Geometry::new(16, 16, McuMode::H1V1, false);
        let mut t = decoder(geometry);
        // DC category 1 with value +1 ("010" "1"), then one AC coefficient 0x01 ("00" "1"),
        // padded with a single one bit.
        assert_eq!(run(&mut t, &[0b0101_0011]), StepStatus::FeedMe);
        assert_eq!(t.mcu_id, 0);
        assert_eq!(t.ac_part, 2);
        t.fill_gap(4).unwrap();
        assert_eq!(t.mcu_id, 4);
        assert_eq!(t.mcu_part, 0);
        assert_eq!(t.state, ScanState::Huffman);
    }

    #[test]
    fn reset_blocks_carry_absolute_dc() {
        let geometry = Geometry::new(16, 16, McuMode::H2V2, false);
        let mut t = decoder(geometry);
        t.dc[0] = 5;
        // MCU 0 is a reset MCU: the incoming value is absolute.
        t.code_dc(7).unwrap();
        assert_eq!(t.dc[0], 7);
        t.mcu_part = 1;
        t.code_dc(-2).unwrap();
        assert_eq!(t.dc[0], 5);
    }
}
