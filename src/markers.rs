// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! JPEG marker segments: parsing and validation of the segments a baseline source image
//! carries, and synthesis of the fixed header written in front of decoded scan data.

use crate::{
    bit_writer::BitWriter,
    entropy_coding::huffman,
    error::{Error, Result},
    frame::{Geometry, McuMode},
    tables::{ComponentGroup, JFIF_APP0, MAX_DIMENSION, SCAN_HEADER, TableClass, TableSet},
};

pub const TEM: u16 = 0xFF01;
pub const SOF0: u16 = 0xFFC0;
pub const SOF1: u16 = 0xFFC1;
pub const SOF2: u16 = 0xFFC2;
pub const DHT: u16 = 0xFFC4;
pub const JPG: u16 = 0xFFC8;
pub const DAC: u16 = 0xFFCC;
pub const RST0: u16 = 0xFFD0;
pub const RST7: u16 = 0xFFD7;
pub const SOI: u16 = 0xFFD8;
pub const EOI: u16 = 0xFFD9;
pub const SOS: u16 = 0xFFDA;
pub const DQT: u16 = 0xFFDB;
pub const DRI: u16 = 0xFFDD;
pub const APP0: u16 = 0xFFE0;
pub const COM: u16 = 0xFFFE;

const DQT_TABLE_LEN: usize = 65;

/// How the byte stream continues after a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// No length or data follows.
    Standalone,
    /// A segment the transcoder needs to read.
    Segment,
    /// A segment whose data is skipped.
    Ignored,
    /// Not a marker (yet): keep scanning.
    None,
}

pub fn classify(marker: u16) -> MarkerKind {
    match marker {
        TEM | RST0..=EOI => MarkerKind::Standalone,
        SOF0 | SOF1 | SOS | DHT | DQT | DRI => MarkerKind::Segment,
        JPG | DAC => MarkerKind::Ignored,
        // Other frame types are rejected once their length has been read.
        0xFFC2..=0xFFCF => MarkerKind::Segment,
        0xFFC0..=COM => MarkerKind::Ignored,
        _ => MarkerKind::None,
    }
}

/// Frame component as declared in SOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub sampling: u8,
    pub quant_table: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub geometry: Geometry,
    pub components: Vec<FrameComponent>,
}

impl FrameHeader {
    pub fn quant_table(&self, group: ComponentGroup) -> Option<u8> {
        self.components
            .get(group as usize)
            .map(|component| component.quant_table)
    }
}

/// Validates a SOFn segment body.
pub fn parse_frame(marker: u16, data: &[u8]) -> Result<FrameHeader> {
    match marker {
        SOF0 | SOF1 => (),
        SOF2 => return Err(Error::Progressive),
        _ => return Err(Error::UnsupportedFrame(marker)),
    }
    if data.len() < 6 {
        return Err(Error::InvalidMarkerLength(marker, data.len()));
    }
    let precision = data[0];
    let height = u16::from_be_bytes([data[1], data[2]]);
    let width = u16::from_be_bytes([data[3], data[4]]);
    let num_components = data[5];
    if precision != 8 {
        return Err(Error::InvalidPrecision(precision));
    }
    if num_components != 1 && num_components != 3 {
        return Err(Error::InvalidComponentCount(num_components));
    }
    if data.len() != 6 + 3 * num_components as usize {
        return Err(Error::InvalidMarkerLength(marker, data.len()));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::ImageTooLarge(width, height));
    }
    if width == 0 || height == 0 || width % 16 != 0 || height % 16 != 0 {
        return Err(Error::InvalidDimensions(width, height));
    }

    let components: Vec<FrameComponent> = data[6..]
        .chunks_exact(3)
        .map(|c| FrameComponent {
            id: c[0],
            sampling: c[1],
            quant_table: c[2],
        })
        .collect();

    let mut mode = McuMode::H1V1;
    for (i, component) in components.iter().enumerate() {
        if i == 0 {
            mode = McuMode::from_sampling(component.sampling).ok_or(
                Error::UnsupportedSampling {
                    component: component.id,
                    factor: component.sampling,
                },
            )?;
        } else if component.sampling != 0x11 {
            return Err(Error::UnsupportedSampling {
                component: component.id,
                factor: component.sampling,
            });
        }
        if component.quant_table > 3 {
            return Err(Error::InvalidTableId(component.quant_table));
        }
    }
    if num_components == 3 && components[1].quant_table != components[2].quant_table {
        return Err(Error::UnsupportedTableLayout);
    }

    let greyscale = num_components == 1;
    if greyscale {
        // Single component scans are coded block by block; pairs of blocks become 16x8 MCUs
        // with flat chroma.
        mode = McuMode::H2V1;
    }
    let geometry = Geometry::new(width, height, mode, greyscale);
    if geometry.mcu_count > u16::MAX as u32 {
        return Err(Error::TooManyMcus(geometry.mcu_count as usize));
    }
    Ok(FrameHeader {
        geometry,
        components,
    })
}

/// Huffman table ids (DC, AC) per component group, as selected by SOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanHeader {
    pub luma: (u8, u8),
    pub chroma: Option<(u8, u8)>,
}

/// Validates a SOS segment body against the frame it belongs to.
pub fn parse_scan(data: &[u8], frame: &FrameHeader) -> Result<ScanHeader> {
    let num_components = *data
        .first()
        .ok_or(Error::InvalidMarkerLength(SOS, data.len()))?;
    if data.len() != 1 + 2 * num_components as usize + 3 {
        return Err(Error::InvalidMarkerLength(SOS, data.len()));
    }
    if num_components as usize != frame.components.len() {
        return Err(Error::ScanComponentMismatch(
            num_components,
            frame.components.len() as u8,
        ));
    }
    let entries = &data[1..1 + 2 * num_components as usize];
    // Interleaved scans list the frame's components in frame order.
    for (entry, component) in entries.chunks_exact(2).zip(&frame.components) {
        if entry[0] != component.id {
            return Err(Error::UnknownScanComponent(entry[0]));
        }
    }
    let selectors: Vec<(u8, u8)> = entries
        .chunks_exact(2)
        .map(|c| (c[1] >> 4, c[1] & 0x0F))
        .collect();
    for &(dc, ac) in &selectors {
        if dc > 3 || ac > 3 {
            return Err(Error::InvalidTableId(dc << 4 | ac));
        }
    }
    let spectral = &data[1 + 2 * num_components as usize..];
    if spectral != [0x00, 0x3F, 0x00] {
        return Err(Error::UnsupportedScan(spectral[0], spectral[1], spectral[2]));
    }
    let chroma = match selectors.as_slice() {
        [_, cb, cr] if cb != cr => return Err(Error::UnsupportedTableLayout),
        [_, cb, _] => Some(*cb),
        _ => None,
    };
    Ok(ScanHeader {
        luma: selectors[0],
        chroma,
    })
}

/// Splits a DHT segment body into its tables.
pub fn parse_dht(data: &[u8]) -> Result<Vec<&[u8]>> {
    let mut tables = Vec::new();
    let mut rest = data;
    while let Some(&class_id) = rest.first() {
        if class_id >> 4 > 1 || class_id & 0x0F > 3 {
            return Err(Error::InvalidTableId(class_id));
        }
        let len = huffman::table_len(rest)?;
        let (table, tail) = rest.split_at(len);
        tables.push(table);
        rest = tail;
    }
    if tables.is_empty() {
        return Err(Error::InvalidMarkerLength(DHT, data.len()));
    }
    Ok(tables)
}

/// Splits a DQT segment body into 65 byte tables.
pub fn parse_dqt(data: &[u8]) -> Result<Vec<&[u8]>> {
    if data.is_empty() || data.len() % DQT_TABLE_LEN != 0 {
        return Err(Error::InvalidMarkerLength(DQT, data.len()));
    }
    data.chunks_exact(DQT_TABLE_LEN)
        .map(|table| {
            let precision = table[0] >> 4;
            let id = table[0] & 0x0F;
            if precision != 0 {
                Err(Error::UnsupportedQuantPrecision(id))
            } else if id > 3 {
                Err(Error::InvalidTableId(table[0]))
            } else {
                Ok(table)
            }
        })
        .collect()
}

pub fn parse_dri(data: &[u8]) -> Result<u16> {
    match data {
        [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(Error::InvalidMarkerLength(DRI, data.len())),
    }
}

pub fn write_marker(writer: &mut BitWriter, marker: u16, data: &[u8]) {
    writer.push_bits(marker, 16);
    if !data.is_empty() {
        writer.push_bits((data.len() + 2) as u16, 16);
        writer.push_bytes(data);
    }
}

fn frame_body(geometry: &Geometry) -> [u8; 15] {
    let [h_hi, h_lo] = geometry.height.to_be_bytes();
    let [w_hi, w_lo] = geometry.width.to_be_bytes();
    [
        8,
        h_hi,
        h_lo,
        w_hi,
        w_lo,
        3,
        1,
        geometry.mode.sampling(),
        0x00,
        2,
        0x11,
        0x01,
        3,
        0x11,
        0x01,
    ]
}

/// Writes everything that precedes the scan data of a decoded image. Stuffing must be off.
pub fn write_headers(writer: &mut BitWriter, geometry: &Geometry, tables: &TableSet) -> Result<()> {
    write_marker(writer, SOI, &[]);
    write_marker(writer, APP0, &JFIF_APP0);
    for group in [ComponentGroup::Luma, ComponentGroup::Chroma] {
        let dqt = tables.dqt(group).ok_or(Error::MissingQuantTable)?;
        write_marker(writer, DQT, dqt);
    }
    write_marker(writer, SOF0, &frame_body(geometry));
    for group in [ComponentGroup::Luma, ComponentGroup::Chroma] {
        for class in [TableClass::Dc, TableClass::Ac] {
            let dht = tables.dht(class, group).ok_or(Error::MissingHuffmanTable)?;
            write_marker(writer, DHT, dht);
        }
    }
    write_marker(writer, SOS, &SCAN_HEADER);
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::ErrorKind;
    use crate::tables::{Quality, STD_DHT_AC_LUMA, STD_DHT_DC_LUMA, STD_DQT_LUMA};

    fn sof(width: u16, height: u16, components: &[(u8, u8, u8)]) -> Vec<u8> {
        let mut data = vec![8];
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.push(components.len() as u8);
        for &(id, sampling, tq) in components {
            data.extend_from_slice(&[id, sampling, tq]);
        }
        data
    }

    const YCBCR: [(u8, u8, u8); 3] = [(1, 0x22, 0), (2, 0x11, 1), (3, 0x11, 1)];

    #[test]
    fn classifies_markers() {
        assert_eq!(classify(SOI), MarkerKind::Standalone);
        assert_eq!(classify(RST0 + 3), MarkerKind::Standalone);
        assert_eq!(classify(DQT), MarkerKind::Segment);
        assert_eq!(classify(SOF2), MarkerKind::Segment);
        assert_eq!(classify(APP0 + 1), MarkerKind::Ignored);
        assert_eq!(classify(COM), MarkerKind::Ignored);
        assert_eq!(classify(0x12FF), MarkerKind::None);
        assert_eq!(classify(0xFFFF), MarkerKind::None);
    }

    #[test]
    fn frame_modes() {
        let frame = parse_frame(SOF0, &sof(320, 240, &YCBCR)).unwrap();
        assert_eq!(frame.geometry.mode, McuMode::H2V2);
        assert_eq!(frame.geometry.mcu_count, 300);
        assert_eq!(frame.quant_table(ComponentGroup::Chroma), Some(1));

        let frame = parse_frame(SOF1, &sof(32, 16, &[(1, 0x11, 0)])).unwrap();
        assert!(frame.geometry.greyscale);
        assert_eq!(frame.geometry.mode, McuMode::H2V1);
        assert_eq!(frame.geometry.mcu_count, 4);
    }

    #[test]
    fn frame_limits() {
        assert!(parse_frame(SOF0, &sof(4080, 4080, &YCBCR)).is_ok());
        for (width, height) in [(4096, 4080), (4080, 4096), (100, 16), (16, 0)] {
            let err = parse_frame(SOF0, &sof(width, height, &YCBCR)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedImage);
        }
        let too_many = [(1, 0x11, 0), (2, 0x11, 1), (3, 0x11, 1)];
        assert!(matches!(
            parse_frame(SOF0, &sof(4080, 4080, &too_many)),
            Err(Error::TooManyMcus(260100))
        ));
    }

    #[test]
    fn frame_rejections() {
        assert!(matches!(
            parse_frame(SOF2, &sof(16, 16, &YCBCR)),
            Err(Error::Progressive)
        ));
        assert!(matches!(
            parse_frame(0xFFC3, &sof(16, 16, &YCBCR)),
            Err(Error::UnsupportedFrame(0xFFC3))
        ));
        let mut data = sof(16, 16, &YCBCR);
        data[0] = 12;
        assert!(matches!(
            parse_frame(SOF0, &data),
            Err(Error::InvalidPrecision(12))
        ));
        assert!(matches!(
            parse_frame(SOF0, &sof(16, 16, &YCBCR[..2])),
            Err(Error::InvalidComponentCount(2))
        ));
        assert!(matches!(
            parse_frame(SOF0, &sof(16, 16, &[(1, 0x22, 0), (2, 0x21, 1), (3, 0x11, 1)])),
            Err(Error::UnsupportedSampling {
                component: 2,
                factor: 0x21
            })
        ));
        assert!(matches!(
            parse_frame(SOF0, &sof(16, 16, &[(1, 0x22, 0), (2, 0x11, 1), (3, 0x11, 2)])),
            Err(Error::UnsupportedTableLayout)
        ));
        let mut data = sof(16, 16, &YCBCR);
        data.pop();
        assert_eq!(
            parse_frame(SOF0, &data).unwrap_err().kind(),
            ErrorKind::ProtocolError
        );
    }

    #[test]
    fn scans() {
        let frame = parse_frame(SOF0, &sof(16, 16, &YCBCR)).unwrap();
        let scan = parse_scan(&SCAN_HEADER, &frame).unwrap();
        assert_eq!(scan.luma, (0, 0));
        assert_eq!(scan.chroma, Some((1, 1)));

        let progressive = [0x03, 0x01, 0x00, 0x02, 0x11, 0x03, 0x11, 0x01, 0x05, 0x00];
        assert!(matches!(
            parse_scan(&progressive, &frame),
            Err(Error::UnsupportedScan(1, 5, 0))
        ));
        let single = [0x01, 0x01, 0x00, 0x00, 0x3F, 0x00];
        assert!(matches!(
            parse_scan(&single, &frame),
            Err(Error::ScanComponentMismatch(1, 3))
        ));
        let split = [0x03, 0x01, 0x00, 0x02, 0x11, 0x03, 0x10, 0x00, 0x3F, 0x00];
        assert!(matches!(
            parse_scan(&split, &frame),
            Err(Error::UnsupportedTableLayout)
        ));
        let unknown = [0x03, 0x01, 0x00, 0x02, 0x11, 0x04, 0x11, 0x00, 0x3F, 0x00];
        assert!(matches!(
            parse_scan(&unknown, &frame),
            Err(Error::UnknownScanComponent(4))
        ));
        let swapped = [0x03, 0x01, 0x00, 0x03, 0x11, 0x02, 0x11, 0x00, 0x3F, 0x00];
        let err = parse_scan(&swapped, &frame).unwrap_err();
        assert!(matches!(err, Error::UnknownScanComponent(3)));
        assert_eq!(err.kind(), ErrorKind::ProtocolError);
    }

    #[test]
    fn table_segments() {
        let mut dht = STD_DHT_DC_LUMA.to_vec();
        dht.extend_from_slice(&STD_DHT_AC_LUMA);
        let tables = parse_dht(&dht).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1], &STD_DHT_AC_LUMA[..]);

        dht.pop();
        assert!(parse_dht(&dht).is_err());

        let mut bad = STD_DHT_DC_LUMA;
        bad[0] = 0x20;
        assert!(matches!(parse_dht(&bad), Err(Error::InvalidTableId(0x20))));

        assert_eq!(parse_dqt(&STD_DQT_LUMA).unwrap().len(), 1);
        let mut wide = STD_DQT_LUMA;
        wide[0] = 0x10;
        assert!(matches!(
            parse_dqt(&wide),
            Err(Error::UnsupportedQuantPrecision(0))
        ));
        assert!(parse_dqt(&STD_DQT_LUMA[..64]).is_err());

        assert_eq!(parse_dri(&[0x01, 0x02]).unwrap(), 0x0102);
        assert!(parse_dri(&[0x01]).is_err());
    }

    #[test]
    fn synthesized_headers() {
        let tables = TableSet::standard(Quality::default()).unwrap();
        let geometry = Geometry::new(64, 32, McuMode::H1V2, false);
        let mut writer = BitWriter::new(usize::MAX);
        write_headers(&mut writer, &geometry, &tables).unwrap();
        let bytes = writer.bytes();
        assert_eq!(&bytes[..4], &[0xFF, 0xD8, 0xFF, 0xE0]);
        // SOI, APP0, 2 DQT, SOF0, 4 DHT and SOS segments.
        let expected = 2 + (4 + 14) + 2 * (4 + 65) + (4 + 15) + 2 * (4 + 29) + 2 * (4 + 179) + (4 + 10);
        assert_eq!(bytes.len(), expected);
        let sof_at = bytes
            .windows(2)
            .position(|w| w == [0xFF, 0xC0])
            .unwrap();
        assert_eq!(
            &bytes[sof_at + 4..sof_at + 13],
            &[8, 0, 32, 0, 64, 3, 1, 0x12, 0]
        );
        assert_eq!(&bytes[bytes.len() - 14..bytes.len() - 12], &[0xFF, 0xDA]);
    }
}
