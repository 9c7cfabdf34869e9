// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use thiserror::Error;

use crate::tables::MAX_DIMENSION;

/// Broad classification of an [`Error`], used by callers to decide whether a failure is
/// fatal for the whole transcode or only for the current packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments when creating a session.
    InvalidConfig,
    /// The JPEG uses a feature outside the supported baseline profile.
    UnsupportedImage,
    /// Corrupt or malformed JPEG or packet structure.
    ProtocolError,
    /// A packet failed its CRC and could not be repaired by FEC.
    Uncorrectable,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid packet size {0}: must be at most 256 with at least 2 payload bytes")]
    InvalidPacketSize(usize),
    #[error("Invalid callsign {0:?}: up to 6 characters of A-Z, 0-9 and space")]
    InvalidCallsign(String),
    #[error("Progressive JPEG images are not supported")]
    Progressive,
    #[error("Unsupported frame type (marker {0:04X}), only baseline Huffman coding is supported")]
    UnsupportedFrame(u16),
    #[error("Invalid precision {0}, the image must have a precision of 8")]
    InvalidPrecision(u8),
    #[error("Invalid number of components {0}, the image must have 1 or 3 components")]
    InvalidComponentCount(u8),
    #[error("Image size {0}x{1} is too large, maximum is {max}x{max}", max = MAX_DIMENSION)]
    ImageTooLarge(u16, u16),
    #[error("Invalid image size {0}x{1}, dimensions must be non-zero multiples of 16")]
    InvalidDimensions(u16, u16),
    #[error("Unsupported sampling factor {factor:02X} for component {component}")]
    UnsupportedSampling { component: u8, factor: u8 },
    #[error("Too many MCU blocks: {0}, maximum is 65535")]
    TooManyMcus(usize),
    #[error("Chroma components must share their Huffman and quantisation tables")]
    UnsupportedTableLayout,
    #[error("Quantisation table {0} uses 16-bit precision")]
    UnsupportedQuantPrecision(u8),
    #[error("Unsupported scan: start {0}, end {1}, approximation {2:02X}")]
    UnsupportedScan(u8, u8, u8),
    #[error("Invalid length {1} for marker {0:04X}")]
    InvalidMarkerLength(u16, usize),
    #[error("Invalid table class/id {0:02X}")]
    InvalidTableId(u8),
    #[error("Table storage overflow: {0} bytes needed, {1} available")]
    TableOverflow(usize, usize),
    #[error("The image is missing one or more DQT tables")]
    MissingQuantTable,
    #[error("The image is missing one or more DHT tables")]
    MissingHuffmanTable,
    #[error("Scan started before the frame header")]
    MissingFrame,
    #[error("End of image reached before any scan data")]
    MissingScan,
    #[error("Scan has {0} components, frame has {1}")]
    ScanComponentMismatch(u8, u8),
    #[error("Scan component {0} is not a frame component in frame order")]
    UnknownScanComponent(u8),
    #[error("Bit buffer overflow with {0} bits pending")]
    BitBufferOverflow(usize),
    #[error("Invalid Huffman code")]
    InvalidHuffman,
    #[error("No Huffman code for symbol {0:02X}")]
    MissingHuffmanSymbol(u8),
    #[error("Unexpected marker FF{0:02X} inside scan data")]
    UnexpectedMarker(u8),
    #[error("Coefficient index {0} out of range")]
    CoefficientOverflow(u8),
    #[error("Packet too short: {0} bytes, expected {1}")]
    PacketTooShort(usize, usize),
    #[error("Unknown packet type {0:02X}")]
    UnknownPacketType(u8),
    #[error("No packets have been decoded")]
    NothingDecoded,
    #[error("Packet is corrupt and could not be corrected")]
    Uncorrectable,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            InvalidPacketSize(_) | InvalidCallsign(_) => ErrorKind::InvalidConfig,
            Progressive
            | UnsupportedFrame(_)
            | InvalidPrecision(_)
            | InvalidComponentCount(_)
            | ImageTooLarge(..)
            | InvalidDimensions(..)
            | UnsupportedSampling { .. }
            | TooManyMcus(_)
            | UnsupportedTableLayout
            | UnsupportedQuantPrecision(_)
            | UnsupportedScan(..)
            | ScanComponentMismatch(..) => ErrorKind::UnsupportedImage,
            Uncorrectable => ErrorKind::Uncorrectable,
            InvalidMarkerLength(..)
            | InvalidTableId(_)
            | TableOverflow(..)
            | MissingQuantTable
            | MissingHuffmanTable
            | MissingFrame
            | MissingScan
            | UnknownScanComponent(_)
            | BitBufferOverflow(_)
            | InvalidHuffman
            | MissingHuffmanSymbol(_)
            | UnexpectedMarker(_)
            | CoefficientOverflow(_)
            | PacketTooShort(..)
            | UnknownPacketType(_)
            | NothingDecoded => ErrorKind::ProtocolError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn messages_name_the_limits() {
        assert_eq!(
            Error::ImageTooLarge(4096, 16).to_string(),
            "Image size 4096x16 is too large, maximum is 4080x4080"
        );
        assert_eq!(
            Error::UnsupportedScan(0, 63, 0x10).to_string(),
            "Unsupported scan: start 0, end 63, approximation 10"
        );
        assert_eq!(
            Error::ImageTooLarge(4096, 16).kind(),
            ErrorKind::UnsupportedImage
        );
    }
}
