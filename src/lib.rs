// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]
pub mod bit_reader;
pub mod bit_writer;
pub mod callsign;
pub mod decode;
pub mod encode;
pub mod entropy_coding;
pub mod error;
pub mod frame;
pub mod markers;
pub mod packet;
pub mod recovery;
pub mod reed_solomon;
pub mod tables;
pub mod util;


pub use decode::{DecodeStatus, Decoder};
pub use encode::{EncodeStatus, Encoder, EncoderOptions};
pub use packet::{PacketInfo, PacketType, decode_header, validate_packet};
pub use tables::Quality;
