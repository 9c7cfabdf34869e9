// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Baseline JPEG entropy coding: canonical Huffman codes and the magnitude categories used for
//! DC differences and AC coefficients, and the engine that re-codes scan data between two
//! table sets.

pub mod coefficients;
pub mod huffman;
pub(crate) mod transcoder;

/// AC symbol ending a block.
pub const EOB: u8 = 0x00;
/// AC symbol for a run of 16 zero coefficients.
pub const ZRL: u8 = 0xF0;
