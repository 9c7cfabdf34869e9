// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};

pub mod dec;
pub mod enc;
pub mod info;

/// Reads a whole input file, or stdin when the path is absent or `-`.
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::read(path).wrap_err_with(|| format!("Cannot read {}", path.display()))
        }
        _ => {
            let mut data = vec![];
            std::io::stdin()
                .lock()
                .read_to_end(&mut data)
                .wrap_err("Cannot read from stdin")?;
            Ok(data)
        }
    }
}

/// Writes to an output file, or stdout when the path is absent or `-`.
pub fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::write(path, data).wrap_err_with(|| format!("Cannot write {}", path.display()))
        }
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data).wrap_err("Cannot write to stdout")?;
            stdout.flush().wrap_err("Cannot write to stdout")
        }
    }
}
