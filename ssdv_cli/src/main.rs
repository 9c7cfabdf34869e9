// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use ssdv::{EncoderOptions, PacketType, Quality};
use ssdv_cli::dec::{DecodeOptions, decode};
use ssdv_cli::{enc, info, read_input, write_output};

#[derive(Parser)]
#[command(version, about = "Slow Scan Digital Video: JPEG images over lossy packet links")]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a baseline JPEG into SSDV packets
    Encode {
        /// Leave out the Reed-Solomon parity
        #[arg(short = 'n', long)]
        no_fec: bool,

        /// Callsign of the sender: up to 6 characters of A-Z, 0-9 and space
        #[arg(short, long, default_value = "")]
        callsign: String,

        /// Image ID (0-255)
        #[arg(short, long, default_value_t = 0)]
        image_id: u8,

        /// Quality level 0-7 the image is requantised to
        #[arg(short, long, default_value_t = 4, allow_negative_numbers = true)]
        quality: i32,

        /// Packet length in bytes
        #[arg(short = 'l', long, default_value_t = 256)]
        length: usize,

        /// Input JPEG file, `-` for stdin
        input: Option<PathBuf>,

        /// Output packet file, `-` for stdout
        output: Option<PathBuf>,
    },
    /// Decode SSDV packets into a JPEG
    Decode {
        /// Packet length in bytes
        #[arg(short = 'l', long, default_value_t = 256)]
        length: usize,

        /// For testing, drop this percentage of the packets before decoding
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=100))]
        drop: u32,

        /// Seed of the packet drop test
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Input packet file, `-` for stdin
        input: Option<PathBuf>,

        /// Output JPEG file, `-` for stdout
        output: Option<PathBuf>,
    },
    /// Print the header of every valid packet
    Info {
        /// Packet length in bytes
        #[arg(short = 'l', long, default_value_t = 256)]
        length: usize,

        /// Input packet file, `-` for stdin
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    #[cfg(feature = "tracing-subscriber")]
    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }

    match Opt::parse().command {
        Command::Encode {
            no_fec,
            callsign,
            image_id,
            quality,
            length,
            input,
            output,
        } => {
            let options = EncoderOptions {
                packet_type: if no_fec {
                    PacketType::NoFec
                } else {
                    PacketType::Normal
                },
                callsign,
                image_id,
                quality: Quality::new(quality),
                packet_size: length,
            };
            let jpeg = read_input(input.as_deref())?;
            let packets = enc::encode(&jpeg, options)?;
            write_output(output.as_deref(), &packets)?;
            eprintln!("Wrote {} packets", packets.len() / length);
        }
        Command::Decode {
            length,
            drop,
            seed,
            input,
            output,
        } => {
            if drop > 0 {
                eprintln!("*** NOTE: Drop test enabled: {drop}% ***");
            }
            let data = read_input(input.as_deref())?;
            let options = DecodeOptions {
                packet_size: length,
                drop_percent: drop,
                seed,
            };
            let (jpeg, stats) = decode(&data, &options)?;
            write_output(output.as_deref(), &jpeg)?;
            eprintln!(
                "Read {} packets ({} dropped, {} ignored, {} bytes corrected, {} bytes skipped)",
                stats.decoded, stats.dropped, stats.ignored, stats.corrected, stats.skipped
            );
        }
        Command::Info { length, input } => {
            let data = read_input(input.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            let count = info::describe(&data, length, &mut stdout)?;
            eprintln!("{count} packets");
        }
    }
    Ok(())
}
