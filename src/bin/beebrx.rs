// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 beebrx contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Disc subsystem demonstration driver
//!
//! Formats a track through the real 8271 command path (index-pulse
//! synchronised, header bytes fed through the data register on demand),
//! then scans the resulting surface with the pulse-level tool and prints
//! what it found.

use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use beebrx::core::config::MachineConfig;
use beebrx::core::error::Result;
use beebrx::core::system::System;
use beebrx::core::tool::DiscTool;

/// BBC Micro disc and JIT emulation core
#[derive(Parser)]
#[command(name = "beebrx")]
#[command(about = "BBC Micro disc subsystem demo driver", long_about = None)]
struct Args {
    /// Optional machine configuration (TOML)
    #[arg(short = 'c', long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format a track via the 8271, then scan and list its sectors
    FormatDemo {
        /// Track to format
        #[arg(short = 't', long, default_value = "0")]
        track: u8,

        /// Number of 256-byte sectors
        #[arg(short = 's', long, default_value = "10")]
        sectors: u8,

        /// Emit the sector list as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct SectorReport {
    track: u8,
    side: u8,
    sector: u8,
    size: u32,
    header_crc_ok: bool,
    data_crc_ok: bool,
    deleted: bool,
}

/// Drive the FDC through one register write sequence
fn command(system: &mut System, command: u8, params: &[u8]) {
    system.fdc_write(0, command);
    for &param in params {
        system.fdc_write(1, param);
    }
}

/// Run the machine until the FDC goes idle, feeding `data` bytes on demand
fn run_feeding(system: &mut System, mut data: impl Iterator<Item = u8>) {
    // Generous bound: ten revolutions of the disc.
    let mut budget = 10 * 3125 * 128 / 64;
    while system.fdc_read(0) & 0x80 != 0 && budget > 0 {
        system.step(64);
        if system.fdc_read(0) & 0x04 != 0 {
            if let Some(byte) = data.next() {
                system.fdc_write(4, byte);
            }
        }
        budget -= 1;
    }
}

fn format_demo(system: &mut System, track: u8, sectors: u8, json: bool) -> Result<()> {
    info!("formatting track {track}: {sectors} sectors of 256 bytes");

    // Drive timings and good tracks, as a filing system ROM would set up.
    command(system, 0x35, &[0x0D, 1, 0, 0xF1]);
    command(system, 0x35, &[0x10, 0xFF, 0xFF, 0]);
    // Load the head and restore the ready latch.
    command(system, 0x3A, &[0x23, 0x48]);
    command(system, 0x6C, &[]);
    let _ = system.fdc_read(1);

    // FORMAT: track, gap3, size/sectors, gap5 (none), gap1.
    command(system, 0x63, &[track, 16, (1 << 5) | sectors, 0, 16]);
    let headers: Vec<u8> = (1..=sectors)
        .flat_map(|sector| [track, 0, sector, 1])
        .collect();
    run_feeding(system, headers.into_iter());

    let result = system.fdc_read(1);
    info!("format result ${result:02X}");

    // Now scan the surface the way the disc tool sees it.
    let disc = system
        .fdc_mut()
        .drive_mut(0)
        .disc_mut()
        .expect("drive 0 has a disc");
    let mut tool = DiscTool::new(disc);
    tool.set_track(u32::from(track));
    tool.find_sectors(false)?;

    let reports: Vec<SectorReport> = tool
        .sectors()
        .iter()
        .map(|sector| SectorReport {
            track: sector.header_bytes[0],
            side: sector.header_bytes[1],
            sector: sector.header_bytes[2],
            size: sector.sector_size(),
            header_crc_ok: !sector.has_header_crc_error,
            data_crc_ok: !sector.has_data_crc_error,
            deleted: sector.is_deleted,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports).expect("serializable"));
    } else {
        println!("track {track}: {} sectors", reports.len());
        for report in &reports {
            println!(
                "  sector {:3}  size {:4}  header crc {}  data crc {}{}",
                report.sector,
                report.size,
                if report.header_crc_ok { "ok " } else { "BAD" },
                if report.data_crc_ok { "ok " } else { "BAD" },
                if report.deleted { "  deleted" } else { "" },
            );
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env file is normal.
        log::debug!("dotenv: {e}");
    }
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("beebrx v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut system = match &args.config {
        Some(path) => {
            info!("loading configuration from {path}");
            System::with_config(&MachineConfig::load(path)?)
        }
        None => {
            let mut system = System::new();
            system.fdc_mut().insert_blank_disc(0, false);
            system
        }
    };

    match args.command {
        Command::FormatDemo {
            track,
            sectors,
            json,
        } => format_demo(&mut system, track, sectors, json),
    }
}
