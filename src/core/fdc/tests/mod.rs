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

//! Tests for the 8271 floppy disc controller

mod seek;
mod transfer;

use super::*;
use crate::core::disc::format::{
    crc_add_byte, crc_add_run, crc_init, DATA_MARK_DATA_PATTERN,
    DELETED_DATA_MARK_DATA_PATTERN, ID_MARK_DATA_PATTERN, MARK_CLOCK_PATTERN,
};
use crate::core::timing::TimerWheel;
use crate::core::tool::DiscTool;

/// One emulated revolution in wheel ticks (3125 bytes x 64 µs)
pub(super) const REVOLUTION: u64 = 3125 * 128;

/// Fresh controller and wheel
pub(super) fn new_fdc() -> (TimerWheel, IntelFdc) {
    let mut wheel = TimerWheel::new();
    let fdc = IntelFdc::new(&mut wheel);
    (wheel, fdc)
}

/// Write a command byte followed by its parameters
pub(super) fn issue_command(
    fdc: &mut IntelFdc,
    wheel: &mut TimerWheel,
    command: u8,
    params: &[u8],
) {
    fdc.write(wheel, ADDR_COMMAND, command);
    for &param in params {
        fdc.write(wheel, ADDR_PARAMETER, param);
    }
}

/// Program sane drive timings and mark all tracks good, the way a filing
/// system ROM does at boot
///
/// Step rate 2 ms, no settle, head load 4 ms, never auto-unload.
pub(super) fn specify_timings(fdc: &mut IntelFdc, wheel: &mut TimerWheel) {
    issue_command(fdc, wheel, 0x75, &[reg::HEAD_STEP_RATE, 1, 0, 0xF1]);
    issue_command(fdc, wheel, 0x75, &[reg::BAD_TRACK_1_DRIVE_0, 0xFF, 0xFF, 0]);
    issue_command(fdc, wheel, 0x75, &[reg::BAD_TRACK_1_DRIVE_1, 0xFF, 0xFF, 0]);
}

/// Load the head of drive 0 and restore the ready latch, the mandatory
/// preamble before data commands
pub(super) fn spin_up_drive_0(fdc: &mut IntelFdc, wheel: &mut TimerWheel) {
    // Disable automatic head unload first, or the READ_DRIVE_STATUS below
    // spins the drive straight back down when it completes.
    issue_command(fdc, wheel, 0x3A, &[reg::HEAD_LOAD_UNLOAD, 0xF1]);
    // Manual head load through the drive output pseudo-register.
    issue_command(fdc, wheel, 0x7A, &[reg::DRIVE_OUT, 0x48]);
    // READ_DRIVE_STATUS restores the latched ready lines.
    issue_command(fdc, wheel, 0x6C, &[]);
    let _ = fdc.read(ADDR_RESULT);
    let _ = fdc.nmi_mut().take_edge();
}

/// Advance emulated time, servicing the controller every half byte slot
pub(super) fn run_with(
    fdc: &mut IntelFdc,
    wheel: &mut TimerWheel,
    ticks: u64,
    mut service: impl FnMut(&mut IntelFdc, &mut TimerWheel),
) {
    let mut remaining = ticks;
    while remaining > 0 {
        let chunk = remaining.min(64);
        wheel.pending_ticks += chunk;
        fdc.tick(wheel, chunk);
        let fired = wheel.run_timers();
        fdc.process_timers(wheel, &fired);
        service(fdc, wheel);
        remaining -= chunk;
    }
}

/// Advance emulated time with no host interaction
pub(super) fn run(fdc: &mut IntelFdc, wheel: &mut TimerWheel, ticks: u64) {
    run_with(fdc, wheel, ticks, |_, _| {});
}

/// Run until the controller goes non-busy, collecting surfaced data bytes
///
/// Returns the bytes read from the data register.
pub(super) fn run_command_collecting(
    fdc: &mut IntelFdc,
    wheel: &mut TimerWheel,
    max_ticks: u64,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut remaining = max_ticks;
    while remaining > 0 && fdc.read(ADDR_STATUS) & 0x80 != 0 {
        let chunk = remaining.min(64);
        wheel.pending_ticks += chunk;
        fdc.tick(wheel, chunk);
        let fired = wheel.run_timers();
        fdc.process_timers(wheel, &fired);
        if fdc.read(ADDR_STATUS) & 0x04 != 0 {
            bytes.push(fdc.read(ADDR_DATA));
        }
        remaining -= chunk;
    }
    bytes
}

/// Lay a complete FM sector down on a drive's disc with the tool
pub(super) fn write_sector_on_drive(
    fdc: &mut IntelFdc,
    drive: usize,
    track: u32,
    byte_pos: u32,
    header: [u8; 4],
    deleted: bool,
    fill: u8,
) {
    let disc = fdc.drive_mut(drive).disc_mut().unwrap();
    let mut tool = DiscTool::new(disc);
    tool.set_track(track);
    tool.set_byte_pos(byte_pos);

    tool.write_fm_data(None, &[0x00; 6]);
    tool.write_fm_data(Some(&[MARK_CLOCK_PATTERN]), &[ID_MARK_DATA_PATTERN]);
    let mut crc = crc_init();
    crc = crc_add_byte(crc, ID_MARK_DATA_PATTERN);
    crc = crc_add_run(crc, &header);
    tool.write_fm_data(None, &header);
    tool.write_fm_data(None, &[(crc >> 8) as u8, (crc & 0xFF) as u8]);

    tool.write_fm_data(None, &[0xFF; 11]);
    tool.write_fm_data(None, &[0x00; 6]);

    let mark = if deleted {
        DELETED_DATA_MARK_DATA_PATTERN
    } else {
        DATA_MARK_DATA_PATTERN
    };
    tool.write_fm_data(Some(&[MARK_CLOCK_PATTERN]), &[mark]);
    let size = (128u32 << (header[3] & 0x07)).min(2048) as usize;
    let payload = vec![fill; size];
    let mut crc = crc_init();
    crc = crc_add_byte(crc, mark);
    crc = crc_add_run(crc, &payload);
    tool.write_fm_data(None, &payload);
    tool.write_fm_data(None, &[(crc >> 8) as u8, (crc & 0xFF) as u8]);
}
