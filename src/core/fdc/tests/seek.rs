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

//! Tests for 8271 seek sequencing

use super::*;

fn seek_ready_fdc() -> (TimerWheel, IntelFdc) {
    let (mut wheel, mut fdc) = new_fdc();
    fdc.insert_blank_disc(0, false);
    specify_timings(&mut fdc, &mut wheel);
    spin_up_drive_0(&mut fdc, &mut wheel);
    (wheel, fdc)
}

fn seek_to(fdc: &mut IntelFdc, wheel: &mut TimerWheel, track: u8) {
    issue_command(fdc, wheel, 0x69, &[track]);
    // Generous bound: 255 steps at 2 ms plus settle.
    run(fdc, wheel, 600 * 2000);
    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0, "seek still busy");
}

#[test]
fn test_seek_steps_to_target() {
    let (mut wheel, mut fdc) = seek_ready_fdc();
    seek_to(&mut fdc, &mut wheel, 20);

    assert_eq!(fdc.drive(0).get_track(), 20);
    assert_eq!(fdc.read(ADDR_RESULT), 0);

    // The per-drive track register follows.
    issue_command(&mut fdc, &mut wheel, 0x3D, &[reg::TRACK_DRIVE_0]);
    assert_eq!(fdc.read(ADDR_RESULT), 20);
}

#[test]
fn test_seek_back_to_zero_uses_trk0_line() {
    let (mut wheel, mut fdc) = seek_ready_fdc();
    seek_to(&mut fdc, &mut wheel, 15);

    // Corrupt the track register: seek-to-0 must still terminate, because
    // it steps until the drive's TRK0 line asserts rather than counting.
    issue_command(&mut fdc, &mut wheel, 0x3A, &[reg::TRACK_DRIVE_0, 3]);
    seek_to(&mut fdc, &mut wheel, 0);

    assert_eq!(fdc.drive(0).get_track(), 0);
    assert_eq!(fdc.read(ADDR_RESULT), 0);
}

#[test]
fn test_seek_same_track_skips_step_phase() {
    let (mut wheel, mut fdc) = seek_ready_fdc();
    seek_to(&mut fdc, &mut wheel, 7);

    // Second seek to the same track: no steps, no settle, synchronous.
    issue_command(&mut fdc, &mut wheel, 0x69, &[7]);
    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0);
    assert_eq!(fdc.drive(0).get_track(), 7);
}

#[test]
fn test_bad_track_registers_shift_physical_target() {
    let (mut wheel, mut fdc) = seek_ready_fdc();

    // One bad track at or below the target adds one physical step.
    issue_command(&mut fdc, &mut wheel, 0x3A, &[reg::BAD_TRACK_1_DRIVE_0, 5]);
    seek_to(&mut fdc, &mut wheel, 10);
    assert_eq!(fdc.drive(0).get_track(), 11);
}

#[test]
fn test_seek_sets_low_head_current_on_inner_tracks() {
    let (mut wheel, mut fdc) = seek_ready_fdc();

    seek_to(&mut fdc, &mut wheel, 50);
    assert!(fdc.drive_out().contains(DriveOut::LOW_HEAD_CURRENT));

    seek_to(&mut fdc, &mut wheel, 10);
    assert!(!fdc.drive_out().contains(DriveOut::LOW_HEAD_CURRENT));
}

#[test]
fn test_single_actuator_mode_tracks_both_drives() {
    let (mut wheel, mut fdc) = seek_ready_fdc();

    issue_command(&mut fdc, &mut wheel, 0x3A, &[reg::MODE, mode::SINGLE_ACTUATOR]);
    seek_to(&mut fdc, &mut wheel, 12);

    issue_command(&mut fdc, &mut wheel, 0x3D, &[reg::TRACK_DRIVE_1]);
    assert_eq!(fdc.read(ADDR_RESULT), 12);
}

#[test]
fn test_seek_step_timing() {
    let (mut wheel, mut fdc) = seek_ready_fdc();

    // 5 steps at step rate 1 (2 ms units): busy for ~10 ms.
    issue_command(&mut fdc, &mut wheel, 0x69, &[5]);
    run(&mut fdc, &mut wheel, 8 * 2000);
    assert_ne!(fdc.read(ADDR_STATUS) & 0x80, 0, "mid-seek");

    run(&mut fdc, &mut wheel, 4 * 2000);
    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0, "seek over");
    assert_eq!(fdc.drive(0).get_track(), 5);
}

#[test]
fn test_seek_without_ready_drive_fails() {
    let (mut wheel, mut fdc) = new_fdc();
    fdc.insert_blank_disc(0, false);
    specify_timings(&mut fdc, &mut wheel);
    // No spin-up preamble: the ready latch still reads the line low.
    issue_command(&mut fdc, &mut wheel, 0x69, &[0]);
    run(&mut fdc, &mut wheel, 20 * 2000);

    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0);
    assert_eq!(fdc.read(ADDR_RESULT), result::DRIVE_NOT_READY);
}
