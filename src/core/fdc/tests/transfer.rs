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

//! Tests for the 8271 read/write transfer state machine

use super::*;

/// Drive 0 spun up and ready, with one 256-byte sector (track 0, logical
/// sector 1) on the disc
fn fdc_with_sector(fill: u8, deleted: bool, write_protect: bool) -> (TimerWheel, IntelFdc) {
    let (mut wheel, mut fdc) = new_fdc();
    fdc.insert_blank_disc(0, write_protect);
    write_sector_on_drive(&mut fdc, 0, 0, 200, [0, 0, 1, 1], deleted, fill);
    specify_timings(&mut fdc, &mut wheel);
    spin_up_drive_0(&mut fdc, &mut wheel);
    (wheel, fdc)
}

#[test]
fn test_read_data_surfaces_sector_bytes() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x5A, false, false);

    issue_command(&mut fdc, &mut wheel, 0x53, &[0, 1, 0x21]);
    let bytes = run_command_collecting(&mut fdc, &mut wheel, 3 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0, "command still busy");
    assert_eq!(fdc.read(ADDR_RESULT), result::OK);
    assert_eq!(bytes.len(), 256);
    assert!(bytes.iter().all(|&b| b == 0x5A));
    assert!(fdc.nmi_mut().take_edge(), "completion NMI");
}

#[test]
fn test_read_data_skips_deleted_but_flags_it() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x77, true, false);

    issue_command(&mut fdc, &mut wheel, 0x53, &[0, 1, 0x21]);
    let bytes = run_command_collecting(&mut fdc, &mut wheel, 3 * REVOLUTION);

    // Plain READ_DATA progresses through deleted data without surfacing
    // it, and the deleted flag is OR'd into the result.
    assert_eq!(fdc.read(ADDR_RESULT), result::FLAG_DELETED_DATA);
    assert!(bytes.is_empty());
}

#[test]
fn test_read_data_and_deleted_surfaces_deleted_bytes() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x77, true, false);

    issue_command(&mut fdc, &mut wheel, 0x57, &[0, 1, 0x21]);
    let bytes = run_command_collecting(&mut fdc, &mut wheel, 3 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_RESULT), result::FLAG_DELETED_DATA);
    assert_eq!(bytes.len(), 256);
    assert!(bytes.iter().all(|&b| b == 0x77));
}

#[test]
fn test_verify_surfaces_nothing() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x5A, false, false);

    issue_command(&mut fdc, &mut wheel, 0x5F, &[0, 1, 0x21]);
    let bytes = run_command_collecting(&mut fdc, &mut wheel, 3 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_RESULT), result::OK);
    assert!(bytes.is_empty());
}

#[test]
fn test_late_dma_aborts_read() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x5A, false, false);

    issue_command(&mut fdc, &mut wheel, 0x53, &[0, 1, 0x21]);
    // Never read the data register: the second surfaced byte finds
    // need-data still set and the command dies.
    run(&mut fdc, &mut wheel, 3 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0);
    assert_eq!(fdc.read(ADDR_RESULT), result::LATE_DMA);
    assert!(fdc.nmi_mut().take_edge(), "completion NMI survives the abort");
}

#[test]
fn test_sector_not_found_after_three_index_pulses() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x5A, false, false);

    // Ask for a sector that is not on the track.
    issue_command(&mut fdc, &mut wheel, 0x53, &[0, 9, 0x21]);
    let bytes = run_command_collecting(&mut fdc, &mut wheel, 5 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0);
    assert_eq!(fdc.read(ADDR_RESULT), result::SECTOR_NOT_FOUND);
    assert!(bytes.is_empty());
}

#[test]
fn test_track_mismatch_retries_then_fails() {
    let (mut wheel, mut fdc) = new_fdc();
    fdc.insert_blank_disc(0, false);
    // Headers on physical tracks 0-2 all claim to be track 9.
    for track in 0..3 {
        write_sector_on_drive(&mut fdc, 0, track, 200, [9, 0, 1, 1], false, 0x00);
    }
    specify_timings(&mut fdc, &mut wheel);
    spin_up_drive_0(&mut fdc, &mut wheel);

    issue_command(&mut fdc, &mut wheel, 0x53, &[0, 1, 0x21]);
    let _ = run_command_collecting(&mut fdc, &mut wheel, 10 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0);
    assert_eq!(fdc.read(ADDR_RESULT), result::SECTOR_NOT_FOUND);
    // The retries physically stepped the head up twice.
    assert_eq!(fdc.drive(0).get_track(), 2);
}

#[test]
fn test_data_crc_error_reported() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x5A, false, false);

    // Flip a data-slot pulse inside the sector body.
    {
        let disc = fdc.drive_mut(0).disc_mut().unwrap();
        let mut tool = DiscTool::new(disc);
        tool.find_sectors(false).unwrap();
        let flip_bit = tool.sectors()[0].bit_pos_data + 8 * 32 + 2;
        let buffer = disc.pulses_mut(false, 0).unwrap();
        buffer[(flip_bit / 32) as usize] ^= 0x8000_0000 >> (flip_bit % 32);
    }

    issue_command(&mut fdc, &mut wheel, 0x53, &[0, 1, 0x21]);
    let _ = run_command_collecting(&mut fdc, &mut wheel, 3 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_RESULT), result::DATA_CRC_ERROR);
}

#[test]
fn test_write_protect_rejects_write() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x5A, false, true);
    let before = fdc.drive(0).disc().unwrap().pulses(false, 0).unwrap().to_vec();

    issue_command(&mut fdc, &mut wheel, 0x4B, &[0, 1, 0x21]);
    run(&mut fdc, &mut wheel, REVOLUTION);

    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0);
    assert_eq!(fdc.read(ADDR_RESULT), result::WRITE_PROTECTED);
    // Nothing reached the surface.
    let after = fdc.drive(0).disc().unwrap().pulses(false, 0).unwrap();
    assert_eq!(after, before.as_slice());
}

#[test]
fn test_write_data_round_trips_through_the_surface() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x00, false, false);

    issue_command(&mut fdc, &mut wheel, 0x4B, &[0, 1, 0x21]);
    let mut source = (0..=255u8).cycle();
    run_with(&mut fdc, &mut wheel, 3 * REVOLUTION, |fdc, wheel| {
        if fdc.read(ADDR_STATUS) & 0x04 != 0 {
            fdc.write(wheel, ADDR_DATA, source.next().unwrap());
        }
    });

    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0);
    assert_eq!(fdc.read(ADDR_RESULT), result::OK);

    // Scan the surface: same sector, fresh contents, CRC intact.
    let disc = fdc.drive_mut(0).disc_mut().unwrap();
    let mut tool = DiscTool::new(disc);
    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 1);
    let sector = &tool.sectors()[0];
    assert!(!sector.has_data_crc_error);
    let data_pos = sector.bit_pos_data;
    tool.set_byte_pos(data_pos / 32);
    let (_, data) = tool.read_fm_data(256);
    let expected: Vec<u8> = (0..=255u8).collect();
    assert_eq!(data, expected);
}

#[test]
fn test_read_id_cycles_through_headers() {
    let (mut wheel, mut fdc) = new_fdc();
    fdc.insert_blank_disc(0, false);
    // Ten sectors, logical 1..=10, laid out around the track.
    for sector in 0..10u32 {
        write_sector_on_drive(
            &mut fdc,
            0,
            0,
            100 + sector * 300,
            [0, 0, sector as u8 + 1, 1],
            false,
            0xE5,
        );
    }
    specify_timings(&mut fdc, &mut wheel);
    spin_up_drive_0(&mut fdc, &mut wheel);

    // One READ_ID with a count of 10 returns all ten headers in track
    // order, 4 bytes each.
    issue_command(&mut fdc, &mut wheel, 0x5B, &[0, 0, 10]);
    let bytes = run_command_collecting(&mut fdc, &mut wheel, 4 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_RESULT), result::OK);
    assert_eq!(bytes.len(), 40);
    for (i, header) in bytes.chunks(4).enumerate() {
        assert_eq!(header, &[0, 0, i as u8 + 1, 1]);
    }
}

#[test]
fn test_read_id_skip_index_mode_walks_successive_headers() {
    let (mut wheel, mut fdc) = new_fdc();
    fdc.insert_blank_disc(0, false);
    for sector in 0..10u32 {
        write_sector_on_drive(
            &mut fdc,
            0,
            0,
            100 + sector * 300,
            [0, 0, sector as u8 + 1, 1],
            false,
            0xE5,
        );
    }
    specify_timings(&mut fdc, &mut wheel);
    spin_up_drive_0(&mut fdc, &mut wheel);

    // The undocumented non-zero second parameter skips the index-pulse
    // wait, so back-to-back commands pick up consecutive headers.
    let mut seen = Vec::new();
    for _ in 0..10 {
        issue_command(&mut fdc, &mut wheel, 0x5B, &[0, 1, 1]);
        let bytes = run_command_collecting(&mut fdc, &mut wheel, 2 * REVOLUTION);
        assert_eq!(fdc.read(ADDR_RESULT), result::OK);
        assert_eq!(bytes.len(), 4);
        seen.push(bytes[2]);
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

#[test]
fn test_read_with_sector_count_zero_reads_32_sectors() {
    let (mut wheel, mut fdc) = new_fdc();
    fdc.insert_blank_disc(0, false);
    for sector in 0..10u32 {
        write_sector_on_drive(
            &mut fdc,
            0,
            0,
            100 + sector * 300,
            [0, 0, sector as u8 + 1, 1],
            false,
            0xE5,
        );
    }
    specify_timings(&mut fdc, &mut wheel);
    spin_up_drive_0(&mut fdc, &mut wheel);

    // A count of 0 underflows the 5-bit sector counter: 32 headers.
    issue_command(&mut fdc, &mut wheel, 0x5B, &[0, 0, 0]);
    let bytes = run_command_collecting(&mut fdc, &mut wheel, 8 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_RESULT), result::OK);
    assert_eq!(bytes.len(), 32 * 4);
}

#[test]
fn test_scan_data_dies_of_late_dma() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x5A, false, false);

    // SCAN_DATA dispatches, but the scan commands need DMA wiring this
    // machine never had; the first data byte aborts the command.
    issue_command(&mut fdc, &mut wheel, 0x40, &[0, 1, 0x21, 1, 0]);
    let _ = run_command_collecting(&mut fdc, &mut wheel, 3 * REVOLUTION);

    assert_eq!(fdc.read(ADDR_STATUS) & 0x80, 0);
    assert_eq!(fdc.read(ADDR_RESULT), result::LATE_DMA);
}

#[test]
fn test_idle_write_gate_scrubs_flux() {
    let (mut wheel, mut fdc) = fdc_with_sector(0x5A, false, false);

    // Open the write gate with no command running.
    issue_command(&mut fdc, &mut wheel, 0x3A, &[reg::DRIVE_OUT, 0x49]);
    run(&mut fdc, &mut wheel, 2 * REVOLUTION);

    // The whole track has been wiped to weak bits.
    let disc = fdc.drive_mut(0).disc_mut().unwrap();
    assert!(disc.pulses(false, 0).unwrap().iter().all(|&w| w == 0));
}
