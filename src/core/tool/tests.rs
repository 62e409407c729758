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

//! Tests for the pulse-level disc tool

use super::*;
use crate::core::disc::format::{BYTES_PER_TRACK, TRACKS_PER_DISC};

/// Lay down one complete FM sector at the tool's current position
fn write_sector(tool: &mut DiscTool, header: [u8; 4], deleted: bool, fill: u8) {
    // Sync run so the mark detector sees clock-only cells
    tool.write_fm_data(None, &[0x00; 6]);

    tool.write_fm_data(Some(&[MARK_CLOCK_PATTERN]), &[ID_MARK_DATA_PATTERN]);
    let mut crc = crc_init();
    crc = crc_add_byte(crc, ID_MARK_DATA_PATTERN);
    crc = crc_add_run(crc, &header);
    tool.write_fm_data(None, &header);
    tool.write_fm_data(None, &[(crc >> 8) as u8, (crc & 0xFF) as u8]);

    // Gap 2
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

#[test]
fn test_empty_track_scans_as_zero_sectors() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    tool.fill_fm_data(0xFF);
    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 0);
}

#[test]
fn test_blank_track_scans_as_zero_sectors() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 0);
}

#[test]
fn test_single_sector_discovery() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    tool.set_track(5);
    tool.set_byte_pos(100);
    write_sector(&mut tool, [5, 0, 1, 1], false, 0xAB);

    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 1);

    let sector = &tool.sectors()[0];
    assert_eq!(&sector.header_bytes[0..4], &[5, 0, 1, 1]);
    assert_eq!(sector.sector_size(), 256);
    assert!(!sector.has_header_crc_error);
    assert!(!sector.has_data_crc_error);
    assert!(!sector.is_deleted);
    assert_ne!(sector.bit_pos_header, 0);
    assert_ne!(sector.bit_pos_data, 0);
    assert!(sector.bit_pos_header < BYTES_PER_TRACK * 32);
}

#[test]
fn test_multiple_sectors_in_track_order() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    for sector in 0..10u8 {
        write_sector(&mut tool, [0, 0, sector, 1], false, sector);
    }

    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 10);
    for (i, sector) in tool.sectors().iter().enumerate() {
        assert_eq!(sector.header_bytes[2], i as u8);
        assert!(!sector.has_header_crc_error);
        assert!(!sector.has_data_crc_error);
    }
}

#[test]
fn test_deleted_data_mark() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    write_sector(&mut tool, [0, 0, 0, 1], true, 0x55);

    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 1);
    assert!(tool.sectors()[0].is_deleted);
    assert!(!tool.sectors()[0].has_data_crc_error);
}

#[test]
fn test_flipped_data_bit_sets_data_crc_error_only() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    write_sector(&mut tool, [0, 0, 3, 1], false, 0xE5);
    tool.find_sectors(false).unwrap();
    let data_pos = tool.sectors()[0].bit_pos_data;

    // Flip one data-slot pulse a few bytes into the sector body
    let flip_bit = data_pos + (4 * 32) + 2;
    let buffer = disc.pulses_mut(false, 0).unwrap();
    buffer[(flip_bit / 32) as usize] ^= 0x8000_0000 >> (flip_bit % 32);

    let mut tool = DiscTool::new(&mut disc);
    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 1);
    assert!(!tool.sectors()[0].has_header_crc_error);
    assert!(tool.sectors()[0].has_data_crc_error);
}

#[test]
fn test_corrupt_header_sets_header_crc_error() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    write_sector(&mut tool, [0, 0, 3, 1], false, 0xE5);
    tool.find_sectors(false).unwrap();
    let header_pos = tool.sectors()[0].bit_pos_header;

    // Corrupt the track byte of the header (first data slot)
    let flip_bit = header_pos + 2;
    let buffer = disc.pulses_mut(false, 0).unwrap();
    buffer[(flip_bit / 32) as usize] ^= 0x8000_0000 >> (flip_bit % 32);

    let mut tool = DiscTool::new(&mut disc);
    tool.find_sectors(false).unwrap();
    assert!(tool.sectors()[0].has_header_crc_error);
}

#[test]
fn test_orphan_data_mark_is_skipped() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);

    // Data mark with no preceding header
    tool.write_fm_data(None, &[0x00; 6]);
    tool.write_fm_data(Some(&[MARK_CLOCK_PATTERN]), &[DATA_MARK_DATA_PATTERN]);

    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 0);
}

#[test]
fn test_second_data_mark_does_not_reattach() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    write_sector(&mut tool, [0, 0, 0, 1], false, 0x11);

    // A stray second data mark after the complete sector
    tool.write_fm_data(None, &[0x00; 6]);
    tool.write_fm_data(Some(&[MARK_CLOCK_PATTERN]), &[DATA_MARK_DATA_PATTERN]);

    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 1);
    assert!(!tool.sectors()[0].has_data_crc_error);
}

#[test]
fn test_too_many_sectors_is_an_error() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    // 33 headers of the smallest size cannot physically fit data fields,
    // so only write the headers
    for sector in 0..=MAX_SECTORS as u8 {
        tool.write_fm_data(None, &[0x00; 6]);
        tool.write_fm_data(Some(&[MARK_CLOCK_PATTERN]), &[ID_MARK_DATA_PATTERN]);
        tool.write_fm_data(None, &[0, 0, sector, 0, 0, 0]);
    }

    let result = tool.find_sectors(false);
    assert!(matches!(
        result,
        Err(EmulatorError::TooManySectors { track: 0, .. })
    ));
}

#[test]
fn test_byte_pos_wraps_to_zero() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);

    tool.set_byte_pos(BYTES_PER_TRACK);
    assert_eq!(tool.byte_pos(), 0);
    tool.set_byte_pos(BYTES_PER_TRACK - 1);
    assert_eq!(tool.byte_pos(), BYTES_PER_TRACK - 1);
}

#[test]
fn test_read_then_rewrite_is_identity() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    write_sector(&mut tool, [0, 0, 7, 1], false, 0xC3);
    let before = disc.pulses(false, 0).unwrap().to_vec();

    let mut tool = DiscTool::new(&mut disc);
    tool.set_byte_pos(3);
    let (clocks, data) = tool.read_fm_data(16);
    tool.set_byte_pos(3);
    tool.write_fm_data(Some(&clocks), &data);

    assert_eq!(disc.pulses(false, 0).unwrap(), before.as_slice());
}

#[test]
fn test_read_wraps_across_track_end() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);

    tool.set_byte_pos(BYTES_PER_TRACK - 1);
    tool.write_fm_data(None, &[0x12, 0x34]);
    assert_eq!(tool.byte_pos(), 1);

    tool.set_byte_pos(BYTES_PER_TRACK - 1);
    let (_, data) = tool.read_fm_data(2);
    assert_eq!(data, vec![0x12, 0x34]);
}

#[test]
fn test_missing_track_scans_silently() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    tool.set_track(TRACKS_PER_DISC + 5);
    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 0);
    assert_eq!(tool.read_fm_data(4).1, vec![0, 0, 0, 0]);
}

#[test]
fn test_track_change_invalidates_sectors() {
    let mut disc = DiscImage::blank(false, false);
    let mut tool = DiscTool::new(&mut disc);
    write_sector(&mut tool, [0, 0, 0, 1], false, 0x00);
    tool.find_sectors(false).unwrap();
    assert_eq!(tool.sectors().len(), 1);

    tool.set_track(1);
    assert_eq!(tool.sectors().len(), 0);
}

#[test]
fn test_log_summary_walks_all_tracks() {
    let mut disc = DiscImage::blank(false, false);
    {
        let mut tool = DiscTool::new(&mut disc);
        tool.set_track(3);
        write_sector(&mut tool, [3, 0, 0, 1], false, 0x00);
    }
    DiscTool::log_summary(&mut disc, true).unwrap();
}
