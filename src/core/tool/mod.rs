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

//! Pulse-level disc tool
//!
//! A bit-addressed view over one track's pulse buffer. The tool reads and
//! writes FM data at arbitrary positions (reads may start mid-word and
//! mid-cell; writes must be byte aligned) and discovers sectors the same
//! way the controller does: by spotting mark bytes in pulse space.
//!
//! FM only. MFM needs a different mark fingerprint and CRC seeding and is
//! deliberately unsupported here.
//!
//! # Sector scanning
//!
//! [`DiscTool::find_sectors`] makes two passes over the selected track:
//!
//! 1. Walk the track bit by bit through a 64-bit mark detector. A match is
//!    8 cells of pure clock (the `0x8888_8888` fingerprint) followed by a
//!    byte whose clock pattern is the mark clock. ID marks open a new
//!    sector descriptor; data and deleted-data marks attach to the most
//!    recent descriptor still missing a data field.
//! 2. Re-read each descriptor's header and data fields and verify their
//!    CRCs, recording (never throwing) any mismatch.

use super::disc::format::{
    crc_add_byte, crc_add_run, crc_init, fm_to_pulses, pulses_to_fm, DATA_MARK_DATA_PATTERN,
    DELETED_DATA_MARK_DATA_PATTERN, ID_MARK_DATA_PATTERN, MARK_CLOCK_PATTERN,
};
use super::disc::DiscImage;
use super::error::{EmulatorError, Result};

/// Maximum sector descriptors per track
pub const MAX_SECTORS: usize = 32;

/// Pulse-space fingerprint of 8 FM cells of clock-only flux, i.e. the sync
/// run that precedes every mark byte
const MARK_DETECTOR_PATTERN: u64 = 0x8888_8888_0000_0000;
const MARK_DETECTOR_MASK: u64 = 0xFFFF_FFFF_0000_0000;

/// One discovered sector
///
/// Positions are bit offsets into the track, pointing just past the mark
/// byte; 0 means "not found". Descriptors are invalidated whenever the
/// tool's track selection changes.
#[derive(Debug, Clone, Default)]
pub struct SectorDescriptor {
    /// Bit position just after the ID mark, 0 if none
    pub bit_pos_header: u32,

    /// Bit position just after the data mark, 0 if none
    pub bit_pos_data: u32,

    /// Header fields: track, side, sector, size code, CRC high, CRC low
    pub header_bytes: [u8; 6],

    /// Header CRC did not verify
    pub has_header_crc_error: bool,

    /// Data CRC did not verify
    pub has_data_crc_error: bool,

    /// Sector carries a deleted-data mark
    pub is_deleted: bool,
}

impl SectorDescriptor {
    /// Physical sector size decoded from the header size code
    pub fn sector_size(&self) -> u32 {
        let size = 128u32 << (self.header_bytes[3] & 0x07);
        size.min(2048)
    }
}

/// Bit-addressed tool over one disc's tracks
pub struct DiscTool<'a> {
    disc: &'a mut DiscImage,
    is_side_upper: bool,
    track: u32,
    track_length: u32,
    pos: u32,
    sectors: Vec<SectorDescriptor>,
}

impl<'a> DiscTool<'a> {
    /// Open a tool on a disc, selecting lower side, track 0
    pub fn new(disc: &'a mut DiscImage) -> Self {
        let mut tool = Self {
            disc,
            is_side_upper: false,
            track: 0,
            track_length: 0,
            pos: 0,
            sectors: Vec::new(),
        };
        tool.set_track(0);
        tool
    }

    /// Select the disc side; invalidates discovered sectors
    pub fn set_is_side_upper(&mut self, is_side_upper: bool) {
        self.is_side_upper = is_side_upper;
        self.set_track(self.track);
    }

    /// Select a track; invalidates discovered sectors
    pub fn set_track(&mut self, track: u32) {
        self.track = track;
        self.sectors.clear();
        self.track_length = self.disc.track_length(self.is_side_upper, track);
    }

    /// Currently selected track
    pub fn track(&self) -> u32 {
        self.track
    }

    /// Byte position of the read/write head within the track
    pub fn byte_pos(&self) -> u32 {
        self.pos / 32
    }

    /// Set the byte position; positions at or past the track end wrap to 0
    pub fn set_byte_pos(&mut self, pos: u32) {
        let pos = if pos >= self.track_length { 0 } else { pos };
        self.pos = pos * 32;
    }

    /// Read 32 pulse slots at the current sub-bit position and advance by 32
    ///
    /// Stitches across word boundaries and wraps at the track end. Returns
    /// zero if no disc track is selected.
    fn read_pulses(&mut self) -> u32 {
        let track_length = self.track_length;
        let Some(buffer) = self.disc.pulses(self.is_side_upper, self.track) else {
            return 0;
        };
        if track_length == 0 {
            return 0;
        }

        let word_pos = self.pos / 32;
        let bit_pos = self.pos % 32;
        let mut pulses = buffer[word_pos as usize] << bit_pos;
        if bit_pos > 0 {
            let next = (word_pos + 1) % track_length;
            pulses |= buffer[next as usize] >> (32 - bit_pos);
        }

        self.pos += 32;
        if self.pos >= track_length * 32 {
            self.pos -= track_length * 32;
        }

        pulses
    }

    /// Read `len` FM bytes from the current position, advancing past them
    ///
    /// Returns the separated clock and data streams.
    pub fn read_fm_data(&mut self, len: u32) -> (Vec<u8>, Vec<u8>) {
        let mut clocks = Vec::with_capacity(len as usize);
        let mut data = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let pulses = self.read_pulses();
            let (clocks_byte, data_byte) = pulses_to_fm(pulses);
            clocks.push(clocks_byte);
            data.push(data_byte);
        }
        (clocks, data)
    }

    /// Write FM bytes at the current position, which must be byte aligned
    ///
    /// `clocks` of `None` writes the normal 0xFF clock stream. The track is
    /// marked dirty afterwards.
    pub fn write_fm_data(&mut self, clocks: Option<&[u8]>, data: &[u8]) {
        assert_eq!(self.pos % 32, 0, "FM writes must be byte aligned");

        let track_length = self.track_length;
        let is_side_upper = self.is_side_upper;
        let track = self.track;
        let mut word_pos = self.pos / 32;
        {
            let Some(buffer) = self.disc.pulses_mut(is_side_upper, track) else {
                return;
            };
            for (i, &data_byte) in data.iter().enumerate() {
                let clocks_byte = clocks.map_or(0xFF, |c| c[i]);
                buffer[word_pos as usize] = fm_to_pulses(clocks_byte, data_byte);
                word_pos = (word_pos + 1) % track_length;
            }
        }
        self.pos = word_pos * 32;

        self.disc.dirty_and_flush(is_side_upper, track);
    }

    /// Fill the whole track with one data byte (clocks 0xFF), resetting the
    /// position to the track start
    pub fn fill_fm_data(&mut self, data: u8) {
        let is_side_upper = self.is_side_upper;
        let track = self.track;
        let pulses = fm_to_pulses(0xFF, data);
        {
            let Some(buffer) = self.disc.pulses_mut(is_side_upper, track) else {
                return;
            };
            buffer.fill(pulses);
        }
        self.pos = 0;

        self.disc.dirty_and_flush(is_side_upper, track);
    }

    /// Scan the selected track for sectors
    ///
    /// Missing discs and out-of-range tracks scan as zero sectors. CRC
    /// failures are recorded in the descriptors. More than [`MAX_SECTORS`]
    /// headers is an error.
    pub fn find_sectors(&mut self, is_mfm: bool) -> Result<()> {
        assert!(!is_mfm, "MFM sector discovery is unsupported");

        self.sectors.clear();

        // Pass 1: walk the track and find header and data markers.
        let track_length = self.track_length;
        let track = self.track;
        {
            let Some(buffer) = self.disc.pulses(self.is_side_upper, track) else {
                return Ok(());
            };

            let bit_length = track_length * 32;
            let mut mark_detector: u64 = 0;
            let mut pulses: u32 = 0;
            for i_pulses in 0..bit_length {
                if i_pulses % 32 == 0 {
                    pulses = buffer[(i_pulses / 32) as usize];
                }
                mark_detector <<= 1;
                if pulses & 0x8000_0000 != 0 {
                    mark_detector |= 1;
                }
                pulses <<= 1;

                if (mark_detector & MARK_DETECTOR_MASK) != MARK_DETECTOR_PATTERN {
                    continue;
                }
                let (clocks, data) = pulses_to_fm(mark_detector as u32);
                if clocks != MARK_CLOCK_PATTERN {
                    continue;
                }

                // The detector fires on the mark byte's final (empty) pulse
                // slot; the field itself starts one slot later.
                let field_pos = (i_pulses + 1) % bit_length;
                if data == ID_MARK_DATA_PATTERN {
                    if self.sectors.len() == MAX_SECTORS {
                        return Err(EmulatorError::TooManySectors {
                            track,
                            limit: MAX_SECTORS,
                        });
                    }
                    self.sectors.push(SectorDescriptor {
                        bit_pos_header: field_pos,
                        ..SectorDescriptor::default()
                    });
                } else if data == DATA_MARK_DATA_PATTERN || data == DELETED_DATA_MARK_DATA_PATTERN
                {
                    match self.sectors.last_mut() {
                        Some(sector) if sector.bit_pos_data == 0 => {
                            sector.bit_pos_data = field_pos;
                            sector.is_deleted = data == DELETED_DATA_MARK_DATA_PATTERN;
                        }
                        _ => {
                            log::warn!("sector data without header on track {track}");
                        }
                    }
                }
            }
        }

        // Pass 2: work out physical sector sizes and check both CRCs.
        let mut sectors = std::mem::take(&mut self.sectors);
        for sector in &mut sectors {
            self.pos = sector.bit_pos_header;
            let (_, header) = self.read_fm_data(6);
            sector.header_bytes.copy_from_slice(&header);

            let mut crc = crc_init();
            crc = crc_add_byte(crc, ID_MARK_DATA_PATTERN);
            crc = crc_add_run(crc, &sector.header_bytes[0..4]);
            let disc_crc = (u16::from(sector.header_bytes[4]) << 8) | u16::from(sector.header_bytes[5]);
            if crc != disc_crc {
                sector.has_header_crc_error = true;
            }

            if sector.bit_pos_data == 0 {
                log::warn!("sector header without data on track {track}");
                continue;
            }
            self.pos = sector.bit_pos_data;
            let mark = if sector.is_deleted {
                DELETED_DATA_MARK_DATA_PATTERN
            } else {
                DATA_MARK_DATA_PATTERN
            };
            let sector_size = sector.sector_size();
            let (_, payload) = self.read_fm_data(sector_size + 2);

            let mut crc = crc_init();
            crc = crc_add_byte(crc, mark);
            crc = crc_add_run(crc, &payload[0..sector_size as usize]);
            let disc_crc = (u16::from(payload[sector_size as usize]) << 8)
                | u16::from(payload[sector_size as usize + 1]);
            if crc != disc_crc {
                sector.has_data_crc_error = true;
            }
        }
        self.sectors = sectors;

        Ok(())
    }

    /// Sectors discovered by the last [`DiscTool::find_sectors`]
    pub fn sectors(&self) -> &[SectorDescriptor] {
        &self.sectors
    }

    /// Scan every track of a disc, logging sector CRC errors
    pub fn log_summary(disc: &mut DiscImage, log_crc_errors: bool) -> Result<()> {
        let mut tool = DiscTool::new(disc);
        for track in 0..super::disc::format::TRACKS_PER_DISC {
            tool.set_track(track);
            tool.find_sectors(false)?;
            for (i, sector) in tool.sectors().iter().enumerate() {
                if !log_crc_errors {
                    continue;
                }
                if sector.has_header_crc_error {
                    log::warn!("header CRC error track {track} physical sector {i}");
                }
                if sector.has_data_crc_error {
                    log::warn!("data CRC error track {track} physical sector {i}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
