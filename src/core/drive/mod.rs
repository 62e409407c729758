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

//! Disc drive mechanics
//!
//! A single-density drive rotating at 300 rpm delivers one on-disc byte
//! every 64 µs while spinning. The controller pumps the drive with elapsed
//! wheel ticks and handles each due byte in on-disc order; writes land on
//! the byte currently under the head.
//!
//! The index pulse is a once-per-rotation signal, active while the head is
//! over the first few milliseconds of the track. The controller samples it
//! once per byte and reacts to the rising edge only.

use serde::{Deserialize, Serialize};

use super::disc::format::{fm_to_pulses, pulses_to_fm, BYTES_PER_TRACK, TRACKS_PER_DISC};
use super::disc::DiscImage;
use super::timing::TickCount;

/// Wheel ticks per on-disc byte (64 µs at 0.5 µs per tick)
pub const TICKS_PER_BYTE: TickCount = 128;

/// Head-of-track window in which the index pulse is asserted (~4 ms)
pub const INDEX_PULSE_BYTES: u32 = 62;

/// Serializable drive state for save states
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveSnapshot {
    /// Inserted disc, if any
    pub disc: Option<DiscImage>,
    /// Selected side
    pub is_side_upper: bool,
    /// Physical head track
    pub track: u32,
    /// Head byte offset within the track
    pub byte_position: u32,
}

/// A floppy disc drive
///
/// Owns the inserted disc, the head position (track and byte-within-track)
/// and the spindle state. Byte-rate progress only happens while the drive
/// is spinning.
#[derive(Debug)]
pub struct DiscDrive {
    /// Drive number, for logging only
    id: u8,

    /// Inserted disc, if any
    disc: Option<DiscImage>,

    /// Which side the head is reading
    is_side_upper: bool,

    /// Physical head track position
    track: u32,

    /// Byte offset of the head within the current track
    byte_position: u32,

    /// Spindle motor state
    spinning: bool,

    /// Wheel ticks accumulated toward the next byte
    tick_accumulator: TickCount,
}

impl DiscDrive {
    /// Create a drive with no disc inserted
    pub fn new(id: u8) -> Self {
        Self {
            id,
            disc: None,
            is_side_upper: false,
            track: 0,
            byte_position: 0,
            spinning: false,
            tick_accumulator: 0,
        }
    }

    /// Insert a disc
    pub fn insert_disc(&mut self, disc: DiscImage) {
        log::debug!("drive {}: disc inserted", self.id);
        self.disc = Some(disc);
    }

    /// Remove and return the inserted disc
    pub fn eject_disc(&mut self) -> Option<DiscImage> {
        log::debug!("drive {}: disc ejected", self.id);
        self.disc.take()
    }

    /// The inserted disc
    pub fn disc(&self) -> Option<&DiscImage> {
        self.disc.as_ref()
    }

    /// The inserted disc, mutably
    pub fn disc_mut(&mut self) -> Option<&mut DiscImage> {
        self.disc.as_mut()
    }

    /// Start the spindle motor
    pub fn start_spinning(&mut self) {
        if !self.spinning {
            log::debug!("drive {}: spinning up", self.id);
            self.spinning = true;
        }
    }

    /// Stop the spindle motor
    pub fn stop_spinning(&mut self) {
        if self.spinning {
            log::debug!("drive {}: spinning down", self.id);
            self.spinning = false;
            self.tick_accumulator = 0;
        }
    }

    /// Whether the spindle motor is running
    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    /// Select which disc side the head reads
    pub fn select_side(&mut self, is_side_upper: bool) {
        self.is_side_upper = is_side_upper;
    }

    /// Whether the inserted disc is write protected
    ///
    /// No disc reads as not protected; writes without a disc are no-ops
    /// anyway.
    pub fn is_write_protect(&self) -> bool {
        self.disc.as_ref().is_some_and(DiscImage::is_write_protect)
    }

    /// Physical track the head is over
    pub fn get_track(&self) -> u32 {
        self.track
    }

    /// Step the head by a (signed) number of tracks, clamped to the
    /// physical range
    pub fn seek_track(&mut self, delta: i32) {
        let target = (self.track as i32 + delta).clamp(0, TRACKS_PER_DISC as i32 - 1);
        self.track = target as u32;
    }

    /// Whether the index hole is currently under the sensor
    pub fn is_index_pulse(&self) -> bool {
        // The window is wide enough that byte-rate sampling cannot miss it.
        self.spinning && self.byte_position < INDEX_PULSE_BYTES
    }

    /// Byte offset of the head within the current track
    pub fn get_head_position(&self) -> u32 {
        self.byte_position
    }

    fn track_length_bytes(&self) -> u32 {
        let length = self
            .disc
            .as_ref()
            .map_or(0, |disc| disc.track_length(self.is_side_upper, self.track));
        if length == 0 {
            BYTES_PER_TRACK
        } else {
            length
        }
    }

    /// Accumulate elapsed wheel ticks; returns how many byte slots are due
    ///
    /// A stopped drive makes no progress and accumulates nothing.
    pub fn accumulate(&mut self, ticks: TickCount) -> u32 {
        if !self.spinning {
            return 0;
        }
        self.tick_accumulator += ticks;
        let due = self.tick_accumulator / TICKS_PER_BYTE;
        self.tick_accumulator %= TICKS_PER_BYTE;
        due as u32
    }

    /// FM-decode the byte currently under the head as `(data, clocks)`
    ///
    /// An absent disc or nonexistent track reads as all-zero pulses.
    pub fn read_head_byte(&self) -> (u8, u8) {
        let pulses = self
            .disc
            .as_ref()
            .and_then(|disc| disc.pulses(self.is_side_upper, self.track))
            .map_or(0, |buffer| buffer[self.byte_position as usize]);
        let (clocks, data) = pulses_to_fm(pulses);
        (data, clocks)
    }

    /// Move the head to the next byte slot, wrapping at the track end
    pub fn advance_head(&mut self) {
        self.byte_position = (self.byte_position + 1) % self.track_length_bytes();
    }

    /// Capture the drive's mechanical state and media
    pub fn snapshot(&self) -> DriveSnapshot {
        DriveSnapshot {
            disc: self.disc.clone(),
            is_side_upper: self.is_side_upper,
            track: self.track,
            byte_position: self.byte_position,
        }
    }

    /// Restore a snapshot taken by [`DiscDrive::snapshot`]
    ///
    /// Spindle state is not part of a snapshot; the controller replays it
    /// from its drive output latch.
    pub fn restore(&mut self, snapshot: DriveSnapshot) {
        self.disc = snapshot.disc;
        self.is_side_upper = snapshot.is_side_upper;
        self.track = snapshot.track;
        self.byte_position = snapshot.byte_position;
        self.tick_accumulator = 0;
    }

    /// FM-encode and write a byte at the head position
    ///
    /// Overwrites the pulse word most recently presented through
    /// [`DiscDrive::read_head_byte`]. Writing 0x00 data with 0x00 clocks
    /// scrubs all flux from the slot.
    pub fn write_byte(&mut self, data: u8, clocks: u8) {
        let is_side_upper = self.is_side_upper;
        let track = self.track;
        let position = self.byte_position as usize;
        if let Some(disc) = self.disc.as_mut() {
            if let Some(buffer) = disc.pulses_mut(is_side_upper, track) {
                buffer[position] = fm_to_pulses(clocks, data);
                disc.dirty_and_flush(is_side_upper, track);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_drive_makes_no_progress() {
        let mut drive = DiscDrive::new(0);
        drive.insert_disc(DiscImage::blank(false, false));
        assert_eq!(drive.accumulate(10_000), 0);
    }

    #[test]
    fn test_byte_rate_is_64us() {
        let mut drive = DiscDrive::new(0);
        drive.insert_disc(DiscImage::blank(false, false));
        drive.start_spinning();

        assert_eq!(drive.accumulate(TICKS_PER_BYTE - 1), 0);
        assert_eq!(drive.accumulate(1), 1);
        assert_eq!(drive.accumulate(TICKS_PER_BYTE * 10), 10);
    }

    #[test]
    fn test_index_pulse_window() {
        let mut drive = DiscDrive::new(0);
        drive.insert_disc(DiscImage::blank(false, false));
        drive.start_spinning();

        assert!(drive.is_index_pulse());
        for _ in 0..INDEX_PULSE_BYTES {
            drive.advance_head();
        }
        assert!(!drive.is_index_pulse());

        // One full revolution brings the pulse back
        for _ in 0..(BYTES_PER_TRACK - INDEX_PULSE_BYTES) {
            drive.advance_head();
        }
        assert!(drive.is_index_pulse());
    }

    #[test]
    fn test_no_index_pulse_when_stopped() {
        let mut drive = DiscDrive::new(0);
        drive.insert_disc(DiscImage::blank(false, false));
        assert!(!drive.is_index_pulse());
    }

    #[test]
    fn test_write_then_read_head_byte() {
        let mut drive = DiscDrive::new(0);
        drive.insert_disc(DiscImage::blank(false, false));
        drive.start_spinning();

        drive.write_byte(0x42, 0xFF);
        assert_eq!(drive.read_head_byte(), (0x42, 0xFF));

        drive.advance_head();
        assert_eq!(drive.read_head_byte(), (0x00, 0x00));
    }

    #[test]
    fn test_read_without_disc_is_zero() {
        let mut drive = DiscDrive::new(1);
        drive.start_spinning();
        assert_eq!(drive.read_head_byte(), (0x00, 0x00));
    }

    #[test]
    fn test_seek_clamps_to_physical_range() {
        let mut drive = DiscDrive::new(0);
        drive.seek_track(-1);
        assert_eq!(drive.get_track(), 0);

        for _ in 0..200 {
            drive.seek_track(1);
        }
        assert_eq!(drive.get_track(), TRACKS_PER_DISC - 1);
    }

    #[test]
    fn test_head_wraps_at_track_end() {
        let mut drive = DiscDrive::new(0);
        drive.insert_disc(DiscImage::blank(false, false));
        for _ in 0..BYTES_PER_TRACK {
            drive.advance_head();
        }
        assert_eq!(drive.get_head_position(), 0);
    }
}
