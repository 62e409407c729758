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

//! Disc surface emulation
//!
//! A disc is two sides of [`format::TRACKS_PER_DISC`] tracks, each track a
//! buffer of 32-bit pulse words (one word per on-disc byte, one bit per
//! 2 µs flux-transition slot). Everything above this module - the drive,
//! the controller, the tool layer - reads and writes these buffers and
//! nothing else.
//!
//! Loading and saving disc image *files* is a separate concern; this module
//! only tracks which tracks have been written so a file backend can flush
//! them.

pub mod format;

use serde::{Deserialize, Serialize};

use format::{BYTES_PER_TRACK, TRACKS_PER_DISC};

/// In-memory pulse-level disc
///
/// Owns every track buffer. Track buffers have a fixed identity: their
/// contents only change through [`DiscImage::pulses_mut`] followed by
/// [`DiscImage::dirty_and_flush`], or through single-word writes from the
/// drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscImage {
    /// Pulse words for every track, indexed `[side][track]`
    tracks: Vec<Vec<u32>>,

    /// Whether the disc is double sided
    double_sided: bool,

    /// Write-protect tab state
    write_protect: bool,

    /// Tracks written since the last flush, as `(side, track)` pairs
    dirty_tracks: Vec<(bool, u32)>,
}

impl DiscImage {
    /// Create a blank (all pulses zero) disc
    ///
    /// A blank surface reads as endless 0x00 data bytes with 0x00 clocks,
    /// which is what an unformatted disc looks like to the controller.
    pub fn blank(double_sided: bool, write_protect: bool) -> Self {
        let num_sides = if double_sided { 2 } else { 1 };
        let tracks = (0..num_sides * TRACKS_PER_DISC)
            .map(|_| vec![0u32; BYTES_PER_TRACK as usize])
            .collect();
        Self {
            tracks,
            double_sided,
            write_protect,
            dirty_tracks: Vec::new(),
        }
    }

    /// Whether the disc has an upper side
    pub fn is_double_sided(&self) -> bool {
        self.double_sided
    }

    /// Whether the write-protect tab is set
    pub fn is_write_protect(&self) -> bool {
        self.write_protect
    }

    /// Change the write-protect tab
    pub fn set_write_protect(&mut self, write_protect: bool) {
        self.write_protect = write_protect;
    }

    fn track_index(&self, upper_side: bool, track: u32) -> Option<usize> {
        if track >= TRACKS_PER_DISC {
            return None;
        }
        if upper_side && !self.double_sided {
            return None;
        }
        let side_base = if upper_side { TRACKS_PER_DISC } else { 0 };
        Some((side_base + track) as usize)
    }

    /// Length of a track in pulse words
    ///
    /// Zero for tracks that do not exist (out of range, or upper side of a
    /// single-sided disc).
    pub fn track_length(&self, upper_side: bool, track: u32) -> u32 {
        match self.track_index(upper_side, track) {
            Some(index) => self.tracks[index].len() as u32,
            None => 0,
        }
    }

    /// Raw pulse buffer of a track
    pub fn pulses(&self, upper_side: bool, track: u32) -> Option<&[u32]> {
        self.track_index(upper_side, track)
            .map(|index| self.tracks[index].as_slice())
    }

    /// Mutable raw pulse buffer of a track
    ///
    /// Callers that write through this must follow up with
    /// [`DiscImage::dirty_and_flush`].
    pub fn pulses_mut(&mut self, upper_side: bool, track: u32) -> Option<&mut [u32]> {
        self.track_index(upper_side, track)
            .map(|index| self.tracks[index].as_mut_slice())
    }

    /// Record that a track was modified and needs flushing to any backend
    pub fn dirty_and_flush(&mut self, upper_side: bool, track: u32) {
        if !self.dirty_tracks.contains(&(upper_side, track)) {
            self.dirty_tracks.push((upper_side, track));
        }
        log::trace!(
            "disc: track {} side {} dirty ({} pending)",
            track,
            u32::from(upper_side),
            self.dirty_tracks.len()
        );
    }

    /// Take the list of dirty tracks, clearing it
    ///
    /// A file backend calls this to learn what to write back.
    pub fn take_dirty_tracks(&mut self) -> Vec<(bool, u32)> {
        std::mem::take(&mut self.dirty_tracks)
    }
}
