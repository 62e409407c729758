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

//! Save state serialization
//!
//! Captures and restores the disc subsystem: the FDC register file and
//! drive output latch, both drives' mechanical positions, and the full
//! pulse surfaces of any inserted discs. States are bincode-encoded with
//! a version stamp and chrono metadata.
//!
//! Snapshots are only taken between commands. Mid-command transfer state
//! (shift registers, live CRCs, pending timers) is deliberately not
//! serialized; capturing while the controller is busy is an error.
//!
//! # Example
//!
//! ```
//! use beebrx::core::save_state::SaveState;
//! use beebrx::core::system::System;
//!
//! let mut system = System::new();
//! system.fdc_mut().insert_blank_disc(0, false);
//!
//! let state = SaveState::capture(&system, "before the risky bit").unwrap();
//! // ... play on, regret it ...
//! state.apply(&mut system).unwrap();
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::drive::DriveSnapshot;
use super::error::{EmulatorError, Result};
use super::fdc::FdcSnapshot;
use super::system::System;

/// Save state format version
///
/// Bump on any incompatible layout change; loading a mismatched version
/// fails rather than misinterpreting bytes.
pub const SAVE_STATE_VERSION: u32 = 1;

/// Descriptive metadata carried alongside a state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveStateMetadata {
    /// When the state was captured
    pub created_at: DateTime<Utc>,

    /// Free-form caller description
    pub description: String,
}

/// A complete disc-subsystem state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveState {
    /// Format version, checked on load
    pub version: u32,

    /// Capture metadata
    pub metadata: SaveStateMetadata,

    /// Virtual time at capture
    pub wheel_ticks: u64,

    /// Controller register file and drive-out latch
    pub fdc: FdcSnapshot,

    /// Both drive bays, media included
    pub drives: [DriveSnapshot; 2],
}

impl SaveState {
    /// Capture the system's current state
    ///
    /// Fails with [`EmulatorError::SaveStateBusy`] if a disc command is in
    /// flight.
    pub fn capture(system: &System, description: &str) -> Result<Self> {
        if system.fdc().is_busy() {
            return Err(EmulatorError::SaveStateBusy);
        }
        Ok(Self {
            version: SAVE_STATE_VERSION,
            metadata: SaveStateMetadata {
                created_at: Utc::now(),
                description: description.to_string(),
            },
            wheel_ticks: system.wheel().global_tick_counter,
            fdc: system.fdc().snapshot(),
            drives: [
                system.fdc().drive(0).snapshot(),
                system.fdc().drive(1).snapshot(),
            ],
        })
    }

    /// Restore this state into a system
    pub fn apply(&self, system: &mut System) -> Result<()> {
        if self.version != SAVE_STATE_VERSION {
            return Err(EmulatorError::SaveStateVersion {
                expected: SAVE_STATE_VERSION,
                got: self.version,
            });
        }

        system.reset();
        system.fdc_mut().drive_mut(0).restore(self.drives[0].clone());
        system.fdc_mut().drive_mut(1).restore(self.drives[1].clone());
        // Restoring the FDC last replays the drive output latch, which
        // re-selects and respins whatever was active.
        system.fdc_mut().restore(&self.fdc);
        log::info!(
            "save state applied: '{}' from {}",
            self.metadata.description,
            self.metadata.created_at
        );
        Ok(())
    }

    /// Encode to bincode bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|err| EmulatorError::SaveStateCodec(err.to_string()))
    }

    /// Decode from bincode bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (state, _) =
            bincode::serde::decode_from_slice::<Self, _>(bytes, bincode::config::standard())
                .map_err(|err| EmulatorError::SaveStateCodec(err.to_string()))?;
        if state.version != SAVE_STATE_VERSION {
            return Err(EmulatorError::SaveStateVersion {
                expected: SAVE_STATE_VERSION,
                got: state.version,
            });
        }
        Ok(state)
    }

    /// Write the encoded state to a file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read an encoded state from a file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tool::DiscTool;

    fn system_with_marked_disc() -> System {
        let mut system = System::new();
        system.fdc_mut().insert_blank_disc(0, false);
        let disc = system.fdc_mut().drive_mut(0).disc_mut().unwrap();
        let mut tool = DiscTool::new(disc);
        tool.set_track(4);
        tool.fill_fm_data(0xAA);
        system
    }

    #[test]
    fn test_capture_and_apply_round_trip() {
        let mut system = system_with_marked_disc();
        let state = SaveState::capture(&system, "test").unwrap();

        // Wreck the surface, then restore it.
        {
            let disc = system.fdc_mut().drive_mut(0).disc_mut().unwrap();
            let mut tool = DiscTool::new(disc);
            tool.set_track(4);
            tool.fill_fm_data(0x00);
        }
        state.apply(&mut system).unwrap();

        let disc = system.fdc_mut().drive_mut(0).disc_mut().unwrap();
        let mut tool = DiscTool::new(disc);
        tool.set_track(4);
        let (_, data) = tool.read_fm_data(8);
        assert!(data.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_bytes_round_trip() {
        let system = system_with_marked_disc();
        let state = SaveState::capture(&system, "codec").unwrap();

        let bytes = state.to_bytes().unwrap();
        let decoded = SaveState::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.version, SAVE_STATE_VERSION);
        assert_eq!(decoded.metadata.description, "codec");
        assert_eq!(decoded.fdc.regs, state.fdc.regs);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let system = system_with_marked_disc();
        let mut state = SaveState::capture(&system, "old").unwrap();
        state.version = 999;

        let mut target = System::new();
        assert!(matches!(
            state.apply(&mut target),
            Err(EmulatorError::SaveStateVersion { got: 999, .. })
        ));
    }

    #[test]
    fn test_capture_while_busy_fails() {
        let mut system = system_with_marked_disc();
        // SEEK wants one parameter; the controller sits busy waiting.
        system.fdc_write(0, 0x69);
        assert!(matches!(
            SaveState::capture(&system, "busy"),
            Err(EmulatorError::SaveStateBusy)
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let system = system_with_marked_disc();
        let state = SaveState::capture(&system, "file").unwrap();

        let file = tempfile::Builder::new()
            .prefix("beebrx_state_")
            .suffix(".state")
            .tempfile()
            .unwrap();
        state.save_to_file(file.path()).unwrap();
        let loaded = SaveState::load_from_file(file.path()).unwrap();
        assert_eq!(loaded.metadata.description, "file");
    }
}
