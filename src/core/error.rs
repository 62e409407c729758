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

//! Emulator error types
//!
//! Guest-visible disc failures (CRC errors, missing sectors, late DMA) are
//! reported through FDC result codes and sector descriptor flags, not through
//! this type. `EmulatorError` covers host-side failures: configuration,
//! save-state I/O, and structural limits of the emulation itself.

use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Emulator error types
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// A track scan found more sector headers than the tool can describe
    #[error("too many sector headers on track {track} (limit {limit})")]
    TooManySectors {
        /// Track that overflowed the descriptor table
        track: u32,
        /// Maximum descriptors per track
        limit: usize,
    },

    /// Configuration file could not be parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Save state version does not match this build
    #[error("save state version mismatch: expected {expected}, got {got}")]
    SaveStateVersion {
        /// Version this build writes
        expected: u32,
        /// Version found in the file
        got: u32,
    },

    /// Save state could not be encoded or decoded
    #[error("save state codec error: {0}")]
    SaveStateCodec(String),

    /// Snapshot requested while a disc command is in flight
    #[error("cannot snapshot while a disc command is in flight")]
    SaveStateBusy,

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
