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

//! Edge-triggered NMI line
//!
//! The 8271 drives the 6502's NMI input directly. Unlike the level-triggered
//! IRQ input, NMI fires on the low-to-high transition only: if the line is
//! raised while an earlier assertion has not been consumed, the second edge
//! is lost. The FDC logs that situation as an error because it means a
//! guest-visible interrupt vanished.
//!
//! # Example
//!
//! ```
//! use beebrx::core::interrupt::NmiLine;
//!
//! let mut nmi = NmiLine::new();
//! nmi.set_level(true);
//!
//! // The CPU consumes the pending edge exactly once
//! assert!(nmi.take_edge());
//! assert!(!nmi.take_edge());
//! ```

/// Edge-triggered NMI line between the FDC and the CPU
///
/// Tracks both the current level (for edge detection) and whether an edge
/// has been generated but not yet consumed by the CPU.
#[derive(Debug, Default)]
pub struct NmiLine {
    /// Current line level
    level: bool,

    /// An asserted edge the CPU has not yet taken
    pending_edge: bool,
}

impl NmiLine {
    /// Create a new NMI line, deasserted with no pending edge
    pub fn new() -> Self {
        Self {
            level: false,
            pending_edge: false,
        }
    }

    /// Drive the line to a level
    ///
    /// A low-to-high transition latches a pending edge. Raising the line
    /// while an edge is still pending loses that edge; the caller is
    /// expected to check [`NmiLine::is_firing`] first and complain.
    pub fn set_level(&mut self, level: bool) {
        if level && !self.level {
            self.pending_edge = true;
            log::trace!("NMI edge latched");
        }
        self.level = level;
    }

    /// Current line level
    pub fn level(&self) -> bool {
        self.level
    }

    /// Whether an edge is latched and waiting for the CPU
    ///
    /// The FDC polls this before raising the line again: an already-pending
    /// edge at that point means an interrupt would be lost.
    pub fn is_firing(&self) -> bool {
        self.pending_edge
    }

    /// Consume the pending edge, if any
    ///
    /// The CPU calls this once per instruction boundary; a `true` return
    /// vectors through the NMI handler.
    pub fn take_edge(&mut self) -> bool {
        let edge = self.pending_edge;
        self.pending_edge = false;
        edge
    }

    /// Drop any pending edge and deassert the line
    pub fn reset(&mut self) {
        self.level = false;
        self.pending_edge = false;
    }
}
