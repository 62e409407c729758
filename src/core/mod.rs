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

//! Core emulation components
//!
//! This module contains the hardware emulation components:
//! - FDC (Intel 8271 floppy disc controller)
//! - Disc (pulse-level disc surface and FM codec)
//! - Drive (rotating drive mechanics, index pulse, head stepping)
//! - Tool (bit-addressed track access and sector scanning)
//! - JIT (6502 basic-block compiler)
//! - Interrupt (edge-triggered NMI line into the CPU)
//! - Timing (single-shot timer wheel)
//! - System integration, configuration and save states

pub mod config;
pub mod disc;
pub mod drive;
pub mod error;
pub mod fdc;
pub mod interrupt;
pub mod jit;
pub mod save_state;
pub mod system;
pub mod timing;
pub mod tool;

// Re-export commonly used types
pub use disc::DiscImage;
pub use drive::DiscDrive;
pub use error::{EmulatorError, Result};
pub use fdc::IntelFdc;
pub use interrupt::NmiLine;
pub use jit::JitCompiler;
pub use system::System;
pub use timing::TimerWheel;
pub use tool::DiscTool;
