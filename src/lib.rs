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

//! BBC Micro disc and JIT emulation core library
//!
//! This library provides the hard core of a BBC Micro emulator: the Intel
//! 8271 floppy disc controller emulated at disc-pulse granularity, the
//! pulse-level disc tool layer, and the 6502-to-host JIT compiler front end.
//!
//! # Example
//!
//! ```
//! use beebrx::core::system::System;
//!
//! let mut system = System::new();
//! system.fdc_mut().insert_blank_disc(0, false);
//!
//! // Advance emulated time by 1000 CPU cycles (2 MHz, 0.5 µs per tick)
//! system.step(1000);
//! ```

pub mod core;
