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

//! System integration
//!
//! Wires the disc subsystem together on one cooperative clock: the timer
//! wheel carries virtual time, the FDC pumps the selected drive's rotation
//! and services its seek timers, and the CPU-facing surfaces (MMIO and the
//! NMI line) are exposed through thin wrappers.
//!
//! Scheduling is single threaded: [`System::step`] advances everything by
//! a number of CPU cycles (0.5 µs each) and must be called with small
//! enough slices that the host can service need-data between disc bytes,
//! exactly like the real CPU would.

use super::config::MachineConfig;
use super::disc::DiscImage;
use super::fdc::IntelFdc;
use super::timing::{TickCount, TimerWheel};

/// The emulated machine core
pub struct System {
    wheel: TimerWheel,
    fdc: IntelFdc,
}

impl System {
    /// Create a system with empty drives
    pub fn new() -> Self {
        let mut wheel = TimerWheel::new();
        let fdc = IntelFdc::new(&mut wheel);
        Self { wheel, fdc }
    }

    /// Create a system from a machine configuration
    pub fn with_config(config: &MachineConfig) -> Self {
        let mut system = Self::new();
        system.fdc.set_log_commands(config.fdc.log_commands);
        for (index, drive) in config.drives.iter().take(2).enumerate() {
            if drive.blank_disc {
                system.fdc.drive_mut(index).insert_disc(DiscImage::blank(
                    drive.double_sided,
                    drive.write_protect,
                ));
            }
        }
        system
    }

    /// The floppy disc controller
    pub fn fdc(&self) -> &IntelFdc {
        &self.fdc
    }

    /// The floppy disc controller, mutably
    pub fn fdc_mut(&mut self) -> &mut IntelFdc {
        &mut self.fdc
    }

    /// The timer wheel
    pub fn wheel(&self) -> &TimerWheel {
        &self.wheel
    }

    /// The timer wheel, mutably
    pub fn wheel_mut(&mut self) -> &mut TimerWheel {
        &mut self.wheel
    }

    /// Advance virtual time by `cycles` CPU cycles
    pub fn step(&mut self, cycles: TickCount) {
        self.wheel.pending_ticks += cycles;
        self.fdc.tick(&mut self.wheel, cycles);
        let fired = self.wheel.run_timers();
        self.fdc.process_timers(&mut self.wheel, &fired);
    }

    /// Read an FDC MMIO address
    pub fn fdc_read(&mut self, addr: u16) -> u8 {
        self.fdc.read(addr)
    }

    /// Write an FDC MMIO address
    pub fn fdc_write(&mut self, addr: u16, value: u8) {
        self.fdc.write(&mut self.wheel, addr, value);
    }

    /// Break-key reset
    pub fn reset(&mut self) {
        self.fdc.break_reset(&mut self.wheel);
    }

    /// Full power-on reset
    pub fn power_on_reset(&mut self) {
        self.fdc.power_on_reset(&mut self.wheel);
        self.wheel.reset();
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}
