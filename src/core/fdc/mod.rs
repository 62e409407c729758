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

//! Intel 8271 floppy disc controller
//!
//! Emulates the 8271 at the level of its internal microcontroller: a flat
//! 32-byte register file (with the datasheet's register aliasing preserved),
//! a command dispatcher driven by parameter writes, a seek state machine
//! paced by the timer wheel, and a read/write state machine fed one disc
//! byte (or bit) at a time from the selected drive.
//!
//! # MMIO map
//!
//! The chip decodes three address lines. Reads: 0 = status, 1 = result
//! (lowers result-ready and NMI), 2/3 = the internal byte counter MSB/LSB,
//! 4-7 = data (lowers need-data and NMI). Writes: 0 = command,
//! 1 = parameter, 2 = reset, 4-7 = data.
//!
//! # Interrupts
//!
//! The status register's NMI bit is mirrored onto the CPU's edge-triggered
//! NMI line whenever it changes. Raising it while an edge is still pending
//! means a lost interrupt and is logged as an error.

mod commands;
mod transfer;
#[cfg(test)]
mod tests;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::disc::DiscImage;
use super::drive::DiscDrive;
use super::interrupt::NmiLine;
use super::timing::{TickCount, TimerId, TimerWheel};

/// MMIO read address: status register
pub const ADDR_STATUS: u16 = 0;
/// MMIO read address: result register
pub const ADDR_RESULT: u16 = 1;
/// MMIO write address: command register
pub const ADDR_COMMAND: u16 = 0;
/// MMIO write address: parameter register
pub const ADDR_PARAMETER: u16 = 1;
/// MMIO write address: reset register
pub const ADDR_RESET: u16 = 2;
/// MMIO read/write address: data register (aliased across 4-7)
pub const ADDR_DATA: u16 = 4;

bitflags! {
    /// Internal status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const BUSY = 0x80;
        const COMMAND_FULL = 0x40;
        const PARAM_FULL = 0x20;
        const RESULT_READY = 0x10;
        const NMI = 0x08;
        const NEED_DATA = 0x04;
    }
}

bitflags! {
    /// Drive output latch bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DriveOut: u8 {
        const SELECT_1 = 0x80;
        const SELECT_0 = 0x40;
        const SIDE = 0x20;
        const LOW_HEAD_CURRENT = 0x10;
        const LOAD_HEAD = 0x08;
        const DIRECTION = 0x04;
        const STEP = 0x02;
        const WRITE_ENABLE = 0x01;
    }
}

/// Result register codes
pub mod result {
    pub const OK: u8 = 0x00;
    pub const CLOCK_ERROR: u8 = 0x08;
    pub const LATE_DMA: u8 = 0x0A;
    pub const ID_CRC_ERROR: u8 = 0x0C;
    pub const DATA_CRC_ERROR: u8 = 0x0E;
    pub const DRIVE_NOT_READY: u8 = 0x10;
    pub const WRITE_PROTECTED: u8 = 0x12;
    pub const SECTOR_NOT_FOUND: u8 = 0x18;
    pub const FLAG_DELETED_DATA: u8 = 0x20;
}

/// Register file indices
///
/// The 8271's registers alias heavily: the same storage cell serves
/// different purposes in different command phases. These names follow the
/// datasheet and ROM disassembly; aliases are intentional and preserved by
/// keeping a flat 32-byte file.
pub(crate) mod reg {
    pub const INTERNAL_POINTER: u8 = 0x00;
    pub const INTERNAL_COUNT_MSB_COPY: u8 = 0x00;
    pub const INTERNAL_PARAM_COUNT: u8 = 0x01;
    pub const INTERNAL_SEEK_RETRY_COUNT: u8 = 0x01;
    pub const INTERNAL_PARAM_DATA_MARKER: u8 = 0x02;
    pub const INTERNAL_PARAM_5: u8 = 0x03;
    pub const INTERNAL_PARAM_4: u8 = 0x04;
    pub const INTERNAL_PARAM_3: u8 = 0x05;
    pub const INTERNAL_PARAM_2: u8 = 0x06;
    pub const INTERNAL_PARAM_1: u8 = 0x07;
    pub const INTERNAL_HEADER_POINTER: u8 = 0x08;
    pub const INTERNAL_MS_COUNT_HI: u8 = 0x08;
    pub const INTERNAL_MS_COUNT_LO: u8 = 0x09;
    pub const INTERNAL_SEEK_COUNT: u8 = 0x0A;
    pub const INTERNAL_ID_SECTOR: u8 = 0x0A;
    pub const INTERNAL_SEEK_TARGET_1: u8 = 0x0B;
    pub const INTERNAL_SEEK_TARGET_2: u8 = 0x0C;
    pub const INTERNAL_ID_TRACK: u8 = 0x0C;
    pub const HEAD_STEP_RATE: u8 = 0x0D;
    pub const HEAD_SETTLE_TIME: u8 = 0x0E;
    pub const HEAD_LOAD_UNLOAD: u8 = 0x0F;
    pub const BAD_TRACK_1_DRIVE_0: u8 = 0x10;
    pub const TRACK_DRIVE_0: u8 = 0x12;
    pub const INTERNAL_COUNT_LSB: u8 = 0x13;
    pub const INTERNAL_COUNT_MSB: u8 = 0x14;
    pub const INTERNAL_DRIVE_IN_COPY: u8 = 0x15;
    pub const INTERNAL_GAP2_SKIP: u8 = 0x15;
    pub const INTERNAL_RESULT: u8 = 0x16;
    pub const MODE: u8 = 0x17;
    pub const INTERNAL_STATUS: u8 = 0x17;
    pub const BAD_TRACK_1_DRIVE_1: u8 = 0x18;
    pub const TRACK_DRIVE_1: u8 = 0x1A;
    pub const INTERNAL_DRIVE_IN_LATCHED: u8 = 0x1B;
    pub const INTERNAL_INDEX_PULSE_COUNT: u8 = 0x1C;
    pub const INTERNAL_DATA: u8 = 0x1D;
    pub const INTERNAL_PARAMETER: u8 = 0x1E;
    pub const INTERNAL_COMMAND: u8 = 0x1F;
    // Pseudo-registers beyond the 32-byte file, reachable through the
    // special register commands only.
    pub const DRIVE_IN: u8 = 0x22;
    pub const DRIVE_OUT: u8 = 0x23;
}

/// Mode register bits (aliased with the status register)
pub(crate) mod mode {
    pub const SINGLE_ACTUATOR: u8 = 0x02;
}

/// On-chip register file size
const NUM_REGISTERS: usize = 32;

/// Executable command slots, decoded from `(command & 0x3C) >> 2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    ScanData,
    ScanDataAndDeleted,
    WriteData,
    WriteDeletedData,
    ReadData,
    ReadDataAndDeleted,
    ReadId,
    Verify,
    Format,
    Unused9,
    Seek,
    ReadDriveStatus,
    Unused12,
    Specify,
    WriteSpecialRegister,
    ReadSpecialRegister,
}

impl Command {
    fn from_index(index: u8) -> Self {
        match index & 0x0F {
            0 => Command::ScanData,
            1 => Command::ScanDataAndDeleted,
            2 => Command::WriteData,
            3 => Command::WriteDeletedData,
            4 => Command::ReadData,
            5 => Command::ReadDataAndDeleted,
            6 => Command::ReadId,
            7 => Command::Verify,
            8 => Command::Format,
            9 => Command::Unused9,
            10 => Command::Seek,
            11 => Command::ReadDriveStatus,
            12 => Command::Unused12,
            13 => Command::Specify,
            14 => Command::WriteSpecialRegister,
            _ => Command::ReadSpecialRegister,
        }
    }
}

/// Read/write state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Idle,
    WaitNoIndex,
    WaitIndex,
    SyncingForIdWait,
    SyncingForId,
    CheckIdMarker,
    InId,
    InIdCrc,
    SyncingForData,
    CheckDataMarker,
    InData,
    InDeletedData,
    InDataCrc,
    SkipGap2,
    WriteGap2,
    WriteSectorData,
    FormatGap1,
    FormatWriteId,
    FormatWriteData,
    FormatGap3,
    FormatGap4,
}

/// What the shared timer is currently counting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerState {
    None,
    SeekStep,
    PostSeek,
}

/// How an incoming parameter byte is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamCallback {
    None,
    Command,
    Specify,
}

/// What an index pulse edge means to the current command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexPulseCallback {
    None,
    Timeout,
    Spindown,
}

/// Serializable controller state for save states
///
/// The register file and drive-out latch are the 8271's only state that
/// survives between commands; everything else is derivable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FdcSnapshot {
    /// The 32-byte register file
    pub regs: [u8; NUM_REGISTERS],
    /// Drive output latch bits
    pub drive_out: u8,
}

/// Intel 8271 floppy disc controller
pub struct IntelFdc {
    /// On-chip register file; aliasing is load-bearing, see [`reg`]
    regs: [u8; NUM_REGISTERS],

    /// Drive output latch
    drive_out: DriveOut,

    /// The two drive mechanisms wired to the controller
    drives: [DiscDrive; 2],

    /// Index of the selected drive, if exactly one select bit is active
    current_drive: Option<usize>,

    /// NMI line into the CPU
    nmi: NmiLine,

    /// Shared seek/settle timer on the wheel
    timer_id: TimerId,

    /// What the timer is counting
    pub(crate) timer_state: TimerState,

    /// Pending parameter-byte consumer
    pub(crate) parameter_callback: ParamCallback,

    /// Pending index-pulse consumer
    pub(crate) index_pulse_callback: IndexPulseCallback,

    /// Read/write FSM state
    pub(crate) state: State,

    /// Monotone counter within the current state
    pub(crate) state_count: u32,

    /// Index pulse level as sampled at the last byte boundary
    pub(crate) state_is_index_pulse: bool,

    /// Bit-level shift register for sync and byte assembly
    pub(crate) shift_register: u32,

    /// Bits currently held in the shift register
    pub(crate) num_shifts: u32,

    /// Live CRC over the field being read or written
    pub(crate) crc: u16,

    /// CRC bytes being assembled off the disc for comparison
    pub(crate) on_disc_crc: u16,

    /// Log command dispatch and completion
    log_commands: bool,
}

impl IntelFdc {
    /// Create a controller with two empty drives, registering its timer on
    /// the wheel
    pub fn new(wheel: &mut TimerWheel) -> Self {
        Self {
            regs: [0; NUM_REGISTERS],
            drive_out: DriveOut::empty(),
            drives: [DiscDrive::new(0), DiscDrive::new(1)],
            current_drive: None,
            nmi: NmiLine::new(),
            timer_id: wheel.register_timer("8271"),
            timer_state: TimerState::None,
            parameter_callback: ParamCallback::None,
            index_pulse_callback: IndexPulseCallback::None,
            state: State::Idle,
            state_count: 0,
            state_is_index_pulse: false,
            shift_register: 0,
            num_shifts: 0,
            crc: 0,
            on_disc_crc: 0,
            log_commands: false,
        }
    }

    /// Enable or disable command logging
    pub fn set_log_commands(&mut self, log_commands: bool) {
        self.log_commands = log_commands;
    }

    pub(crate) fn log_commands(&self) -> bool {
        self.log_commands
    }

    /// A drive mechanism
    pub fn drive(&self, index: usize) -> &DiscDrive {
        &self.drives[index]
    }

    /// A drive mechanism, mutably
    pub fn drive_mut(&mut self, index: usize) -> &mut DiscDrive {
        &mut self.drives[index]
    }

    /// Insert a blank disc into a drive
    pub fn insert_blank_disc(&mut self, drive: usize, write_protect: bool) {
        self.drives[drive].insert_disc(DiscImage::blank(false, write_protect));
    }

    /// The NMI line the CPU consumes
    pub fn nmi(&self) -> &NmiLine {
        &self.nmi
    }

    /// The NMI line, mutably (the CPU takes edges through this)
    pub fn nmi_mut(&mut self) -> &mut NmiLine {
        &mut self.nmi
    }

    /// The drive output latch
    pub fn drive_out(&self) -> DriveOut {
        self.drive_out
    }

    // ----- register file primitives -----

    pub(crate) fn reg(&self, index: u8) -> u8 {
        self.regs[index as usize]
    }

    pub(crate) fn set_reg(&mut self, index: u8, value: u8) {
        self.regs[index as usize] = value;
    }

    pub(crate) fn status(&self) -> Status {
        Status::from_bits_retain(self.regs[reg::INTERNAL_STATUS as usize])
    }

    /// External view of the status register
    ///
    /// The internal status cell is shared with mode bits (0x03) which are
    /// masked out. Bit 0x40, "command register full", is never returned:
    /// its true behaviour is not understood, and observed hardware always
    /// reads it as zero.
    pub(crate) fn external_status(&self) -> u8 {
        let mut status = self.regs[reg::INTERNAL_STATUS as usize];
        status &= !0x03;
        status &= !0x40;
        status
    }

    fn update_nmi(&mut self) {
        let level = self.status().contains(Status::NMI);
        if level && self.nmi.is_firing() {
            log::error!("edge triggered NMI already high");
        }
        self.nmi.set_level(level);
    }

    pub(crate) fn status_raise(&mut self, bits: Status) {
        self.regs[reg::INTERNAL_STATUS as usize] |= bits.bits();
        if bits.contains(Status::NMI) {
            self.update_nmi();
        }
    }

    pub(crate) fn status_lower(&mut self, bits: Status) {
        self.regs[reg::INTERNAL_STATUS as usize] &= !bits.bits();
        if bits.contains(Status::NMI) {
            self.update_nmi();
        }
    }

    pub(crate) fn result(&self) -> u8 {
        self.regs[reg::INTERNAL_RESULT as usize]
    }

    pub(crate) fn set_result(&mut self, result: u8) {
        self.regs[reg::INTERNAL_RESULT as usize] = result;
        self.status_raise(Status::RESULT_READY);
    }

    /// The executable command slot from the low 6 bits of the command
    /// register
    pub(crate) fn internal_command(&self) -> Command {
        let command = self.regs[reg::INTERNAL_COMMAND as usize] & 0x3C;
        Command::from_index(command >> 2)
    }

    pub(crate) fn command_is_writing(&self) -> bool {
        matches!(
            self.internal_command(),
            Command::WriteData | Command::WriteDeletedData | Command::Format
        )
    }

    // ----- drive output -----

    /// Rewire the drive output latch, with all its side effects
    ///
    /// A change of select bits spins down the old drive (if its head was
    /// loaded) and spins up the new one. Asserting both selects is
    /// ambiguous on real hardware; no drive is selected.
    pub(crate) fn set_drive_out(&mut self, drive_out: DriveOut) {
        if let Some(index) = self.current_drive {
            if self.drive_out.contains(DriveOut::LOAD_HEAD) {
                self.drives[index].stop_spinning();
            }
        }

        self.current_drive = match drive_out.bits() & 0xC0 {
            0x40 => Some(0),
            0x80 => Some(1),
            _ => None,
        };

        if let Some(index) = self.current_drive {
            if drive_out.contains(DriveOut::LOAD_HEAD) {
                self.drives[index].start_spinning();
            }
            self.drives[index].select_side(drive_out.contains(DriveOut::SIDE));
        }

        self.drive_out = drive_out;
    }

    pub(crate) fn drive_out_raise(&mut self, bits: DriveOut) {
        self.set_drive_out(self.drive_out | bits);
    }

    pub(crate) fn drive_out_lower(&mut self, bits: DriveOut) {
        self.set_drive_out(self.drive_out - bits);
    }

    pub(crate) fn spindown(&mut self) {
        self.drive_out_lower(DriveOut::SELECT_1 | DriveOut::SELECT_0 | DriveOut::LOAD_HEAD);
    }

    pub(crate) fn current_drive(&self) -> Option<&DiscDrive> {
        self.current_drive.map(|index| &self.drives[index])
    }

    pub(crate) fn current_drive_mut(&mut self) -> Option<&mut DiscDrive> {
        self.current_drive.map(move |index| &mut self.drives[index])
    }

    // ----- drive input -----

    pub(crate) fn is_write_protect(&self) -> bool {
        self.current_drive().is_some_and(DiscDrive::is_write_protect)
    }

    pub(crate) fn is_track_0(&self) -> bool {
        self.current_drive().is_some_and(|drive| drive.get_track() == 0)
    }

    pub(crate) fn is_index_pulse(&self) -> bool {
        self.current_drive().is_some_and(DiscDrive::is_index_pulse)
    }

    fn current_drive_is_spinning(&self) -> bool {
        self.current_drive().is_some_and(DiscDrive::is_spinning)
    }

    /// Compose the drive input lines
    ///
    /// Bits 7 and 0 read as set on real hardware. The remaining lines are
    /// only meaningful while the selected drive is spinning.
    pub(crate) fn read_drive_in(&self) -> u8 {
        let mut drive_in = 0x81;
        if self.current_drive_is_spinning() {
            if self.is_track_0() {
                drive_in |= 0x02; // TRK0
            }
            if self.drive_out.contains(DriveOut::SELECT_0) {
                drive_in |= 0x04; // RDY0
            }
            if self.drive_out.contains(DriveOut::SELECT_1) {
                drive_in |= 0x40; // RDY1
            }
            if self.is_write_protect() {
                drive_in |= 0x08; // WR PROT
            }
            if self.is_index_pulse() {
                drive_in |= 0x10; // INDEX
            }
        }
        drive_in
    }

    /// Sample the drive inputs into the copy register, folding the ready
    /// lines through the latched register
    ///
    /// The latched register remembers a ready line that has been seen low;
    /// only the READ_DRIVE_STATUS command restores it from the live copy.
    pub(crate) fn do_read_drive_status(&mut self) -> u8 {
        let mut drive_in = self.read_drive_in();
        self.set_reg(reg::INTERNAL_DRIVE_IN_COPY, drive_in);
        let latched = self.reg(reg::INTERNAL_DRIVE_IN_LATCHED) | 0xBB;
        drive_in &= latched;
        self.set_reg(reg::INTERNAL_DRIVE_IN_LATCHED, drive_in);
        drive_in
    }

    // ----- special register access -----

    /// Read a register through READ_SPECIAL_REGISTER addressing
    pub(crate) fn read_register(&mut self, register: u8) -> u8 {
        let register = register & 0x3F;
        if (register as usize) < NUM_REGISTERS {
            return self.reg(register);
        }
        match register & 0x07 {
            r if r == (reg::DRIVE_IN & 0x07) => self.read_drive_in(),
            // DFS-1.2 reads drive out in normal operation.
            r if r == (reg::DRIVE_OUT & 0x07) => self.drive_out.bits(),
            r => {
                log::warn!("8271: direct read of unimplemented MMIO register {r}");
                0
            }
        }
    }

    /// Write a register through WRITE_SPECIAL_REGISTER addressing
    pub(crate) fn write_register(&mut self, register: u8, value: u8) {
        let register = register & 0x3F;
        if (register as usize) < NUM_REGISTERS {
            self.set_reg(register, value);
            return;
        }
        match register & 0x07 {
            // Side select and manual head load / spin control both arrive
            // through direct drive-out writes.
            r if r == (reg::DRIVE_OUT & 0x07) => {
                self.set_drive_out(DriveOut::from_bits_retain(value));
            }
            r => {
                log::warn!("8271: direct write of unimplemented MMIO register {r}");
            }
        }
    }

    // ----- MMIO surface -----

    /// Read one of the chip's MMIO addresses (masked to the low 3 bits)
    pub fn read(&mut self, addr: u16) -> u8 {
        match addr & 0x07 {
            0 => self.external_status(),
            1 => {
                let result = self.result();
                self.status_lower(Status::RESULT_READY | Status::NMI);
                result
            }
            // Registers 2 and 3 are not documented as readable, but real
            // hardware presents the internal byte counter there.
            2 => self.reg(reg::INTERNAL_COUNT_MSB),
            3 => self.reg(reg::INTERNAL_COUNT_LSB),
            // The data register is mapped across all of 4-7.
            _ => {
                self.status_lower(Status::NEED_DATA | Status::NMI);
                self.reg(reg::INTERNAL_DATA)
            }
        }
    }

    /// Write one of the chip's MMIO addresses (masked to the low 3 bits)
    ///
    /// Needs the timer wheel because a completed parameter list dispatches
    /// the command, and seeks are timer paced.
    pub fn write(&mut self, wheel: &mut TimerWheel, addr: u16, value: u8) {
        match addr & 0x07 {
            0 => self.command_written(wheel, value),
            1 => self.param_written(wheel, value),
            2 => {
                // Values 2 and 4 do crazy things to a real 8271; treat any
                // such write as a fatal emulation error.
                assert!(value == 0 || value == 1, "invalid 8271 reset value {value}");
                if value == 1 {
                    if self.log_commands {
                        log::info!("8271: reset");
                    }
                    self.break_reset(wheel);
                }
            }
            3 => {
                log::info!("8271: write to unmapped register 3");
            }
            _ => {
                self.status_lower(Status::NEED_DATA | Status::NMI);
                self.set_reg(reg::INTERNAL_DATA, value);
            }
        }
    }

    // ----- reset -----

    /// Reset driven by the host's break key / reset register
    ///
    /// Aborts any in-flight command (leaving a deliberately misaligned
    /// trailing byte if mid-write), deselects the drives and clears status.
    /// The register file itself survives.
    pub fn break_reset(&mut self, wheel: &mut TimerWheel) {
        self.command_abort();
        self.set_state(State::Idle);
        self.clear_callbacks(wheel);

        // Deselect any drive; ensures spin-down.
        self.set_drive_out(DriveOut::empty());

        // On a real machine status is cleared but result and data are not.
        self.status_lower(self.status());
    }

    /// Full power-on reset: break reset plus register file clear
    pub fn power_on_reset(&mut self, wheel: &mut TimerWheel) {
        self.break_reset(wheel);
        debug_assert_eq!(self.parameter_callback, ParamCallback::None);
        debug_assert_eq!(self.index_pulse_callback, IndexPulseCallback::None);
        debug_assert_eq!(self.timer_state, TimerState::None);
        debug_assert_eq!(self.state, State::Idle);
        debug_assert!(self.current_drive.is_none());
        debug_assert!(self.drive_out.is_empty());

        self.regs = [0; NUM_REGISTERS];
        self.state_count = 0;
        self.state_is_index_pulse = false;
        self.nmi.reset();
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
        self.state_count = 0;

        if state == State::SyncingForId || state == State::SyncingForData {
            self.shift_register = 0;
            self.num_shifts = 0;
        }
    }

    // ----- snapshots -----

    /// Whether a command is in flight
    pub fn is_busy(&self) -> bool {
        self.status().contains(Status::BUSY)
    }

    /// Capture the controller's persistent state
    ///
    /// Only meaningful between commands: the dynamic transfer state is
    /// not part of a snapshot.
    pub fn snapshot(&self) -> FdcSnapshot {
        FdcSnapshot {
            regs: self.regs,
            drive_out: self.drive_out.bits(),
        }
    }

    /// Restore a snapshot taken by [`IntelFdc::snapshot`]
    ///
    /// Dynamic transfer state resets to idle; the drive output latch is
    /// replayed with its full side-select and spin semantics.
    pub fn restore(&mut self, snapshot: &FdcSnapshot) {
        self.regs = snapshot.regs;
        self.state = State::Idle;
        self.state_count = 0;
        self.state_is_index_pulse = false;
        self.shift_register = 0;
        self.num_shifts = 0;
        self.crc = 0;
        self.on_disc_crc = 0;
        self.timer_state = TimerState::None;
        self.parameter_callback = ParamCallback::None;
        self.index_pulse_callback = IndexPulseCallback::None;
        self.nmi.reset();
        self.set_drive_out(DriveOut::from_bits_retain(snapshot.drive_out));
        self.update_nmi();
    }

    // ----- time -----

    /// Advance the controller by elapsed wheel ticks
    ///
    /// Pumps the selected drive's rotation and processes each due disc
    /// byte through the state machine, in on-disc order.
    pub fn tick(&mut self, wheel: &mut TimerWheel, ticks: TickCount) {
        let Some(index) = self.current_drive else {
            return;
        };
        let due = self.drives[index].accumulate(ticks);
        for _ in 0..due {
            // A command completing mid-burst may deselect or spin down the
            // drive; remaining byte slots then never happen.
            let Some(index) = self.current_drive else {
                break;
            };
            if !self.drives[index].is_spinning() {
                break;
            }
            let (data_byte, clocks_byte) = self.drives[index].read_head_byte();
            self.on_disc_byte(wheel, data_byte, clocks_byte);
            if let Some(index) = self.current_drive {
                self.drives[index].advance_head();
            }
        }
    }
}
