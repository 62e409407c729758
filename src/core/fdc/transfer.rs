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

//! 8271 read/write state machine
//!
//! The drive presents one byte of separated clocks and data every 64 µs.
//! For read-side states the byte is re-serialised into a bit stream
//! (clock bit, data bit, clock bit, ...) and pushed through the sync
//! detector and shift register, which tolerates disc surfaces that are not
//! byte aligned. Write-side states consume the byte slot by emitting one
//! byte through the drive instead.
//!
//! Sync is a run of 1 clock bits over 0 data bits (the `101010...` bit
//! stream). After at least 32 such bits, the first 1 data bit is the start
//! of a marker byte; the state machine exits to a check-marker state with
//! two bits of the marker already shifted in.

use super::super::disc::format::{
    crc_add_byte, crc_init, DATA_MARK_DATA_PATTERN, DELETED_DATA_MARK_DATA_PATTERN,
    ID_MARK_DATA_PATTERN, MARK_CLOCK_PATTERN,
};
use super::super::timing::TimerWheel;
use super::{reg, result, Command, DriveOut, IndexPulseCallback, IntelFdc, State, Status};

impl IntelFdc {
    // ----- sector size plumbing -----

    /// Sector size requested by the current command, from the top 3 bits
    /// of parameter 3
    pub(super) fn sector_size(&self) -> u32 {
        128 << (self.reg(reg::INTERNAL_PARAM_3) >> 5)
    }

    pub(super) fn setup_sector_size(&mut self) {
        let size = self.sector_size();
        let msb = ((size / 128) - 1) as u8;
        self.set_reg(reg::INTERNAL_COUNT_LSB, 0x80);
        self.set_reg(reg::INTERNAL_COUNT_MSB, msb);
        // This cell is R0; the internal pointer is trashed here.
        self.set_reg(reg::INTERNAL_COUNT_MSB_COPY, msb);
    }

    /// Count down one data byte; true when the whole sector is done
    pub(super) fn decrement_counter(&mut self) -> bool {
        let lsb = self.reg(reg::INTERNAL_COUNT_LSB).wrapping_sub(1);
        self.set_reg(reg::INTERNAL_COUNT_LSB, lsb);
        if lsb != 0 {
            return false;
        }
        let msb = self.reg(reg::INTERNAL_COUNT_MSB).wrapping_sub(1);
        self.set_reg(reg::INTERNAL_COUNT_MSB, msb);
        if msb != 0xFF {
            self.set_reg(reg::INTERNAL_COUNT_LSB, 0x80);
            return false;
        }
        self.set_reg(reg::INTERNAL_COUNT_MSB, 0);
        true
    }

    // ----- command phase helpers -----

    pub(super) fn start_index_pulse_timeout(&mut self) {
        // Three index pulses without sector progress ends the command
        // with "sector not found".
        self.set_reg(reg::INTERNAL_INDEX_PULSE_COUNT, 3);
        self.index_pulse_callback = IndexPulseCallback::Timeout;
    }

    pub(super) fn start_syncing_for_header(&mut self) {
        // ID bytes land at descending register indices from 0x0C.
        self.set_reg(reg::INTERNAL_HEADER_POINTER, 0x0C);
        self.set_state(State::SyncingForId);
    }

    // ----- data-loss checks -----

    fn check_data_loss_ok(&mut self, wheel: &mut TimerWheel) -> bool {
        let command = self.internal_command();

        // Scan commands need DMA, which is not wired up; they always die
        // here.
        let mut ok =
            !matches!(command, Command::ScanData | Command::ScanDataAndDeleted);

        // Abort if the previous data byte wasn't picked up in time.
        if self.status().contains(Status::NEED_DATA) {
            ok = false;
        }

        if ok {
            return true;
        }

        self.command_abort();
        self.finish_command(wheel, result::LATE_DMA);
        false
    }

    fn provide_data_byte(&mut self, wheel: &mut TimerWheel, byte: u8) -> bool {
        if !self.check_data_loss_ok(wheel) {
            return false;
        }
        self.set_reg(reg::INTERNAL_DATA, byte);
        self.status_raise(Status::NMI | Status::NEED_DATA);
        true
    }

    fn consume_data_byte(&mut self, wheel: &mut TimerWheel) -> bool {
        let data = self.reg(reg::INTERNAL_DATA);
        if !self.check_data_loss_ok(wheel) {
            return false;
        }
        if let Some(drive) = self.current_drive_mut() {
            drive.write_byte(data, 0xFF);
        }
        true
    }

    fn check_crc(&mut self, wheel: &mut TimerWheel, error: u8) -> bool {
        if self.crc == self.on_disc_crc {
            return true;
        }
        self.finish_command(wheel, error);
        false
    }

    // ----- byte entry point -----

    /// Handle one disc byte of separated data and clocks
    pub(super) fn on_disc_byte(&mut self, wheel: &mut TimerWheel, data_byte: u8, clocks_byte: u8) {
        self.check_index_pulse(wheel);

        match self.state {
            State::Idle => {
                // An open write gate outside a command scrubs flux from
                // the surface, creating weak bits.
                if self.drive_out().contains(DriveOut::WRITE_ENABLE) && !self.is_write_protect() {
                    if let Some(drive) = self.current_drive_mut() {
                        drive.write_byte(0x00, 0x00);
                    }
                }
            }
            State::WaitNoIndex => {
                if !self.state_is_index_pulse {
                    self.set_state(State::WaitIndex);
                }
            }
            State::WaitIndex => {
                if !self.state_is_index_pulse {
                    return;
                }
                if self.internal_command() == Command::ReadId {
                    self.start_index_pulse_timeout();
                    self.start_syncing_for_header();
                } else {
                    debug_assert_eq!(self.internal_command(), Command::Format);
                    assert!(
                        self.reg(reg::INTERNAL_PARAM_4) == 0,
                        "format GAP5 not supported"
                    );
                    self.drive_out_raise(DriveOut::WRITE_ENABLE);
                    self.set_state(State::FormatGap1);
                    // Writing starts on this same byte slot.
                    self.byte_callback_writing(wheel);
                }
            }
            State::SyncingForIdWait
            | State::SyncingForId
            | State::CheckIdMarker
            | State::InId
            | State::InIdCrc
            | State::SkipGap2
            | State::SyncingForData
            | State::CheckDataMarker
            | State::InData
            | State::InDeletedData
            | State::InDataCrc => {
                // Re-serialise the byte into bits, so surfaces that are
                // not byte aligned (easily made with exotic image formats)
                // still sync correctly.
                let mut clocks = clocks_byte;
                let mut data = data_byte;
                for _ in 0..8 {
                    self.shift_data_bit(wheel, clocks >> 7);
                    self.shift_data_bit(wheel, data >> 7);
                    clocks <<= 1;
                    data <<= 1;
                }
            }
            State::WriteGap2
            | State::WriteSectorData
            | State::FormatGap1
            | State::FormatWriteId
            | State::FormatWriteData
            | State::FormatGap3
            | State::FormatGap4 => {
                self.byte_callback_writing(wheel);
            }
        }
    }

    /// Sample the index pulse at a byte boundary and react to the rising
    /// edge
    fn check_index_pulse(&mut self, wheel: &mut TimerWheel) {
        let was_index_pulse = self.state_is_index_pulse;
        self.state_is_index_pulse = self.is_index_pulse();

        // Only the transition to active is interesting.
        if !self.state_is_index_pulse || was_index_pulse {
            return;
        }

        match self.index_pulse_callback {
            IndexPulseCallback::None => {}
            IndexPulseCallback::Timeout => {
                let count = self.reg(reg::INTERNAL_INDEX_PULSE_COUNT).wrapping_sub(1);
                self.set_reg(reg::INTERNAL_INDEX_PULSE_COUNT, count);
                if count == 0 {
                    self.finish_command(wheel, result::SECTOR_NOT_FOUND);
                }
            }
            IndexPulseCallback::Spindown => {
                let count = self.reg(reg::INTERNAL_INDEX_PULSE_COUNT).wrapping_sub(1);
                self.set_reg(reg::INTERNAL_INDEX_PULSE_COUNT, count);
                if count == 0 {
                    if self.log_commands() {
                        log::info!("8271: automatic head unload");
                    }
                    self.spindown();
                    self.index_pulse_callback = IndexPulseCallback::None;
                }
            }
        }
    }

    // ----- bit-level shifting -----

    fn shift_data_bit(&mut self, wheel: &mut TimerWheel, bit: u8) {
        let bit = u32::from(bit & 1);

        match self.state {
            State::SyncingForIdWait => {
                self.state_count += 1;
                // The controller needs recovery time after a sector header
                // before it can sync to another: 4 byte times, measured
                // with the read-sector-IDs command.
                if self.state_count == 4 * 8 * 2 {
                    self.start_syncing_for_header();
                }
            }
            State::SyncingForId | State::SyncingForData => {
                let state_count = self.state_count;
                // Sync is 1010101010...: 1 clock bits over 0 data bits.
                if (bit == 1) == (state_count & 1 == 0) {
                    self.state_count += 1;
                } else if state_count >= 32 && state_count & 1 == 1 {
                    // A 1 data bit while in sync: start of a marker byte.
                    debug_assert_eq!(bit, 1);
                    if self.state == State::SyncingForId {
                        self.set_state(State::CheckIdMarker);
                    } else {
                        self.set_state(State::CheckDataMarker);
                    }
                    // Clock 1, data 1 already seen.
                    self.shift_register = 3;
                    self.num_shifts = 2;
                } else {
                    // Restart sync.
                    self.state_count = 0;
                }
            }
            State::CheckIdMarker
            | State::InId
            | State::InIdCrc
            | State::CheckDataMarker
            | State::InData
            | State::InDeletedData
            | State::InDataCrc
            | State::SkipGap2 => {
                self.shift_register = (self.shift_register << 1) | bit;
                self.num_shifts += 1;
                if self.num_shifts != 16 {
                    return;
                }

                // Unzip the interleaved clock/data bits back into bytes.
                let shift_register = self.shift_register;
                let mut clocks_byte = 0u8;
                let mut data_byte = 0u8;
                for i in 0..8 {
                    clocks_byte = (clocks_byte << 1) | ((shift_register >> (15 - 2 * i)) & 1) as u8;
                    data_byte = (data_byte << 1) | ((shift_register >> (14 - 2 * i)) & 1) as u8;
                }

                self.byte_callback_reading(wheel, data_byte, clocks_byte);

                self.shift_register = 0;
                self.num_shifts = 0;
            }
            // A few trailing bits arrive after a command ends if the disc
            // surface isn't byte aligned.
            State::Idle | State::WriteGap2 => {}
            _ => {
                debug_assert!(false, "bit shifted in state {:?}", self.state);
            }
        }
    }

    // ----- read-side byte handling -----

    fn byte_callback_reading(&mut self, wheel: &mut TimerWheel, data_byte: u8, clocks_byte: u8) {
        let command = self.internal_command();

        match self.state {
            State::SkipGap2 => {
                // The ROM-enforced gap skip is 11 bytes between a matched
                // header and the resumed sync search. With 2 bytes of sync
                // needed, the practical minimum gap is 14; the controller
                // formats to 17.
                let skip = self.reg(reg::INTERNAL_GAP2_SKIP).wrapping_sub(1);
                self.set_reg(reg::INTERNAL_GAP2_SKIP, skip);
                if skip != 0 {
                    return;
                }
                if self.command_is_writing() {
                    self.drive_out_raise(DriveOut::WRITE_ENABLE);
                    self.set_state(State::WriteGap2);
                } else {
                    self.set_state(State::SyncingForData);
                }
            }
            State::CheckIdMarker => {
                if clocks_byte == MARK_CLOCK_PATTERN && data_byte == ID_MARK_DATA_PATTERN {
                    self.crc = crc_init();
                    self.crc = crc_add_byte(self.crc, ID_MARK_DATA_PATTERN);
                    self.set_state(State::InId);
                } else {
                    self.start_syncing_for_header();
                }
            }
            State::InId => {
                self.crc = crc_add_byte(self.crc, data_byte);
                if command == Command::ReadId && !self.provide_data_byte(wheel, data_byte) {
                    return;
                }
                let pointer = self.reg(reg::INTERNAL_HEADER_POINTER);
                self.write_register(pointer, data_byte);
                self.set_reg(reg::INTERNAL_HEADER_POINTER, pointer.wrapping_sub(1));
                if self.reg(reg::INTERNAL_HEADER_POINTER) & 0x07 == 0 {
                    self.on_disc_crc = 0;
                    self.set_state(State::InIdCrc);
                }
            }
            State::InIdCrc => {
                self.on_disc_crc = (self.on_disc_crc << 8) | u16::from(data_byte);
                self.state_count += 1;
                if self.state_count != 2 {
                    return;
                }
                // An ID CRC error ends things decisively, even if a
                // subsequent good ID would match.
                if !self.check_crc(wheel, result::ID_CRC_ERROR) {
                    return;
                }
                if self.reg(reg::INTERNAL_COMMAND) == 0x18 {
                    // READ_ID: each header is a completed "sector".
                    self.check_completion(wheel);
                } else if self.reg(reg::INTERNAL_ID_TRACK) != self.reg(reg::INTERNAL_PARAM_1) {
                    // On any mismatch of found vs. expected track, retry
                    // on the next two tracks before giving up.
                    let retries = self.reg(reg::INTERNAL_SEEK_RETRY_COUNT).wrapping_add(1);
                    self.set_reg(reg::INTERNAL_SEEK_RETRY_COUNT, retries);
                    if retries == 3 {
                        self.finish_command(wheel, result::SECTOR_NOT_FOUND);
                    } else {
                        self.do_seek(wheel);
                    }
                } else if self.reg(reg::INTERNAL_ID_SECTOR) == self.reg(reg::INTERNAL_PARAM_2) {
                    self.set_reg(reg::INTERNAL_GAP2_SKIP, 11);
                    self.set_state(State::SkipGap2);
                } else {
                    self.set_state(State::SyncingForIdWait);
                }
            }
            State::CheckDataMarker => {
                if clocks_byte == MARK_CLOCK_PATTERN
                    && (data_byte == DATA_MARK_DATA_PATTERN
                        || data_byte == DELETED_DATA_MARK_DATA_PATTERN)
                {
                    let mut new_state = State::InData;
                    if data_byte == DELETED_DATA_MARK_DATA_PATTERN {
                        self.set_result(result::FLAG_DELETED_DATA);
                        new_state = State::InDeletedData;
                    }
                    self.crc = crc_init();
                    self.crc = crc_add_byte(self.crc, data_byte);
                    self.set_state(new_state);
                } else {
                    self.finish_command(wheel, result::CLOCK_ERROR);
                }
            }
            State::InData => {
                let is_done = self.decrement_counter();
                self.crc = crc_add_byte(self.crc, data_byte);
                if command != Command::Verify && !self.provide_data_byte(wheel, data_byte) {
                    return;
                }
                if is_done {
                    self.on_disc_crc = 0;
                    self.set_state(State::InDataCrc);
                }
            }
            State::InDeletedData => {
                let is_done = self.decrement_counter();
                self.crc = crc_add_byte(self.crc, data_byte);
                // Only READ_DATA_AND_DELETED surfaces deleted bytes; a
                // plain READ_DATA still progresses, carrying the deleted
                // flag in its result.
                if command == Command::ReadDataAndDeleted
                    && !self.provide_data_byte(wheel, data_byte)
                {
                    return;
                }
                if is_done {
                    self.on_disc_crc = 0;
                    self.set_state(State::InDataCrc);
                }
            }
            State::InDataCrc => {
                self.on_disc_crc = (self.on_disc_crc << 8) | u16::from(data_byte);
                self.state_count += 1;
                if self.state_count != 2 {
                    return;
                }
                if !self.check_crc(wheel, result::DATA_CRC_ERROR) {
                    return;
                }
                self.check_completion(wheel);
            }
            _ => {
                debug_assert!(false, "read byte in state {:?}", self.state);
            }
        }
    }

    // ----- write-side byte handling -----

    fn write_drive_byte(&mut self, data: u8, clocks: u8) {
        if let Some(drive) = self.current_drive_mut() {
            drive.write_byte(data, clocks);
        }
    }

    fn byte_callback_writing(&mut self, wheel: &mut TimerWheel) {
        match self.state {
            State::WriteGap2 => {
                self.write_drive_byte(0x00, 0xFF);
                self.state_count += 1;
                if self.state_count == 6 {
                    self.set_state(State::WriteSectorData);
                }
            }
            State::WriteSectorData => {
                let sector_size = self.sector_size();
                if self.state_count == 0 {
                    let mark_byte = self.reg(reg::INTERNAL_PARAM_DATA_MARKER);
                    self.write_drive_byte(mark_byte, MARK_CLOCK_PATTERN);
                    self.crc = crc_init();
                    self.crc = crc_add_byte(self.crc, mark_byte);
                } else if self.state_count < sector_size + 1 {
                    let data = self.reg(reg::INTERNAL_DATA);
                    if !self.consume_data_byte(wheel) {
                        return;
                    }
                    self.crc = crc_add_byte(self.crc, data);
                } else if self.state_count == sector_size + 1 {
                    self.write_drive_byte((self.crc >> 8) as u8, 0xFF);
                } else if self.state_count == sector_size + 2 {
                    self.write_drive_byte((self.crc & 0xFF) as u8, 0xFF);
                }

                self.state_count += 1;
                if self.state_count == sector_size + 3 {
                    self.check_completion(wheel);
                } else if self.state_count < sector_size + 1 {
                    self.status_raise(Status::NMI | Status::NEED_DATA);
                }
            }
            State::FormatGap1 => {
                if self.state_count < u32::from(self.reg(reg::INTERNAL_PARAM_5)) {
                    self.write_drive_byte(0xFF, 0xFF);
                } else {
                    self.write_drive_byte(0x00, 0xFF);
                }
                self.state_count += 1;
                if self.state_count == u32::from(self.reg(reg::INTERNAL_PARAM_5)) + 6 {
                    self.set_state(State::FormatWriteId);
                }
            }
            State::FormatWriteId => {
                if self.state_count == 0 {
                    self.write_drive_byte(ID_MARK_DATA_PATTERN, MARK_CLOCK_PATTERN);
                    self.crc = crc_init();
                    self.crc = crc_add_byte(self.crc, ID_MARK_DATA_PATTERN);
                } else if self.state_count < 5 {
                    let data = self.reg(reg::INTERNAL_DATA);
                    if !self.consume_data_byte(wheel) {
                        return;
                    }
                    self.crc = crc_add_byte(self.crc, data);
                } else if self.state_count == 5 {
                    self.write_drive_byte((self.crc >> 8) as u8, 0xFF);
                } else if self.state_count == 6 {
                    self.write_drive_byte((self.crc & 0xFF) as u8, 0xFF);
                } else if self.state_count < 18 {
                    // GAP 2, 0xFF x11
                    self.write_drive_byte(0xFF, 0xFF);
                } else {
                    // GAP 2, 0x00 x6
                    self.write_drive_byte(0x00, 0xFF);
                }

                self.state_count += 1;
                if self.state_count < 5 {
                    self.status_raise(Status::NMI | Status::NEED_DATA);
                } else if self.state_count == 7 + 11 + 6 {
                    self.set_state(State::FormatWriteData);
                }
            }
            State::FormatWriteData => {
                let sector_size = self.sector_size();
                if self.state_count == 0 {
                    self.write_drive_byte(DATA_MARK_DATA_PATTERN, MARK_CLOCK_PATTERN);
                    self.crc = crc_init();
                    self.crc = crc_add_byte(self.crc, DATA_MARK_DATA_PATTERN);
                } else if self.state_count < sector_size + 1 {
                    self.write_drive_byte(0xE5, 0xFF);
                    self.crc = crc_add_byte(self.crc, 0xE5);
                } else if self.state_count == sector_size + 1 {
                    // Formatted sector data is constant, so the CRC is a
                    // known value for the common size.
                    if sector_size == 256 {
                        debug_assert_eq!(self.crc, 0xA40C);
                    }
                    self.write_drive_byte((self.crc >> 8) as u8, 0xFF);
                } else {
                    self.write_drive_byte((self.crc & 0xFF) as u8, 0xFF);
                }

                self.state_count += 1;
                if self.state_count == sector_size + 3 {
                    let remaining = self.reg(reg::INTERNAL_PARAM_3).wrapping_sub(1);
                    self.set_reg(reg::INTERNAL_PARAM_3, remaining);
                    if remaining & 0x1F == 0 {
                        self.set_state(State::FormatGap4);
                    } else {
                        self.set_state(State::FormatGap3);
                    }
                }
            }
            State::FormatGap3 => {
                if self.state_count < u32::from(self.reg(reg::INTERNAL_PARAM_2)) {
                    self.write_drive_byte(0xFF, 0xFF);
                } else {
                    self.write_drive_byte(0x00, 0xFF);
                }
                self.state_count += 1;
                if self.state_count == u32::from(self.reg(reg::INTERNAL_PARAM_2)) + 6 {
                    self.set_state(State::FormatWriteId);
                }
            }
            State::FormatGap4 => {
                // GAP 4 writes until the index pulse, which ends the
                // command.
                if self.state_is_index_pulse {
                    self.finish_command(wheel, result::OK);
                } else {
                    self.write_drive_byte(0xFF, 0xFF);
                }
            }
            _ => {
                debug_assert!(false, "write byte in state {:?}", self.state);
            }
        }
    }
}
