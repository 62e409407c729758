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

//! IBM FM disc format primitives
//!
//! Single-density discs store each byte as 8 FM cells. One cell is 4 µs and
//! holds a clock bit followed by a data bit, each occupying a 2 µs pulse
//! slot. A track buffer is therefore a run of 32-bit words where every set
//! bit is a flux transition in one 2 µs slot: the clock bit of cell `i`
//! lands in slot `4i` and the data bit in slot `4i + 2`. Slots `4i + 1` and
//! `4i + 3` are empty in clean FM.
//!
//! Address and data marks violate the normal all-ones clock stream by using
//! the clock pattern `0xC7`, which is what the controller's sync detector
//! keys on.
//!
//! CRC-16-CCITT (poly 0x1021, init 0xFFFF, no reflection, no final XOR) is
//! run over the mark byte followed by the payload for both ID and data
//! fields.

/// Pulse words per standard single-density track (one word per byte)
pub const BYTES_PER_TRACK: u32 = 3125;

/// Addressable track positions per disc side
pub const TRACKS_PER_DISC: u32 = 84;

/// Clock pattern accompanying ID, data and deleted-data marks
pub const MARK_CLOCK_PATTERN: u8 = 0xC7;

/// Data pattern of a sector ID (header) mark
pub const ID_MARK_DATA_PATTERN: u8 = 0xFE;

/// Data pattern of a sector data mark
pub const DATA_MARK_DATA_PATTERN: u8 = 0xFB;

/// Data pattern of a deleted sector data mark
pub const DELETED_DATA_MARK_DATA_PATTERN: u8 = 0xF8;

/// Convert an FM (clocks, data) byte pair to a 32-slot pulse word
///
/// The inverse of [`pulses_to_fm`] for any byte pair.
pub fn fm_to_pulses(clocks: u8, data: u8) -> u32 {
    let mut clocks = clocks;
    let mut data = data;
    let mut pulses = 0u32;

    for _ in 0..8 {
        pulses <<= 4;
        if clocks & 0x80 != 0 {
            pulses |= 0x08;
        }
        if data & 0x80 != 0 {
            pulses |= 0x02;
        }
        clocks <<= 1;
        data <<= 1;
    }

    pulses
}

/// Recover the FM (clocks, data) byte pair from a 32-slot pulse word
///
/// Only the clock and data slot of each cell is examined; transitions in
/// the two off-phase slots (which clean FM never produces) are ignored.
pub fn pulses_to_fm(mut pulses: u32) -> (u8, u8) {
    let mut clocks = 0u8;
    let mut data = 0u8;

    for _ in 0..8 {
        clocks <<= 1;
        data <<= 1;
        if pulses & 0x8000_0000 != 0 {
            clocks |= 1;
        }
        if pulses & 0x2000_0000 != 0 {
            data |= 1;
        }
        pulses <<= 4;
    }

    (clocks, data)
}

/// Initial CRC-16-CCITT value
#[inline]
pub fn crc_init() -> u16 {
    0xFFFF
}

/// Feed one byte into a running CRC-16-CCITT
pub fn crc_add_byte(crc: u16, byte: u8) -> u16 {
    let mut crc = crc;
    let mut byte = byte;

    for _ in 0..8 {
        let bit = u16::from(byte >> 7);
        let do_xor = ((crc >> 15) ^ bit) != 0;
        crc <<= 1;
        byte <<= 1;
        if do_xor {
            crc ^= 0x1021;
        }
    }

    crc
}

/// Feed a run of bytes into a running CRC-16-CCITT
pub fn crc_add_run(crc: u16, bytes: &[u8]) -> u16 {
    bytes.iter().fold(crc, |crc, &byte| crc_add_byte(crc, byte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_all_ones_fm_cell_layout() {
        // Clock at slot 0, data at slot 2 of each 4-slot cell
        assert_eq!(fm_to_pulses(0xFF, 0x00), 0x8888_8888);
        assert_eq!(fm_to_pulses(0xFF, 0xFF), 0xAAAA_AAAA);
        assert_eq!(fm_to_pulses(0x00, 0x00), 0);
    }

    #[test]
    fn test_mark_byte_encoding() {
        let pulses = fm_to_pulses(MARK_CLOCK_PATTERN, ID_MARK_DATA_PATTERN);
        let (clocks, data) = pulses_to_fm(pulses);
        assert_eq!(clocks, MARK_CLOCK_PATTERN);
        assert_eq!(data, ID_MARK_DATA_PATTERN);
    }

    #[test]
    fn test_off_phase_pulses_ignored() {
        // Noise in slots 1 and 3 of each cell must not leak into FM bytes
        let noisy = fm_to_pulses(0xC7, 0xFB) | 0x4444_4444 | 0x1111_1111;
        assert_eq!(pulses_to_fm(noisy), (0xC7, 0xFB));
    }

    #[test]
    fn test_crc_known_value() {
        // Formatted 256-byte sector of 0xE5 filler, seeded with the data mark
        let mut crc = crc_init();
        crc = crc_add_byte(crc, DATA_MARK_DATA_PATTERN);
        for _ in 0..256 {
            crc = crc_add_byte(crc, 0xE5);
        }
        assert_eq!(crc, 0xA40C);
    }

    #[test]
    fn test_crc_of_message_plus_crc_is_zero() {
        let header = [0x00u8, 0x00, 0x00, 0x01];
        let mut crc = crc_init();
        crc = crc_add_byte(crc, ID_MARK_DATA_PATTERN);
        crc = crc_add_run(crc, &header);

        let mut check = crc_init();
        check = crc_add_byte(check, ID_MARK_DATA_PATTERN);
        check = crc_add_run(check, &header);
        check = crc_add_byte(check, (crc >> 8) as u8);
        check = crc_add_byte(check, (crc & 0xFF) as u8);
        assert_eq!(check, 0);
    }

    proptest! {
        #[test]
        fn prop_fm_pulse_round_trip(clocks: u8, data: u8) {
            let pulses = fm_to_pulses(clocks, data);
            prop_assert_eq!(pulses_to_fm(pulses), (clocks, data));
        }

        #[test]
        fn prop_crc_self_check(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let crc = crc_add_run(crc_init(), &bytes);
            let mut check = crc_add_run(crc_init(), &bytes);
            check = crc_add_byte(check, (crc >> 8) as u8);
            check = crc_add_byte(check, (crc & 0xFF) as u8);
            prop_assert_eq!(check, 0);
        }
    }
}
