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

//! 6502 decode tables
//!
//! Per-opcode operation type and addressing mode for the full 256-entry
//! space, plus the derived properties the compiler's dataflow tracking
//! needs: branch class, which register an operation writes, and whether it
//! clobbers the carry flag.
//!
//! Two opcodes carry host-harness meanings carried over from the
//! interpreter: 0x02 exits to the host and 0xF2 is a deliberate crash.
//! The remaining undocumented opcodes that real software leans on (SLO,
//! ALR, SAX and the extra NOPs) decode with their true addressing modes;
//! everything else is `Unk` and terminates a block.

/// Operation type, independent of addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Adc, Alr, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Crash, Dec, Dex, Dey, Eor, Exit,
    Inc, Inx, Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla,
    Plp, Rol, Ror, Rti, Rts, Sax, Sbc, Sec, Sed, Sei, Slo, Sta, Stx, Sty,
    Tax, Tay, Tsx, Txa, Txs, Tya, Unk,
}

/// Addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Nil, Acc, Imm, Zpg, Zpx, Zpy, Abs, Abx, Aby, Ind, Idx, Idy, Rel,
}

/// Branch class of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Execution always continues to the next instruction
    None,
    /// Conditional branch: may continue or leave the block
    Conditional,
    /// Unconditional transfer: terminates the basic block
    Always,
}

/// CPU register written by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    A,
    X,
    Y,
}

use AddrMode::*;
use OpType::*;

/// Operation type for each of the 256 opcodes
#[rustfmt::skip]
pub const OPTYPES: [OpType; 256] = [
    // 0x00
    Brk, Ora, Exit, Slo, Nop, Ora, Asl, Slo, Php, Ora, Asl, Unk, Nop, Ora, Asl, Slo,
    // 0x10
    Bpl, Ora, Unk, Slo, Nop, Ora, Asl, Slo, Clc, Ora, Nop, Slo, Nop, Ora, Asl, Slo,
    // 0x20
    Jsr, And, Unk, Unk, Bit, And, Rol, Unk, Plp, And, Rol, Unk, Bit, And, Rol, Unk,
    // 0x30
    Bmi, And, Unk, Unk, Nop, And, Rol, Unk, Sec, And, Nop, Unk, Nop, And, Rol, Unk,
    // 0x40
    Rti, Eor, Unk, Unk, Nop, Eor, Lsr, Unk, Pha, Eor, Lsr, Alr, Jmp, Eor, Lsr, Unk,
    // 0x50
    Bvc, Eor, Unk, Unk, Nop, Eor, Lsr, Unk, Cli, Eor, Nop, Unk, Nop, Eor, Lsr, Unk,
    // 0x60
    Rts, Adc, Unk, Unk, Nop, Adc, Ror, Unk, Pla, Adc, Ror, Unk, Jmp, Adc, Ror, Unk,
    // 0x70
    Bvs, Adc, Unk, Unk, Nop, Adc, Ror, Unk, Sei, Adc, Nop, Unk, Nop, Adc, Ror, Unk,
    // 0x80
    Nop, Sta, Nop, Sax, Sty, Sta, Stx, Sax, Dey, Nop, Txa, Unk, Sty, Sta, Stx, Sax,
    // 0x90
    Bcc, Sta, Unk, Unk, Sty, Sta, Stx, Sax, Tya, Sta, Txs, Unk, Unk, Sta, Unk, Unk,
    // 0xA0
    Ldy, Lda, Ldx, Unk, Ldy, Lda, Ldx, Unk, Tay, Lda, Tax, Unk, Ldy, Lda, Ldx, Unk,
    // 0xB0
    Bcs, Lda, Unk, Unk, Ldy, Lda, Ldx, Unk, Clv, Lda, Tsx, Unk, Ldy, Lda, Ldx, Unk,
    // 0xC0
    Cpy, Cmp, Nop, Unk, Cpy, Cmp, Dec, Unk, Iny, Cmp, Dex, Unk, Cpy, Cmp, Dec, Unk,
    // 0xD0
    Bne, Cmp, Unk, Unk, Nop, Cmp, Dec, Unk, Cld, Cmp, Nop, Unk, Nop, Cmp, Dec, Unk,
    // 0xE0
    Cpx, Sbc, Nop, Unk, Cpx, Sbc, Inc, Unk, Inx, Sbc, Nop, Unk, Cpx, Sbc, Inc, Unk,
    // 0xF0
    Beq, Sbc, Crash, Unk, Nop, Sbc, Inc, Unk, Sed, Sbc, Nop, Unk, Nop, Sbc, Inc, Unk,
];

/// Addressing mode for each of the 256 opcodes
#[rustfmt::skip]
pub const OPMODES: [AddrMode; 256] = [
    // 0x00
    Nil, Idx, Nil, Idx, Zpg, Zpg, Zpg, Zpg, Nil, Imm, Acc, Imm, Abs, Abs, Abs, Abs,
    // 0x10
    Rel, Idy, Nil, Idy, Zpx, Zpx, Zpx, Zpx, Nil, Aby, Nil, Aby, Abx, Abx, Abx, Abx,
    // 0x20
    Abs, Idx, Nil, Idx, Zpg, Zpg, Zpg, Zpg, Nil, Imm, Acc, Imm, Abs, Abs, Abs, Abs,
    // 0x30
    Rel, Idy, Nil, Idy, Zpx, Zpx, Zpx, Zpx, Nil, Aby, Nil, Aby, Abx, Abx, Abx, Abx,
    // 0x40
    Nil, Idx, Nil, Idx, Zpg, Zpg, Zpg, Zpg, Nil, Imm, Acc, Imm, Abs, Abs, Abs, Abs,
    // 0x50
    Rel, Idy, Nil, Idy, Zpx, Zpx, Zpx, Zpx, Nil, Aby, Nil, Aby, Abx, Abx, Abx, Abx,
    // 0x60
    Nil, Idx, Nil, Idx, Zpg, Zpg, Zpg, Zpg, Nil, Imm, Acc, Imm, Ind, Abs, Abs, Abs,
    // 0x70
    Rel, Idy, Nil, Idy, Zpx, Zpx, Zpx, Zpx, Nil, Aby, Nil, Aby, Abx, Abx, Abx, Abx,
    // 0x80
    Imm, Idx, Imm, Idx, Zpg, Zpg, Zpg, Zpg, Nil, Imm, Nil, Imm, Abs, Abs, Abs, Abs,
    // 0x90
    Rel, Idy, Nil, Idy, Zpx, Zpx, Zpy, Zpy, Nil, Aby, Nil, Aby, Abx, Abx, Aby, Aby,
    // 0xA0
    Imm, Idx, Imm, Idx, Zpg, Zpg, Zpg, Zpg, Nil, Imm, Nil, Imm, Abs, Abs, Abs, Abs,
    // 0xB0
    Rel, Idy, Nil, Idy, Zpx, Zpx, Zpy, Zpy, Nil, Aby, Nil, Aby, Abx, Abx, Aby, Aby,
    // 0xC0
    Imm, Idx, Imm, Idx, Zpg, Zpg, Zpg, Zpg, Nil, Imm, Nil, Imm, Abs, Abs, Abs, Abs,
    // 0xD0
    Rel, Idy, Nil, Idy, Zpx, Zpx, Zpx, Zpx, Nil, Aby, Nil, Aby, Abx, Abx, Abx, Abx,
    // 0xE0
    Imm, Idx, Imm, Idx, Zpg, Zpg, Zpg, Zpg, Nil, Imm, Nil, Imm, Abs, Abs, Abs, Abs,
    // 0xF0
    Rel, Idy, Nil, Idy, Zpx, Zpx, Zpx, Zpx, Nil, Aby, Nil, Aby, Abx, Abx, Abx, Abx,
];

/// Instruction length in bytes for an addressing mode
pub fn mode_len(mode: AddrMode) -> u8 {
    match mode {
        Nil | Acc => 1,
        Imm | Zpg | Zpx | Zpy | Idx | Idy | Rel => 2,
        Abs | Abx | Aby | Ind => 3,
    }
}

/// Branch class of an operation type
pub fn branch_class(optype: OpType) -> Branch {
    match optype {
        Bcc | Bcs | Beq | Bmi | Bne | Bpl | Bvc | Bvs => Branch::Conditional,
        Brk | Crash | Exit | Jmp | Rti | Rts | Unk => Branch::Always,
        _ => Branch::None,
    }
}

/// Which CPU register an operation type writes, if any
///
/// The shift/rotate group is listed as writing A: that is only true in
/// accumulator mode, but invalidating a tracked value is always safe.
pub fn sets_register(optype: OpType) -> Option<Reg> {
    match optype {
        Adc | Alr | And | Asl | Eor | Lda | Lsr | Ora | Pla | Rol | Ror | Sbc | Slo | Txa
        | Tya => Some(Reg::A),
        Dex | Inx | Ldx | Tax | Tsx => Some(Reg::X),
        Dey | Iny | Ldy | Tay => Some(Reg::Y),
        _ => None,
    }
}

/// Whether an operation type changes the carry flag
pub fn changes_carry(optype: OpType) -> bool {
    matches!(
        optype,
        Adc | Alr | Asl | Clc | Cmp | Cpx | Cpy | Lsr | Plp | Rol | Ror | Rti | Sbc | Sec | Slo
    )
}
