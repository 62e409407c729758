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

//! 6502 JIT compiler front end
//!
//! Translates 6502 basic blocks into host machine code in two passes per
//! instruction: expand the opcode into a short sequence of micro-ops
//! (flag loads, the main operation, flag saves and N/Z updates), then emit
//! each micro-op through the [`assembler::HostAssembler`] while folding
//! against tracked constant state.
//!
//! A block ends at (and includes) the first instruction whose branch
//! class is unconditional: JMP, RTS, BRK, RTI, the host exit, a crash or
//! an unknown opcode. Branch targets that leave the block are resolved to
//! host addresses through the resolver callback at compile time.
//!
//! # Tracked state
//!
//! Within one block the compiler knows, where provable, the constant
//! values of A, X and Y and of the carry and decimal flags. That enables
//! three rewrites:
//!
//! - a store of a known register becomes a store-immediate
//! - `ADC #imm` with carry known clear becomes a plain add
//! - `SBC #imm` with carry known set becomes a plain subtract
//!
//! Everything resets to unknown at block entry; there is no cross-block
//! dataflow.

pub mod assembler;
pub mod opcodes;

use assembler::{CodeBuffer, HostAssembler};
use opcodes::{
    branch_class, changes_carry, mode_len, sets_register, AddrMode, Branch, OpType, Reg, OPMODES,
    OPTYPES,
};

/// 6502 IRQ/BRK vector location
const VECTOR_IRQ: u16 = 0xFFFE;

/// Upper bound of host bytes for one translated 6502 instruction
const MAX_HOST_BYTES_PER_OPCODE: usize = 128;

/// Micro-ops per opcode upper bound
const MAX_UOPS: usize = 8;

/// A micro-op's operation: either a 6502 opcode or a synthetic marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UopCode {
    /// A 6502 opcode emitted (mostly) as itself
    Op(u8),
    Debug,
    FlagA,
    FlagX,
    FlagY,
    AddImm,
    LoadCarry,
    LoadCarryInv,
    LoadOverflow,
    Push16,
    SaveCarry,
    SaveCarryInv,
    SaveOverflow,
    StoaImm,
    SubImm,
}

/// One compiler IR unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroOp {
    /// Operation
    pub code: UopCode,
    /// Operation type of a 6502 opcode; `None` for synthetic markers
    pub optype: Option<OpType>,
    /// First operand: immediate, 6502 address, or resolved host address
    pub value1: i64,
    /// Second operand (folded store value)
    pub value2: i64,
}

impl MicroOp {
    fn synthetic(code: UopCode) -> Self {
        Self {
            code,
            optype: None,
            value1: 0,
            value2: 0,
        }
    }
}

/// Expansion of one 6502 instruction
#[derive(Debug, Clone, Copy)]
struct OpcodeDetails {
    len: u8,
    branches: Branch,
    uops: [MicroOp; MAX_UOPS],
    num_uops: usize,
}

impl OpcodeDetails {
    fn push(&mut self, uop: MicroOp) -> usize {
        let index = self.num_uops;
        self.uops[index] = uop;
        self.num_uops += 1;
        index
    }
}

/// 6502 basic-block compiler
///
/// Holds the host-address resolver and the per-block dataflow state. The
/// compiler has no global state; create one per thread if ever made
/// concurrent.
pub struct JitCompiler {
    /// Maps a 6502 address to the host address of its compiled code
    resolver: Box<dyn FnMut(u16) -> u64>,

    /// Insert a host debug trap before every instruction
    debug: bool,

    /// Scratch buffer for one instruction's host bytes
    single_opcode_buf: CodeBuffer,

    // Known constant state within the current block; `None` is unknown.
    reg_a: Option<u8>,
    reg_x: Option<u8>,
    reg_y: Option<u8>,
    flag_carry: Option<bool>,
    flag_decimal: Option<bool>,
}

impl JitCompiler {
    /// Create a compiler with a host-address resolver
    pub fn new(resolver: Box<dyn FnMut(u16) -> u64>, debug: bool) -> Self {
        Self {
            resolver,
            debug,
            single_opcode_buf: CodeBuffer::with_capacity(MAX_HOST_BYTES_PER_OPCODE),
            reg_a: None,
            reg_x: None,
            reg_y: None,
            flag_carry: None,
            flag_decimal: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn known_decimal(&self) -> Option<bool> {
        self.flag_decimal
    }

    /// Compile the basic block starting at `addr` into `buf`
    ///
    /// `mem` is the 6502 address space the block is read from.
    pub fn compile_block(
        &mut self,
        asm: &mut dyn HostAssembler,
        buf: &mut CodeBuffer,
        mem: &[u8],
        addr: u16,
    ) {
        let mut addr = addr;

        self.reg_a = None;
        self.reg_x = None;
        self.reg_y = None;
        self.flag_carry = None;
        self.flag_decimal = None;

        loop {
            let mut scratch = std::mem::take(&mut self.single_opcode_buf);
            scratch.clear();
            // Host-relative encodings inside this instruction are fixed
            // up against where its bytes will land in the block.
            scratch.set_base_address(buf.base_address() + buf.pos() as u64);

            let details = self.opcode_details(mem, addr);
            for i in 0..details.num_uops {
                let mut uop = details.uops[i];
                self.process_uop(asm, &mut scratch, &mut uop);
            }

            buf.append(&scratch);
            self.single_opcode_buf = scratch;

            if details.branches == Branch::Always {
                break;
            }
            addr = addr.wrapping_add(u16::from(details.len));
        }
    }

    /// Expand one 6502 instruction into micro-ops
    fn opcode_details(&mut self, mem: &[u8], addr: u16) -> OpcodeDetails {
        let opcode = mem[addr as usize];
        let optype = OPTYPES[opcode as usize];
        let opmode = OPMODES[opcode as usize];
        let operand8 = mem[addr.wrapping_add(1) as usize];
        let operand16 =
            u16::from_le_bytes([operand8, mem[addr.wrapping_add(2) as usize]]);

        let mut details = OpcodeDetails {
            len: mode_len(opmode),
            branches: branch_class(optype),
            uops: [MicroOp::synthetic(UopCode::Debug); MAX_UOPS],
            num_uops: 0,
        };

        if self.debug {
            let mut uop = MicroOp::synthetic(UopCode::Debug);
            uop.value1 = i64::from(addr);
            details.push(uop);
        }

        // Pre-main micro-ops: materialise CPU flags in host registers.
        match optype {
            OpType::Adc | OpType::Bcc | OpType::Bcs | OpType::Rol | OpType::Ror => {
                details.push(MicroOp::synthetic(UopCode::LoadCarry));
            }
            OpType::Bvc | OpType::Bvs => {
                details.push(MicroOp::synthetic(UopCode::LoadOverflow));
            }
            OpType::Sbc => {
                details.push(MicroOp::synthetic(UopCode::LoadCarryInv));
            }
            _ => {}
        }

        // Main micro-op.
        let mut jump_fixup = false;
        let mut main = MicroOp {
            code: UopCode::Op(opcode),
            optype: Some(optype),
            value1: 0,
            value2: 0,
        };
        match opmode {
            AddrMode::Nil | AddrMode::Acc => {}
            AddrMode::Imm | AddrMode::Zpg | AddrMode::Zpx | AddrMode::Zpy | AddrMode::Idx
            | AddrMode::Idy => {
                main.value1 = i64::from(operand8);
            }
            AddrMode::Rel => {
                let target = (i32::from(addr) + 2 + i32::from(operand8 as i8)) as u16;
                main.value1 = i64::from(target);
                jump_fixup = true;
            }
            AddrMode::Abs | AddrMode::Abx | AddrMode::Aby => {
                main.value1 = i64::from(operand16);
                if optype == OpType::Jmp || optype == OpType::Jsr {
                    jump_fixup = true;
                }
            }
            AddrMode::Ind => {
                main.value1 = i64::from(operand16);
            }
        }
        let main_index = details.push(main);

        // Post-main micro-ops: save flags, update N/Z for the written
        // register.
        match optype {
            OpType::Adc => {
                details.push(MicroOp::synthetic(UopCode::SaveCarry));
                details.push(MicroOp::synthetic(UopCode::SaveOverflow));
            }
            OpType::Alr | OpType::Asl | OpType::Lsr | OpType::Slo => {
                details.push(MicroOp::synthetic(UopCode::SaveCarry));
            }
            OpType::Brk => {
                // BRK becomes PUSH_16(addr + 2), PHP, SEI, JMP (irq).
                let main = &mut details.uops[main_index];
                main.code = UopCode::Push16;
                main.optype = None;
                main.value1 = i64::from(addr.wrapping_add(2));

                let mut php = MicroOp::synthetic(UopCode::Op(0x08));
                php.optype = Some(OpType::Php);
                details.push(php);
                let mut sei = MicroOp::synthetic(UopCode::Op(0x78));
                sei.optype = Some(OpType::Sei);
                details.push(sei);
                let mut jmp = MicroOp::synthetic(UopCode::Op(0x6C));
                jmp.optype = Some(OpType::Jmp);
                jmp.value1 = i64::from(VECTOR_IRQ);
                details.push(jmp);
            }
            OpType::Cmp | OpType::Cpx | OpType::Cpy => {
                details.push(MicroOp::synthetic(UopCode::SaveCarryInv));
            }
            OpType::Lda | OpType::Txa | OpType::Tya | OpType::Pla => {
                details.push(MicroOp::synthetic(UopCode::FlagA));
            }
            OpType::Ldx | OpType::Tax | OpType::Tsx => {
                details.push(MicroOp::synthetic(UopCode::FlagX));
            }
            OpType::Ldy | OpType::Tay => {
                details.push(MicroOp::synthetic(UopCode::FlagY));
            }
            OpType::Rol | OpType::Ror => {
                details.push(MicroOp::synthetic(UopCode::SaveCarry));
                if opmode == AddrMode::Acc {
                    details.push(MicroOp::synthetic(UopCode::FlagA));
                }
            }
            OpType::Sbc => {
                details.push(MicroOp::synthetic(UopCode::SaveCarryInv));
                details.push(MicroOp::synthetic(UopCode::SaveOverflow));
            }
            _ => {}
        }

        if jump_fixup {
            let main = &mut details.uops[main_index];
            main.value1 = (self.resolver)(main.value1 as u16) as i64;
        }

        details
    }

    /// Fold, emit and account one micro-op
    fn process_uop(
        &mut self,
        asm: &mut dyn HostAssembler,
        buf: &mut CodeBuffer,
        uop: &mut MicroOp,
    ) {
        let opreg = uop.optype.and_then(sets_register);
        let clobbers_carry = uop.optype.is_some_and(changes_carry);

        // Re-write the opcode if tracked state opens an optimisation.
        match uop.code {
            UopCode::Op(0x69) => {
                // ADC imm with known clear carry is a plain add.
                if self.flag_carry == Some(false) {
                    uop.code = UopCode::AddImm;
                }
            }
            UopCode::Op(0xE9) => {
                // SBC imm with known set carry is a plain subtract.
                if self.flag_carry == Some(true) {
                    uop.code = UopCode::SubImm;
                }
            }
            UopCode::Op(0x84) | UopCode::Op(0x8C) => {
                if let Some(value) = self.reg_y {
                    uop.code = UopCode::StoaImm;
                    uop.value2 = i64::from(value);
                }
            }
            UopCode::Op(0x85) | UopCode::Op(0x8D) => {
                if let Some(value) = self.reg_a {
                    uop.code = UopCode::StoaImm;
                    uop.value2 = i64::from(value);
                }
            }
            UopCode::Op(0x86) | UopCode::Op(0x8E) => {
                if let Some(value) = self.reg_x {
                    uop.code = UopCode::StoaImm;
                    uop.value2 = i64::from(value);
                }
            }
            _ => {}
        }

        self.emit_uop(asm, buf, uop);

        // Update the known state of registers and flags.
        match opreg {
            Some(Reg::A) => self.reg_a = None,
            Some(Reg::X) => self.reg_x = None,
            Some(Reg::Y) => self.reg_y = None,
            None => {}
        }
        if clobbers_carry {
            self.flag_carry = None;
        }

        match uop.code {
            UopCode::Op(0x18) => self.flag_carry = Some(false),
            UopCode::Op(0x38) => self.flag_carry = Some(true),
            UopCode::Op(0xA0) => self.reg_y = Some(uop.value1 as u8),
            UopCode::Op(0xA2) => self.reg_x = Some(uop.value1 as u8),
            UopCode::Op(0xA9) => self.reg_a = Some(uop.value1 as u8),
            UopCode::Op(0xD8) => self.flag_decimal = Some(false),
            UopCode::Op(0xF8) => self.flag_decimal = Some(true),
            _ => {}
        }
    }

    /// Emit one micro-op through the assembler
    fn emit_uop(&mut self, asm: &mut dyn HostAssembler, buf: &mut CodeBuffer, uop: &MicroOp) {
        let value1 = uop.value1;
        let value2 = uop.value2;

        match uop.code {
            UopCode::Debug => asm.emit_jit_call_debug(buf, value1 as u16),
            UopCode::AddImm => asm.emit_jit_add_imm(buf, value1 as u8),
            UopCode::FlagA => asm.emit_jit_flag_a(buf),
            UopCode::FlagX => asm.emit_jit_flag_x(buf),
            UopCode::FlagY => asm.emit_jit_flag_y(buf),
            UopCode::LoadCarry => asm.emit_jit_load_carry(buf),
            UopCode::LoadCarryInv => asm.emit_jit_load_carry_inv(buf),
            UopCode::LoadOverflow => asm.emit_jit_load_overflow(buf),
            UopCode::Push16 => asm.emit_jit_push_16(buf, value1 as u16),
            UopCode::SaveCarry => asm.emit_jit_save_carry(buf),
            UopCode::SaveCarryInv => asm.emit_jit_save_carry_inv(buf),
            UopCode::SaveOverflow => asm.emit_jit_save_overflow(buf),
            UopCode::StoaImm => asm.emit_jit_stoa_imm(buf, value1 as u16, value2 as u8),
            UopCode::SubImm => asm.emit_jit_sub_imm(buf, value1 as u8),
            UopCode::Op(opcode) => match opcode {
                0x02 => asm.emit_instruction_exit(buf),
                0x08 => asm.emit_instruction_php(buf),
                0x10 => asm.emit_jit_bpl(buf, value1 as u64),
                0x18 => asm.emit_instruction_clc(buf),
                0x28 => asm.emit_instruction_plp(buf),
                0x29 => asm.emit_jit_and_imm(buf, value1 as u8),
                0x2A => asm.emit_jit_rol_acc(buf),
                0x30 => asm.emit_jit_bmi(buf, value1 as u64),
                0x38 => asm.emit_instruction_sec(buf),
                0x48 => asm.emit_instruction_pha(buf),
                0x4C => asm.emit_jit_jmp(buf, value1 as u64),
                0x50 => asm.emit_jit_bvc(buf, value1 as u64),
                0x58 => asm.emit_instruction_cli(buf),
                0x68 => asm.emit_instruction_pla(buf),
                0x69 => asm.emit_jit_adc_imm(buf, value1 as u8),
                0x6A => asm.emit_jit_ror_acc(buf),
                0x6C => asm.emit_jit_jmp_ind(buf, value1 as u16),
                0x70 => asm.emit_jit_bvs(buf, value1 as u64),
                0x78 => asm.emit_instruction_sei(buf),
                // STY zpg shares the STY abs emitter.
                0x84 | 0x8C => asm.emit_jit_sty_abs(buf, value1 as u16),
                // STA zpg shares the STA abs emitter.
                0x85 | 0x8D => asm.emit_jit_sta_abs(buf, value1 as u16),
                // STX zpg shares the STX abs emitter.
                0x86 | 0x8E => asm.emit_jit_stx_abs(buf, value1 as u16),
                0x88 => asm.emit_instruction_dey(buf),
                0x90 => asm.emit_jit_bcc(buf, value1 as u64),
                0x9A => asm.emit_instruction_txs(buf),
                0x9D => asm.emit_jit_sta_abx(buf, value1 as u16),
                0xA0 => asm.emit_jit_ldy_imm(buf, value1 as u8),
                0xA2 => asm.emit_jit_ldx_imm(buf, value1 as u8),
                // LDX zpg re-uses the LDX abs emitter.
                0xA6 | 0xAE => asm.emit_jit_ldx_abs(buf, value1 as u16),
                0xA8 => asm.emit_instruction_tay(buf),
                0xA9 => asm.emit_jit_lda_imm(buf, value1 as u8),
                0xAA => asm.emit_instruction_tax(buf),
                0xAD => asm.emit_jit_lda_abs(buf, value1 as u16),
                0xB0 => asm.emit_jit_bcs(buf, value1 as u64),
                0xB8 => asm.emit_instruction_clv(buf),
                0xBA => asm.emit_instruction_tsx(buf),
                0xBD => asm.emit_jit_lda_abx(buf, value1 as u16),
                0xC0 => asm.emit_jit_cpy_imm(buf, value1 as u8),
                0xC8 => asm.emit_instruction_iny(buf),
                0xC9 => asm.emit_jit_cmp_imm(buf, value1 as u8),
                0xCA => asm.emit_instruction_dex(buf),
                0xD0 => asm.emit_jit_bne(buf, value1 as u64),
                0xD8 => asm.emit_instruction_cld(buf),
                0xE0 => asm.emit_jit_cpx_imm(buf, value1 as u8),
                0xE6 => asm.emit_jit_inc_zpg(buf, value1 as u8),
                0xE8 => asm.emit_instruction_inx(buf),
                0xE9 => asm.emit_jit_sbc_imm(buf, value1 as u8),
                0xF0 => asm.emit_jit_beq(buf, value1 as u64),
                0xF2 => asm.emit_instruction_crash(buf),
                0xF8 => asm.emit_instruction_sed(buf),
                _ => asm.emit_instruction_illegal(buf),
            },
        }
    }
}
