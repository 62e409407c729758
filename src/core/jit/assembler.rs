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

//! Host code emission seam
//!
//! The compiler never encodes host instructions itself: it drives a
//! [`HostAssembler`] with one `emit_*` call per host instruction or
//! synthetic micro-op, targeting a [`CodeBuffer`]. A concrete backend
//! encodes real machine code; [`TraceAssembler`] records the stream as
//! readable text with a compact placeholder encoding, which is what the
//! compiler tests and benches run against.

/// A bounded, positioned code buffer
///
/// Carries a base address so emitted position-dependent encodings (host
/// relative jumps) can be fixed up by the assembler relative to where the
/// bytes will finally live.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    base_address: u64,
}

impl CodeBuffer {
    /// Create a buffer bounded to `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
            base_address: 0,
        }
    }

    /// Address the first byte of this buffer will occupy
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Rebase the buffer
    pub fn set_base_address(&mut self, base_address: u64) {
        self.base_address = base_address;
    }

    /// Bytes emitted so far
    pub fn pos(&self) -> usize {
        self.bytes.len()
    }

    /// Emitted bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Discard contents, keeping capacity and base address
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Append raw host bytes
    ///
    /// Panics if the buffer would overflow its bound; per-instruction
    /// buffers are sized so that one translated instruction always fits.
    pub fn put(&mut self, bytes: &[u8]) {
        assert!(
            self.bytes.len() + bytes.len() <= self.capacity,
            "code buffer overflow"
        );
        self.bytes.extend_from_slice(bytes);
    }

    /// Append another buffer's contents
    pub fn append(&mut self, other: &CodeBuffer) {
        self.put(other.bytes());
    }
}

/// One `emit_*` per host instruction and per synthetic micro-op
///
/// The 6502-derived emitters take their resolved operand; branch targets
/// arrive as host addresses already resolved by the compiler.
pub trait HostAssembler {
    // Synthetic micro-ops.
    fn emit_jit_call_debug(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_add_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_flag_a(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_flag_x(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_flag_y(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_load_carry(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_load_carry_inv(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_load_overflow(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_push_16(&mut self, buf: &mut CodeBuffer, value: u16);
    fn emit_jit_save_carry(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_save_carry_inv(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_save_overflow(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_stoa_imm(&mut self, buf: &mut CodeBuffer, addr: u16, value: u8);
    fn emit_jit_sub_imm(&mut self, buf: &mut CodeBuffer, value: u8);

    // 6502 instructions with operands.
    fn emit_jit_adc_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_and_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_cmp_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_cpx_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_cpy_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_lda_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_ldx_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_ldy_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_sbc_imm(&mut self, buf: &mut CodeBuffer, value: u8);
    fn emit_jit_inc_zpg(&mut self, buf: &mut CodeBuffer, addr: u8);
    fn emit_jit_lda_abs(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_lda_abx(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_ldx_abs(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_sta_abs(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_sta_abx(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_stx_abs(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_sty_abs(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_rol_acc(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_ror_acc(&mut self, buf: &mut CodeBuffer);
    fn emit_jit_jmp(&mut self, buf: &mut CodeBuffer, target: u64);
    fn emit_jit_jmp_ind(&mut self, buf: &mut CodeBuffer, addr: u16);
    fn emit_jit_bcc(&mut self, buf: &mut CodeBuffer, target: u64);
    fn emit_jit_bcs(&mut self, buf: &mut CodeBuffer, target: u64);
    fn emit_jit_beq(&mut self, buf: &mut CodeBuffer, target: u64);
    fn emit_jit_bmi(&mut self, buf: &mut CodeBuffer, target: u64);
    fn emit_jit_bne(&mut self, buf: &mut CodeBuffer, target: u64);
    fn emit_jit_bpl(&mut self, buf: &mut CodeBuffer, target: u64);
    fn emit_jit_bvc(&mut self, buf: &mut CodeBuffer, target: u64);
    fn emit_jit_bvs(&mut self, buf: &mut CodeBuffer, target: u64);

    // Whole implied instructions.
    fn emit_instruction_clc(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_cld(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_cli(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_clv(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_sec(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_sed(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_sei(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_dex(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_dey(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_inx(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_iny(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_pha(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_php(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_pla(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_plp(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_tax(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_tay(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_tsx(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_txs(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_exit(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_crash(&mut self, buf: &mut CodeBuffer);
    fn emit_instruction_illegal(&mut self, buf: &mut CodeBuffer);
}

/// Recording assembler backend
///
/// Appends a one-line description per emitted operation and a compact
/// tagged placeholder encoding to the buffer, so position arithmetic
/// behaves like a real backend's.
#[derive(Debug, Default)]
pub struct TraceAssembler {
    ops: Vec<String>,
}

impl TraceAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded emission stream
    pub fn ops(&self) -> &[String] {
        &self.ops
    }

    fn op0(&mut self, buf: &mut CodeBuffer, name: &str) {
        self.ops.push(name.to_string());
        buf.put(&[0xF4]);
    }

    fn op8(&mut self, buf: &mut CodeBuffer, name: &str, value: u8) {
        self.ops.push(format!("{name} ${value:02X}"));
        buf.put(&[0xF4, value]);
    }

    fn op16(&mut self, buf: &mut CodeBuffer, name: &str, value: u16) {
        self.ops.push(format!("{name} ${value:04X}"));
        buf.put(&[0xF4, (value & 0xFF) as u8, (value >> 8) as u8]);
    }

    fn op_host(&mut self, buf: &mut CodeBuffer, name: &str, target: u64) {
        self.ops.push(format!("{name} @{target:X}"));
        buf.put(&[0xF4, 0, 0, 0, 0]);
    }
}

impl HostAssembler for TraceAssembler {
    fn emit_jit_call_debug(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "CALL_DEBUG", addr);
    }
    fn emit_jit_add_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "ADD_IMM", value);
    }
    fn emit_jit_flag_a(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "FLAGA");
    }
    fn emit_jit_flag_x(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "FLAGX");
    }
    fn emit_jit_flag_y(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "FLAGY");
    }
    fn emit_jit_load_carry(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "LOAD_CARRY");
    }
    fn emit_jit_load_carry_inv(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "LOAD_CARRY_INV");
    }
    fn emit_jit_load_overflow(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "LOAD_OVERFLOW");
    }
    fn emit_jit_push_16(&mut self, buf: &mut CodeBuffer, value: u16) {
        self.op16(buf, "PUSH_16", value);
    }
    fn emit_jit_save_carry(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "SAVE_CARRY");
    }
    fn emit_jit_save_carry_inv(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "SAVE_CARRY_INV");
    }
    fn emit_jit_save_overflow(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "SAVE_OVERFLOW");
    }
    fn emit_jit_stoa_imm(&mut self, buf: &mut CodeBuffer, addr: u16, value: u8) {
        self.ops.push(format!("STOA_IMM ${addr:04X} ${value:02X}"));
        buf.put(&[0xF4, (addr & 0xFF) as u8, (addr >> 8) as u8, value]);
    }
    fn emit_jit_sub_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "SUB_IMM", value);
    }

    fn emit_jit_adc_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "ADC_IMM", value);
    }
    fn emit_jit_and_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "AND_IMM", value);
    }
    fn emit_jit_cmp_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "CMP_IMM", value);
    }
    fn emit_jit_cpx_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "CPX_IMM", value);
    }
    fn emit_jit_cpy_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "CPY_IMM", value);
    }
    fn emit_jit_lda_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "LDA_IMM", value);
    }
    fn emit_jit_ldx_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "LDX_IMM", value);
    }
    fn emit_jit_ldy_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "LDY_IMM", value);
    }
    fn emit_jit_sbc_imm(&mut self, buf: &mut CodeBuffer, value: u8) {
        self.op8(buf, "SBC_IMM", value);
    }
    fn emit_jit_inc_zpg(&mut self, buf: &mut CodeBuffer, addr: u8) {
        self.op8(buf, "INC_ZPG", addr);
    }
    fn emit_jit_lda_abs(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "LDA_ABS", addr);
    }
    fn emit_jit_lda_abx(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "LDA_ABX", addr);
    }
    fn emit_jit_ldx_abs(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "LDX_ABS", addr);
    }
    fn emit_jit_sta_abs(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "STA_ABS", addr);
    }
    fn emit_jit_sta_abx(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "STA_ABX", addr);
    }
    fn emit_jit_stx_abs(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "STX_ABS", addr);
    }
    fn emit_jit_sty_abs(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "STY_ABS", addr);
    }
    fn emit_jit_rol_acc(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "ROL_ACC");
    }
    fn emit_jit_ror_acc(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "ROR_ACC");
    }
    fn emit_jit_jmp(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "JMP", target);
    }
    fn emit_jit_jmp_ind(&mut self, buf: &mut CodeBuffer, addr: u16) {
        self.op16(buf, "JMP_IND", addr);
    }
    fn emit_jit_bcc(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "BCC", target);
    }
    fn emit_jit_bcs(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "BCS", target);
    }
    fn emit_jit_beq(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "BEQ", target);
    }
    fn emit_jit_bmi(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "BMI", target);
    }
    fn emit_jit_bne(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "BNE", target);
    }
    fn emit_jit_bpl(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "BPL", target);
    }
    fn emit_jit_bvc(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "BVC", target);
    }
    fn emit_jit_bvs(&mut self, buf: &mut CodeBuffer, target: u64) {
        self.op_host(buf, "BVS", target);
    }

    fn emit_instruction_clc(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "CLC");
    }
    fn emit_instruction_cld(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "CLD");
    }
    fn emit_instruction_cli(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "CLI");
    }
    fn emit_instruction_clv(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "CLV");
    }
    fn emit_instruction_sec(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "SEC");
    }
    fn emit_instruction_sed(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "SED");
    }
    fn emit_instruction_sei(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "SEI");
    }
    fn emit_instruction_dex(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "DEX");
    }
    fn emit_instruction_dey(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "DEY");
    }
    fn emit_instruction_inx(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "INX");
    }
    fn emit_instruction_iny(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "INY");
    }
    fn emit_instruction_pha(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "PHA");
    }
    fn emit_instruction_php(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "PHP");
    }
    fn emit_instruction_pla(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "PLA");
    }
    fn emit_instruction_plp(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "PLP");
    }
    fn emit_instruction_tax(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "TAX");
    }
    fn emit_instruction_tay(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "TAY");
    }
    fn emit_instruction_tsx(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "TSX");
    }
    fn emit_instruction_txs(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "TXS");
    }
    fn emit_instruction_exit(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "EXIT");
    }
    fn emit_instruction_crash(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "CRASH");
    }
    fn emit_instruction_illegal(&mut self, buf: &mut CodeBuffer) {
        self.op0(buf, "ILLEGAL");
    }
}
