//! Opcode dispatch table for the 6502 core.
//!
//! Every one of the 256 opcode bytes maps to an [`Opcode`] entry describing the
//! addressing mode, the operation, the documented base cycle count and the
//! extra-cycle policy. Opcodes outside the documented NMOS set are marked
//! [`Operation::Undocumented`].

/// Operand addressing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// JMP ($nnnn), with the page-wrap quirk when the pointer sits at $xxFF
    Indirect,
    /// ($nn,X)
    IndirectX,
    /// ($nn),Y
    IndirectY,
    Relative,
}

impl AddrMode {
    /// Number of operand bytes following the opcode
    pub const fn operand_len(self) -> u16 {
        match self {
            AddrMode::Implied | AddrMode::Accumulator => 0,
            AddrMode::Immediate
            | AddrMode::ZeroPage
            | AddrMode::ZeroPageX
            | AddrMode::ZeroPageY
            | AddrMode::IndirectX
            | AddrMode::IndirectY
            | AddrMode::Relative => 1,
            AddrMode::Absolute
            | AddrMode::AbsoluteX
            | AddrMode::AbsoluteY
            | AddrMode::Indirect => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
    Undocumented,
}

impl Operation {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Operation::Adc => "ADC",
            Operation::And => "AND",
            Operation::Asl => "ASL",
            Operation::Bcc => "BCC",
            Operation::Bcs => "BCS",
            Operation::Beq => "BEQ",
            Operation::Bit => "BIT",
            Operation::Bmi => "BMI",
            Operation::Bne => "BNE",
            Operation::Bpl => "BPL",
            Operation::Brk => "BRK",
            Operation::Bvc => "BVC",
            Operation::Bvs => "BVS",
            Operation::Clc => "CLC",
            Operation::Cld => "CLD",
            Operation::Cli => "CLI",
            Operation::Clv => "CLV",
            Operation::Cmp => "CMP",
            Operation::Cpx => "CPX",
            Operation::Cpy => "CPY",
            Operation::Dec => "DEC",
            Operation::Dex => "DEX",
            Operation::Dey => "DEY",
            Operation::Eor => "EOR",
            Operation::Inc => "INC",
            Operation::Inx => "INX",
            Operation::Iny => "INY",
            Operation::Jmp => "JMP",
            Operation::Jsr => "JSR",
            Operation::Lda => "LDA",
            Operation::Ldx => "LDX",
            Operation::Ldy => "LDY",
            Operation::Lsr => "LSR",
            Operation::Nop => "NOP",
            Operation::Ora => "ORA",
            Operation::Pha => "PHA",
            Operation::Php => "PHP",
            Operation::Pla => "PLA",
            Operation::Plp => "PLP",
            Operation::Rol => "ROL",
            Operation::Ror => "ROR",
            Operation::Rti => "RTI",
            Operation::Rts => "RTS",
            Operation::Sbc => "SBC",
            Operation::Sec => "SEC",
            Operation::Sed => "SED",
            Operation::Sei => "SEI",
            Operation::Sta => "STA",
            Operation::Stx => "STX",
            Operation::Sty => "STY",
            Operation::Tax => "TAX",
            Operation::Tay => "TAY",
            Operation::Tsx => "TSX",
            Operation::Txa => "TXA",
            Operation::Txs => "TXS",
            Operation::Tya => "TYA",
            Operation::Undocumented => "???",
        }
    }
}

/// When an instruction costs more than its base cycle count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraCycle {
    Never,
    /// +1 when the indexed effective address lands on another page
    PageCross,
    /// +1 when taken, +1 more when the target is on another page
    Branch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub operation: Operation,
    pub mode: AddrMode,
    pub cycles: u8,
    pub extra: ExtraCycle,
}

impl Opcode {
    const UNDOCUMENTED: Opcode = Opcode {
        operation: Operation::Undocumented,
        mode: AddrMode::Implied,
        cycles: 0,
        extra: ExtraCycle::Never,
    };

    pub const fn is_documented(&self) -> bool {
        !matches!(self.operation, Operation::Undocumented)
    }
}

const fn op(operation: Operation, mode: AddrMode, cycles: u8, extra: ExtraCycle) -> Opcode {
    Opcode {
        operation,
        mode,
        cycles,
        extra,
    }
}

/// The opcode table, indexed by opcode byte
pub static OPCODES: [Opcode; 256] = build_table();

const fn build_table() -> [Opcode; 256] {
    use AddrMode::*;
    use ExtraCycle::*;
    use Operation::*;

    let mut t = [Opcode::UNDOCUMENTED; 256];

    t[0x69] = op(Adc, Immediate, 2, Never);
    t[0x65] = op(Adc, ZeroPage, 3, Never);
    t[0x75] = op(Adc, ZeroPageX, 4, Never);
    t[0x6D] = op(Adc, Absolute, 4, Never);
    t[0x7D] = op(Adc, AbsoluteX, 4, PageCross);
    t[0x79] = op(Adc, AbsoluteY, 4, PageCross);
    t[0x61] = op(Adc, IndirectX, 6, Never);
    t[0x71] = op(Adc, IndirectY, 5, PageCross);

    t[0x29] = op(And, Immediate, 2, Never);
    t[0x25] = op(And, ZeroPage, 3, Never);
    t[0x35] = op(And, ZeroPageX, 4, Never);
    t[0x2D] = op(And, Absolute, 4, Never);
    t[0x3D] = op(And, AbsoluteX, 4, PageCross);
    t[0x39] = op(And, AbsoluteY, 4, PageCross);
    t[0x21] = op(And, IndirectX, 6, Never);
    t[0x31] = op(And, IndirectY, 5, PageCross);

    t[0x0A] = op(Asl, Accumulator, 2, Never);
    t[0x06] = op(Asl, ZeroPage, 5, Never);
    t[0x16] = op(Asl, ZeroPageX, 6, Never);
    t[0x0E] = op(Asl, Absolute, 6, Never);
    t[0x1E] = op(Asl, AbsoluteX, 7, Never);

    t[0x90] = op(Bcc, Relative, 2, Branch);
    t[0xB0] = op(Bcs, Relative, 2, Branch);
    t[0xF0] = op(Beq, Relative, 2, Branch);
    t[0x30] = op(Bmi, Relative, 2, Branch);
    t[0xD0] = op(Bne, Relative, 2, Branch);
    t[0x10] = op(Bpl, Relative, 2, Branch);
    t[0x50] = op(Bvc, Relative, 2, Branch);
    t[0x70] = op(Bvs, Relative, 2, Branch);

    t[0x24] = op(Bit, ZeroPage, 3, Never);
    t[0x2C] = op(Bit, Absolute, 4, Never);

    t[0x00] = op(Brk, Implied, 7, Never);

    t[0x18] = op(Clc, Implied, 2, Never);
    t[0xD8] = op(Cld, Implied, 2, Never);
    t[0x58] = op(Cli, Implied, 2, Never);
    t[0xB8] = op(Clv, Implied, 2, Never);

    t[0xC9] = op(Cmp, Immediate, 2, Never);
    t[0xC5] = op(Cmp, ZeroPage, 3, Never);
    t[0xD5] = op(Cmp, ZeroPageX, 4, Never);
    t[0xCD] = op(Cmp, Absolute, 4, Never);
    t[0xDD] = op(Cmp, AbsoluteX, 4, PageCross);
    t[0xD9] = op(Cmp, AbsoluteY, 4, PageCross);
    t[0xC1] = op(Cmp, IndirectX, 6, Never);
    t[0xD1] = op(Cmp, IndirectY, 5, PageCross);

    t[0xE0] = op(Cpx, Immediate, 2, Never);
    t[0xE4] = op(Cpx, ZeroPage, 3, Never);
    t[0xEC] = op(Cpx, Absolute, 4, Never);

    t[0xC0] = op(Cpy, Immediate, 2, Never);
    t[0xC4] = op(Cpy, ZeroPage, 3, Never);
    t[0xCC] = op(Cpy, Absolute, 4, Never);

    t[0xC6] = op(Dec, ZeroPage, 5, Never);
    t[0xD6] = op(Dec, ZeroPageX, 6, Never);
    t[0xCE] = op(Dec, Absolute, 6, Never);
    t[0xDE] = op(Dec, AbsoluteX, 7, Never);
    t[0xCA] = op(Dex, Implied, 2, Never);
    t[0x88] = op(Dey, Implied, 2, Never);

    t[0x49] = op(Eor, Immediate, 2, Never);
    t[0x45] = op(Eor, ZeroPage, 3, Never);
    t[0x55] = op(Eor, ZeroPageX, 4, Never);
    t[0x4D] = op(Eor, Absolute, 4, Never);
    t[0x5D] = op(Eor, AbsoluteX, 4, PageCross);
    t[0x59] = op(Eor, AbsoluteY, 4, PageCross);
    t[0x41] = op(Eor, IndirectX, 6, Never);
    t[0x51] = op(Eor, IndirectY, 5, PageCross);

    t[0xE6] = op(Inc, ZeroPage, 5, Never);
    t[0xF6] = op(Inc, ZeroPageX, 6, Never);
    t[0xEE] = op(Inc, Absolute, 6, Never);
    t[0xFE] = op(Inc, AbsoluteX, 7, Never);
    t[0xE8] = op(Inx, Implied, 2, Never);
    t[0xC8] = op(Iny, Implied, 2, Never);

    t[0x4C] = op(Jmp, Absolute, 3, Never);
    t[0x6C] = op(Jmp, Indirect, 5, Never);
    t[0x20] = op(Jsr, Absolute, 6, Never);

    t[0xA9] = op(Lda, Immediate, 2, Never);
    t[0xA5] = op(Lda, ZeroPage, 3, Never);
    t[0xB5] = op(Lda, ZeroPageX, 4, Never);
    t[0xAD] = op(Lda, Absolute, 4, Never);
    t[0xBD] = op(Lda, AbsoluteX, 4, PageCross);
    t[0xB9] = op(Lda, AbsoluteY, 4, PageCross);
    t[0xA1] = op(Lda, IndirectX, 6, Never);
    t[0xB1] = op(Lda, IndirectY, 5, PageCross);

    t[0xA2] = op(Ldx, Immediate, 2, Never);
    t[0xA6] = op(Ldx, ZeroPage, 3, Never);
    t[0xB6] = op(Ldx, ZeroPageY, 4, Never);
    t[0xAE] = op(Ldx, Absolute, 4, Never);
    t[0xBE] = op(Ldx, AbsoluteY, 4, PageCross);

    t[0xA0] = op(Ldy, Immediate, 2, Never);
    t[0xA4] = op(Ldy, ZeroPage, 3, Never);
    t[0xB4] = op(Ldy, ZeroPageX, 4, Never);
    t[0xAC] = op(Ldy, Absolute, 4, Never);
    t[0xBC] = op(Ldy, AbsoluteX, 4, PageCross);

    t[0x4A] = op(Lsr, Accumulator, 2, Never);
    t[0x46] = op(Lsr, ZeroPage, 5, Never);
    t[0x56] = op(Lsr, ZeroPageX, 6, Never);
    t[0x4E] = op(Lsr, Absolute, 6, Never);
    t[0x5E] = op(Lsr, AbsoluteX, 7, Never);

    t[0xEA] = op(Nop, Implied, 2, Never);

    t[0x09] = op(Ora, Immediate, 2, Never);
    t[0x05] = op(Ora, ZeroPage, 3, Never);
    t[0x15] = op(Ora, ZeroPageX, 4, Never);
    t[0x0D] = op(Ora, Absolute, 4, Never);
    t[0x1D] = op(Ora, AbsoluteX, 4, PageCross);
    t[0x19] = op(Ora, AbsoluteY, 4, PageCross);
    t[0x01] = op(Ora, IndirectX, 6, Never);
    t[0x11] = op(Ora, IndirectY, 5, PageCross);

    t[0x48] = op(Pha, Implied, 3, Never);
    t[0x08] = op(Php, Implied, 3, Never);
    t[0x68] = op(Pla, Implied, 4, Never);
    t[0x28] = op(Plp, Implied, 4, Never);

    t[0x2A] = op(Rol, Accumulator, 2, Never);
    t[0x26] = op(Rol, ZeroPage, 5, Never);
    t[0x36] = op(Rol, ZeroPageX, 6, Never);
    t[0x2E] = op(Rol, Absolute, 6, Never);
    t[0x3E] = op(Rol, AbsoluteX, 7, Never);

    t[0x6A] = op(Ror, Accumulator, 2, Never);
    t[0x66] = op(Ror, ZeroPage, 5, Never);
    t[0x76] = op(Ror, ZeroPageX, 6, Never);
    t[0x6E] = op(Ror, Absolute, 6, Never);
    t[0x7E] = op(Ror, AbsoluteX, 7, Never);

    t[0x40] = op(Rti, Implied, 6, Never);
    t[0x60] = op(Rts, Implied, 6, Never);

    t[0xE9] = op(Sbc, Immediate, 2, Never);
    t[0xE5] = op(Sbc, ZeroPage, 3, Never);
    t[0xF5] = op(Sbc, ZeroPageX, 4, Never);
    t[0xED] = op(Sbc, Absolute, 4, Never);
    t[0xFD] = op(Sbc, AbsoluteX, 4, PageCross);
    t[0xF9] = op(Sbc, AbsoluteY, 4, PageCross);
    t[0xE1] = op(Sbc, IndirectX, 6, Never);
    t[0xF1] = op(Sbc, IndirectY, 5, PageCross);

    t[0x38] = op(Sec, Implied, 2, Never);
    t[0xF8] = op(Sed, Implied, 2, Never);
    t[0x78] = op(Sei, Implied, 2, Never);

    // Stores always take the fixed-page path, no page-cross penalty
    t[0x85] = op(Sta, ZeroPage, 3, Never);
    t[0x95] = op(Sta, ZeroPageX, 4, Never);
    t[0x8D] = op(Sta, Absolute, 4, Never);
    t[0x9D] = op(Sta, AbsoluteX, 5, Never);
    t[0x99] = op(Sta, AbsoluteY, 5, Never);
    t[0x81] = op(Sta, IndirectX, 6, Never);
    t[0x91] = op(Sta, IndirectY, 6, Never);

    t[0x86] = op(Stx, ZeroPage, 3, Never);
    t[0x96] = op(Stx, ZeroPageY, 4, Never);
    t[0x8E] = op(Stx, Absolute, 4, Never);

    t[0x84] = op(Sty, ZeroPage, 3, Never);
    t[0x94] = op(Sty, ZeroPageX, 4, Never);
    t[0x8C] = op(Sty, Absolute, 4, Never);

    t[0xAA] = op(Tax, Implied, 2, Never);
    t[0xA8] = op(Tay, Implied, 2, Never);
    t[0xBA] = op(Tsx, Implied, 2, Never);
    t[0x8A] = op(Txa, Implied, 2, Never);
    t[0x9A] = op(Txs, Implied, 2, Never);
    t[0x98] = op(Tya, Implied, 2, Never);

    t
}
