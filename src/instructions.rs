use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Encoding family of a base instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    R,
    I,
    J,
}

/// What an operand slot feeds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Rd,
    Rs,
    Rt,
    Shamt,
    Imm,
    Label,
    Target,
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrFlags: u8 {
const UNSIGNED_IMM = 1 << 0; // immediate range 0..=65535, zero-extended
const MEMORY = 1 << 1;       // rt, offset(rs)
const BRANCH = 1 << 2;       // pc-relative label operand
const REGIMM = 1 << 3;       // opcode 1, variant in rt
const LINK = 1 << 4;         // writes a return address
const NO_OPERANDS = 1 << 5;
}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mnemonic {
    // R-type
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Syscall,
    Break,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Mult,
    Multu,
    Div,
    Divu,
    // I-type
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Lw,
    Lb,
    Lh,
    Lbu,
    Lhu,
    Sw,
    Sb,
    Sh,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Bltz,
    Bgez,
    Bltzal,
    Bgezal,
    // J-type
    J,
    Jal,
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub op: Mnemonic,
    pub mnemonic: &'static str,
    pub format: Format,
    /// funct for R-type, opcode otherwise
    pub code: u8,
    /// rt value baked in by the encoder (REGIMM variants, blez/bgtz)
    pub fixed_rt: Option<u8>,
    pub operands: &'static [Role],
    pub flags: InstrFlags,
}

impl InstrDesc {
    pub fn opcode(&self) -> u8 {
        match self.format {
            Format::R => 0,
            _ => self.code,
        }
    }

    pub fn signed_imm(&self) -> bool {
        !self.flags.contains(InstrFlags::UNSIGNED_IMM)
    }
}

use Role::*;

const RD_RS_RT: &[Role] = &[Rd, Rs, Rt];
const RD_RT_RS: &[Role] = &[Rd, Rt, Rs];
const RD_RT_SHAMT: &[Role] = &[Rd, Rt, Shamt];
const RS_RT: &[Role] = &[Rs, Rt];
const ONLY_RS: &[Role] = &[Rs];
const ONLY_RD: &[Role] = &[Rd];
const RT_RS_IMM: &[Role] = &[Rt, Rs, Imm];
const RT_IMM_RS: &[Role] = &[Rt, Imm, Rs];
const RS_RT_LABEL: &[Role] = &[Rs, Rt, Label];
const RS_LABEL: &[Role] = &[Rs, Label];

const fn r(op: Mnemonic, mnemonic: &'static str, funct: u8, operands: &'static [Role]) -> InstrDesc {
    InstrDesc { op, mnemonic, format: Format::R, code: funct, fixed_rt: None, operands, flags: InstrFlags::empty() }
}

const fn i(op: Mnemonic, mnemonic: &'static str, opcode: u8, operands: &'static [Role], flags: InstrFlags) -> InstrDesc {
    InstrDesc { op, mnemonic, format: Format::I, code: opcode, fixed_rt: None, operands, flags }
}

const fn branch(op: Mnemonic, mnemonic: &'static str, opcode: u8, rt: Option<u8>, operands: &'static [Role], flags: InstrFlags) -> InstrDesc {
    InstrDesc {
        op,
        mnemonic,
        format: Format::I,
        code: opcode,
        fixed_rt: rt,
        operands,
        flags: InstrFlags::BRANCH.union(flags),
    }
}

const NONE: InstrFlags = InstrFlags::empty();
const UNS: InstrFlags = InstrFlags::UNSIGNED_IMM;
const MEM: InstrFlags = InstrFlags::MEMORY;
const REGIMM: InstrFlags = InstrFlags::REGIMM;
const REGIMM_LINK: InstrFlags = InstrFlags::REGIMM.union(InstrFlags::LINK);

/// The one encoding contract shared by encoder, decoder and executor.
pub const TABLE: &[InstrDesc] = &[
    r(Mnemonic::Add, "add", 0x20, RD_RS_RT),
    r(Mnemonic::Addu, "addu", 0x21, RD_RS_RT),
    r(Mnemonic::Sub, "sub", 0x22, RD_RS_RT),
    r(Mnemonic::Subu, "subu", 0x23, RD_RS_RT),
    r(Mnemonic::And, "and", 0x24, RD_RS_RT),
    r(Mnemonic::Or, "or", 0x25, RD_RS_RT),
    r(Mnemonic::Xor, "xor", 0x26, RD_RS_RT),
    r(Mnemonic::Nor, "nor", 0x27, RD_RS_RT),
    r(Mnemonic::Slt, "slt", 0x2a, RD_RS_RT),
    r(Mnemonic::Sltu, "sltu", 0x2b, RD_RS_RT),
    r(Mnemonic::Sll, "sll", 0x00, RD_RT_SHAMT),
    r(Mnemonic::Srl, "srl", 0x02, RD_RT_SHAMT),
    r(Mnemonic::Sra, "sra", 0x03, RD_RT_SHAMT),
    r(Mnemonic::Sllv, "sllv", 0x04, RD_RT_RS),
    r(Mnemonic::Srlv, "srlv", 0x06, RD_RT_RS),
    r(Mnemonic::Srav, "srav", 0x07, RD_RT_RS),
    r(Mnemonic::Jr, "jr", 0x08, ONLY_RS),
    InstrDesc {
        op: Mnemonic::Jalr,
        mnemonic: "jalr",
        format: Format::R,
        code: 0x09,
        fixed_rt: None,
        operands: &[Rd, Rs],
        flags: InstrFlags::LINK,
    },
    InstrDesc {
        op: Mnemonic::Syscall,
        mnemonic: "syscall",
        format: Format::R,
        code: 0x0c,
        fixed_rt: None,
        operands: &[],
        flags: InstrFlags::NO_OPERANDS,
    },
    InstrDesc {
        op: Mnemonic::Break,
        mnemonic: "break",
        format: Format::R,
        code: 0x0d,
        fixed_rt: None,
        operands: &[],
        flags: InstrFlags::NO_OPERANDS,
    },
    r(Mnemonic::Mfhi, "mfhi", 0x10, ONLY_RD),
    r(Mnemonic::Mthi, "mthi", 0x11, ONLY_RS),
    r(Mnemonic::Mflo, "mflo", 0x12, ONLY_RD),
    r(Mnemonic::Mtlo, "mtlo", 0x13, ONLY_RS),
    r(Mnemonic::Mult, "mult", 0x18, RS_RT),
    r(Mnemonic::Multu, "multu", 0x19, RS_RT),
    r(Mnemonic::Div, "div", 0x1a, RS_RT),
    r(Mnemonic::Divu, "divu", 0x1b, RS_RT),
    i(Mnemonic::Addi, "addi", 0x08, RT_RS_IMM, NONE),
    i(Mnemonic::Addiu, "addiu", 0x09, RT_RS_IMM, NONE),
    i(Mnemonic::Slti, "slti", 0x0a, RT_RS_IMM, NONE),
    i(Mnemonic::Sltiu, "sltiu", 0x0b, RT_RS_IMM, UNS),
    i(Mnemonic::Andi, "andi", 0x0c, RT_RS_IMM, UNS),
    i(Mnemonic::Ori, "ori", 0x0d, RT_RS_IMM, UNS),
    i(Mnemonic::Xori, "xori", 0x0e, RT_RS_IMM, UNS),
    i(Mnemonic::Lui, "lui", 0x0f, &[Rt, Imm], UNS),
    i(Mnemonic::Lw, "lw", 0x23, RT_IMM_RS, MEM),
    i(Mnemonic::Lb, "lb", 0x20, RT_IMM_RS, MEM),
    i(Mnemonic::Lh, "lh", 0x21, RT_IMM_RS, MEM),
    i(Mnemonic::Lbu, "lbu", 0x24, RT_IMM_RS, MEM),
    i(Mnemonic::Lhu, "lhu", 0x25, RT_IMM_RS, MEM),
    i(Mnemonic::Sw, "sw", 0x2b, RT_IMM_RS, MEM),
    i(Mnemonic::Sb, "sb", 0x28, RT_IMM_RS, MEM),
    i(Mnemonic::Sh, "sh", 0x29, RT_IMM_RS, MEM),
    branch(Mnemonic::Beq, "beq", 0x04, None, RS_RT_LABEL, NONE),
    branch(Mnemonic::Bne, "bne", 0x05, None, RS_RT_LABEL, NONE),
    branch(Mnemonic::Blez, "blez", 0x06, Some(0), RS_LABEL, NONE),
    branch(Mnemonic::Bgtz, "bgtz", 0x07, Some(0), RS_LABEL, NONE),
    branch(Mnemonic::Bltz, "bltz", 0x01, Some(0x00), RS_LABEL, REGIMM),
    branch(Mnemonic::Bgez, "bgez", 0x01, Some(0x01), RS_LABEL, REGIMM),
    branch(Mnemonic::Bltzal, "bltzal", 0x01, Some(0x10), RS_LABEL, REGIMM_LINK),
    branch(Mnemonic::Bgezal, "bgezal", 0x01, Some(0x11), RS_LABEL, REGIMM_LINK),
    InstrDesc {
        op: Mnemonic::J,
        mnemonic: "j",
        format: Format::J,
        code: 0x02,
        fixed_rt: None,
        operands: &[Target],
        flags: InstrFlags::empty(),
    },
    InstrDesc {
        op: Mnemonic::Jal,
        mnemonic: "jal",
        format: Format::J,
        code: 0x03,
        fixed_rt: None,
        operands: &[Target],
        flags: InstrFlags::LINK,
    },
];

/// Look up a base mnemonic (already lower-cased by the parser).
pub fn lookup(name: &str) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| d.mnemonic == name)
}

pub fn by_funct(funct: u8) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| d.format == Format::R && d.code == funct)
}

/// I/J-type lookup; opcode 1 selects its variant through `rt`.
pub fn by_opcode(opcode: u8, rt: u8) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| {
        d.format != Format::R
            && d.code == opcode
            && (!d.flags.contains(InstrFlags::REGIMM) || d.fixed_rt == Some(rt))
    })
}

impl Mnemonic {
    pub fn desc(self) -> &'static InstrDesc {
        // every variant has exactly one row
        TABLE
            .iter()
            .find(|d| d.op == self)
            .unwrap_or(&TABLE[0])
    }

    pub fn as_str(self) -> &'static str {
        self.desc().mnemonic
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mnemonic '{0}'")]
pub struct UnknownMnemonic(pub String);

impl FromStr for Mnemonic {
    type Err = UnknownMnemonic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(&s.to_ascii_lowercase())
            .map(|d| d.op)
            .ok_or_else(|| UnknownMnemonic(s.to_string()))
    }
}
