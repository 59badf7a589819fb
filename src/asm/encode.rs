//! Base instruction -> machine word.

use tracing::warn;

use super::parser::parse_int;
use super::{Expanded, SymbolTable};
use crate::instructions::{Format, InstrDesc, Mnemonic, Role};
use crate::registers;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("Invalid register name: '{0}'")]
    InvalidRegister(String),
    #[error("Incorrect operand count for '{mnemonic}'. Expected {expected}, got {got}.")]
    OperandCount {
        mnemonic: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Empty immediate value.")]
    EmptyImmediate,
    #[error("Invalid immediate value: '{0}'")]
    InvalidImmediate(String),
    #[error("Immediate '{value}' out of range for {bits}-bit signed value ({min} to {max})")]
    SignedRange {
        value: String,
        bits: u32,
        min: i64,
        max: i64,
    },
    #[error("Immediate '{value}' out of range for {bits}-bit unsigned value (0 to {max})")]
    UnsignedRange { value: String, bits: u32, max: i64 },
    #[error("Undefined label: '{0}'")]
    UndefinedLabel(String),
    #[error("Branch target '{label}' is not word aligned relative to the branch")]
    BranchMisaligned { label: String },
    #[error("Branch target '{label}' (offset {offset}) too far for 16-bit signed relative offset.")]
    BranchRange { label: String, offset: i64 },
    #[error("Invalid jump target: '{0}'")]
    InvalidJumpTarget(String),
    #[error("Jump target 0x{0:08x} is not word aligned")]
    JumpMisaligned(u32),
}

pub fn register(op: &str) -> Result<u32, EncodeError> {
    registers::parse(op)
        .map(u32::from)
        .ok_or_else(|| EncodeError::InvalidRegister(op.to_string()))
}

/// Range-check an immediate and return its low `bits` bits.
pub fn immediate(op: &str, bits: u32, signed: bool) -> Result<u32, EncodeError> {
    let text = op.trim();
    if text.is_empty() {
        return Err(EncodeError::EmptyImmediate);
    }
    let v = parse_int(text).ok_or_else(|| EncodeError::InvalidImmediate(text.to_string()))?;
    if signed {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if !(min..=max).contains(&v) {
            return Err(EncodeError::SignedRange { value: text.to_string(), bits, min, max });
        }
    } else {
        let max = (1i64 << bits) - 1;
        if !(0..=max).contains(&v) {
            return Err(EncodeError::UnsignedRange { value: text.to_string(), bits, max });
        }
    }
    Ok((v as u32) & ((1u32 << bits) - 1))
}

pub struct Encoder<'a> {
    symbols: &'a SymbolTable,
}

impl<'a> Encoder<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self { symbols }
    }

    pub fn encode(&self, ins: &Expanded) -> Result<u32, EncodeError> {
        let desc = ins.op.desc();
        match desc.format {
            Format::R => encode_r(desc, &ins.operands),
            Format::I => self.encode_i(desc, &ins.operands, ins.address),
            Format::J => self.encode_j(desc, &ins.operands, ins.address),
        }
    }

    fn branch_offset(&self, label: &str, address: u32) -> Result<u32, EncodeError> {
        let target = self
            .symbols
            .get(label)
            .ok_or_else(|| EncodeError::UndefinedLabel(label.to_string()))?;
        let delta = i64::from(target) - (i64::from(address) + 4);
        if delta % 4 != 0 {
            return Err(EncodeError::BranchMisaligned { label: label.to_string() });
        }
        let offset = delta / 4;
        if !(i64::from(i16::MIN)..=i64::from(i16::MAX)).contains(&offset) {
            return Err(EncodeError::BranchRange { label: label.to_string(), offset });
        }
        Ok(offset as u32 & 0xFFFF)
    }

    fn encode_i(&self, desc: &InstrDesc, ops: &[String], address: u32) -> Result<u32, EncodeError> {
        check_count(desc, ops, desc.operands.len())?;
        let (mut rs, mut rt, mut imm) = (0, 0, 0);
        for (role, op) in desc.operands.iter().zip(ops) {
            match role {
                Role::Rs => rs = register(op)?,
                Role::Rt => rt = register(op)?,
                Role::Imm => imm = immediate(op, 16, desc.signed_imm())?,
                Role::Label => imm = self.branch_offset(op, address)?,
                _ => {}
            }
        }
        if let Some(fixed) = desc.fixed_rt {
            rt = u32::from(fixed);
        }
        Ok((u32::from(desc.opcode()) << 26) | (rs << 21) | (rt << 16) | imm)
    }

    fn encode_j(&self, desc: &InstrDesc, ops: &[String], address: u32) -> Result<u32, EncodeError> {
        check_count(desc, ops, 1)?;
        let op = ops[0].as_str();
        let target = match self.symbols.get(op) {
            Some(addr) => addr,
            None => parse_int(op)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    if op.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                        EncodeError::UndefinedLabel(op.to_string())
                    } else {
                        EncodeError::InvalidJumpTarget(op.to_string())
                    }
                })?,
        };
        if target % 4 != 0 {
            return Err(EncodeError::JumpMisaligned(target));
        }
        if (target ^ address.wrapping_add(4)) & 0xF000_0000 != 0 {
            warn!(
                mnemonic = desc.mnemonic,
                address = format_args!("{address:#010x}"),
                target = format_args!("{target:#010x}"),
                "jump target leaves the current 256MB region"
            );
        }
        Ok((u32::from(desc.opcode()) << 26) | ((target >> 2) & 0x03FF_FFFF))
    }
}

fn check_count(desc: &InstrDesc, ops: &[String], expected: usize) -> Result<(), EncodeError> {
    if ops.len() != expected {
        return Err(EncodeError::OperandCount {
            mnemonic: desc.mnemonic,
            expected,
            got: ops.len(),
        });
    }
    Ok(())
}

fn encode_r(desc: &InstrDesc, ops: &[String]) -> Result<u32, EncodeError> {
    let (mut rd, mut rs, mut rt, mut shamt) = (0, 0, 0, 0);
    if desc.op == Mnemonic::Jalr {
        match ops {
            [target] => {
                rd = u32::from(registers::RA);
                rs = register(target)?;
            }
            [link, target] => {
                rd = register(link)?;
                rs = register(target)?;
            }
            _ => check_count(desc, ops, 2)?,
        }
    } else {
        check_count(desc, ops, desc.operands.len())?;
        for (role, op) in desc.operands.iter().zip(ops) {
            match role {
                Role::Rd => rd = register(op)?,
                Role::Rs => rs = register(op)?,
                Role::Rt => rt = register(op)?,
                Role::Shamt => shamt = immediate(op, 5, false)?,
                _ => {}
            }
        }
    }
    Ok((rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | u32::from(desc.code))
}
