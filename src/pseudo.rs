//! Pseudo-instructions: assembler-level mnemonics rewritten into base
//! instructions before encoding. Every rule is a pure function of the
//! operands, the (final) symbol table and the instruction address.

use tracing::trace;

use crate::asm::parser::parse_int;
use crate::asm::SymbolTable;
use crate::instructions::Mnemonic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    Move,
    Clear,
    Nop,
    Li,
    La,
    Blt,
    Bgt,
    Ble,
    Bge,
}

/// One base instruction produced by an expansion, operands still textual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseInstr {
    pub op: Mnemonic,
    pub operands: Vec<String>,
}

impl BaseInstr {
    fn new(op: Mnemonic, operands: &[&str]) -> Self {
        Self {
            op,
            operands: operands.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpandError {
    #[error("Incorrect operand count for '{name}'. Expected {expected}, got {got}.")]
    OperandCount {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Invalid immediate value: '{0}'")]
    InvalidImmediate(String),
    #[error("Immediate '{0}' out of range for 32-bit value")]
    ImmediateRange(String),
    #[error("Undefined label: '{0}'")]
    UndefinedLabel(String),
}

impl Pseudo {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "move" => Pseudo::Move,
            "clear" => Pseudo::Clear,
            "nop" => Pseudo::Nop,
            "li" => Pseudo::Li,
            "la" => Pseudo::La,
            "blt" => Pseudo::Blt,
            "bgt" => Pseudo::Bgt,
            "ble" => Pseudo::Ble,
            "bge" => Pseudo::Bge,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Pseudo::Move => "move",
            Pseudo::Clear => "clear",
            Pseudo::Nop => "nop",
            Pseudo::Li => "li",
            Pseudo::La => "la",
            Pseudo::Blt => "blt",
            Pseudo::Bgt => "bgt",
            Pseudo::Ble => "ble",
            Pseudo::Bge => "bge",
        }
    }

    fn arity(self) -> usize {
        match self {
            Pseudo::Nop => 0,
            Pseudo::Clear => 1,
            Pseudo::Move | Pseudo::Li | Pseudo::La => 2,
            Pseudo::Blt | Pseudo::Bgt | Pseudo::Ble | Pseudo::Bge => 3,
        }
    }

    /// Bytes this line occupies in `.text`. Exact whenever the operands
    /// decide it; `la` to a label not yet seen assumes the long form.
    pub fn size_hint(self, operands: &[String], symbols: &SymbolTable) -> u32 {
        match self {
            Pseudo::Move | Pseudo::Clear | Pseudo::Nop => 4,
            Pseudo::Blt | Pseudo::Bgt | Pseudo::Ble | Pseudo::Bge => 8,
            Pseudo::Li => match operands.get(1).and_then(|s| parse_int(s)) {
                Some(v) if fits_i16(v) || (0..=0xFFFF).contains(&v) => 4,
                Some(v) if v & 0xFFFF == 0 => 4,
                _ => 8,
            },
            Pseudo::La => match operands.get(1).and_then(|l| symbols.get(l)) {
                Some(addr) if addr & 0xFFFF == 0 => 4,
                _ => 8,
            },
        }
    }
}

fn fits_i16(v: i64) -> bool {
    (i16::MIN as i64..=i16::MAX as i64).contains(&v)
}

/// `lui`/`ori` pair through `$at`, collapsed to a single `lui rd` when the
/// low half is zero.
fn upper_lower(rd: &str, value: u32) -> Vec<BaseInstr> {
    let upper = (value >> 16) & 0xFFFF;
    let lower = value & 0xFFFF;
    if lower == 0 {
        vec![BaseInstr::new(Mnemonic::Lui, &[rd, &upper.to_string()])]
    } else {
        vec![
            BaseInstr::new(Mnemonic::Lui, &["$at", &upper.to_string()]),
            BaseInstr::new(Mnemonic::Ori, &[rd, "$at", &lower.to_string()]),
        ]
    }
}

fn set_less_then_branch(lhs: &str, rhs: &str, branch: Mnemonic, label: &str) -> Vec<BaseInstr> {
    vec![
        BaseInstr::new(Mnemonic::Slt, &["$at", lhs, rhs]),
        BaseInstr::new(branch, &["$at", "$zero", label]),
    ]
}

pub fn expand(
    pseudo: Pseudo,
    operands: &[String],
    symbols: &SymbolTable,
    address: u32,
) -> Result<Vec<BaseInstr>, ExpandError> {
    if operands.len() != pseudo.arity() {
        return Err(ExpandError::OperandCount {
            name: pseudo.name(),
            expected: pseudo.arity(),
            got: operands.len(),
        });
    }
    let ops: Vec<&str> = operands.iter().map(String::as_str).collect();
    let out = match pseudo {
        Pseudo::Move => vec![BaseInstr::new(Mnemonic::Add, &[ops[0], ops[1], "$zero"])],
        Pseudo::Clear => vec![BaseInstr::new(Mnemonic::Add, &[ops[0], "$zero", "$zero"])],
        Pseudo::Nop => vec![BaseInstr::new(Mnemonic::Sll, &["$zero", "$zero", "0"])],
        Pseudo::Li => {
            let value = parse_int(ops[1]).ok_or_else(|| ExpandError::InvalidImmediate(ops[1].to_string()))?;
            if fits_i16(value) {
                vec![BaseInstr::new(Mnemonic::Addiu, &[ops[0], "$zero", &value.to_string()])]
            } else if (0..=0xFFFF).contains(&value) {
                vec![BaseInstr::new(Mnemonic::Ori, &[ops[0], "$zero", &value.to_string()])]
            } else if (i32::MIN as i64..=u32::MAX as i64).contains(&value) {
                upper_lower(ops[0], value as u32)
            } else {
                return Err(ExpandError::ImmediateRange(ops[1].to_string()));
            }
        }
        Pseudo::La => {
            let addr = symbols
                .get(ops[1])
                .ok_or_else(|| ExpandError::UndefinedLabel(ops[1].to_string()))?;
            upper_lower(ops[0], addr)
        }
        // rs < rt
        Pseudo::Blt => set_less_then_branch(ops[0], ops[1], Mnemonic::Bne, ops[2]),
        // rt < rs
        Pseudo::Bgt => set_less_then_branch(ops[1], ops[0], Mnemonic::Bne, ops[2]),
        // !(rt < rs)
        Pseudo::Ble => set_less_then_branch(ops[1], ops[0], Mnemonic::Beq, ops[2]),
        // !(rs < rt)
        Pseudo::Bge => set_less_then_branch(ops[0], ops[1], Mnemonic::Beq, ops[2]),
    };
    trace!(pseudo = pseudo.name(), address, count = out.len(), "expanded");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ops(s: &[&str]) -> Vec<String> {
        s.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn li_picks_shortest_form() {
        let st = SymbolTable::default();
        let small = expand(Pseudo::Li, &ops(&["$t0", "-5"]), &st, 0).unwrap();
        assert_eq!(small, vec![BaseInstr::new(Mnemonic::Addiu, &["$t0", "$zero", "-5"])]);

        let unsigned = expand(Pseudo::Li, &ops(&["$t0", "0xFFFF"]), &st, 0).unwrap();
        assert_eq!(unsigned, vec![BaseInstr::new(Mnemonic::Ori, &["$t0", "$zero", "65535"])]);

        let split = expand(Pseudo::Li, &ops(&["$t0", "65537"]), &st, 0).unwrap();
        assert_eq!(
            split,
            vec![
                BaseInstr::new(Mnemonic::Lui, &["$at", "1"]),
                BaseInstr::new(Mnemonic::Ori, &["$t0", "$at", "1"]),
            ]
        );

        let upper_only = expand(Pseudo::Li, &ops(&["$t0", "0x10000"]), &st, 0).unwrap();
        assert_eq!(upper_only, vec![BaseInstr::new(Mnemonic::Lui, &["$t0", "1"])]);
    }

    #[test]
    fn li_negative_wide_value() {
        let st = SymbolTable::default();
        let out = expand(Pseudo::Li, &ops(&["$t1", "-70000"]), &st, 0).unwrap();
        // -70000 = 0xfffeee90
        assert_eq!(
            out,
            vec![
                BaseInstr::new(Mnemonic::Lui, &["$at", "65534"]),
                BaseInstr::new(Mnemonic::Ori, &["$t1", "$at", "61072"]),
            ]
        );
        assert_eq!(
            expand(Pseudo::Li, &ops(&["$t1", "0x1_0000_0000"]), &st, 0),
            Err(ExpandError::InvalidImmediate("0x1_0000_0000".into()))
        );
        assert_eq!(
            expand(Pseudo::Li, &ops(&["$t1", "0x100000000"]), &st, 0),
            Err(ExpandError::ImmediateRange("0x100000000".into()))
        );
    }

    #[test]
    fn la_requires_known_label() {
        let mut st = SymbolTable::default();
        assert_eq!(
            expand(Pseudo::La, &ops(&["$a0", "msg"]), &st, 0),
            Err(ExpandError::UndefinedLabel("msg".into()))
        );
        st.define("msg", 0x1001_0004).unwrap();
        let out = expand(Pseudo::La, &ops(&["$a0", "msg"]), &st, 0).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(Pseudo::La.size_hint(&ops(&["$a0", "msg"]), &st), 8);
    }

    #[test]
    fn branch_pseudos_swap_and_invert() {
        let st = SymbolTable::default();
        let bgt = expand(Pseudo::Bgt, &ops(&["$t0", "$t1", "L"]), &st, 0).unwrap();
        assert_eq!(bgt[0], BaseInstr::new(Mnemonic::Slt, &["$at", "$t1", "$t0"]));
        assert_eq!(bgt[1], BaseInstr::new(Mnemonic::Bne, &["$at", "$zero", "L"]));
        let bge = expand(Pseudo::Bge, &ops(&["$t0", "$t1", "L"]), &st, 0).unwrap();
        assert_eq!(bge[0], BaseInstr::new(Mnemonic::Slt, &["$at", "$t0", "$t1"]));
        assert_eq!(bge[1].op, Mnemonic::Beq);
    }

    #[test]
    fn arity_is_checked() {
        let st = SymbolTable::default();
        assert_eq!(
            expand(Pseudo::Move, &ops(&["$t0"]), &st, 0),
            Err(ExpandError::OperandCount { name: "move", expected: 2, got: 1 })
        );
    }
}
