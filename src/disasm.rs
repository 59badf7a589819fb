use serde::Serialize;
use tracing::debug;

use crate::asm::{Diagnostic, Diagnostics};
use crate::config::TEXT_BASE;
use crate::decoder::{Decoded, Decoder, Fields};
use crate::hex;
use crate::instructions::Mnemonic;
use crate::isa::mips32::Mips32Decoder;
use crate::registers::name as reg;

pub fn fmt_decoded(d: &Decoded, pc: u32) -> String {
    use Mnemonic::*;
    let f = &d.f;
    let mn = d.op.as_str();
    match d.op {
        _ if d.raw == 0 => "nop".to_string(),
        Syscall | Break => mn.to_string(),
        Add | Addu | Sub | Subu | And | Or | Xor | Nor | Slt | Sltu => {
            format!("{mn} {}, {}, {}", reg(f.rd), reg(f.rs), reg(f.rt))
        }
        // shift amount register last, as the assembler takes it
        Sllv | Srlv | Srav => format!("{mn} {}, {}, {}", reg(f.rd), reg(f.rt), reg(f.rs)),
        Sll | Srl | Sra => format!("{mn} {}, {}, {}", reg(f.rd), reg(f.rt), f.shamt),
        Jr | Mthi | Mtlo => format!("{mn} {}", reg(f.rs)),
        Mfhi | Mflo => format!("{mn} {}", reg(f.rd)),
        Jalr if f.rd == 31 => format!("jalr {}", reg(f.rs)),
        Jalr => format!("jalr {}, {}", reg(f.rd), reg(f.rs)),
        Mult | Multu | Div | Divu => format!("{mn} {}, {}", reg(f.rs), reg(f.rt)),
        J | Jal => format!("{mn} 0x{:08x}", f.jump_target(pc)),
        Beq | Bne => format!("{mn} {}, {}, 0x{:08x}", reg(f.rs), reg(f.rt), f.branch_target(pc)),
        Blez | Bgtz | Bltz | Bgez | Bltzal | Bgezal => {
            format!("{mn} {}, 0x{:08x}", reg(f.rs), f.branch_target(pc))
        }
        Addi | Addiu | Slti => format!("{mn} {}, {}, {}", reg(f.rt), reg(f.rs), f.simm()),
        Sltiu => format!("{mn} {}, {}, {}", reg(f.rt), reg(f.rs), f.imm),
        Andi | Ori | Xori => format!("{mn} {}, {}, 0x{:x}", reg(f.rt), reg(f.rs), f.imm),
        Lui => format!("lui {}, 0x{:x}", reg(f.rt), f.imm),
        Lw | Lb | Lh | Lbu | Lhu | Sw | Sb | Sh => {
            format!("{mn} {}, {}({})", reg(f.rt), f.simm(), reg(f.rs))
        }
    }
}

/// Placeholder text for a word the table has no row for.
fn unknown(raw: u32) -> String {
    let f = Fields::split(raw);
    match f.opcode {
        0 => format!("Unknown R-type (funct=0x{:02x})", f.funct),
        1 => format!("Unknown REGIMM instruction (opcode=0x1, rt={})", f.rt),
        op => format!("Unknown Instruction (opcode=0x{op:02x})"),
    }
}

/// Render one word as it would sit at `pc`. Never fails: unknown encodings
/// come back as an "Unknown ..." line.
pub fn disassemble_one(word: u32, pc: u32) -> String {
    match Mips32Decoder.decode(word) {
        Some(d) => fmt_decoded(&d, pc),
        None => unknown(word),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Disassembly {
    pub text: String,
    pub errors: Vec<Diagnostic>,
}

/// Multi-word driver. Tracks its own pc (no symbol table), so branch and
/// jump targets always come out as absolute addresses.
#[derive(Debug, Clone)]
pub struct Disassembler {
    text_base: u32,
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new(TEXT_BASE)
    }
}

impl Disassembler {
    pub fn new(text_base: u32) -> Self {
        Self { text_base }
    }

    /// Hex input, one word per entry. Blank entries are skipped without
    /// advancing the pc.
    pub fn disassemble_hex<S: AsRef<str>>(&self, lines: &[S]) -> Disassembly {
        let mut out = Vec::new();
        let mut diags = Diagnostics::default();
        let mut pc = self.text_base;
        for (i, line) in lines.iter().enumerate() {
            let text = line.as_ref().trim();
            if text.is_empty() {
                continue;
            }
            match hex::parse_word(text) {
                Some(word) => {
                    out.push(disassemble_one(word, pc));
                    pc = pc.wrapping_add(4);
                }
                None => {
                    let message = format!("invalid hex word '{text}'");
                    out.push(format!("Error line {}: {message}", i + 1));
                    diags.push(i + 1, message, text);
                }
            }
        }
        debug!(lines = out.len(), errors = diags.len(), "disassembled");
        Disassembly {
            text: out.join("\n"),
            errors: diags.as_slice().to_vec(),
        }
    }

    pub fn disassemble_words(&self, words: &[u32]) -> Disassembly {
        let text = words
            .iter()
            .zip((0u32..).map(|i| self.text_base.wrapping_add(i * 4)))
            .map(|(w, pc)| disassemble_one(*w, pc))
            .collect::<Vec<_>>()
            .join("\n");
        Disassembly {
            text,
            errors: Vec::new(),
        }
    }
}
