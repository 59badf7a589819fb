//! Two-pass assembler.
//!
//! Pass 1 scans every line, lays out both segments and records labels.
//! Pass 2 first expands pseudo-instructions and emits `.data` bytes, then
//! encodes the expanded base instructions. Each pass stops the pipeline if
//! it produced any diagnostic.

pub mod data;
pub mod encode;
pub mod parser;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AsmConfig;
use crate::instructions::{self, Mnemonic};
use crate::pseudo::{self, Pseudo};
use encode::Encoder;
use parser::{Directive, LineKind, ParsedLine, SyntaxError};

/// Upper bound on layout re-walks after pass 1.
const MAX_LAYOUT_ROUNDS: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    labels: BTreeMap<String, u32>,
}

impl SymbolTable {
    pub fn get(&self, label: &str) -> Option<u32> {
        self.labels.get(label).copied()
    }

    pub fn define(&mut self, label: &str, address: u32) -> Result<(), SyntaxError> {
        if self.labels.contains_key(label) {
            return Err(SyntaxError::DuplicateLabel(label.to_string()));
        }
        self.labels.insert(label.to_string(), address);
        Ok(())
    }

    /// Move an existing label; true if its address changed.
    fn relocate(&mut self, label: &str, address: u32) -> bool {
        match self.labels.get_mut(label) {
            Some(a) if *a != address => {
                *a = address;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One reported problem. Line 0 is used for problems with no source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
    pub text: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Ordered, de-duplicated by (line, message).
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, line: usize, message: impl fmt::Display, text: &str) {
        let message = message.to_string();
        if self.0.iter().any(|d| d.line == line && d.message == message) {
            return;
        }
        debug!(line, %message, "diagnostic");
        self.0.push(Diagnostic {
            line,
            message,
            text: text.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }
}

/// A base instruction placed at its final address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expanded {
    pub op: Mnemonic,
    pub operands: Vec<String>,
    pub address: u32,
    pub line: usize,
    pub text: String,
}

/// Result of one assembly run. `words` is empty whenever pass 1 or the
/// expansion pass failed; after an encoding failure it holds the words
/// encoded before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assembly {
    pub words: Vec<u32>,
    pub data: Vec<u8>,
    pub errors: Vec<Diagnostic>,
}

impl Assembly {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Size in `.text` of one source instruction.
fn instruction_size(mnemonic: &str, operands: &[String], symbols: &SymbolTable) -> u32 {
    match Pseudo::from_name(mnemonic) {
        Some(p) => p.size_hint(operands, symbols),
        None => 4,
    }
}

#[derive(Debug, Default)]
pub struct Assembler {
    cfg: AsmConfig,
    symbols: SymbolTable,
    lines: Vec<ParsedLine>,
    data: Vec<u8>,
    code: Vec<u32>,
    diags: Diagnostics,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(cfg: AsmConfig) -> Self {
        Self {
            cfg,
            ..Self::default()
        }
    }

    /// Labels from the most recent run.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn assemble(&mut self, source: &str) -> Assembly {
        *self = Self::with_config(self.cfg);
        info!(lines = source.lines().count(), "assembling");

        self.first_pass(source);
        if !self.diags.is_empty() {
            warn!(errors = self.diags.len(), "pass 1 failed");
            return self.finish(false);
        }

        let expanded = self.expand_pass();
        if !self.diags.is_empty() {
            warn!(errors = self.diags.len(), "expansion failed");
            return self.finish(false);
        }

        self.encode_pass(&expanded);
        info!(
            words = self.code.len(),
            data_bytes = self.data.len(),
            errors = self.diags.len(),
            "assembled"
        );
        self.finish(true)
    }

    fn finish(&mut self, with_code: bool) -> Assembly {
        Assembly {
            words: if with_code { std::mem::take(&mut self.code) } else { Vec::new() },
            data: std::mem::take(&mut self.data),
            errors: self.diags.as_slice().to_vec(),
        }
    }

    fn first_pass(&mut self, source: &str) {
        for (i, text) in source.lines().enumerate() {
            let mut errors = Vec::new();
            if let Some(line) = parser::parse_line(text, i + 1, &mut errors) {
                self.lines.push(line);
            }
            for e in errors {
                self.diags.push(i + 1, e, text);
            }
        }

        self.layout(true);
        if !self.diags.is_empty() {
            return;
        }
        // Forward `la` targets were sized before their labels existed.
        for round in 0..MAX_LAYOUT_ROUNDS {
            if !self.layout(false) {
                debug!(rounds = round + 1, symbols = self.symbols.len(), "layout settled");
                return;
            }
        }
        self.diags.push(0, "Label layout did not converge", "");
    }

    /// Walk all lines assigning addresses. The first walk defines labels and
    /// reports placement errors; later walks only move labels and return
    /// whether any moved.
    fn layout(&mut self, first: bool) -> bool {
        let mut in_data = false;
        let mut addr = self.cfg.text_base;
        let mut moved = false;

        for line in self.lines.iter_mut() {
            line.address = addr;
            if let Some(label) = &line.label {
                if first {
                    match self.symbols.define(label, addr) {
                        Ok(()) => debug!(label = %label, address = format_args!("{addr:#010x}"), "label"),
                        Err(e) => self.diags.push(line.line, e, &line.text),
                    }
                } else {
                    moved |= self.symbols.relocate(label, addr);
                }
            }

            match &line.kind {
                LineKind::LabelOnly => {}
                LineKind::Directive { directive: Directive::Data, .. } => {
                    if !in_data {
                        in_data = true;
                        addr = self.cfg.data_base;
                    }
                }
                LineKind::Directive { directive: Directive::Text, .. } => {
                    if in_data {
                        in_data = false;
                        addr = self.cfg.text_base;
                    }
                }
                LineKind::Directive { directive, .. } if directive.is_segment_neutral() => {}
                LineKind::Directive { directive, args } => {
                    if !in_data {
                        if first {
                            self.diags.push(
                                line.line,
                                SyntaxError::DirectiveOutsideData(directive.name()),
                                &line.text,
                            );
                        }
                        continue;
                    }
                    match data::directive_size(*directive, args, addr) {
                        Ok(n) => addr = addr.wrapping_add(n),
                        Err(e) if first => self.diags.push(line.line, e, &line.text),
                        Err(_) => {}
                    }
                }
                LineKind::Instruction { mnemonic, operands } => {
                    if in_data {
                        if first {
                            self.diags.push(line.line, SyntaxError::InstructionInData, &line.text);
                        }
                        continue;
                    }
                    addr = addr.wrapping_add(instruction_size(mnemonic, operands, &self.symbols));
                }
            }
        }
        moved
    }

    fn expand_pass(&mut self) -> Vec<Expanded> {
        let mut out = Vec::new();
        let mut in_data = false;
        let mut addr = self.cfg.text_base;
        let data_base = self.cfg.data_base;

        for line in &self.lines {
            match &line.kind {
                LineKind::Directive { directive: Directive::Data, .. } => {
                    if !in_data {
                        in_data = true;
                        addr = data_base;
                    }
                }
                LineKind::Directive { directive: Directive::Text, .. } => {
                    if in_data {
                        in_data = false;
                        addr = self.cfg.text_base;
                    }
                }
                LineKind::Directive { directive, args } if in_data && !directive.is_segment_neutral() => {
                    let offset = line.address.wrapping_sub(data_base) as usize;
                    if offset > self.data.len() {
                        self.data.resize(offset, 0);
                    }
                    if let Err(e) = data::emit(*directive, args, &mut self.data, data_base) {
                        self.diags.push(line.line, e, &line.text);
                    }
                    addr = data_base.wrapping_add(self.data.len() as u32);
                }
                LineKind::Instruction { mnemonic, operands } if !in_data => {
                    // only meaningful while nothing upstream failed
                    if addr != line.address && self.diags.is_empty() {
                        self.diags.push(
                            0,
                            format!(
                                "Internal error: line {} laid out at {:#010x} but expanded at {:#010x}",
                                line.line, line.address, addr
                            ),
                            "",
                        );
                    }
                    let base = if let Some(p) = Pseudo::from_name(mnemonic) {
                        match pseudo::expand(p, operands, &self.symbols, addr) {
                            Ok(base) => base,
                            Err(e) => {
                                self.diags.push(line.line, e, &line.text);
                                Vec::new()
                            }
                        }
                    } else if let Some(desc) = instructions::lookup(mnemonic) {
                        vec![pseudo::BaseInstr {
                            op: desc.op,
                            operands: operands.clone(),
                        }]
                    } else {
                        self.diags
                            .push(line.line, format!("Unknown instruction: '{mnemonic}'"), &line.text);
                        Vec::new()
                    };
                    for b in base {
                        out.push(Expanded {
                            op: b.op,
                            operands: b.operands,
                            address: addr,
                            line: line.line,
                            text: line.text.clone(),
                        });
                        addr = addr.wrapping_add(4);
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Stops at the first failing instruction.
    fn encode_pass(&mut self, expanded: &[Expanded]) {
        let encoder = Encoder::new(&self.symbols);
        for ins in expanded {
            match encoder.encode(ins) {
                Ok(word) => {
                    debug!(
                        address = format_args!("{:#010x}", ins.address),
                        word = format_args!("{word:#010x}"),
                        op = %ins.op,
                        "encoded"
                    );
                    self.code.push(word);
                }
                Err(e) => {
                    self.diags.push(ins.line, e, &ins.text);
                    break;
                }
            }
        }
    }
}

/// Assemble with the default memory layout.
pub fn assemble(source: &str) -> Assembly {
    Assembler::new().assemble(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn diagnostics_dedupe_on_line_and_message() {
        let mut d = Diagnostics::default();
        d.push(3, "boom", "x");
        d.push(3, "boom", "y");
        d.push(4, "boom", "x");
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn forward_la_is_relaxed() {
        // `la` to a 64K-aligned label collapses to one word once the label
        // is known, which moves `after` back by four bytes.
        let src = "\
    la $t0, buf
after: j after
.data
buf: .word 1
";
        let mut asm = Assembler::new();
        let out = asm.assemble(src);
        assert_eq!(out.errors, vec![]);
        assert_eq!(asm.symbols().get("after"), Some(0x0040_0004));
        assert_eq!(out.words, vec![0x3c08_1001, 0x0810_0001]);
    }

    #[test]
    fn segment_switch_only_on_change() {
        let src = "\
.data
a: .byte 1
.data
b: .byte 2
";
        let mut asm = Assembler::new();
        let out = asm.assemble(src);
        assert!(out.is_ok());
        assert_eq!(asm.symbols().get("b"), Some(0x1001_0001));
        assert_eq!(out.data, vec![1, 2]);
    }

    #[test]
    fn assembler_is_reusable() {
        let mut asm = Assembler::new();
        assert!(!asm.assemble("x: nop\nx: nop").is_ok());
        let out = asm.assemble("x: nop");
        assert!(out.is_ok());
        assert_eq!(out.words, vec![0]);
    }
}
