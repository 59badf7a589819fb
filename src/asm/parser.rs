use serde::Serialize;

/// Assembler directives understood by both passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Directive {
    Data,
    Text,
    Globl,
    Extern,
    Word,
    Half,
    Byte,
    Space,
    Ascii,
    Asciiz,
    Align,
}

impl Directive {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            ".data" => Directive::Data,
            ".text" => Directive::Text,
            ".globl" => Directive::Globl,
            ".extern" => Directive::Extern,
            ".word" => Directive::Word,
            ".half" => Directive::Half,
            ".byte" => Directive::Byte,
            ".space" => Directive::Space,
            ".ascii" => Directive::Ascii,
            ".asciiz" => Directive::Asciiz,
            ".align" => Directive::Align,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Directive::Data => ".data",
            Directive::Text => ".text",
            Directive::Globl => ".globl",
            Directive::Extern => ".extern",
            Directive::Word => ".word",
            Directive::Half => ".half",
            Directive::Byte => ".byte",
            Directive::Space => ".space",
            Directive::Ascii => ".ascii",
            Directive::Asciiz => ".asciiz",
            Directive::Align => ".align",
        }
    }

    /// Accepted in either segment; everything else belongs to `.data`.
    pub fn is_segment_neutral(self) -> bool {
        matches!(
            self,
            Directive::Data | Directive::Text | Directive::Globl | Directive::Extern
        )
    }

    fn takes_string(self) -> bool {
        matches!(self, Directive::Ascii | Directive::Asciiz)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LineKind {
    LabelOnly,
    Directive {
        directive: Directive,
        args: Vec<String>,
    },
    Instruction {
        mnemonic: String,
        /// memory operands already rewritten to `[rt, offset, base]`
        operands: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedLine {
    pub line: usize,
    pub text: String,
    pub label: Option<String>,
    pub kind: LineKind,
    /// assigned by pass 1
    pub address: u32,
}

/// Problems found while scanning (pass 1). Never fatal to the scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Unknown directive '{0}'")]
    UnknownDirective(String),
    #[error("Invalid string format for {directive}: {args}")]
    InvalidString { directive: &'static str, args: String },
    #[error("Non-ASCII character in string literal")]
    NonAsciiString,
    #[error("Invalid memory operand format: '{0}'. Expected 'offset($reg)' or '($reg)'.")]
    InvalidMemoryOperand(String),
    #[error("Duplicate label definition: {0}")]
    DuplicateLabel(String),
    #[error("Directive '{0}' only allowed in .data segment")]
    DirectiveOutsideData(&'static str),
    #[error("Instructions not allowed in .data segment")]
    InstructionInData,
    #[error("Invalid size for .space: {0}")]
    InvalidSpace(String),
    #[error("Invalid alignment value for .align: {0}")]
    InvalidAlign(String),
    #[error("{directive} expects {expected}")]
    ArgCount {
        directive: &'static str,
        expected: &'static str,
    },
}

const MEMORY_OPS: &[&str] = &["lw", "sw", "lb", "sb", "lh", "sh", "lbu", "lhu"];

/// Integer literal: optional sign, `0x`/`0o`/`0b` prefixes, plain
/// decimal without leading zeros.
pub fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let (neg, body) = match t.as_bytes().first()? {
        b'-' => (true, &t[1..]),
        b'+' => (false, &t[1..]),
        _ => (false, t),
    };
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d)
    } else {
        if lower.len() > 1 && lower.starts_with('0') && !lower.bytes().all(|b| b == b'0') {
            return None;
        }
        (10, lower.as_str())
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let v = i64::from_str_radix(digits, radix).ok()?;
    Some(if neg { -v } else { v })
}

/// Decode a string literal body. Recognised escapes: `\n \t \r \0 \\ \"`;
/// any other backslash is kept verbatim.
pub fn unescape(raw: &str) -> Result<Vec<u8>, SyntaxError> {
    if !raw.is_ascii() {
        return Err(SyntaxError::NonAsciiString);
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.bytes().peekable();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.peek().copied() {
            Some(b'n') => out.push(b'\n'),
            Some(b't') => out.push(b'\t'),
            Some(b'r') => out.push(b'\r'),
            Some(b'0') => out.push(0),
            Some(b'\\') => out.push(b'\\'),
            Some(b'"') => out.push(b'"'),
            _ => {
                out.push(b'\\');
                continue;
            }
        }
        bytes.next();
    }
    Ok(out)
}

/// Cut a trailing `#` comment, ignoring `#` inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut in_str = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_str => escaped = true,
            '"' => in_str = !in_str,
            '#' if !in_str => return &line[..i],
            _ => {}
        }
    }
    line
}

/// `name:` prefix, identifier rules `[A-Za-z_][A-Za-z0-9_]*`.
fn split_label(s: &str) -> (Option<&str>, &str) {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return (None, s),
    }
    let end = bytes
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
        .unwrap_or(bytes.len());
    if bytes.get(end) == Some(&b':') {
        (Some(&s[..end]), s[end + 1..].trim())
    } else {
        (None, s)
    }
}

/// Split `offset(reg)` / `(reg)` into `(offset, reg)`.
pub fn parse_memory_operand(s: &str) -> Option<(i64, String)> {
    let t = s.trim();
    let inner = t.strip_suffix(')')?;
    let open = inner.find('(')?;
    let reg = inner[open + 1..].trim();
    let body = reg.strip_prefix('$')?;
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let offset = inner[..open].trim();
    let offset = if offset.is_empty() { 0 } else { parse_int(offset)? };
    Some((offset, reg.to_string()))
}

fn split_operands(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse one source line. Blank and comment-only lines yield `None`.
/// Syntax problems are pushed to `errors`; a label on a broken line is
/// still returned so that later labels keep their addresses.
pub fn parse_line(text: &str, line: usize, errors: &mut Vec<SyntaxError>) -> Option<ParsedLine> {
    let body = strip_comment(text).trim();
    if body.is_empty() {
        return None;
    }
    let (label, rest) = split_label(body);
    let label = label.map(str::to_string);
    let make = |kind: LineKind| ParsedLine {
        line,
        text: text.to_string(),
        label: label.clone(),
        kind,
        address: 0,
    };
    let fail = |errors: &mut Vec<SyntaxError>, e: SyntaxError| {
        errors.push(e);
        label.as_ref().map(|_| make(LineKind::LabelOnly))
    };

    if rest.is_empty() {
        return Some(make(LineKind::LabelOnly));
    }

    let (head, tail) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim()),
        None => (rest, ""),
    };

    if head.starts_with('.') {
        let name = head.to_ascii_lowercase();
        let Some(directive) = Directive::from_name(&name) else {
            return fail(errors, SyntaxError::UnknownDirective(name));
        };
        let args = if directive.takes_string() {
            match (tail.find('"'), tail.rfind('"')) {
                (Some(first), Some(last)) if last > first => vec![tail[first + 1..last].to_string()],
                _ => {
                    return fail(
                        errors,
                        SyntaxError::InvalidString {
                            directive: directive.name(),
                            args: tail.to_string(),
                        },
                    )
                }
            }
        } else {
            split_operands(tail)
        };
        return Some(make(LineKind::Directive { directive, args }));
    }

    let mnemonic = head.to_ascii_lowercase();
    let mut operands = split_operands(tail);
    if MEMORY_OPS.contains(&mnemonic.as_str()) && operands.len() == 2 {
        match parse_memory_operand(&operands[1]) {
            Some((offset, base)) => {
                let rt = operands.swap_remove(0);
                operands = vec![rt, offset.to_string(), base];
            }
            None => return fail(errors, SyntaxError::InvalidMemoryOperand(operands[1].clone())),
        }
    }
    Some(make(LineKind::Instruction { mnemonic, operands }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> (Option<ParsedLine>, Vec<SyntaxError>) {
        let mut errs = Vec::new();
        let l = parse_line(text, 1, &mut errs);
        (l, errs)
    }

    #[test]
    fn ints() {
        assert_eq!(parse_int("100"), Some(100));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("010"), None);
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("12ab"), None);
        assert_eq!(parse_int("--1"), None);
    }

    #[test]
    fn label_with_instruction_and_comment() {
        let (l, errs) = parse("loop:  ADDI $t0, $t0, 1   # bump");
        assert!(errs.is_empty());
        let l = l.unwrap();
        assert_eq!(l.label.as_deref(), Some("loop"));
        assert_eq!(
            l.kind,
            LineKind::Instruction {
                mnemonic: "addi".into(),
                operands: vec!["$t0".into(), "$t0".into(), "1".into()],
            }
        );
    }

    #[test]
    fn memory_operand_is_normalised() {
        let (l, _) = parse("lw $t0, -4($sp)");
        assert_eq!(
            l.unwrap().kind,
            LineKind::Instruction {
                mnemonic: "lw".into(),
                operands: vec!["$t0".into(), "-4".into(), "$sp".into()],
            }
        );
        let (l, _) = parse("sb $t1, ($a0)");
        assert_eq!(
            l.unwrap().kind,
            LineKind::Instruction {
                mnemonic: "sb".into(),
                operands: vec!["$t1".into(), "0".into(), "$a0".into()],
            }
        );
        let (l, errs) = parse("lw $t0, 8");
        assert!(l.is_none());
        assert_eq!(errs, vec![SyntaxError::InvalidMemoryOperand("8".into())]);
    }

    #[test]
    fn strings_keep_hash_and_commas() {
        let (l, errs) = parse(r#"msg: .asciiz "a, b # c\n"  # real comment"#);
        assert!(errs.is_empty());
        let LineKind::Directive { directive, args } = l.unwrap().kind else {
            panic!("expected directive")
        };
        assert_eq!(directive, Directive::Asciiz);
        assert_eq!(args, vec![r"a, b # c\n".to_string()]);
        assert_eq!(unescape(&args[0]).unwrap(), b"a, b # c\n".to_vec());
    }

    #[test]
    fn unknown_directive_keeps_label() {
        let (l, errs) = parse("here: .bogus 1");
        assert_eq!(errs, vec![SyntaxError::UnknownDirective(".bogus".into())]);
        assert_eq!(l.unwrap().kind, LineKind::LabelOnly);
    }

    #[test]
    fn blank_and_comment_lines() {
        assert!(parse("   ").0.is_none());
        assert!(parse("  # only a comment").0.is_none());
    }
}
