//! `.data` directives: sizing for the layout pass, bytes for the emit pass.

use num_traits::ToPrimitive;

use super::parser::{parse_int, unescape, Directive, SyntaxError};

/// Largest accepted `.align` exponent.
pub const MAX_ALIGN_SHIFT: i64 = 14;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("Invalid value for {directive}: '{value}'")]
    InvalidValue { directive: &'static str, value: String },
    #[error("Value '{value}' out of range for {directive}")]
    ValueRange { directive: &'static str, value: String },
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

fn element_width(d: Directive) -> Option<u32> {
    match d {
        Directive::Word => Some(4),
        Directive::Half => Some(2),
        Directive::Byte => Some(1),
        _ => None,
    }
}

fn single_arg<'a>(d: Directive, args: &'a [String], expected: &'static str) -> Result<&'a str, SyntaxError> {
    match args {
        [one] => Ok(one.as_str()),
        _ => Err(SyntaxError::ArgCount {
            directive: d.name(),
            expected,
        }),
    }
}

fn space_size(args: &[String]) -> Result<u32, SyntaxError> {
    let arg = single_arg(Directive::Space, args, "one argument")?;
    parse_int(arg)
        .and_then(|n| n.to_u32())
        .ok_or_else(|| SyntaxError::InvalidSpace(arg.to_string()))
}

/// Padding needed to bring `address` to a `2^n` boundary.
fn align_padding(args: &[String], address: u32) -> Result<u32, SyntaxError> {
    let arg = single_arg(Directive::Align, args, "one argument")?;
    let shift = parse_int(arg)
        .filter(|n| (0..=MAX_ALIGN_SHIFT).contains(n))
        .ok_or_else(|| SyntaxError::InvalidAlign(arg.to_string()))?;
    let align = 1u32 << shift;
    Ok((align - address % align) % align)
}

fn string_bytes(d: Directive, args: &[String]) -> Result<Vec<u8>, SyntaxError> {
    let raw = single_arg(d, args, "one string argument")?;
    let mut bytes = unescape(raw)?;
    if d == Directive::Asciiz {
        bytes.push(0);
    }
    Ok(bytes)
}

/// Bytes a data directive occupies when placed at `address`.
/// Element values are checked later, when they are emitted.
pub fn directive_size(d: Directive, args: &[String], address: u32) -> Result<u32, SyntaxError> {
    if let Some(width) = element_width(d) {
        return Ok(width * args.len() as u32);
    }
    match d {
        Directive::Space => space_size(args),
        Directive::Align => align_padding(args, address),
        Directive::Ascii | Directive::Asciiz => Ok(string_bytes(d, args)?.len() as u32),
        _ => Ok(0),
    }
}

/// Append a data directive's bytes. `base` is the segment's load address so
/// that `.align` pads against real addresses.
pub fn emit(d: Directive, args: &[String], out: &mut Vec<u8>, base: u32) -> Result<(), DataError> {
    if let Some(width) = element_width(d) {
        let bits = width * 8;
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << bits) - 1;
        for arg in args {
            let v = parse_int(arg).ok_or_else(|| DataError::InvalidValue {
                directive: d.name(),
                value: arg.clone(),
            })?;
            if !(min..=max).contains(&v) {
                return Err(DataError::ValueRange {
                    directive: d.name(),
                    value: arg.clone(),
                });
            }
            out.extend_from_slice(&(v as u32).to_le_bytes()[..width as usize]);
        }
        return Ok(());
    }
    match d {
        Directive::Space => {
            let n = space_size(args)?;
            out.resize(out.len() + n as usize, 0);
        }
        Directive::Align => {
            let here = base.wrapping_add(out.len() as u32);
            let pad = align_padding(args, here)?;
            out.resize(out.len() + pad as usize, 0);
        }
        Directive::Ascii | Directive::Asciiz => out.extend(string_bytes(d, args)?),
        _ => {}
    }
    Ok(())
}
