/// Canonical ABI names, indexed by register number.
pub const NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", // 0..7
    "$t0", "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7", // 8..15
    "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", // 16..23
    "$t8", "$t9", "$k0", "$k1", "$gp", "$sp", "$fp", "$ra", // 24..31
];

pub const ZERO: u8 = 0;
pub const AT: u8 = 1;
pub const V0: u8 = 2;
pub const A0: u8 = 4;
pub const A1: u8 = 5;
pub const SP: u8 = 29;
pub const RA: u8 = 31;

/// Parse `$name` or `$N` (0..=31). Case-insensitive.
pub fn parse(s: &str) -> Option<u8> {
    let lower = s.trim().to_ascii_lowercase();
    let body = lower.strip_prefix('$')?;
    if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
        // "$08" is not an alias, only the plain decimal spelling is
        if body.len() > 1 && body.starts_with('0') {
            return None;
        }
        return body.parse::<u8>().ok().filter(|n| *n < 32);
    }
    NAMES
        .iter()
        .position(|n| *n == lower.as_str())
        .map(|i| i as u8)
}

pub fn name(reg: u8) -> &'static str {
    NAMES.get(reg as usize).copied().unwrap_or("$?")
}
