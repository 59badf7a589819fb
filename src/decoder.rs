use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::instructions::{InstrDesc, Mnemonic};

/// Raw bit fields of one instruction word, all formats at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    pub opcode: u8, // 31..26
    pub rs: u8,     // 25..21
    pub rt: u8,     // 20..16
    pub rd: u8,     // 15..11
    pub shamt: u8,  // 10..6
    pub funct: u8,  // 5..0
    pub imm: u16,   // 15..0
    pub target: u32, // 25..0
}

impl Fields {
    pub fn split(raw: u32) -> Self {
        let bits = raw.view_bits::<Lsb0>();
        Self {
            opcode: bits[26..32].load_le(),
            rs: bits[21..26].load_le(),
            rt: bits[16..21].load_le(),
            rd: bits[11..16].load_le(),
            shamt: bits[6..11].load_le(),
            funct: bits[0..6].load_le(),
            imm: bits[0..16].load_le(),
            target: bits[0..26].load_le(),
        }
    }

    /// Sign-extended 16-bit immediate.
    pub fn simm(&self) -> i32 {
        self.imm as i16 as i32
    }

    /// `pc + 4 + simm * 4`
    pub fn branch_target(&self, pc: u32) -> u32 {
        pc.wrapping_add(4).wrapping_add((self.simm() << 2) as u32)
    }

    /// Pseudo-absolute jump target, top four bits taken from `pc`.
    pub fn jump_target(&self, pc: u32) -> u32 {
        (self.target << 2) | (pc & 0xF000_0000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Mnemonic,
    pub raw: u32,
    pub f: Fields,
}

impl Decoded {
    pub fn desc(&self) -> &'static InstrDesc {
        self.op.desc()
    }
}

pub trait Decoder {
    fn decode(&self, raw: u32) -> Option<Decoded>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_match_shift_and_mask() {
        for raw in [0x0000_0000u32, 0x012a_8020, 0x2008_0064, 0xffff_ffff, 0x0c10_0004, 0x0501_fffd] {
            let f = Fields::split(raw);
            assert_eq!(f.opcode as u32, raw >> 26);
            assert_eq!(f.rs as u32, (raw >> 21) & 0x1f);
            assert_eq!(f.rt as u32, (raw >> 16) & 0x1f);
            assert_eq!(f.rd as u32, (raw >> 11) & 0x1f);
            assert_eq!(f.shamt as u32, (raw >> 6) & 0x1f);
            assert_eq!(f.funct as u32, raw & 0x3f);
            assert_eq!(f.imm as u32, raw & 0xffff);
            assert_eq!(f.target, raw & 0x03ff_ffff);
        }
    }

    #[test]
    fn targets() {
        let f = Fields::split(0x1109_fffe); // beq, offset -2
        assert_eq!(f.simm(), -2);
        assert_eq!(f.branch_target(0x0040_0008), 0x0040_0004);
        let j = Fields::split(0x0810_0000);
        assert_eq!(j.jump_target(0x0040_0010), 0x0040_0000);
        assert_eq!(j.jump_target(0x9000_0000), 0x9040_0000);
    }
}
