use crate::decoder::{Decoded, Decoder, Fields};
use crate::instructions;

/// Table-driven decoder for the MIPS I integer subset in
/// [`crate::instructions::TABLE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Mips32Decoder;

impl Mips32Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for Mips32Decoder {
    fn decode(&self, raw: u32) -> Option<Decoded> {
        let f = Fields::split(raw);
        let desc = match f.opcode {
            0 => instructions::by_funct(f.funct)?,
            // REGIMM picks its row by rt, others ignore it
            op => instructions::by_opcode(op, f.rt)?,
        };
        Some(Decoded { op: desc.op, raw, f })
    }
}
