use serde::{Deserialize, Serialize};

pub const TEXT_BASE: u32 = 0x0040_0000;
pub const DATA_BASE: u32 = 0x1001_0000;
pub const STACK_TOP: u32 = 0x7fff_fffc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsmConfig {
    pub text_base: u32,
    pub data_base: u32,
}

impl Default for AsmConfig {
    fn default() -> Self {
        Self {
            text_base: TEXT_BASE,
            data_base: DATA_BASE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub text_base: u32,
    pub data_base: u32,
    pub stack_top: u32, // initial $sp
    /// print_string gives up after this many bytes without a terminator
    pub string_cap: usize,
    /// Upper bound on words in a snapshot's memory view
    pub memory_view_words: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            text_base: TEXT_BASE,
            data_base: DATA_BASE,
            stack_top: STACK_TOP,
            string_cap: 1024,
            memory_view_words: 256,
        }
    }
}
