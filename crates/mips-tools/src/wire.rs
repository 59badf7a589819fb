use serde::{Deserialize, Serialize};

use mips_rs::hex;
use mips_rs::{Assembly, Diagnostic, Disassembly, Simulator, Snapshot};

/// One machine word in the three renderings callers ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordView {
    pub hex: String,
    pub bin: String,
    pub dec: u32,
}

impl From<u32> for WordView {
    fn from(w: u32) -> Self {
        Self {
            hex: hex::word_hex(w),
            bin: format!("{w:032b}"),
            dec: w,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembleReport {
    pub machine_code: Vec<WordView>,
    pub data_segment: String,
    pub errors: Vec<Diagnostic>,
}

impl From<&Assembly> for AssembleReport {
    fn from(a: &Assembly) -> Self {
        Self {
            machine_code: a.words.iter().copied().map(WordView::from).collect(),
            data_segment: hex::encode_bytes(&a.data),
            errors: a.errors.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisassembleReport {
    pub assembly_code: String,
    pub errors: Vec<Diagnostic>,
}

impl From<Disassembly> for DisassembleReport {
    fn from(d: Disassembly) -> Self {
        Self {
            assembly_code: d.text,
            errors: d.errors,
        }
    }
}

/// Input of a simulator load: hex words plus the data segment as hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub machine_code: Vec<String>,
    #[serde(default)]
    pub data_segment: String,
}

impl LoadRequest {
    /// Load into `sim` (always from a clean state). A failed load still
    /// yields a snapshot, in the `error` state.
    pub fn apply(&self, sim: &mut Simulator) -> Snapshot {
        if let Err(e) = sim.load_program_hex(&self.machine_code, &self.data_segment) {
            tracing::warn!(error = %e, "load rejected");
        }
        sim.snapshot()
    }
}
