pub mod asm;
pub mod config;
pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod exec;
pub mod hex;
pub mod instructions;
pub mod memory;
pub mod pseudo;
pub mod registers;
pub mod sim;
pub mod syscall;

pub mod isa {
    pub mod mips32; // MIPS I integer subset, rows in crate::instructions
}

pub use asm::{assemble, Assembler, Assembly, Diagnostic, SymbolTable};
pub use config::{AsmConfig, SimConfig};
pub use cpu::{Cpu, Trap};
pub use disasm::{disassemble_one, Disassembler, Disassembly};
pub use memory::{Bus, SparseMemory};
pub use sim::{LoadError, SimState, Simulator, Snapshot};
