use anyhow::Error;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::decoder::{Decoder, Fields};
use crate::exec::{Executor, Flow};
use crate::memory::Bus;
use crate::registers;
use crate::syscall::SysEnv;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    pub pc: u32,
    pub gpr: [u32; 32], // gpr[0] reads as zero, writes are dropped
    pub hi: u32,
    pub lo: u32,
}

/// Runtime faults. Every one of them ends the run in the `error` state.
#[derive(thiserror::Error, Debug)]
pub enum Trap {
    #[error("PC unaligned: 0x{0:08x}")]
    UnalignedPc(u32),
    #[error("PC attempted to execute from data/stack/invalid region: 0x{0:08x}")]
    NonCode(u32),
    #[error("Execution not implemented for {kind} instruction at PC 0x{pc:08x} (instr=0x{raw:08x}, {detail})")]
    Unimplemented {
        kind: &'static str,
        pc: u32,
        raw: u32,
        detail: String,
    },
    #[error("{mnemonic} target address unaligned: 0x{target:08x}")]
    UnalignedJump { mnemonic: &'static str, target: u32 },
    #[error("Unaligned memory {access} at 0x{addr:08x} for {size} bytes")]
    Unaligned {
        access: &'static str,
        addr: u32,
        size: u32,
    },
    #[error("Invalid access size {0}, expected 1, 2 or 4")]
    AccessSize(u32),
    #[error("Memory write error at 0x{addr:08x}: Value '{value}' out of range for {size} byte(s).")]
    ValueRange { addr: u32, value: i64, size: u32 },
    #[error("Memory access error at 0x{addr:08x}: {source}")]
    Bus {
        addr: u32,
        #[source]
        source: Error,
    },
    #[error("Arithmetic overflow in {mnemonic} at PC 0x{pc:08x}")]
    Overflow { mnemonic: &'static str, pc: u32 },
    #[error("break at PC 0x{pc:08x} (code={code})")]
    Break { pc: u32, code: u32 },
    #[error("Unimplemented syscall: {0}")]
    UnimplementedSyscall(u32),
    #[error("Syscall print_string exceeded max length ({cap}) or no null terminator found starting at 0x{addr:08x}")]
    UnterminatedString { addr: u32, cap: usize },
    #[error("Syscall print_string found non-ASCII data at address 0x{addr:08x}")]
    NonAscii { addr: u32 },
    #[error("Invalid input for {syscall}: '{input}'")]
    InvalidInput { syscall: &'static str, input: String },
    #[error("sbrk({0}) would move the program break outside the heap")]
    Sbrk(i32),
}

impl Trap {
    /// Fault for a word the decoder has no row for.
    pub fn unimplemented(pc: u32, raw: u32) -> Self {
        let f = Fields::split(raw);
        let (kind, detail) = match f.opcode {
            0 => ("R-Type", format!("funct=0x{:02x}", f.funct)),
            1 => ("REGIMM", format!("rt=0x{:02x}", f.rt)),
            op => ("I/J-Type", format!("opcode=0x{op:02x}")),
        };
        Trap::Unimplemented { kind, pc, raw, detail }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Cpu {
    pub fn new(reset_pc: u32) -> Self {
        Self {
            pc: reset_pc,
            gpr: [0; 32],
            hi: 0,
            lo: 0,
        }
    }

    #[inline]
    pub fn reg(&self, r: u8) -> u32 {
        self.gpr[usize::from(r & 0x1f)]
    }

    pub fn set_reg(&mut self, r: u8, val: u32) {
        let r = r & 0x1f;
        if r == registers::ZERO {
            return;
        }
        trace!(reg = registers::name(r), val = format_args!("{val:#010x}"), "write");
        self.gpr[usize::from(r)] = val;
    }

    /// Decode and execute one already-fetched word at `self.pc`. The pc only
    /// moves on [`Flow::Next`].
    pub fn execute<B: Bus, D: Decoder, X: Executor>(
        &mut self,
        raw: u32,
        bus: &mut B,
        env: &mut SysEnv,
        dec: &D,
        exec: &X,
    ) -> Result<Flow, Trap> {
        let pc = self.pc;
        let d = dec.decode(raw).ok_or_else(|| Trap::unimplemented(pc, raw))?;
        let flow = exec.exec(self, bus, env, &d);
        self.gpr[0] = 0;
        let flow = flow?;
        if let Flow::Next(next) = flow {
            self.pc = next;
        }
        Ok(flow)
    }
}
