//! Single-step simulator: owns the register file, memory and program, and
//! exposes load / step / reset / snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::SimConfig;
use crate::cpu::{Cpu, Trap};
use crate::exec::{self, Flow, IntExecutor};
use crate::hex;
use crate::isa::mips32::Mips32Decoder;
use crate::memory::{Bus, SparseMemory};
use crate::registers::SP;
use crate::syscall::SysEnv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimState {
    Idle,
    Loaded,
    Running,
    Paused,
    Finished,
    Error,
    InputWait,
}

impl SimState {
    pub fn can_step(self) -> bool {
        matches!(
            self,
            SimState::Loaded | SimState::Paused | SimState::Running | SimState::InputWait
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SimState::Idle => "idle",
            SimState::Loaded => "loaded",
            SimState::Running => "running",
            SimState::Paused => "paused",
            SimState::Finished => "finished",
            SimState::Error => "error",
            SimState::InputWait => "input_wait",
        }
    }
}

impl fmt::Display for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("Invalid machine code hex format during load: '{0}'")]
    CodeHex(String),
    #[error("Invalid data segment hex format during load: '{0}'")]
    DataHex(String),
    #[error("Program does not fit at the requested base: {0}")]
    Layout(#[from] anyhow::Error),
}

/// Everything a caller sees after an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub pc: u32,
    pub registers: [u32; 32],
    pub hi: u32,
    pub lo: u32,
    pub state: SimState,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub output: String,
    pub step_output: String,
    pub input_needed: bool,
    /// A bounded window over the data segment and the top of the stack.
    /// Not exhaustive.
    pub memory_view: BTreeMap<u32, i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulator {
    cfg: SimConfig,
    cpu: Cpu,
    mem: SparseMemory,
    program: Vec<u32>,
    index: HashMap<u32, usize>,
    text_base: u32,
    data_base: u32,
    env: SysEnv,
    state: SimState,
    error: Option<String>,
    exit_code: Option<i32>,
    reason: Option<String>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(cfg: SimConfig) -> Self {
        Self {
            cfg,
            cpu: Cpu::new(cfg.text_base),
            mem: SparseMemory::new(),
            program: Vec::new(),
            index: HashMap::new(),
            text_base: cfg.text_base,
            data_base: cfg.data_base,
            env: SysEnv::new(&cfg),
            state: SimState::Idle,
            error: None,
            exit_code: None,
            reason: None,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn output(&self) -> &str {
        &self.env.output
    }

    /// Back to a freshly constructed engine.
    pub fn reset(&mut self) {
        *self = Self::with_config(self.cfg);
        info!("simulator reset");
    }

    fn set_state(&mut self, state: SimState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "state");
        }
        self.state = state;
    }

    fn fail(&mut self, msg: String) {
        error!(pc = format_args!("{:#010x}", self.cpu.pc), "{msg}");
        self.error = Some(msg);
        self.set_state(SimState::Error);
    }

    fn finish(&mut self, code: i32, reason: String) {
        info!(code, reason = %reason, "finished");
        self.exit_code = Some(code);
        self.reason = Some(reason);
        self.set_state(SimState::Finished);
    }

    pub fn load_program(&mut self, code: &[u32], data: &[u8]) -> Result<(), LoadError> {
        let (text_base, data_base) = (self.cfg.text_base, self.cfg.data_base);
        self.load_program_at(code, data, text_base, data_base)
    }

    pub fn load_program_at(
        &mut self,
        code: &[u32],
        data: &[u8],
        text_base: u32,
        data_base: u32,
    ) -> Result<(), LoadError> {
        self.reset();
        let r = self.place(code, data, text_base, data_base);
        if let Err(e) = &r {
            self.fail(e.to_string());
        }
        r
    }

    /// Hex entry point: one word per entry (`0x` optional, blanks skipped)
    /// and the data segment as one even-length hex string.
    pub fn load_program_hex<S: AsRef<str>>(&mut self, code: &[S], data: &str) -> Result<(), LoadError> {
        self.reset();
        let parsed = code
            .iter()
            .map(|s| s.as_ref().trim())
            .filter(|s| !s.is_empty())
            .map(|s| hex::parse_word(s).ok_or_else(|| LoadError::CodeHex(s.to_string())))
            .collect::<Result<Vec<u32>, _>>()
            .and_then(|words| {
                let bytes = hex::decode_bytes(data).ok_or_else(|| LoadError::DataHex(data.trim().to_string()))?;
                Ok((words, bytes))
            });
        match parsed {
            Ok((words, bytes)) => self.load_program(&words, &bytes),
            Err(e) => {
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    fn place(&mut self, code: &[u32], data: &[u8], text_base: u32, data_base: u32) -> Result<(), LoadError> {
        self.text_base = text_base;
        self.data_base = data_base;
        self.cpu.pc = text_base;

        let mut addr = text_base;
        for (i, word) in code.iter().enumerate() {
            self.mem.write_u32(addr, *word)?;
            self.program.push(*word);
            self.index.insert(addr, i);
            addr = addr.wrapping_add(4);
        }
        self.mem.load(data_base, data)?;

        let brk = u32::try_from(data.len())
            .ok()
            .and_then(|n| data_base.checked_add(n))
            .ok_or_else(|| anyhow::anyhow!("data segment runs past the end of memory"))?;
        self.env.set_break(brk);
        self.cpu.gpr[usize::from(SP)] = self.cfg.stack_top;

        info!(
            words = code.len(),
            data_bytes = data.len(),
            text_base = format_args!("{text_base:#010x}"),
            data_base = format_args!("{data_base:#010x}"),
            "program loaded"
        );
        self.set_state(SimState::Loaded);
        Ok(())
    }

    /// Queue console input for the read syscalls.
    pub fn provide_input(&mut self, text: &str) {
        debug!(bytes = text.len(), "input provided");
        self.env.provide_input(text);
    }

    /// Execute one instruction. Outside a steppable state this only
    /// returns the current snapshot.
    pub fn step(&mut self) -> Snapshot {
        if !self.state.can_step() {
            warn!(state = %self.state, "cannot step");
            return self.snapshot();
        }
        self.env.step_output.clear();
        self.error = None;

        let pc = self.cpu.pc;
        if pc % 4 != 0 {
            self.fail(Trap::UnalignedPc(pc).to_string());
            return self.snapshot();
        }
        let Some(&i) = self.index.get(&pc) else {
            if pc >= self.data_base {
                self.fail(Trap::NonCode(pc).to_string());
            } else {
                self.finish(0, "Execution ran off the end of the program.".to_string());
            }
            return self.snapshot();
        };

        let raw = self.program[i];
        match self
            .cpu
            .execute(raw, &mut self.mem, &mut self.env, &Mips32Decoder, &IntExecutor)
        {
            Ok(Flow::Next(next)) => {
                debug!(pc = format_args!("{next:#010x}"), "stepped");
                self.set_state(SimState::Paused);
            }
            Ok(Flow::Exit { code, reason }) => self.finish(code, reason),
            Ok(Flow::WaitInput) => self.set_state(SimState::InputWait),
            Err(trap) => self.fail(trap.to_string()),
        }
        self.snapshot()
    }

    /// Step until the program stops, waits for input, or `max_steps` ran.
    pub fn run(&mut self, max_steps: usize) -> Snapshot {
        for _ in 0..max_steps {
            if !self.state.can_step() || (self.state == SimState::InputWait && self.env.input_needed) {
                break;
            }
            self.set_state(SimState::Running);
            self.step();
            if self.state != SimState::Paused {
                break;
            }
        }
        self.snapshot()
    }

    pub fn get_state(&self) -> Snapshot {
        self.snapshot()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pc: self.cpu.pc,
            registers: self.cpu.gpr,
            hi: self.cpu.hi,
            lo: self.cpu.lo,
            state: self.state,
            error: self.error.clone(),
            exit_code: self.exit_code,
            output: self.env.output.clone(),
            step_output: self.env.step_output.clone(),
            input_needed: self.env.input_needed,
            memory_view: self.memory_view(),
            termination_reason: match self.state {
                SimState::Finished => self.reason.clone(),
                _ => None,
            },
        }
    }

    /// Data segment from its base (up to 256 bytes, or 128 past the break)
    /// then the stack from `$sp - 128` to the top, together at most
    /// `memory_view_words` words.
    fn memory_view(&self) -> BTreeMap<u32, i32> {
        let max_words = self.cfg.memory_view_words as u64;
        let half = max_words / 2;
        let mut view = BTreeMap::new();

        let data_start = u64::from(self.data_base);
        let data_end = (data_start + 256)
            .min(u64::from(self.env.program_break) + 128)
            .min(data_start + half * 4);
        for addr in (data_start..data_end).step_by(4).take(half as usize) {
            let a = addr as u32;
            view.insert(a, self.mem.peek_u32(a) as i32);
        }

        let stack_top = u64::from(self.cfg.stack_top);
        let view_top = stack_top + 4;
        let sp = u64::from(self.cpu.reg(SP));
        let anchor = if sp > stack_top { stack_top } else { sp };
        let mut bottom = anchor.saturating_sub(128).min(view_top);
        if (view_top - bottom) / 4 > half {
            bottom = view_top.saturating_sub(half * 4);
        }
        bottom &= !3;
        let budget = max_words.saturating_sub(view.len() as u64) as usize;
        let mut added = 0;
        for addr in (bottom..view_top).step_by(4) {
            if added >= budget || addr > u64::from(u32::MAX) {
                break;
            }
            let a = addr as u32;
            if let std::collections::btree_map::Entry::Vacant(slot) = view.entry(a) {
                slot.insert(self.mem.peek_u32(a) as i32);
                added += 1;
            }
        }
        view
    }

    /// Signed read of 1, 2 or 4 bytes. Faults put the engine in `error`
    /// and read as 0.
    pub fn read_memory(&mut self, addr: u32, size: u32) -> i32 {
        match exec::read_sized(&mut self.mem, addr, size) {
            Ok(v) => exec::sign_extend(v, size),
            Err(trap) => {
                self.fail(trap.to_string());
                0
            }
        }
    }

    pub fn read_memory_unsigned(&mut self, addr: u32, size: u32) -> u32 {
        match exec::read_sized(&mut self.mem, addr, size) {
            Ok(v) => v,
            Err(trap) => {
                self.fail(trap.to_string());
                0
            }
        }
    }

    /// `value` must fit the signed range of `size` bytes; anything else is
    /// a fault rather than a silent truncation.
    pub fn write_memory(&mut self, addr: u32, value: i64, size: u32) -> bool {
        match exec::write_sized(&mut self.mem, addr, value, size) {
            Ok(()) => true,
            Err(trap) => {
                self.fail(trap.to_string());
                false
            }
        }
    }
}
