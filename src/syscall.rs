//! Syscall services selected by `$v0`.

use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::cpu::{Cpu, Trap};
use crate::exec::Flow;
use crate::memory::Bus;
use crate::registers::{A0, A1, V0};

pub const PRINT_INT: u32 = 1;
pub const PRINT_STRING: u32 = 4;
pub const READ_INT: u32 = 5;
pub const READ_STRING: u32 = 8;
pub const SBRK: u32 = 9;
pub const EXIT: u32 = 10;
pub const PRINT_CHAR: u32 = 11;
pub const READ_CHAR: u32 = 12;
pub const EXIT2: u32 = 17;

/// Console and heap state the syscalls work against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SysEnv {
    /// everything printed since load
    pub output: String,
    /// what the latest step printed
    pub step_output: String,
    /// pending console input, consumed line by line
    pub input: String,
    pub input_needed: bool,
    pub program_break: u32,
    heap_start: u32,
    string_cap: usize,
}

impl SysEnv {
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            program_break: cfg.data_base,
            heap_start: cfg.data_base,
            string_cap: cfg.string_cap,
            ..Self::default()
        }
    }

    /// Heap starts where the loaded data ends.
    pub fn set_break(&mut self, brk: u32) {
        self.program_break = brk;
        self.heap_start = brk;
    }

    pub fn provide_input(&mut self, text: &str) {
        self.input.push_str(text);
        self.input_needed = false;
    }

    fn print(&mut self, s: &str) {
        self.output.push_str(s);
        self.step_output.push_str(s);
    }

    /// Next input line without its terminator. `None` when nothing is queued.
    fn take_line(&mut self) -> Option<String> {
        if self.input.is_empty() {
            return None;
        }
        let line = match self.input.find('\n') {
            Some(i) => {
                let rest = self.input.split_off(i + 1);
                std::mem::replace(&mut self.input, rest)
            }
            None => std::mem::take(&mut self.input),
        };
        Some(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn take_char(&mut self) -> Option<char> {
        let c = self.input.chars().next()?;
        self.input.drain(..c.len_utf8());
        Some(c)
    }

    fn wait(&mut self, name: &str) -> Flow {
        info!(syscall = name, "waiting for input");
        self.input_needed = true;
        Flow::WaitInput
    }
}

fn print_string<B: Bus>(bus: &mut B, env: &mut SysEnv, addr: u32) -> Result<(), Trap> {
    let mut bytes = Vec::new();
    loop {
        if bytes.len() >= env.string_cap {
            return Err(Trap::UnterminatedString {
                addr,
                cap: env.string_cap,
            });
        }
        let at = addr.wrapping_add(bytes.len() as u32);
        let b = bus.read_u8(at).map_err(|source| Trap::Bus { addr: at, source })?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    let text = String::from_utf8(bytes)
        .ok()
        .filter(|s| s.is_ascii())
        .ok_or(Trap::NonAscii { addr })?;
    info!(text = %text, "print_string");
    env.print(&text);
    Ok(())
}

/// `read_string`: at most `len - 1` bytes followed by a NUL.
fn read_string<B: Bus>(bus: &mut B, line: &str, addr: u32, len: u32) -> Result<(), Trap> {
    if len == 0 {
        return Ok(());
    }
    let keep = line.as_bytes().iter().take(len as usize - 1);
    for (i, b) in keep.chain(std::iter::once(&0u8)).enumerate() {
        let at = addr.wrapping_add(i as u32);
        bus.write_u8(at, *b).map_err(|source| Trap::Bus { addr: at, source })?;
    }
    Ok(())
}

pub fn dispatch<B: Bus>(cpu: &mut Cpu, bus: &mut B, env: &mut SysEnv) -> Result<Flow, Trap> {
    let code = cpu.reg(V0);
    let a0 = cpu.reg(A0);
    let next = Flow::Next(cpu.pc.wrapping_add(4));
    debug!(code, "syscall");

    match code {
        PRINT_INT => {
            let s = (a0 as i32).to_string();
            info!(value = %s, "print_int");
            env.print(&s);
        }
        PRINT_STRING => print_string(bus, env, a0)?,
        READ_INT => {
            let Some(line) = env.take_line() else {
                return Ok(env.wait("read_int"));
            };
            let v: i32 = line.trim().parse().map_err(|_| Trap::InvalidInput {
                syscall: "read_int",
                input: line.clone(),
            })?;
            cpu.set_reg(V0, v as u32);
        }
        READ_STRING => {
            let Some(line) = env.take_line() else {
                return Ok(env.wait("read_string"));
            };
            read_string(bus, &line, a0, cpu.reg(A1))?;
        }
        SBRK => {
            let n = a0 as i32;
            let old = env.program_break;
            let new = i64::from(old) + i64::from(n);
            if new < i64::from(env.heap_start) || new > i64::from(u32::MAX) {
                return Err(Trap::Sbrk(n));
            }
            env.program_break = new as u32;
            cpu.set_reg(V0, old);
            debug!(old = format_args!("{old:#010x}"), new = format_args!("{new:#010x}"), "sbrk");
        }
        EXIT => {
            return Ok(Flow::Exit {
                code: 0,
                reason: "Program exited via syscall 10.".to_string(),
            })
        }
        PRINT_CHAR => {
            let c = char::from(a0 as u8);
            env.print(c.encode_utf8(&mut [0; 4]));
        }
        READ_CHAR => {
            let Some(c) = env.take_char() else {
                return Ok(env.wait("read_char"));
            };
            cpu.set_reg(V0, c as u32);
        }
        EXIT2 => {
            let code = a0 as i32;
            return Ok(Flow::Exit {
                code,
                reason: format!("Program exited via syscall 17 with code {code}."),
            });
        }
        other => {
            warn!(code = other, "unimplemented syscall");
            return Err(Trap::UnimplementedSyscall(other));
        }
    }
    Ok(next)
}
