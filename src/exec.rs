use num_traits::ToPrimitive;
use tracing::{debug, warn};

use crate::cpu::{Cpu, Trap};
use crate::decoder::Decoded;
use crate::instructions::Mnemonic;
use crate::memory::Bus;
use crate::registers::RA;
use crate::syscall::{self, SysEnv};

/// What the simulator does after an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Next(u32),
    /// Program is done; pc stays on the instruction that ended it.
    Exit { code: i32, reason: String },
    /// A read syscall found no input; pc stays so the syscall re-runs.
    WaitInput,
}

pub trait Executor {
    fn exec<B: Bus>(&self, cpu: &mut Cpu, bus: &mut B, env: &mut SysEnv, d: &Decoded) -> Result<Flow, Trap>;
}

fn check_size(size: u32) -> Result<(), Trap> {
    match size {
        1 | 2 | 4 => Ok(()),
        _ => Err(Trap::AccessSize(size)),
    }
}

fn check_align(access: &'static str, addr: u32, size: u32) -> Result<(), Trap> {
    if addr % size != 0 {
        warn!(access, addr = format_args!("{addr:#010x}"), size, "unaligned access");
        return Err(Trap::Unaligned { access, addr, size });
    }
    Ok(())
}

/// Zero-extended little-endian read of 1, 2 or 4 bytes.
pub fn read_sized<B: Bus>(bus: &mut B, addr: u32, size: u32) -> Result<u32, Trap> {
    check_size(size)?;
    check_align("read", addr, size)?;
    let v = match size {
        1 => bus.read_u8(addr).map(u32::from),
        2 => bus.read_u16(addr).map(u32::from),
        _ => bus.read_u32(addr),
    };
    v.map_err(|source| Trap::Bus { addr, source })
}

pub fn sign_extend(v: u32, size: u32) -> i32 {
    match size {
        1 => v as u8 as i8 as i32,
        2 => v as u16 as i16 as i32,
        _ => v as i32,
    }
}

/// Store `value`, which must fit the signed range of `size` bytes.
pub fn write_sized<B: Bus>(bus: &mut B, addr: u32, value: i64, size: u32) -> Result<(), Trap> {
    check_size(size)?;
    check_align("write", addr, size)?;
    let range = || Trap::ValueRange { addr, value, size };
    let r = match size {
        1 => bus.write_u8(addr, value.to_i8().ok_or_else(range)? as u8),
        2 => bus.write_u16(addr, value.to_i16().ok_or_else(range)? as u16),
        _ => bus.write_u32(addr, value.to_i32().ok_or_else(range)? as u32),
    };
    r.map_err(|source| Trap::Bus { addr, source })
}

/// Low `size` bytes of a register, read back as a signed value.
fn reg_as_signed(v: u32, size: u32) -> i64 {
    i64::from(sign_extend(v, size))
}

fn jump_reg(mnemonic: &'static str, target: u32) -> Result<u32, Trap> {
    if target % 4 != 0 {
        return Err(Trap::UnalignedJump { mnemonic, target });
    }
    Ok(target)
}

/// Integer executor for every row of the instruction table.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntExecutor;

impl Executor for IntExecutor {
    fn exec<B: Bus>(&self, cpu: &mut Cpu, bus: &mut B, env: &mut SysEnv, d: &Decoded) -> Result<Flow, Trap> {
        use Mnemonic::*;
        let f = d.f;
        let pc = cpu.pc;
        let next = pc.wrapping_add(4);
        let rs = cpu.reg(f.rs);
        let rt = cpu.reg(f.rt);
        let simm = f.simm();
        let ea = rs.wrapping_add(simm as u32);
        let overflow = || Trap::Overflow { mnemonic: d.op.as_str(), pc };
        let branch = |taken: bool| if taken { f.branch_target(pc) } else { next };

        debug!(pc = format_args!("{pc:#010x}"), raw = format_args!("{:#010x}", d.raw), op = %d.op, "exec");

        let target = match d.op {
            Add => {
                let v = (rs as i32).checked_add(rt as i32).ok_or_else(overflow)?;
                cpu.set_reg(f.rd, v as u32);
                next
            }
            Addu => {
                cpu.set_reg(f.rd, rs.wrapping_add(rt));
                next
            }
            Sub => {
                let v = (rs as i32).checked_sub(rt as i32).ok_or_else(overflow)?;
                cpu.set_reg(f.rd, v as u32);
                next
            }
            Subu => {
                cpu.set_reg(f.rd, rs.wrapping_sub(rt));
                next
            }
            And => {
                cpu.set_reg(f.rd, rs & rt);
                next
            }
            Or => {
                cpu.set_reg(f.rd, rs | rt);
                next
            }
            Xor => {
                cpu.set_reg(f.rd, rs ^ rt);
                next
            }
            Nor => {
                cpu.set_reg(f.rd, !(rs | rt));
                next
            }
            Slt => {
                cpu.set_reg(f.rd, u32::from((rs as i32) < (rt as i32)));
                next
            }
            Sltu => {
                cpu.set_reg(f.rd, u32::from(rs < rt));
                next
            }
            Sll => {
                // the all-zero word is nop and writes nothing
                if d.raw != 0 {
                    cpu.set_reg(f.rd, rt << f.shamt);
                }
                next
            }
            Srl => {
                cpu.set_reg(f.rd, rt >> f.shamt);
                next
            }
            Sra => {
                cpu.set_reg(f.rd, ((rt as i32) >> f.shamt) as u32);
                next
            }
            Sllv => {
                cpu.set_reg(f.rd, rt << (rs & 0x1f));
                next
            }
            Srlv => {
                cpu.set_reg(f.rd, rt >> (rs & 0x1f));
                next
            }
            Srav => {
                cpu.set_reg(f.rd, ((rt as i32) >> (rs & 0x1f)) as u32);
                next
            }
            Jr => jump_reg("Jump Register", rs)?,
            Jalr => {
                let target = jump_reg("Jump and Link Register", rs)?;
                let link = if f.rd == 0 { RA } else { f.rd };
                cpu.set_reg(link, pc.wrapping_add(8));
                target
            }
            Syscall => return syscall::dispatch(cpu, bus, env),
            Break => {
                return Err(Trap::Break {
                    pc,
                    code: (d.raw >> 6) & 0xF_FFFF,
                })
            }
            Mfhi => {
                cpu.set_reg(f.rd, cpu.hi);
                next
            }
            Mthi => {
                cpu.hi = rs;
                next
            }
            Mflo => {
                cpu.set_reg(f.rd, cpu.lo);
                next
            }
            Mtlo => {
                cpu.lo = rs;
                next
            }
            Mult => {
                let p = i64::from(rs as i32) * i64::from(rt as i32);
                cpu.hi = (p >> 32) as u32;
                cpu.lo = p as u32;
                next
            }
            Multu => {
                let p = u64::from(rs) * u64::from(rt);
                cpu.hi = (p >> 32) as u32;
                cpu.lo = p as u32;
                next
            }
            Div => {
                let (a, b) = (rs as i32, rt as i32);
                if b == 0 {
                    warn!(pc = format_args!("{pc:#010x}"), "div by zero, hi/lo unchanged");
                } else {
                    cpu.lo = a.wrapping_div(b) as u32;
                    cpu.hi = a.wrapping_rem(b) as u32;
                }
                next
            }
            Divu => {
                if rt == 0 {
                    warn!(pc = format_args!("{pc:#010x}"), "divu by zero, hi/lo unchanged");
                } else {
                    cpu.lo = rs / rt;
                    cpu.hi = rs % rt;
                }
                next
            }
            Addi => {
                let v = (rs as i32).checked_add(simm).ok_or_else(overflow)?;
                cpu.set_reg(f.rt, v as u32);
                next
            }
            Addiu => {
                cpu.set_reg(f.rt, rs.wrapping_add(simm as u32));
                next
            }
            Slti => {
                cpu.set_reg(f.rt, u32::from((rs as i32) < simm));
                next
            }
            Sltiu => {
                // sign-extended, then compared unsigned
                cpu.set_reg(f.rt, u32::from(rs < simm as u32));
                next
            }
            Andi => {
                cpu.set_reg(f.rt, rs & u32::from(f.imm));
                next
            }
            Ori => {
                cpu.set_reg(f.rt, rs | u32::from(f.imm));
                next
            }
            Xori => {
                cpu.set_reg(f.rt, rs ^ u32::from(f.imm));
                next
            }
            Lui => {
                cpu.set_reg(f.rt, u32::from(f.imm) << 16);
                next
            }
            Lw => {
                let v = read_sized(bus, ea, 4)?;
                cpu.set_reg(f.rt, v);
                next
            }
            Lh | Lb => {
                let size = if d.op == Lh { 2 } else { 1 };
                let v = read_sized(bus, ea, size)?;
                cpu.set_reg(f.rt, sign_extend(v, size) as u32);
                next
            }
            Lhu | Lbu => {
                let size = if d.op == Lhu { 2 } else { 1 };
                let v = read_sized(bus, ea, size)?;
                cpu.set_reg(f.rt, v);
                next
            }
            Sw | Sh | Sb => {
                let size = match d.op {
                    Sw => 4,
                    Sh => 2,
                    _ => 1,
                };
                write_sized(bus, ea, reg_as_signed(rt, size), size)?;
                next
            }
            Beq => branch(rs == rt),
            Bne => branch(rs != rt),
            Blez => branch((rs as i32) <= 0),
            Bgtz => branch((rs as i32) > 0),
            Bltz => branch((rs as i32) < 0),
            Bgez => branch((rs as i32) >= 0),
            Bltzal | Bgezal => {
                let taken = if d.op == Bltzal { (rs as i32) < 0 } else { (rs as i32) >= 0 };
                cpu.set_reg(RA, pc.wrapping_add(8));
                branch(taken)
            }
            J => f.jump_target(pc),
            Jal => {
                cpu.set_reg(RA, pc.wrapping_add(8));
                f.jump_target(pc)
            }
        };
        Ok(Flow::Next(target))
    }
}
