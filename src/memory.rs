use std::collections::HashMap;

use anyhow::{anyhow, Result};
use tracing::trace;

pub trait Bus {
    fn read_u8(&mut self, addr: u32) -> Result<u8>;
    fn read_u16(&mut self, addr: u32) -> Result<u16>;
    fn read_u32(&mut self, addr: u32) -> Result<u32>;
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()>;
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<()>;
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<()>;
}

/// Byte-addressed sparse memory. Unwritten bytes read as zero and take no
/// storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMemory {
    bytes: HashMap<u32, u8>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Number of bytes ever written.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Side-effect free read, for views and diagnostics.
    pub fn peek(&self, addr: u32) -> u8 {
        self.bytes.get(&addr).copied().unwrap_or(0)
    }

    pub fn peek_u32(&self, addr: u32) -> u32 {
        u32::from_le_bytes([
            self.peek(addr),
            self.peek(addr.wrapping_add(1)),
            self.peek(addr.wrapping_add(2)),
            self.peek(addr.wrapping_add(3)),
        ])
    }

    pub fn load(&mut self, base: u32, data: &[u8]) -> Result<()> {
        for (i, b) in data.iter().enumerate() {
            let addr = offset(base, i)?;
            self.bytes.insert(addr, *b);
        }
        Ok(())
    }

    fn read_n<const N: usize>(&self, addr: u32) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        for (i, slot) in out.iter_mut().enumerate() {
            let a = offset(addr, i)?;
            *slot = match self.bytes.get(&a) {
                Some(b) => *b,
                None => {
                    trace!(addr = format_args!("{a:#010x}"), "uninitialized read");
                    0
                }
            };
        }
        Ok(out)
    }

    fn write_n(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        // all or nothing
        offset(addr, bytes.len().saturating_sub(1))?;
        for (i, b) in bytes.iter().enumerate() {
            let a = offset(addr, i)?;
            self.bytes.insert(a, *b);
        }
        Ok(())
    }
}

fn offset(addr: u32, i: usize) -> Result<u32> {
    u32::try_from(i)
        .ok()
        .and_then(|i| addr.checked_add(i))
        .ok_or_else(|| anyhow!("address {addr:#010x}+{i} is outside the 32-bit space"))
}

impl Bus for SparseMemory {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        Ok(self.read_n::<1>(addr)?[0])
    }
    fn read_u16(&mut self, addr: u32) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_n(addr)?))
    }
    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_n(addr)?))
    }
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()> {
        self.write_n(addr, &[val])
    }
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<()> {
        self.write_n(addr, &val.to_le_bytes())
    }
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<()> {
        self.write_n(addr, &val.to_le_bytes())
    }
}
