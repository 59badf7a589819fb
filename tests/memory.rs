use mips_rs::{Bus, SimState, Simulator, SparseMemory};
use pretty_assertions::assert_eq;

const DATA: u32 = 0x1001_0000;

#[test]
fn little_endian_layout() {
    let mut m = SparseMemory::new();
    m.write_u32(0x100, 0x1122_3344).unwrap();
    assert_eq!(m.read_u8(0x100).unwrap(), 0x44);
    assert_eq!(m.read_u8(0x103).unwrap(), 0x11);
    assert_eq!(m.read_u16(0x102).unwrap(), 0x1122);
    assert_eq!(m.len(), 4);
}

#[test]
fn unwritten_bytes_read_zero() {
    let mut m = SparseMemory::new();
    assert_eq!(m.read_u32(0xdead_beec).unwrap(), 0);
    assert!(m.is_empty());
}

#[test]
fn writes_past_the_address_space_fail_whole() {
    let mut m = SparseMemory::new();
    assert!(m.write_u32(0xffff_fffe, 0x0102_0304).is_err());
    assert!(m.is_empty());
    assert!(m.write_u8(0xffff_ffff, 1).is_ok());
}

#[test]
fn out_of_range_write_sets_error() {
    let mut sim = Simulator::new();
    sim.load_program(&[0], &[]).unwrap();
    assert!(!sim.write_memory(DATA, 200, 1));
    assert_eq!(sim.state(), SimState::Error);
    assert_eq!(
        sim.error(),
        Some("Memory write error at 0x10010000: Value '200' out of range for 1 byte(s).")
    );
    assert_eq!(sim.read_memory_unsigned(DATA, 1), 0);
}

#[test]
fn signed_and_unsigned_reads() {
    let mut sim = Simulator::new();
    assert!(sim.write_memory(DATA, -2, 2));
    assert_eq!(sim.read_memory(DATA, 2), -2);
    assert_eq!(sim.read_memory_unsigned(DATA, 2), 0xfffe);
    assert!(sim.write_memory(DATA + 4, -128, 1));
    assert_eq!(sim.read_memory(DATA + 4, 1), -128);
    assert!(sim.write_memory(DATA + 8, i64::from(i32::MIN), 4));
    assert_eq!(sim.read_memory_unsigned(DATA + 8, 4), 0x8000_0000);
}

#[test]
fn misaligned_access_sets_error() {
    let mut sim = Simulator::new();
    assert_eq!(sim.read_memory(DATA + 1, 2), 0);
    assert_eq!(sim.state(), SimState::Error);
    assert_eq!(
        sim.error(),
        Some("Unaligned memory read at 0x10010001 for 2 bytes")
    );

    let mut sim = Simulator::new();
    assert!(!sim.write_memory(DATA + 2, 1, 4));
    assert_eq!(sim.error(), Some("Unaligned memory write at 0x10010002 for 4 bytes"));
}

#[test]
fn bad_access_size() {
    let mut sim = Simulator::new();
    assert!(!sim.write_memory(DATA, 1, 3));
    assert_eq!(sim.state(), SimState::Error);
}
