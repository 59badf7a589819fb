use mips_rs::config::TEXT_BASE;
use mips_rs::{disassemble_one, Disassembler};
use pretty_assertions::assert_eq;

#[test]
fn register_and_immediate_forms() {
    let cases = [
        (0x2008_0064, "addi $t0, $zero, 100"),
        (0x012a_8020, "add $s0, $t1, $t2"),
        (0x2408_ffff, "addiu $t0, $zero, -1"),
        (0x2d08_ffff, "sltiu $t0, $t0, 65535"),
        (0x3c01_1001, "lui $at, 0x1001"),
        (0x3424_0004, "ori $a0, $at, 0x4"),
        (0x8fa8_0008, "lw $t0, 8($sp)"),
        (0xafbf_0000, "sw $ra, 0($sp)"),
        (0x0320_f809, "jalr $t9"),
        (0x0320_8009, "jalr $s0, $t9"),
        (0x03e0_0008, "jr $ra"),
        (0x0000_000c, "syscall"),
        (0x0000_0000, "nop"),
    ];
    for (word, text) in cases {
        assert_eq!(disassemble_one(word, TEXT_BASE), text, "word {word:#010x}");
    }
}

#[test]
fn targets_are_absolute() {
    assert_eq!(disassemble_one(0x0c10_0004, TEXT_BASE), "jal 0x00400010");
    assert_eq!(disassemble_one(0x1109_0002, TEXT_BASE), "beq $t0, $t1, 0x0040000c");
    assert_eq!(disassemble_one(0x0501_ffff, TEXT_BASE), "bgez $t0, 0x00400000");
    // backward branch from the third word
    assert_eq!(disassemble_one(0x1500_fffd, TEXT_BASE + 8), "bne $t0, $zero, 0x00400000");
}

#[test]
fn hex_driver_skips_blanks_and_reports_bad_words() {
    let lines = ["20080064", "", "0xZZ", "  0x08100000  "];
    let out = Disassembler::default().disassemble_hex(&lines);
    assert_eq!(
        out.text,
        "addi $t0, $zero, 100\nError line 3: invalid hex word '0xZZ'\nj 0x00400000"
    );
    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.errors[0].line, 3);
    assert_eq!(out.errors[0].message, "invalid hex word '0xZZ'");
}

#[test]
fn short_hex_is_zero_extended() {
    let out = Disassembler::default().disassemble_hex(&["c"]);
    assert_eq!(out.text, "syscall");
    assert!(out.errors.is_empty());
}

#[test]
fn words_track_pc_from_base() {
    let out = Disassembler::new(0x0000_1000).disassemble_words(&[0, 0x1000_fffe]);
    assert_eq!(out.text, "nop\nbeq $zero, $zero, 0x00001000");
}
