use mips_rs::{assemble, AsmConfig, Assembler};
use pretty_assertions::assert_eq;

fn words(src: &str) -> Vec<u32> {
    let a = assemble(src);
    assert!(a.errors.is_empty(), "unexpected errors: {:?}", a.errors);
    a.words
}

fn first_error(src: &str) -> (usize, String) {
    let a = assemble(src);
    let e = a.errors.first().expect("an error");
    (e.line, e.message.clone())
}

#[test]
fn base_instructions() {
    assert_eq!(words("addi $t0, $zero, 100"), vec![0x2008_0064]);
    assert_eq!(words("add $s0, $t1, $t2"), vec![0x012a_8020]);
    assert_eq!(words("lw $t0, 8($sp)"), vec![0x8fa8_0008]);
    assert_eq!(words("sw $ra, ($sp)"), vec![0xafbf_0000]);
    assert_eq!(words("jalr $t9"), vec![0x0320_f809]);
    assert_eq!(words("syscall"), vec![0x0000_000c]);
}

#[test]
fn numeric_register_names() {
    assert_eq!(words("add $16, $9, $10"), words("add $s0, $t1, $t2"));
    assert_eq!(words("addi $8, $0, 100"), vec![0x2008_0064]);
}

#[test]
fn pseudo_expansions() {
    assert_eq!(words("nop"), vec![0]);
    assert_eq!(words("li $t0, 65537"), vec![0x3c01_0001, 0x3428_0001]);
    assert_eq!(words("move $t0, $t1"), vec![0x0120_4020]);
    // slt $at, $t0, $t1 ; bne $at, $zero, L
    assert_eq!(words("L: blt $t0, $t1, L"), vec![0x0109_082a, 0x1420_fffe]);
}

#[test]
fn loop_with_forward_and_backward_labels() {
    let src = "\
loop: beq $t0, $t1, end
      addi $t0, $t0, 1
      j loop
end:  add $s0, $zero, $zero
";
    assert_eq!(
        words(src),
        vec![0x1109_0002, 0x2108_0001, 0x0810_0000, 0x0000_8020]
    );
}

#[test]
fn comments_and_blank_lines() {
    let src = "# header\n\n   addi $t0, $zero, 100   # trailing\n\t\n";
    assert_eq!(words(src), vec![0x2008_0064]);
}

#[test]
fn data_directives_and_la() {
    let src = r#"
.data
msg: .asciiz "hi"
     .align 2
val: .word -2
.text
     la $a0, val
"#;
    let a = assemble(src);
    assert!(a.is_ok(), "{:?}", a.errors);
    assert_eq!(a.data, vec![b'h', b'i', 0, 0, 0xfe, 0xff, 0xff, 0xff]);
    assert_eq!(a.words, vec![0x3c01_1001, 0x3424_0004]);
}

#[test]
fn hash_inside_string_is_data() {
    let a = assemble(".data\n.asciiz \"a#b\" # comment\n");
    assert!(a.is_ok(), "{:?}", a.errors);
    assert_eq!(a.data, b"a#b\0".to_vec());
}

#[test]
fn unaligned_half_is_laid_out_as_written() {
    let a = assemble(".data\n.byte 1\n.half 2\n");
    assert_eq!(a.data, vec![1, 2, 0]);
}

#[test]
fn duplicate_label_reports_second_definition() {
    let a = assemble("foo: nop\nfoo: nop\n");
    assert!(a.words.is_empty());
    assert_eq!(a.errors.len(), 1);
    assert_eq!(a.errors[0].line, 2);
    assert_eq!(a.errors[0].message, "Duplicate label definition: foo");
}

#[test]
fn placement_errors() {
    assert_eq!(
        first_error(".data\nadd $t0, $t0, $t0"),
        (2, "Instructions not allowed in .data segment".to_string())
    );
    assert_eq!(
        first_error(".word 5"),
        (1, "Directive '.word' only allowed in .data segment".to_string())
    );
    assert_eq!(first_error(".bogus 1"), (1, "Unknown directive '.bogus'".to_string()));
}

#[test]
fn unknown_instruction_and_labels() {
    assert_eq!(first_error("frob $t0"), (1, "Unknown instruction: 'frob'".to_string()));
    assert_eq!(first_error("j nowhere"), (1, "Undefined label: 'nowhere'".to_string()));

    let a = assemble("la $t0, nolabel\nnop\n");
    assert!(a.words.is_empty());
    assert_eq!(a.errors[0].message, "Undefined label: 'nolabel'");
}

#[test]
fn immediate_ranges() {
    assert_eq!(
        first_error("ori $t0, $t0, -1"),
        (
            1,
            "Immediate '-1' out of range for 16-bit unsigned value (0 to 65535)".to_string()
        )
    );
    assert_eq!(
        first_error("addi $t0, $t0, 32768"),
        (
            1,
            "Immediate '32768' out of range for 16-bit signed value (-32768 to 32767)".to_string()
        )
    );
    assert_eq!(
        first_error("add $t0, $t1"),
        (1, "Incorrect operand count for 'add'. Expected 3, got 2.".to_string())
    );
    assert_eq!(first_error("add $t0, $t1, $xx"), (1, "Invalid register name: '$xx'".to_string()));
}

#[test]
fn encoding_stops_at_first_failure() {
    let a = assemble("addi $t0, $zero, 1\naddi $t0, $zero, 99999\naddi $t0, $zero, 2\n");
    assert_eq!(a.words, vec![0x2008_0001]);
    assert_eq!(a.errors.len(), 1);
    assert_eq!(a.errors[0].line, 2);
}

#[test]
fn branch_reach_is_sixteen_bit_signed() {
    let fits = format!("beq $t0, $t1, far\n{}far: nop\n", "nop\n".repeat(32767));
    let a = assemble(&fits);
    assert!(a.is_ok(), "{:?}", a.errors.first());
    assert_eq!(a.words[0], 0x1109_7fff);

    let too_far = format!("beq $t0, $t1, far\n{}far: nop\n", "nop\n".repeat(32768));
    let a = assemble(&too_far);
    assert!(a.words.is_empty());
    assert_eq!(a.errors.len(), 1);
    assert_eq!(a.errors[0].line, 1);
    assert_eq!(
        a.errors[0].message,
        "Branch target 'far' (offset 32768) too far for 16-bit signed relative offset."
    );
}

#[test]
fn deterministic_and_reusable() {
    let src = ".data\nx: .word 1, 2\n.text\nmain: la $t0, x\nlw $t1, 4($t0)\nbne $t1, $zero, main\n";
    assert_eq!(assemble(src), assemble(src));

    let mut asm = Assembler::new();
    let first = asm.assemble(src);
    let again = asm.assemble(src);
    assert_eq!(first, again);
    assert_eq!(asm.symbols().get("x"), Some(0x1001_0000));
    assert_eq!(asm.symbols().get("main"), Some(0x0040_0000));
}

#[test]
fn custom_bases() {
    let mut asm = Assembler::with_config(AsmConfig {
        text_base: 0x0000_1000,
        data_base: 0x0000_8000,
    });
    let a = asm.assemble(".data\nv: .word 7\n.text\nla $t0, v\nj 0x1000\n");
    assert!(a.is_ok(), "{:?}", a.errors);
    assert_eq!(a.words, vec![0x3c01_0000, 0x3428_8000, 0x0800_0400]);
}
