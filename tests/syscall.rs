use mips_rs::{assemble, SimConfig, SimState, Simulator, Snapshot};
use pretty_assertions::assert_eq;

const TEXT: u32 = 0x0040_0000;

fn load(src: &str, cfg: SimConfig) -> Simulator {
    let a = assemble(src);
    assert!(a.errors.is_empty(), "{:?}", a.errors);
    let mut sim = Simulator::with_config(cfg);
    sim.load_program(&a.words, &a.data).unwrap();
    sim
}

fn run(src: &str) -> Snapshot {
    load(src, SimConfig::default()).run(10_000)
}

#[test]
fn read_int_waits_for_input() {
    let src = "
li $v0, 5
syscall
move $a0, $v0
li $v0, 1
syscall
";
    let mut sim = load(src, SimConfig::default());
    let s = sim.run(100);
    assert_eq!(s.state, SimState::InputWait);
    assert!(s.input_needed);
    assert_eq!(s.pc, TEXT + 4);

    // nothing changes until input arrives
    assert_eq!(sim.run(100).pc, TEXT + 4);

    sim.provide_input("21\n");
    let s = sim.step();
    assert_eq!(s.state, SimState::Paused);
    assert_eq!(s.registers[2], 21);
    assert_eq!(s.pc, TEXT + 8);

    let s = sim.run(100);
    assert_eq!(s.output, "21");
    assert_eq!(s.state, SimState::Finished);
}

#[test]
fn queued_input_is_consumed_line_by_line() {
    let src = "
li $v0, 5
syscall
move $t0, $v0
li $v0, 5
syscall
add $a0, $t0, $v0
li $v0, 1
syscall
";
    let mut sim = load(src, SimConfig::default());
    sim.provide_input("4\n38\n");
    let s = sim.run(100);
    assert_eq!(s.output, "42");
}

#[test]
fn bad_integer_input_is_an_error() {
    let mut sim = load("li $v0, 5\nsyscall\n", SimConfig::default());
    sim.provide_input("forty\n");
    let s = sim.run(10);
    assert_eq!(s.state, SimState::Error);
    assert_eq!(s.error.as_deref(), Some("Invalid input for read_int: 'forty'"));
}

#[test]
fn read_string_then_print_it() {
    let src = "
.data
buf: .space 8
.text
la $a0, buf
li $a1, 4
li $v0, 8
syscall
li $v0, 4
syscall
";
    let mut sim = load(src, SimConfig::default());
    sim.provide_input("hello\n");
    let s = sim.run(100);
    assert_eq!(s.state, SimState::Finished);
    assert_eq!(s.output, "hel");
}

#[test]
fn char_syscalls() {
    let src = "
li $v0, 12
syscall
move $a0, $v0
li $v0, 11
syscall
li $a0, 10
syscall
";
    let mut sim = load(src, SimConfig::default());
    sim.provide_input("Z");
    let s = sim.run(100);
    assert_eq!(s.output, "Z\n");
}

#[test]
fn step_output_holds_only_the_latest_print() {
    let src = "li $a0, 1\nli $v0, 1\nsyscall\nli $a0, 2\nsyscall\n";
    let mut sim = load(src, SimConfig::default());
    for _ in 0..3 {
        sim.step();
    }
    assert_eq!(sim.get_state().step_output, "1");
    let s = sim.step();
    assert_eq!(s.step_output, "");
    let s = sim.step();
    assert_eq!(s.step_output, "2");
    assert_eq!(s.output, "12");
}

#[test]
fn exit_with_code() {
    let s = run("li $a0, 3\nli $v0, 17\nsyscall\nli $v0, 1\nsyscall\n");
    assert_eq!(s.state, SimState::Finished);
    assert_eq!(s.exit_code, Some(3));
    assert_eq!(
        s.termination_reason.as_deref(),
        Some("Program exited via syscall 17 with code 3.")
    );
    assert_eq!(s.output, "");
}

#[test]
fn sbrk_grows_from_the_end_of_data() {
    let src = "
.data
.word 1, 2
.text
li $a0, 16
li $v0, 9
syscall
move $t0, $v0
li $v0, 9
syscall
";
    let s = run(src);
    assert_eq!(s.registers[8], 0x1001_0008);
    assert_eq!(s.registers[2], 0x1001_0018);
}

#[test]
fn unterminated_string_hits_the_cap() {
    let cfg = SimConfig {
        string_cap: 8,
        ..SimConfig::default()
    };
    let src = ".data\ns: .ascii \"abcdefghij\"\n.text\nla $a0, s\nli $v0, 4\nsyscall\n";
    let s = load(src, cfg).run(10);
    assert_eq!(s.state, SimState::Error);
    assert_eq!(
        s.error.as_deref(),
        Some("Syscall print_string exceeded max length (8) or no null terminator found starting at 0x10010000")
    );
}

#[test]
fn non_ascii_string_is_an_error() {
    let src = ".data\ns: .byte 200, 0\n.text\nla $a0, s\nli $v0, 4\nsyscall\n";
    let s = run(src);
    assert_eq!(s.state, SimState::Error);
    assert_eq!(
        s.error.as_deref(),
        Some("Syscall print_string found non-ASCII data at address 0x10010000")
    );
}
