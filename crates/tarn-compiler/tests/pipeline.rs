//! End-to-end pipeline tests: parse → compile → encode → verify /
//! decode / disassemble.

use tarn_bytecode::{verify, Instr, Program};
use tarn_compiler::compile;
use tarn_parser::parse_source;

const SAMPLE: &str = r#"
proc fact(n, acc) {
    if n <= 1 {
        return acc
    }
    return fact(n - 1, acc * n)
}

proc greet(name) {
    return "hello " + name
}

alloc total := 0
alloc i := 0
loop i < 5 {
    if i == 3 {
        break
    }
    total := total + i
    i := i + 1
}

try {
    facts total == 3
} except (err) {
    emit err
}

emit fact(5, 1)
emit greet("tarn")
emit length([1, 2, 3])
"#;

fn compile_sample() -> Program {
    compile(&parse_source(SAMPLE).unwrap()).unwrap()
}

#[test]
fn compiler_output_passes_verification() {
    let bytes = compile_sample().encode();
    verify(&bytes).unwrap();
}

#[test]
fn round_trip_preserves_everything() {
    let program = compile_sample();
    let decoded = Program::decode(&program.encode()).unwrap();
    assert_eq!(decoded.version, program.version);
    assert_eq!(decoded.functions, program.functions);
    assert_eq!(decoded.instructions, program.instructions);
}

#[test]
fn disassembly_is_stable_across_reencode() {
    let program = compile_sample();
    let first = tarn_bytecode::disassemble_program(&program);
    let decoded = Program::decode(&program.encode()).unwrap();
    let second = tarn_bytecode::disassemble_program(&decoded);
    assert_eq!(first, second);
}

#[test]
fn corrupting_a_jump_target_fails_verification() {
    let mut program = compile_sample();
    let count = program.instructions.len() as u32;
    let slot = program
        .instructions
        .iter_mut()
        .find_map(|instr| match instr {
            Instr::Jump(target) | Instr::JumpIfFalse(target) => Some(target),
            _ => None,
        })
        .expect("sample contains a jump");
    *slot = count + 100;
    verify(&program.encode()).unwrap_err();
}

#[test]
fn corrupting_a_call_target_fails_verification() {
    let mut program = compile_sample();
    let name = program
        .instructions
        .iter_mut()
        .find_map(|instr| match instr {
            Instr::Call(name) | Instr::TailCall(name) => Some(name),
            _ => None,
        })
        .expect("sample contains a call");
    *name = "no_such_function".to_string();
    verify(&program.encode()).unwrap_err();
}

#[test]
fn output_always_starts_with_magic() {
    let bytes = compile_sample().encode();
    assert_eq!(&bytes[..4], b"TARN");
}

#[test]
fn compiling_twice_is_byte_identical() {
    assert_eq!(compile_sample().encode(), compile_sample().encode());
}

#[test]
fn recursion_in_tail_position_compiles_to_tcall() {
    let program = compile_sample();
    let fact = &program.functions[0];
    assert_eq!(fact.name, "fact");
    let body_end = program.functions[1].address as usize;
    let body = &program.instructions[fact.address as usize..body_end];
    assert!(body.contains(&Instr::TailCall("fact".to_string())));
    assert!(!body
        .iter()
        .any(|i| matches!(i, Instr::Call(name) if name == "fact")));
}
