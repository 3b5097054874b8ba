//! End-to-end execution tests: source through the compiler into the
//! VM, with the evaluator run on the same source as a cross-check.

use tarn_compiler::compile;
use tarn_parser::parse_source;
use tarn_runtime::{Interpreter, Vm};

fn run_vm(source: &str) -> String {
    let program = compile(&parse_source(source).expect("parse failed")).expect("compile failed");
    let mut vm = Vm::with_output(Vec::new());
    vm.run(&program, &[]).expect("vm run failed");
    String::from_utf8(vm.into_output()).unwrap()
}

fn run_eval(source: &str) -> String {
    let mut interp = Interpreter::with_output(Vec::new());
    interp.eval_source(source).expect("evaluation failed");
    String::from_utf8(interp.into_output()).unwrap()
}

/// Runs on both engines and requires identical output.
fn run_both(source: &str) -> String {
    let vm_out = run_vm(source);
    let eval_out = run_eval(source);
    assert_eq!(vm_out, eval_out, "VM and evaluator disagree");
    vm_out
}

#[test]
fn three_way_branch_executes_exactly_one_arm() {
    let template = "\
alloc n := {N}
if n < 0 {
  emit \"neg\"
} elif n == 0 {
  emit \"zero\"
} else {
  emit \"pos\"
}";
    for (n, expected) in [("0 - 7", "neg\n"), ("0", "zero\n"), ("7", "pos\n")] {
        let source = template.replace("{N}", n);
        assert_eq!(run_both(&source), expected);
    }
}

#[test]
fn loop_breaks_after_three_iterations() {
    let source = "\
alloc i := 0
loop true {
  i := i + 1
  emit i
  if i == 3 {
    break
  }
}
emit \"done\"";
    assert_eq!(run_both(source), "1\n2\n3\ndone\n");
}

#[test]
fn loop_condition_false_up_front_skips_the_body() {
    let source = "\
loop false {
  emit \"never\"
}
emit \"after\"";
    assert_eq!(run_both(source), "after\n");
}

#[test]
fn raising_try_body_runs_handler_exactly_once() {
    let source = "\
try {
  emit \"before\"
  emit 1 / 0
  emit \"unreached\"
} except (e) {
  emit \"caught\"
}
emit \"after\"";
    assert_eq!(run_both(source), "before\ncaught\nafter\n");
}

#[test]
fn non_raising_try_body_skips_the_handler() {
    let source = "\
try {
  emit \"body\"
} except (e) {
  emit \"handler\"
}";
    assert_eq!(run_both(source), "body\n");
}

#[test]
fn handler_sees_the_error_message() {
    let source = "\
try {
  panic(\"kaboom\")
} except (e) {
  emit e
}";
    assert_eq!(run_both(source), "RuntimeError: kaboom\n");
}

#[test]
fn functions_agree_across_engines() {
    let source = "\
proc fib(n) {
  if n < 2 {
    return n
  }
  return fib(n - 1) + fib(n - 2)
}
emit fib(15)";
    assert_eq!(run_both(source), "610\n");
}

#[test]
fn tail_recursive_countdown_runs_deep_in_the_vm() {
    // Deep enough that a frame per call would be a problem; TCALL
    // reuses the frame.
    let source = "\
proc count(n) {
  if n == 0 {
    return \"done\"
  }
  return count(n - 1)
}
emit count(200000)";
    assert_eq!(run_vm(source), "done\n");
}

#[test]
fn string_and_list_semantics_agree() {
    let source = "\
alloc s := \"val: \" + 42
emit s
alloc xs := [1, 2]
alloc ys := xs + [3]
emit xs
emit ys
emit xs[1:3]
emit length(xs)
emit s[0:3]";
    assert_eq!(
        run_both(source),
        "val: 42\n[1, 2, 3]\n[1, 2, 3]\n[2, 3]\n3\nval\n"
    );
}

#[test]
fn dict_attrs_and_freeze_agree() {
    let source = "\
alloc d := {}
d.name := \"tarn\"
d[\"n\"] := 1
emit d.name
emit d[\"n\"]
alloc f := freeze(d)
emit f.name
try {
  f.name := \"other\"
} except (e) {
  emit e
}";
    assert_eq!(
        run_both(source),
        "tarn\n1\ntarn\nFrozenWriteError: Imported modules are read-only\n"
    );
}

#[test]
fn short_circuit_agrees() {
    let source = "\
alloc hits := 0
proc touch() {
  hits := hits + 1
  return true
}
emit false and touch()
emit true or touch()
emit true and touch()
emit hits";
    assert_eq!(run_both(source), "false\ntrue\ntrue\n1\n");
}

#[test]
fn facts_failure_is_catchable() {
    let source = "\
try {
  facts 1 == 2
} except (e) {
  emit e
}";
    assert_eq!(run_both(source), "AssertionError: assertion failed\n");
}

#[test]
fn compiled_program_survives_an_encode_decode_round_trip() {
    let source = "\
proc greet(name) {
  return \"hello \" + name
}
emit greet(\"world\")";
    let program = compile(&parse_source(source).unwrap()).unwrap();
    let bytes = program.encode();
    let decoded = tarn_bytecode::Program::decode(&bytes).unwrap();

    let mut vm = Vm::with_output(Vec::new());
    vm.run(&decoded, &[]).unwrap();
    assert_eq!(
        String::from_utf8(vm.into_output()).unwrap(),
        "hello world\n"
    );
}

#[test]
fn file_builtins_work_from_compiled_code() {
    let dir = tempfile::tempdir().unwrap();
    let source = "\
alloc fd := file_open(\"out.txt\", \"w\")
file_write(fd, \"payload\")
file_close(fd)
emit file_exists(\"out.txt\")
emit read_file(\"out.txt\")";
    let program = compile(&parse_source(source).unwrap()).unwrap();

    // current_dir is seeded from the script path in args.
    let script = dir.path().join("script.tarnb").display().to_string();
    let mut vm = Vm::with_output(Vec::new());
    vm.run(&program, &[script]).unwrap();
    assert_eq!(
        String::from_utf8(vm.into_output()).unwrap(),
        "true\npayload\n"
    );
    assert!(dir.path().join("out.txt").exists());
}

#[test]
fn import_is_a_compile_error_but_works_interpreted() {
    let err = compile(&parse_source("import \"lib.tarn\" as lib").unwrap()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Module imports are resolved by the interpreter and cannot be compiled (line 1)"
    );

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.tarn"), ";;;tarn\nalloc two := 2\n").unwrap();
    let main = dir.path().join("main.tarn");
    std::fs::write(
        &main,
        ";;;tarn\nimport \"lib.tarn\" as lib\nemit lib.two\n",
    )
    .unwrap();

    let mut interp = Interpreter::with_output(Vec::new());
    interp.run_file(&main, &[]).unwrap();
    assert_eq!(String::from_utf8(interp.into_output()).unwrap(), "2\n");
}
