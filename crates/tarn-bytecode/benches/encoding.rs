use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tarn_bytecode::{Function, Instr, Program};

/// A program shaped like real compiler output: a counting loop in the
/// top-level code plus a handful of small function bodies.
fn sample_program(functions: usize) -> Program {
    let mut program = Program::new();
    program.instructions = vec![
        Instr::PushInt(0),
        Instr::Store("i".to_string()),
        Instr::Load("i".to_string()),
        Instr::PushInt(100),
        Instr::Lt,
        Instr::JumpIfFalse(11),
        Instr::Load("i".to_string()),
        Instr::PushInt(1),
        Instr::Add,
        Instr::Store("i".to_string()),
        Instr::Jump(2),
        Instr::Halt,
    ];
    for i in 0..functions {
        let address = program.instructions.len() as u32;
        program.functions.push(Function {
            name: format!("fn{}", i),
            params: vec!["a".to_string(), "b".to_string()],
            address,
        });
        program.instructions.extend([
            Instr::Load("a".to_string()),
            Instr::Load("b".to_string()),
            Instr::Add,
            Instr::Ret,
        ]);
    }
    program
}

fn bench_encode(c: &mut Criterion) {
    let program = sample_program(50);

    c.bench_function("encode_program", |b| {
        b.iter(|| black_box(&program).encode());
    });
}

fn bench_decode(c: &mut Criterion) {
    let bytes = sample_program(50).encode();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("decode_program", |b| {
        b.iter(|| Program::decode(black_box(&bytes)).unwrap());
    });
    group.finish();
}

fn bench_verify(c: &mut Criterion) {
    let bytes = sample_program(50).encode();

    let mut group = c.benchmark_group("verify");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("verify_program", |b| {
        b.iter(|| tarn_bytecode::verify(black_box(&bytes)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_verify);
criterion_main!(benches);
