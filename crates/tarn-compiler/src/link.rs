//! Function linker.
//!
//! Appends pending function bodies behind the top-level code and
//! rewrites their body-relative jump operands to absolute addresses.

use tarn_bytecode::{Function, Instr, Program};

/// A function body lowered into its own buffer, waiting for an entry
/// address.
pub struct PendingFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Instr>,
}

/// Links top-level code and pending bodies into one flat program.
///
/// Jump operands inside a body are relative to the body's own buffer;
/// adding the base offset makes them absolute. `SETUP_EXCEPT` operands
/// are addresses too and get the same rewrite.
pub fn link(top_level: Vec<Instr>, pending: Vec<PendingFunction>) -> Program {
    let mut program = Program::new();
    program.instructions = top_level;

    for func in pending {
        let base = program.instructions.len() as u32;
        program.functions.push(Function {
            name: func.name,
            params: func.params,
            address: base,
        });
        for instr in func.body {
            program.instructions.push(relocate(instr, base));
        }
    }
    program
}

fn relocate(instr: Instr, base: u32) -> Instr {
    match instr {
        Instr::Jump(target) => Instr::Jump(target + base),
        Instr::JumpIfFalse(target) => Instr::JumpIfFalse(target + base),
        Instr::SetupExcept(target) => Instr::SetupExcept(target + base),
        other => other,
    }
}
