//! Bytecode disassembler
//!
//! Converts an encoded program back into a textual listing, one
//! function-table entry or instruction per line. The walk is the
//! mechanical inverse of the encoder and serves as the golden-file
//! oracle for the binary format.

use crate::instr::Instr;
use crate::program::{Program, ProgramError};

/// Disassemble an encoded program into a textual listing
pub fn disassemble(data: &[u8]) -> Result<String, ProgramError> {
    let program = Program::decode(data)?;
    Ok(disassemble_program(&program))
}

/// Render an already decoded program as a textual listing
pub fn disassemble_program(program: &Program) -> String {
    let mut lines = Vec::with_capacity(program.functions.len() + program.instructions.len());
    for func in &program.functions {
        let mut parts = Vec::with_capacity(func.params.len() + 4);
        parts.push("FUNC".to_string());
        parts.push(func.name.clone());
        parts.push(func.params.len().to_string());
        parts.extend(func.params.iter().cloned());
        parts.push(func.address.to_string());
        lines.push(parts.join(" "));
    }
    for instr in &program.instructions {
        lines.push(disassemble_instr(instr));
    }
    lines.join("\n")
}

/// Render one instruction as a listing line
pub fn disassemble_instr(instr: &Instr) -> String {
    let mnemonic = instr.opcode().name();
    match instr {
        Instr::PushInt(value) => format!("{} {}", mnemonic, value),
        Instr::PushStr(value) => format!("{} {}", mnemonic, value),
        Instr::PushBool(value) => format!("{} {}", mnemonic, u8::from(*value)),
        Instr::BuildList(count) | Instr::BuildDict(count) | Instr::CallValue(count) => {
            format!("{} {}", mnemonic, count)
        }
        Instr::Load(name)
        | Instr::Store(name)
        | Instr::Call(name)
        | Instr::TailCall(name)
        | Instr::Attr(name)
        | Instr::StoreAttr(name) => format!("{} {}", mnemonic, name),
        Instr::CallBuiltin(name, argc) => format!("{} {} {}", mnemonic, name, argc),
        Instr::Jump(target) | Instr::JumpIfFalse(target) | Instr::SetupExcept(target) => {
            format!("{} {}", mnemonic, target)
        }
        Instr::Raise(kind) => format!("RAISE {}", kind.name()),
        _ => mnemonic.to_string(),
    }
}
