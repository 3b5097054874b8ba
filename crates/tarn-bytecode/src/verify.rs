//! Bytecode verifier
//!
//! Independently decodes a binary container and proves it well-formed
//! without trusting the compiler that produced it. Two passes: a strict
//! decode of the header, function table, and instruction stream, then a
//! validation pass over the decoded program checking referential
//! integrity of entry addresses, jump targets, and call targets.

use crate::program::{Program, ProgramError};
use std::collections::HashSet;
use thiserror::Error;

/// Errors reported by the verifier
///
/// Every failure mode is a distinct variant; verification never
/// downgrades a problem to a warning.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The container failed to decode (bad magic, bad version,
    /// truncated field, unknown opcode, or trailing bytes)
    #[error(transparent)]
    Malformed(#[from] ProgramError),

    /// A function entry address is not a valid instruction index
    #[error(
        "function `{name}` entry address {address} is out of range (instruction count {count})"
    )]
    EntryOutOfRange {
        /// Function table entry name
        name: String,
        /// Out-of-range entry address
        address: u32,
        /// Number of decoded instructions
        count: usize,
    },

    /// A jump operand is not a valid instruction index
    #[error("{mnemonic} target {target} at instruction {index} is out of range (instruction count {count})")]
    JumpOutOfRange {
        /// Mnemonic of the offending instruction
        mnemonic: &'static str,
        /// Index of the offending instruction
        index: usize,
        /// Out-of-range target address
        target: u32,
        /// Number of decoded instructions
        count: usize,
    },

    /// A call names a function missing from the function table
    #[error("{mnemonic} to unknown function `{name}` at instruction {index}")]
    UnknownCallTarget {
        /// Mnemonic of the offending instruction
        mnemonic: &'static str,
        /// Index of the offending instruction
        index: usize,
        /// The unresolved function name
        name: String,
    },

    /// Two function table entries share a name
    #[error("duplicate function name `{0}` in function table")]
    DuplicateFunction(String),
}

/// Verify an encoded program
///
/// Returns Ok only if the buffer decodes cleanly end to end and every
/// structural check passes.
pub fn verify(data: &[u8]) -> Result<(), VerifyError> {
    let program = Program::decode(data)?;
    verify_program(&program)
}

/// Run the validation pass over an already decoded program
pub fn verify_program(program: &Program) -> Result<(), VerifyError> {
    let count = program.instructions.len();

    let mut names: HashSet<&str> = HashSet::with_capacity(program.functions.len());
    for func in &program.functions {
        if !names.insert(func.name.as_str()) {
            return Err(VerifyError::DuplicateFunction(func.name.clone()));
        }
        if func.address as usize >= count {
            return Err(VerifyError::EntryOutOfRange {
                name: func.name.clone(),
                address: func.address,
                count,
            });
        }
    }

    for (index, instr) in program.instructions.iter().enumerate() {
        if let Some(target) = instr.jump_target() {
            if target as usize >= count {
                return Err(VerifyError::JumpOutOfRange {
                    mnemonic: instr.opcode().name(),
                    index,
                    target,
                    count,
                });
            }
        }
        if let Some(name) = instr.call_target() {
            if !names.contains(name) {
                return Err(VerifyError::UnknownCallTarget {
                    mnemonic: instr.opcode().name(),
                    index,
                    name: name.to_string(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instr;
    use crate::program::{Function, VERSION};

    fn program_with_function() -> Program {
        Program {
            version: VERSION,
            functions: vec![Function {
                name: "ping".to_string(),
                params: vec!["n".to_string()],
                address: 4,
            }],
            instructions: vec![
                Instr::PushInt(1),
                Instr::Call("ping".to_string()),
                Instr::Pop,
                Instr::Halt,
                Instr::Load("n".to_string()),
                Instr::Ret,
            ],
        }
    }

    #[test]
    fn test_verify_valid_program() {
        let program = program_with_function();
        assert!(verify(&program.encode()).is_ok());
    }

    #[test]
    fn test_verify_empty_program() {
        assert!(verify(&Program::new().encode()).is_ok());
    }

    #[test]
    fn test_detect_entry_out_of_range() {
        let mut program = program_with_function();
        program.functions[0].address = 99;
        let err = verify_program(&program).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::EntryOutOfRange { address: 99, .. }
        ));
    }

    #[test]
    fn test_detect_dangling_jump() {
        let mut program = program_with_function();
        program.instructions[0] = Instr::Jump(1000);
        let err = verify_program(&program).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::JumpOutOfRange { target: 1000, .. }
        ));
    }

    #[test]
    fn test_detect_dangling_setup_except() {
        let mut program = program_with_function();
        program.instructions[0] = Instr::SetupExcept(77);
        let err = verify_program(&program).unwrap_err();
        assert!(matches!(err, VerifyError::JumpOutOfRange { target: 77, .. }));
    }

    #[test]
    fn test_detect_unknown_call_target() {
        let mut program = program_with_function();
        program.instructions[1] = Instr::Call("missing".to_string());
        let err = verify_program(&program).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownCallTarget { .. }));
    }

    #[test]
    fn test_detect_unknown_tail_call_target() {
        let mut program = program_with_function();
        program.instructions[5] = Instr::TailCall("missing".to_string());
        let err = verify_program(&program).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownCallTarget { .. }));
    }

    #[test]
    fn test_detect_duplicate_function_names() {
        let mut program = program_with_function();
        program.functions.push(Function {
            name: "ping".to_string(),
            params: Vec::new(),
            address: 5,
        });
        let err = verify_program(&program).unwrap_err();
        assert!(matches!(err, VerifyError::DuplicateFunction(name) if name == "ping"));
    }

    #[test]
    fn test_jump_target_must_be_strictly_in_range() {
        // Jump to an index equal to the instruction count dangles.
        let program = Program {
            version: VERSION,
            functions: Vec::new(),
            instructions: vec![Instr::Jump(1)],
        };
        assert!(verify_program(&program).is_err());
    }

    // Mutation tests over the encoded byte stream. The header is
    // magic (4) + version (4) + function count (4); with no functions
    // the instruction count follows at offset 12 and the first opcode
    // byte sits at offset 16.

    fn encoded_without_functions() -> Vec<u8> {
        let program = Program {
            version: VERSION,
            functions: Vec::new(),
            instructions: vec![Instr::Jump(1), Instr::Halt],
        };
        program.encode()
    }

    #[test]
    fn test_mutated_jump_operand_fails() {
        let mut bytes = encoded_without_functions();
        assert!(verify(&bytes).is_ok());
        // Jump operand is the u32 after the opcode byte at offset 16.
        bytes[17..21].copy_from_slice(&999u32.to_le_bytes());
        assert!(matches!(
            verify(&bytes),
            Err(VerifyError::JumpOutOfRange { target: 999, .. })
        ));
    }

    #[test]
    fn test_mutated_opcode_fails() {
        let mut bytes = encoded_without_functions();
        bytes[16] = 200;
        assert!(matches!(verify(&bytes), Err(VerifyError::Malformed(_))));
    }

    #[test]
    fn test_truncated_buffer_fails() {
        let bytes = encoded_without_functions();
        assert!(matches!(
            verify(&bytes[..bytes.len() - 1]),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_fail() {
        let mut bytes = encoded_without_functions();
        bytes.push(0xAA);
        assert!(matches!(verify(&bytes), Err(VerifyError::Malformed(_))));
    }

    #[test]
    fn test_bad_magic_fails() {
        let mut bytes = encoded_without_functions();
        bytes[3] = b'X';
        assert!(matches!(verify(&bytes), Err(VerifyError::Malformed(_))));
    }
}
