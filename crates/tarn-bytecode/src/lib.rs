//! Tarn VM Bytecode Definitions
//!
//! This crate provides the instruction set, the binary program
//! container, and the disassembler and verifier for Tarn bytecode.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod disasm;
pub mod encoder;
pub mod instr;
pub mod opcode;
pub mod program;
pub mod verify;

pub use disasm::{disassemble, disassemble_program};
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use instr::Instr;
pub use opcode::{ErrorKind, Opcode};
pub use program::{Function, Program, ProgramError, MAGIC, VERSION};
pub use verify::{verify, verify_program, VerifyError};
