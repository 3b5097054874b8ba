//! Compiled program container format
//!
//! Binary layout, all multi-byte integers little-endian:
//!
//! ```text
//! 4 bytes   magic "TARN"
//! 4 bytes   version (major << 16 | minor << 8 | patch)
//! 4 bytes   function count N
//!   N x:    name (u32 length + UTF-8)
//!           parameter count P, then P x (u32 length + UTF-8)
//!           entry address (u32 instruction index)
//! 4 bytes   instruction count M
//!   M x:    opcode byte + operand bytes per opcode
//! ```

use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use crate::instr::Instr;
use thiserror::Error;

/// Magic number for Tarn bytecode files: "TARN"
pub const MAGIC: [u8; 4] = *b"TARN";

/// Bytecode format major version
pub const VERSION_MAJOR: u32 = 0;
/// Bytecode format minor version
pub const VERSION_MINOR: u32 = 1;
/// Bytecode format patch version
pub const VERSION_PATCH: u32 = 1;

/// Current bytecode version, packed
pub const VERSION: u32 = pack_version(VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH);

/// Pack a three-part version into its wire form
pub const fn pack_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 16) | (minor << 8) | patch
}

/// Unpack a wire version into (major, minor, patch)
pub const fn unpack_version(version: u32) -> (u32, u32, u32) {
    ((version >> 16) & 0xFF, (version >> 8) & 0xFF, version & 0xFF)
}

/// Program encoding/decoding errors
#[derive(Debug, Error)]
pub enum ProgramError {
    /// Decode error
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("invalid magic number: expected TARN, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("unsupported bytecode version {major}.{minor}.{patch} (current: {VERSION_MAJOR}.{VERSION_MINOR}.{VERSION_PATCH})")]
    UnsupportedVersion {
        /// Major version found in the header
        major: u32,
        /// Minor version found in the header
        minor: u32,
        /// Patch version found in the header
        patch: u32,
    },

    /// Extra bytes after the last instruction
    #[error("{0} trailing bytes after the last instruction")]
    TrailingBytes(usize),
}

/// An entry in the function table
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name, unique within one program
    pub name: String,
    /// Ordered parameter names
    pub params: Vec<String>,
    /// Entry address, an index into the instruction list
    pub address: u32,
}

impl Function {
    /// Encode function table entry to binary
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_str(&self.name);
        writer.emit_u32(self.params.len() as u32);
        for param in &self.params {
            writer.emit_str(param);
        }
        writer.emit_u32(self.address);
    }

    /// Decode function table entry from binary
    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let param_count = reader.read_u32()? as usize;
        let mut params = Vec::with_capacity(param_count.min(64));
        for _ in 0..param_count {
            params.push(reader.read_string()?);
        }
        let address = reader.read_u32()?;
        Ok(Self {
            name,
            params,
            address,
        })
    }
}

/// A compiled Tarn program
///
/// Built once per compilation unit and immutable after linking.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Bytecode version the program was encoded with
    pub version: u32,
    /// Function table
    pub functions: Vec<Function>,
    /// Flat instruction list; addresses index into this
    pub instructions: Vec<Instr>,
}

impl Program {
    /// Create a new empty program at the current version
    pub fn new() -> Self {
        Self {
            version: VERSION,
            functions: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// Encode the program to its binary form
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BytecodeWriter::with_capacity(64 + self.instructions.len() * 4);
        writer.emit_bytes(&MAGIC);
        writer.emit_u32(self.version);

        writer.emit_u32(self.functions.len() as u32);
        for func in &self.functions {
            func.encode(&mut writer);
        }

        writer.emit_u32(self.instructions.len() as u32);
        for instr in &self.instructions {
            instr.encode(&mut writer);
        }

        writer.into_bytes()
    }

    /// Decode a program from its binary form
    ///
    /// Fails on a wrong magic, a major version mismatch, any truncated
    /// field, an unknown opcode byte, or bytes left over after the last
    /// instruction.
    pub fn decode(data: &[u8]) -> Result<Self, ProgramError> {
        let mut reader = BytecodeReader::new(data);

        let magic = reader.read_bytes(4)?;
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(ProgramError::InvalidMagic(found));
        }

        let version = reader.read_u32()?;
        let (major, minor, patch) = unpack_version(version);
        if major != VERSION_MAJOR {
            return Err(ProgramError::UnsupportedVersion {
                major,
                minor,
                patch,
            });
        }

        let func_count = reader.read_u32()? as usize;
        let mut functions = Vec::with_capacity(func_count.min(1024));
        for _ in 0..func_count {
            functions.push(Function::decode(&mut reader)?);
        }

        let instr_count = reader.read_u32()? as usize;
        let mut instructions = Vec::with_capacity(instr_count.min(65536));
        for _ in 0..instr_count {
            instructions.push(Instr::decode(&mut reader)?);
        }

        if reader.has_more() {
            return Err(ProgramError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            version,
            functions,
            instructions,
        })
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::ErrorKind;

    fn sample_program() -> Program {
        Program {
            version: VERSION,
            functions: vec![Function {
                name: "fact".to_string(),
                params: vec!["n".to_string(), "acc".to_string()],
                address: 3,
            }],
            instructions: vec![
                Instr::PushInt(1),
                Instr::Emit,
                Instr::Halt,
                Instr::Load("n".to_string()),
                Instr::Ret,
            ],
        }
    }

    #[test]
    fn test_version_packing() {
        assert_eq!(pack_version(0, 1, 1), 0x0101);
        assert_eq!(unpack_version(VERSION), (0, 1, 1));
        assert_eq!(unpack_version(pack_version(2, 13, 7)), (2, 13, 7));
    }

    #[test]
    fn test_empty_program_roundtrip() {
        let program = Program::new();
        let bytes = program.encode();
        assert_eq!(&bytes[..4], b"TARN");
        let decoded = Program::decode(&bytes).unwrap();
        assert_eq!(decoded, program);
    }

    #[test]
    fn test_program_roundtrip() {
        let program = sample_program();
        let decoded = Program::decode(&program.encode()).unwrap();
        assert_eq!(decoded.functions, program.functions);
        assert_eq!(decoded.instructions, program.instructions);
        assert_eq!(decoded.version, VERSION);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = sample_program().encode();
        let b = sample_program().encode();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = sample_program().encode();
        bytes[0] = b'X';
        assert!(matches!(
            Program::decode(&bytes),
            Err(ProgramError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_rejects_major_version_mismatch() {
        let mut program = sample_program();
        program.version = pack_version(1, 0, 0);
        let bytes = program.encode();
        assert!(matches!(
            Program::decode(&bytes),
            Err(ProgramError::UnsupportedVersion { major: 1, .. })
        ));
    }

    #[test]
    fn test_accepts_minor_version_drift() {
        let mut program = sample_program();
        program.version = pack_version(VERSION_MAJOR, VERSION_MINOR + 1, 0);
        let bytes = program.encode();
        assert!(Program::decode(&bytes).is_ok());
    }

    #[test]
    fn test_rejects_truncated_buffer() {
        let bytes = sample_program().encode();
        for len in [0, 3, 7, 11, bytes.len() - 1] {
            assert!(
                Program::decode(&bytes[..len]).is_err(),
                "expected failure at length {}",
                len
            );
        }
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = sample_program().encode();
        bytes.push(0);
        assert!(matches!(
            Program::decode(&bytes),
            Err(ProgramError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_raise_roundtrip_in_program() {
        let program = Program {
            version: VERSION,
            functions: Vec::new(),
            instructions: vec![
                Instr::PushStr("boom".to_string()),
                Instr::Raise(ErrorKind::Type),
                Instr::Halt,
            ],
        };
        let decoded = Program::decode(&program.encode()).unwrap();
        assert_eq!(decoded.instructions[1], Instr::Raise(ErrorKind::Type));
    }
}
