//! In-memory instruction representation
//!
//! One variant per opcode, carrying the typed operand. The operand
//! shape is fixed per opcode; encoding and decoding are total over
//! this enum.

use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use crate::opcode::{ErrorKind, Opcode};

/// A single decoded bytecode instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Push a 64-bit integer literal
    PushInt(i64),
    /// Push a string literal
    PushStr(String),
    /// Push a boolean literal
    PushBool(bool),
    /// Pop N values and push a list of them
    BuildList(u32),
    /// Pop N key/value pairs and push a dict
    BuildDict(u32),
    /// Push the value of a variable
    Load(String),
    /// Pop a value and store it in a variable
    Store(String),
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Integer division
    Div,
    /// Modulo
    Mod,
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Less than
    Lt,
    /// Less or equal
    Le,
    /// Greater than
    Gt,
    /// Greater or equal
    Ge,
    /// Bitwise and
    BitAnd,
    /// Bitwise or
    BitOr,
    /// Bitwise xor
    BitXor,
    /// Shift left
    Shl,
    /// Shift right
    Shr,
    /// Eager logical and
    And,
    /// Eager logical or
    Or,
    /// Bitwise complement
    Not,
    /// Arithmetic negation
    Neg,
    /// Indexing
    Index,
    /// Slicing
    Slice,
    /// Unconditional jump to an absolute instruction index
    Jump(u32),
    /// Conditional jump taken when the popped value is falsy
    JumpIfFalse(u32),
    /// Call a named function
    Call(String),
    /// Tail-call a named function
    TailCall(String),
    /// Call a builtin with an argument count
    CallBuiltin(String, u32),
    /// Discard the top of stack
    Pop,
    /// Push the none value
    PushNone,
    /// Return from the current function
    Ret,
    /// Pop a value and print it
    Emit,
    /// Stop execution of top-level code
    Halt,
    /// Indexed store
    StoreIndex,
    /// Attribute access
    Attr(String),
    /// Attribute store
    StoreAttr(String),
    /// Assertion
    Assert,
    /// Call through a value with an argument count
    CallValue(u32),
    /// Install an exception handler at an absolute instruction index
    SetupExcept(u32),
    /// Remove the innermost exception handler
    PopBlock,
    /// Raise an error of the given kind
    Raise(ErrorKind),
}

impl Instr {
    /// The opcode this instruction encodes to
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::PushInt(_) => Opcode::PushInt,
            Self::PushStr(_) => Opcode::PushStr,
            Self::PushBool(_) => Opcode::PushBool,
            Self::BuildList(_) => Opcode::BuildList,
            Self::BuildDict(_) => Opcode::BuildDict,
            Self::Load(_) => Opcode::Load,
            Self::Store(_) => Opcode::Store,
            Self::Add => Opcode::Add,
            Self::Sub => Opcode::Sub,
            Self::Mul => Opcode::Mul,
            Self::Div => Opcode::Div,
            Self::Mod => Opcode::Mod,
            Self::Eq => Opcode::Eq,
            Self::Ne => Opcode::Ne,
            Self::Lt => Opcode::Lt,
            Self::Le => Opcode::Le,
            Self::Gt => Opcode::Gt,
            Self::Ge => Opcode::Ge,
            Self::BitAnd => Opcode::BitAnd,
            Self::BitOr => Opcode::BitOr,
            Self::BitXor => Opcode::BitXor,
            Self::Shl => Opcode::Shl,
            Self::Shr => Opcode::Shr,
            Self::And => Opcode::And,
            Self::Or => Opcode::Or,
            Self::Not => Opcode::Not,
            Self::Neg => Opcode::Neg,
            Self::Index => Opcode::Index,
            Self::Slice => Opcode::Slice,
            Self::Jump(_) => Opcode::Jump,
            Self::JumpIfFalse(_) => Opcode::JumpIfFalse,
            Self::Call(_) => Opcode::Call,
            Self::TailCall(_) => Opcode::TailCall,
            Self::CallBuiltin(_, _) => Opcode::CallBuiltin,
            Self::Pop => Opcode::Pop,
            Self::PushNone => Opcode::PushNone,
            Self::Ret => Opcode::Ret,
            Self::Emit => Opcode::Emit,
            Self::Halt => Opcode::Halt,
            Self::StoreIndex => Opcode::StoreIndex,
            Self::Attr(_) => Opcode::Attr,
            Self::StoreAttr(_) => Opcode::StoreAttr,
            Self::Assert => Opcode::Assert,
            Self::CallValue(_) => Opcode::CallValue,
            Self::SetupExcept(_) => Opcode::SetupExcept,
            Self::PopBlock => Opcode::PopBlock,
            Self::Raise(kind) => kind.opcode(),
        }
    }

    /// The absolute jump target carried by this instruction, if any
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Self::Jump(target) | Self::JumpIfFalse(target) | Self::SetupExcept(target) => {
                Some(*target)
            }
            _ => None,
        }
    }

    /// The function name referenced by this instruction, if it is a call
    pub fn call_target(&self) -> Option<&str> {
        match self {
            Self::Call(name) | Self::TailCall(name) => Some(name),
            _ => None,
        }
    }

    /// Encode the opcode byte and operand bytes
    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_u8(self.opcode().to_u8());
        match self {
            Self::PushInt(value) => writer.emit_i64(*value),
            Self::PushStr(value) => writer.emit_str(value),
            Self::PushBool(value) => writer.emit_u8(u8::from(*value)),
            Self::BuildList(count) | Self::BuildDict(count) | Self::CallValue(count) => {
                writer.emit_u32(*count)
            }
            Self::Load(name)
            | Self::Store(name)
            | Self::Call(name)
            | Self::TailCall(name)
            | Self::Attr(name)
            | Self::StoreAttr(name) => writer.emit_str(name),
            Self::CallBuiltin(name, argc) => {
                writer.emit_str(name);
                writer.emit_u32(*argc);
            }
            Self::Jump(target) | Self::JumpIfFalse(target) | Self::SetupExcept(target) => {
                writer.emit_u32(*target)
            }
            // Remaining instructions carry no operand bytes.
            _ => {}
        }
    }

    /// Decode one instruction starting at the reader's position
    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let byte = reader.read_u8()?;
        let opcode = Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, offset))?;
        let instr = match opcode {
            Opcode::PushInt => Self::PushInt(reader.read_i64()?),
            Opcode::PushStr => Self::PushStr(reader.read_string()?),
            Opcode::PushBool => Self::PushBool(reader.read_u8()? != 0),
            Opcode::BuildList => Self::BuildList(reader.read_u32()?),
            Opcode::BuildDict => Self::BuildDict(reader.read_u32()?),
            Opcode::Load => Self::Load(reader.read_string()?),
            Opcode::Store => Self::Store(reader.read_string()?),
            Opcode::Add => Self::Add,
            Opcode::Sub => Self::Sub,
            Opcode::Mul => Self::Mul,
            Opcode::Div => Self::Div,
            Opcode::Mod => Self::Mod,
            Opcode::Eq => Self::Eq,
            Opcode::Ne => Self::Ne,
            Opcode::Lt => Self::Lt,
            Opcode::Le => Self::Le,
            Opcode::Gt => Self::Gt,
            Opcode::Ge => Self::Ge,
            Opcode::BitAnd => Self::BitAnd,
            Opcode::BitOr => Self::BitOr,
            Opcode::BitXor => Self::BitXor,
            Opcode::Shl => Self::Shl,
            Opcode::Shr => Self::Shr,
            Opcode::And => Self::And,
            Opcode::Or => Self::Or,
            Opcode::Not => Self::Not,
            Opcode::Neg => Self::Neg,
            Opcode::Index => Self::Index,
            Opcode::Slice => Self::Slice,
            Opcode::Jump => Self::Jump(reader.read_u32()?),
            Opcode::JumpIfFalse => Self::JumpIfFalse(reader.read_u32()?),
            Opcode::Call => Self::Call(reader.read_string()?),
            Opcode::TailCall => Self::TailCall(reader.read_string()?),
            Opcode::CallBuiltin => {
                let name = reader.read_string()?;
                let argc = reader.read_u32()?;
                Self::CallBuiltin(name, argc)
            }
            Opcode::Pop => Self::Pop,
            Opcode::PushNone => Self::PushNone,
            Opcode::Ret => Self::Ret,
            Opcode::Emit => Self::Emit,
            Opcode::Halt => Self::Halt,
            Opcode::StoreIndex => Self::StoreIndex,
            Opcode::Attr => Self::Attr(reader.read_string()?),
            Opcode::StoreAttr => Self::StoreAttr(reader.read_string()?),
            Opcode::Assert => Self::Assert,
            Opcode::CallValue => Self::CallValue(reader.read_u32()?),
            Opcode::SetupExcept => Self::SetupExcept(reader.read_u32()?),
            Opcode::PopBlock => Self::PopBlock,
            Opcode::Raise => Self::Raise(ErrorKind::Generic),
            Opcode::RaiseSyntaxError => Self::Raise(ErrorKind::Syntax),
            Opcode::RaiseTypeError => Self::Raise(ErrorKind::Type),
            Opcode::RaiseUndefIdentError => Self::Raise(ErrorKind::UndefinedIdent),
            Opcode::RaiseValueError => Self::Raise(ErrorKind::Value),
            Opcode::RaiseModuleImportError => Self::Raise(ErrorKind::ModuleImport),
        };
        Ok(instr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(instr: Instr) -> Instr {
        let mut writer = BytecodeWriter::new();
        instr.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = BytecodeReader::new(&bytes);
        let decoded = Instr::decode(&mut reader).expect("decode");
        assert!(!reader.has_more(), "trailing bytes after {:?}", decoded);
        decoded
    }

    #[test]
    fn test_operand_roundtrips() {
        let samples = [
            Instr::PushInt(-7),
            Instr::PushInt(i64::MAX),
            Instr::PushStr("hello".to_string()),
            Instr::PushStr(String::new()),
            Instr::PushBool(true),
            Instr::PushBool(false),
            Instr::BuildList(3),
            Instr::BuildDict(0),
            Instr::Load("x".to_string()),
            Instr::Store("y".to_string()),
            Instr::Jump(12),
            Instr::JumpIfFalse(0),
            Instr::Call("fact".to_string()),
            Instr::TailCall("fact".to_string()),
            Instr::CallBuiltin("length".to_string(), 1),
            Instr::Attr("field".to_string()),
            Instr::StoreAttr("field".to_string()),
            Instr::CallValue(2),
            Instr::SetupExcept(9),
            Instr::Raise(ErrorKind::Generic),
            Instr::Raise(ErrorKind::Value),
            Instr::Add,
            Instr::Halt,
        ];
        for instr in samples {
            assert_eq!(roundtrip(instr.clone()), instr);
        }
    }

    #[test]
    fn test_raise_kind_in_opcode_byte() {
        let mut writer = BytecodeWriter::new();
        Instr::Raise(ErrorKind::Syntax).encode(&mut writer);
        let bytes = writer.into_bytes();
        // The kind lives in the opcode byte; no operand follows.
        assert_eq!(bytes, vec![Opcode::RaiseSyntaxError.to_u8()]);
    }

    #[test]
    fn test_decode_rejects_unknown_opcode() {
        let bytes = vec![200u8];
        let mut reader = BytecodeReader::new(&bytes);
        assert!(matches!(
            Instr::decode(&mut reader),
            Err(DecodeError::InvalidOpcode(200, 0))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_operand() {
        let mut writer = BytecodeWriter::new();
        Instr::PushInt(42).encode(&mut writer);
        let mut bytes = writer.into_bytes();
        bytes.truncate(5);
        let mut reader = BytecodeReader::new(&bytes);
        assert!(matches!(
            Instr::decode(&mut reader),
            Err(DecodeError::UnexpectedEnd(_))
        ));
    }

    #[test]
    fn test_jump_targets() {
        assert_eq!(Instr::Jump(4).jump_target(), Some(4));
        assert_eq!(Instr::JumpIfFalse(7).jump_target(), Some(7));
        assert_eq!(Instr::SetupExcept(2).jump_target(), Some(2));
        assert_eq!(Instr::Call("f".to_string()).jump_target(), None);
    }

    #[test]
    fn test_call_targets() {
        assert_eq!(Instr::Call("f".to_string()).call_target(), Some("f"));
        assert_eq!(Instr::TailCall("g".to_string()).call_target(), Some("g"));
        assert_eq!(Instr::CallBuiltin("length".to_string(), 1).call_target(), None);
        assert_eq!(Instr::CallValue(1).call_target(), None);
    }
}
