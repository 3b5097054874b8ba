//! Bytecode opcodes for the Tarn VM
//!
//! This module defines the complete instruction set shared by the
//! compiler, the verifier, the disassembler, and the virtual machine.

/// Bytecode opcode enumeration
///
/// All opcodes are single-byte instructions. Some opcodes take operands
/// that follow the opcode byte in the instruction stream; the operand
/// shape is fixed per opcode (see [`Instr`](crate::instr::Instr)).
///
/// Opcodes are organized into categories:
/// - 0-6: constants, collections, variables
/// - 7-22: arithmetic, comparison, bitwise
/// - 23-26: logical and unary
/// - 27-28: indexing and slicing
/// - 29-33: control flow and calls
/// - 34-38: stack and program control
/// - 39-43: structured assignment and indirect calls
/// - 44-51: exception handling
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Constants, collections, variables =====
    /// Push a 64-bit integer literal (operand: i64)
    PushInt = 0,
    /// Push a string literal (operand: string)
    PushStr = 1,
    /// Push a boolean literal (operand: 1 byte, 0 or 1)
    PushBool = 2,
    /// Pop N values and push a list (operand: u32 count)
    BuildList = 3,
    /// Pop N key/value pairs and push a dict (operand: u32 pair count)
    BuildDict = 4,
    /// Push the value of a variable (operand: name)
    Load = 5,
    /// Pop a value and store it in a variable (operand: name)
    Store = 6,

    // ===== Arithmetic =====
    /// Pop b, pop a, push a + b
    Add = 7,
    /// Pop b, pop a, push a - b
    Sub = 8,
    /// Pop b, pop a, push a * b
    Mul = 9,
    /// Pop b, pop a, push a / b (integer division)
    Div = 10,
    /// Pop b, pop a, push a % b
    Mod = 11,

    // ===== Comparison =====
    /// Pop b, pop a, push a == b
    Eq = 12,
    /// Pop b, pop a, push a != b
    Ne = 13,
    /// Pop b, pop a, push a < b
    Lt = 14,
    /// Pop b, pop a, push a <= b
    Le = 15,
    /// Pop b, pop a, push a > b
    Gt = 16,
    /// Pop b, pop a, push a >= b
    Ge = 17,

    // ===== Bitwise =====
    /// Pop b, pop a, push a & b
    BitAnd = 18,
    /// Pop b, pop a, push a | b
    BitOr = 19,
    /// Pop b, pop a, push a ^ b
    BitXor = 20,
    /// Pop b, pop a, push a << b
    Shl = 21,
    /// Pop b, pop a, push a >> b
    Shr = 22,

    // ===== Logical and unary =====
    /// Pop b, pop a, push a && b (eager)
    And = 23,
    /// Pop b, pop a, push a || b (eager)
    Or = 24,
    /// Pop a, push bitwise complement of a
    Not = 25,
    /// Pop a, push -a
    Neg = 26,

    // ===== Indexing =====
    /// Pop index, pop base, push base[index]
    Index = 27,
    /// Pop end, pop start, pop base, push base[start..end]
    Slice = 28,

    // ===== Control flow and calls =====
    /// Unconditional jump (operand: u32 absolute instruction index)
    Jump = 29,
    /// Pop a, jump if falsy (operand: u32 absolute instruction index)
    JumpIfFalse = 30,
    /// Call a named function (operand: name)
    Call = 31,
    /// Tail-call a named function, reusing the current frame (operand: name)
    TailCall = 32,
    /// Call a builtin (operand: name + u32 argument count)
    CallBuiltin = 33,

    // ===== Stack and program control =====
    /// Discard the top of stack
    Pop = 34,
    /// Push the none value
    PushNone = 35,
    /// Return from the current function (pop return value)
    Ret = 36,
    /// Pop a value and print it
    Emit = 37,
    /// Stop execution of top-level code
    Halt = 38,

    // ===== Structured assignment and indirect calls =====
    /// Pop value, pop index, pop base, store base[index] = value
    StoreIndex = 39,
    /// Pop base, push base.attr (operand: attribute name)
    Attr = 40,
    /// Pop value, pop base, store base.attr = value (operand: attribute name)
    StoreAttr = 41,
    /// Pop a value, raise an assertion error if falsy
    Assert = 42,
    /// Pop N arguments then the callee value, call it (operand: u32 count)
    CallValue = 43,

    // ===== Exception handling =====
    /// Install an exception handler (operand: u32 handler instruction index)
    SetupExcept = 44,
    /// Remove the innermost exception handler
    PopBlock = 45,
    /// Pop a message and raise a generic runtime error
    Raise = 46,
    /// Pop a message and raise a syntax error
    RaiseSyntaxError = 47,
    /// Pop a message and raise a type error
    RaiseTypeError = 48,
    /// Pop a message and raise an undefined-identifier error
    RaiseUndefIdentError = 49,
    /// Pop a message and raise a value error
    RaiseValueError = 50,
    /// Pop a message and raise a module-import error
    RaiseModuleImportError = 51,
}

impl Opcode {
    /// Convert byte to opcode
    ///
    /// Returns None if the byte does not correspond to a valid opcode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::PushInt),
            1 => Some(Self::PushStr),
            2 => Some(Self::PushBool),
            3 => Some(Self::BuildList),
            4 => Some(Self::BuildDict),
            5 => Some(Self::Load),
            6 => Some(Self::Store),
            7 => Some(Self::Add),
            8 => Some(Self::Sub),
            9 => Some(Self::Mul),
            10 => Some(Self::Div),
            11 => Some(Self::Mod),
            12 => Some(Self::Eq),
            13 => Some(Self::Ne),
            14 => Some(Self::Lt),
            15 => Some(Self::Le),
            16 => Some(Self::Gt),
            17 => Some(Self::Ge),
            18 => Some(Self::BitAnd),
            19 => Some(Self::BitOr),
            20 => Some(Self::BitXor),
            21 => Some(Self::Shl),
            22 => Some(Self::Shr),
            23 => Some(Self::And),
            24 => Some(Self::Or),
            25 => Some(Self::Not),
            26 => Some(Self::Neg),
            27 => Some(Self::Index),
            28 => Some(Self::Slice),
            29 => Some(Self::Jump),
            30 => Some(Self::JumpIfFalse),
            31 => Some(Self::Call),
            32 => Some(Self::TailCall),
            33 => Some(Self::CallBuiltin),
            34 => Some(Self::Pop),
            35 => Some(Self::PushNone),
            36 => Some(Self::Ret),
            37 => Some(Self::Emit),
            38 => Some(Self::Halt),
            39 => Some(Self::StoreIndex),
            40 => Some(Self::Attr),
            41 => Some(Self::StoreAttr),
            42 => Some(Self::Assert),
            43 => Some(Self::CallValue),
            44 => Some(Self::SetupExcept),
            45 => Some(Self::PopBlock),
            46 => Some(Self::Raise),
            47 => Some(Self::RaiseSyntaxError),
            48 => Some(Self::RaiseTypeError),
            49 => Some(Self::RaiseUndefIdentError),
            50 => Some(Self::RaiseValueError),
            51 => Some(Self::RaiseModuleImportError),
            _ => None,
        }
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the canonical mnemonic of the opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::PushInt => "PUSH_INT",
            Self::PushStr => "PUSH_STR",
            Self::PushBool => "PUSH_BOOL",
            Self::BuildList => "BUILD_LIST",
            Self::BuildDict => "BUILD_DICT",
            Self::Load => "LOAD",
            Self::Store => "STORE",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::BitAnd => "BAND",
            Self::BitOr => "BOR",
            Self::BitXor => "BXOR",
            Self::Shl => "SHL",
            Self::Shr => "SHR",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Neg => "NEG",
            Self::Index => "INDEX",
            Self::Slice => "SLICE",
            Self::Jump => "JUMP",
            Self::JumpIfFalse => "JUMP_IF_FALSE",
            Self::Call => "CALL",
            Self::TailCall => "TCALL",
            Self::CallBuiltin => "BUILTIN",
            Self::Pop => "POP",
            Self::PushNone => "PUSH_NONE",
            Self::Ret => "RET",
            Self::Emit => "EMIT",
            Self::Halt => "HALT",
            Self::StoreIndex => "STORE_INDEX",
            Self::Attr => "ATTR",
            Self::StoreAttr => "STORE_ATTR",
            Self::Assert => "ASSERT",
            Self::CallValue => "CALL_VALUE",
            Self::SetupExcept => "SETUP_EXCEPT",
            Self::PopBlock => "POP_BLOCK",
            Self::Raise => "RAISE",
            Self::RaiseSyntaxError => "RAISE_SYNTAX_ERROR",
            Self::RaiseTypeError => "RAISE_TYPE_ERROR",
            Self::RaiseUndefIdentError => "RAISE_UNDEF_IDENT_ERROR",
            Self::RaiseValueError => "RAISE_VALUE_ERROR",
            Self::RaiseModuleImportError => "RAISE_MODULE_IMPORT_ERROR",
        }
    }

    /// Check if this opcode carries an absolute instruction address
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIfFalse | Self::SetupExcept)
    }

    /// Check if this opcode calls a named function from the function table
    pub fn is_call(self) -> bool {
        matches!(self, Self::Call | Self::TailCall)
    }

    /// Check if this opcode raises an error
    pub fn is_raise(self) -> bool {
        self.error_kind().is_some()
    }

    /// The error kind raised by this opcode, if it is one of the raise family
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            Self::Raise => Some(ErrorKind::Generic),
            Self::RaiseSyntaxError => Some(ErrorKind::Syntax),
            Self::RaiseTypeError => Some(ErrorKind::Type),
            Self::RaiseUndefIdentError => Some(ErrorKind::UndefinedIdent),
            Self::RaiseValueError => Some(ErrorKind::Value),
            Self::RaiseModuleImportError => Some(ErrorKind::ModuleImport),
            _ => None,
        }
    }
}

/// Error categories carried by the raise opcodes
///
/// The kind is encoded in the opcode byte itself; raise instructions
/// have no operand bytes. The message travels on the value stack.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A generic runtime error (`panic`/`raise`)
    Generic = 0,
    /// A syntax error surfaced at run time
    Syntax = 1,
    /// A type error
    Type = 2,
    /// An undefined identifier
    UndefinedIdent = 3,
    /// An invalid value
    Value = 4,
    /// A failed module import
    ModuleImport = 5,
}

impl ErrorKind {
    /// Short kind name used in disassembly listings
    pub fn name(self) -> &'static str {
        match self {
            Self::Generic => "Generic",
            Self::Syntax => "Syntax",
            Self::Type => "Type",
            Self::UndefinedIdent => "UndefinedIdent",
            Self::Value => "Value",
            Self::ModuleImport => "ModuleImport",
        }
    }

    /// The opcode that raises this kind
    pub fn opcode(self) -> Opcode {
        match self {
            Self::Generic => Opcode::Raise,
            Self::Syntax => Opcode::RaiseSyntaxError,
            Self::Type => Opcode::RaiseTypeError,
            Self::UndefinedIdent => Opcode::RaiseUndefIdentError,
            Self::Value => Opcode::RaiseValueError,
            Self::ModuleImport => Opcode::RaiseModuleImportError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0u8..=51 {
            let opcode = Opcode::from_u8(byte).expect("valid opcode");
            assert_eq!(opcode.to_u8(), byte, "failed roundtrip for {:?}", opcode);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::from_u8(52), None);
        assert_eq!(Opcode::from_u8(0x80), None);
        assert_eq!(Opcode::from_u8(0xFF), None);
    }

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::PushInt as u8, 0);
        assert_eq!(Opcode::Jump as u8, 29);
        assert_eq!(Opcode::TailCall as u8, 32);
        assert_eq!(Opcode::Halt as u8, 38);
        assert_eq!(Opcode::SetupExcept as u8, 44);
        assert_eq!(Opcode::Raise as u8, 46);
        assert_eq!(Opcode::RaiseModuleImportError as u8, 51);
    }

    #[test]
    fn test_opcode_names() {
        assert_eq!(Opcode::PushInt.name(), "PUSH_INT");
        assert_eq!(Opcode::TailCall.name(), "TCALL");
        assert_eq!(Opcode::CallBuiltin.name(), "BUILTIN");
        assert_eq!(Opcode::BitAnd.name(), "BAND");
        assert_eq!(Opcode::JumpIfFalse.name(), "JUMP_IF_FALSE");
    }

    #[test]
    fn test_jump_detection() {
        assert!(Opcode::Jump.is_jump());
        assert!(Opcode::JumpIfFalse.is_jump());
        assert!(Opcode::SetupExcept.is_jump());
        assert!(!Opcode::Call.is_jump());
        assert!(!Opcode::Ret.is_jump());
    }

    #[test]
    fn test_call_detection() {
        assert!(Opcode::Call.is_call());
        assert!(Opcode::TailCall.is_call());
        assert!(!Opcode::CallBuiltin.is_call());
        assert!(!Opcode::CallValue.is_call());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Opcode::Raise.error_kind(), Some(ErrorKind::Generic));
        assert_eq!(Opcode::RaiseValueError.error_kind(), Some(ErrorKind::Value));
        assert_eq!(Opcode::Halt.error_kind(), None);
        for kind in [
            ErrorKind::Generic,
            ErrorKind::Syntax,
            ErrorKind::Type,
            ErrorKind::UndefinedIdent,
            ErrorKind::Value,
            ErrorKind::ModuleImport,
        ] {
            assert_eq!(kind.opcode().error_kind(), Some(kind));
        }
    }
}
