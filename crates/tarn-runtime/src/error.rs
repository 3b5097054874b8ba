//! Runtime error types.
//!
//! `VmError` covers everything that can go wrong while executing
//! bytecode or a builtin; its `Display` strings are what `try`/`except`
//! handlers observe as the bound message. `EvalError` wraps the same
//! errors for the tree-walking evaluator and adds the declaration rules
//! and module-import failures that only exist on that path.

use thiserror::Error;

use tarn_bytecode::ErrorKind;
use tarn_parser::ParseError;

/// An error raised during VM or builtin execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("AssertionError: assertion failed")]
    Assertion,
    #[error("FrozenWriteError: Imported modules are read-only")]
    FrozenWrite,
    #[error("IndexError: {0}")]
    Index(String),
    #[error("KeyError: \"Key '{0}' not found\"")]
    Key(String),
    #[error("ModuleImportError: {0}")]
    ModuleImport(String),
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("UndefinedIdentError: {0}")]
    UndefinedIdent(String),
    #[error("ValueError: {0}")]
    Value(String),
    #[error("ZeroDivisionError: integer division or modulo by zero")]
    ZeroDivision,
    #[error("RuntimeError: {0}")]
    Raised(String),
    /// A broken VM invariant, such as operand stack underflow. Always a
    /// compiler or VM defect, never a user error.
    #[error("VmInvariant: {0}")]
    Invariant(String),
}

impl VmError {
    /// Builds the error a `RAISE` opcode of the given kind produces.
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Generic => VmError::Raised(message),
            ErrorKind::Syntax => VmError::Syntax(message),
            ErrorKind::Type => VmError::Type(message),
            ErrorKind::UndefinedIdent => VmError::UndefinedIdent(message),
            ErrorKind::Value => VmError::Value(message),
            ErrorKind::ModuleImport => VmError::ModuleImport(message),
        }
    }
}

/// An error raised by the tree-walking evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Runtime(#[from] VmError),
    #[error("Identifier '{0}' already declared")]
    AlreadyDeclared(String),
    #[error("Assignment to undeclared identifier '{0}'")]
    AssignUndeclared(String),
    #[error("ModuleImportError: {0}")]
    ModuleImport(String),
    #[error("{0}")]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_kinds_map_to_their_variants() {
        assert_eq!(
            VmError::from_kind(ErrorKind::Generic, "boom".to_string()).to_string(),
            "RuntimeError: boom"
        );
        assert_eq!(
            VmError::from_kind(ErrorKind::Type, "bad".to_string()).to_string(),
            "TypeError: bad"
        );
        assert_eq!(
            VmError::from_kind(ErrorKind::ModuleImport, "nope".to_string()).to_string(),
            "ModuleImportError: nope"
        );
    }

    #[test]
    fn handler_visible_messages() {
        assert_eq!(
            VmError::ZeroDivision.to_string(),
            "ZeroDivisionError: integer division or modulo by zero"
        );
        assert_eq!(
            VmError::Key("missing".to_string()).to_string(),
            "KeyError: \"Key 'missing' not found\""
        );
    }
}
