//! Tarn runtime: the bytecode VM, the builtin library, and the
//! tree-walking reference evaluator.
//!
//! The VM executes programs produced by `tarn-compiler`; the evaluator
//! interprets the AST directly and additionally supports module
//! imports, which the bytecode path rejects at compile time.

pub mod builtins;
pub mod error;
pub mod eval;
pub mod value;
pub mod vm;

pub use error::{EvalError, VmError};
pub use eval::Interpreter;
pub use value::Value;
pub use vm::Vm;
