//! Tarn bytecode compiler.
//!
//! Lowers the AST produced by `tarn-parser` into the flat instruction
//! model of `tarn-bytecode` in a single pass, then links pending
//! function bodies behind the top-level code.

pub mod compile;
pub mod link;

pub use compile::{compile, is_builtin, Compiler, CompileError, BUILTIN_NAMES};
