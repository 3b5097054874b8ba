//! Tarn front end: lexer, AST, and recursive-descent parser.
//!
//! Source text goes in, a statement list comes out. The compiler and the
//! tree-walking evaluator both consume the AST defined here.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{BinOp, Expr, Stmt, UnOp};
pub use lexer::{lex, strip_header, LexError};
pub use parser::{parse, parse_source, ParseError, Parser};
pub use token::Token;

/// The source header line that marks a file as a Tarn module.
///
/// The evaluator requires it on every file it loads; the bytecode
/// compiler accepts headerless sources.
pub const SOURCE_HEADER: &str = ";;;tarn";
