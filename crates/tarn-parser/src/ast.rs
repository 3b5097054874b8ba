//! Abstract syntax for Tarn programs.
//!
//! Statements carry the 1-based source line they started on; the
//! compiler and evaluator use it for error reporting. `if` keeps its
//! `elif` chain as a nested statement in `else_tail` so consumers see
//! a uniform two-way branch.

/// Binary operators, in source spelling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Arithmetic negation (`-x`).
    Neg,
    /// Bitwise complement (`~x`).
    BitNot,
    /// Unary plus, kept for symmetry; a no-op on integers.
    Plus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Str(String),
    Bool(bool),
    List(Vec<Expr>),
    Dict(Vec<(String, Expr)>),
    Ident(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Box<Expr>,
        end: Option<Box<Expr>>,
    },
    Attr {
        target: Box<Expr>,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `alloc name := value`
    Decl {
        name: String,
        value: Expr,
        line: u32,
    },
    /// `name := value`
    Assign {
        name: String,
        value: Expr,
        line: u32,
    },
    /// `target.field := value`
    AttrAssign {
        target: Expr,
        name: String,
        value: Expr,
        line: u32,
    },
    /// `target[index] := value`
    IndexAssign {
        target: Expr,
        index: Expr,
        value: Expr,
        line: u32,
    },
    /// Bare expression evaluated for effect.
    ExprStmt { expr: Expr, line: u32 },
    /// `emit value`
    Emit { value: Expr, line: u32 },
    /// `facts condition`
    Facts { condition: Expr, line: u32 },
    If {
        condition: Expr,
        then_block: Vec<Stmt>,
        /// Either another `If` (from `elif`) or a `Block`, if present.
        else_tail: Option<Box<Stmt>>,
        line: u32,
    },
    /// `loop condition { body }` — a while loop.
    Loop {
        condition: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    Break { line: u32 },
    /// `try { body } except (binding) { handler }`
    Try {
        body: Vec<Stmt>,
        binding: String,
        handler: Vec<Stmt>,
        line: u32,
    },
    /// `proc name(params) { body }`
    FuncDef {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
        line: u32,
    },
    Return { value: Option<Expr>, line: u32 },
    /// A bare brace block; also the shape of a plain `else` arm.
    Block { body: Vec<Stmt>, line: u32 },
    /// `import "path" as name`
    Import {
        path: String,
        alias: String,
        line: u32,
    },
}

impl Stmt {
    /// The 1-based source line the statement started on.
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Decl { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::AttrAssign { line, .. }
            | Stmt::IndexAssign { line, .. }
            | Stmt::ExprStmt { line, .. }
            | Stmt::Emit { line, .. }
            | Stmt::Facts { line, .. }
            | Stmt::If { line, .. }
            | Stmt::Loop { line, .. }
            | Stmt::Break { line }
            | Stmt::Try { line, .. }
            | Stmt::FuncDef { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Block { line, .. }
            | Stmt::Import { line, .. } => *line,
        }
    }
}
