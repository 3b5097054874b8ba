//! AST lowering.
//!
//! A `Compiler` owns the working instruction buffer, the break-scope
//! stack, and the list of pending function bodies. One instance serves
//! one `compile` call. Forward jumps are emitted with operand 0 and
//! patched by buffer index once their target is known; function bodies
//! are lowered into a swapped-in buffer and linked after top-level
//! code.

use rustc_hash::FxHashSet;
use thiserror::Error;

use tarn_bytecode::{ErrorKind, Instr, Program};
use tarn_parser::{BinOp, Expr, Stmt, UnOp};

use crate::link::{self, PendingFunction};

/// The closed set of builtin names the compiler specializes into
/// `BUILTIN` instructions.
pub const BUILTIN_NAMES: &[&str] = &[
    "chr",
    "ascii",
    "hex",
    "binary",
    "length",
    "read_file",
    "write_file",
    "file_open",
    "file_read",
    "file_write",
    "file_close",
    "file_exists",
    "freeze",
    "call_builtin",
];

/// Whether `name` is one of the builtin functions.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// Names intercepted at compile time and lowered to raise opcodes.
fn raise_kind(name: &str) -> Option<ErrorKind> {
    match name {
        "panic" | "raise" => Some(ErrorKind::Generic),
        "_tarn_vm_syntax_error_handle" => Some(ErrorKind::Syntax),
        "_tarn_vm_type_error_handle" => Some(ErrorKind::Type),
        "_tarn_vm_undef_ident_error_handle" => Some(ErrorKind::UndefinedIdent),
        "_tarn_vm_value_error_handle" => Some(ErrorKind::Value),
        "_tarn_vm_module_import_error_handle" => Some(ErrorKind::ModuleImport),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("'break' used outside of loop on line {line}")]
    BreakOutsideLoop { line: u32 },
    #[error("Module imports are resolved by the interpreter and cannot be compiled (line {line})")]
    ImportNotSupported { line: u32 },
}

/// Compiles a statement list into a linked, executable program.
pub fn compile(statements: &[Stmt]) -> Result<Program, CompileError> {
    let mut compiler = Compiler::new();
    compiler.lower_block(statements)?;
    compiler.emit(Instr::Halt);
    Ok(link::link(compiler.code, compiler.pending))
}

pub struct Compiler {
    code: Vec<Instr>,
    pending: Vec<PendingFunction>,
    break_scopes: Vec<Vec<usize>>,
    builtins: FxHashSet<&'static str>,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            code: Vec::new(),
            pending: Vec::new(),
            break_scopes: Vec::new(),
            builtins: BUILTIN_NAMES.iter().copied().collect(),
        }
    }

    // --- buffer primitives ----------------------------------------------

    fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    /// Overwrites the operand of a previously emitted jump.
    fn patch_jump(&mut self, at: usize, target: u32) {
        match &mut self.code[at] {
            Instr::Jump(operand) | Instr::JumpIfFalse(operand) | Instr::SetupExcept(operand) => {
                *operand = target;
            }
            other => debug_assert!(false, "patched slot is not a jump: {other:?}"),
        }
    }

    // --- statements -----------------------------------------------------

    fn lower_block(&mut self, statements: &[Stmt]) -> Result<(), CompileError> {
        for stmt in statements {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Decl { name, value, .. } | Stmt::Assign { name, value, .. } => {
                self.lower_expr(value)?;
                self.emit(Instr::Store(name.clone()));
            }
            Stmt::AttrAssign {
                target, name, value, ..
            } => {
                self.lower_expr(target)?;
                self.lower_expr(value)?;
                self.emit(Instr::StoreAttr(name.clone()));
            }
            Stmt::IndexAssign {
                target,
                index,
                value,
                ..
            } => {
                self.lower_expr(target)?;
                self.lower_expr(index)?;
                self.lower_expr(value)?;
                self.emit(Instr::StoreIndex);
            }
            Stmt::ExprStmt { expr, .. } => {
                self.lower_expr(expr)?;
                self.emit(Instr::Pop);
            }
            Stmt::Emit { value, .. } => {
                self.lower_expr(value)?;
                self.emit(Instr::Emit);
            }
            Stmt::Facts { condition, .. } => {
                self.lower_expr(condition)?;
                self.emit(Instr::Assert);
            }
            Stmt::If {
                condition,
                then_block,
                else_tail,
                ..
            } => self.lower_if(condition, then_block, else_tail.as_deref())?,
            Stmt::Loop {
                condition, body, ..
            } => self.lower_loop(condition, body)?,
            Stmt::Break { line } => {
                let site = self.emit(Instr::Jump(0));
                match self.break_scopes.last_mut() {
                    Some(scope) => scope.push(site),
                    None => return Err(CompileError::BreakOutsideLoop { line: *line }),
                }
            }
            Stmt::Try {
                body,
                binding,
                handler,
                ..
            } => self.lower_try(body, binding, handler)?,
            Stmt::FuncDef {
                name, params, body, ..
            } => self.lower_func_def(name, params, body)?,
            Stmt::Return { value, .. } => self.lower_return(value.as_ref())?,
            Stmt::Block { body, .. } => self.lower_block(body)?,
            Stmt::Import { line, .. } => {
                return Err(CompileError::ImportNotSupported { line: *line })
            }
        }
        Ok(())
    }

    /// Unrolls the parser's nested tail-else representation into a flat
    /// chain of (condition, block) branches plus an optional else.
    fn lower_if(
        &mut self,
        condition: &Expr,
        then_block: &[Stmt],
        else_tail: Option<&Stmt>,
    ) -> Result<(), CompileError> {
        let mut branches: Vec<(&Expr, &[Stmt])> = vec![(condition, then_block)];
        let mut else_block: Option<&[Stmt]> = None;
        let mut tail = else_tail;
        while let Some(stmt) = tail {
            match stmt {
                Stmt::If {
                    condition,
                    then_block,
                    else_tail,
                    ..
                } => {
                    branches.push((condition, then_block));
                    tail = else_tail.as_deref();
                }
                Stmt::Block { body, .. } => {
                    else_block = Some(body);
                    tail = None;
                }
                other => {
                    else_block = Some(std::slice::from_ref(other));
                    tail = None;
                }
            }
        }

        let mut end_jumps = Vec::with_capacity(branches.len());
        for (cond, block) in branches {
            self.lower_expr(cond)?;
            let skip = self.emit(Instr::JumpIfFalse(0));
            self.lower_block(block)?;
            end_jumps.push(self.emit(Instr::Jump(0)));
            let next = self.here();
            self.patch_jump(skip, next);
        }
        if let Some(block) = else_block {
            self.lower_block(block)?;
        }
        let end = self.here();
        for site in end_jumps {
            self.patch_jump(site, end);
        }
        Ok(())
    }

    fn lower_loop(&mut self, condition: &Expr, body: &[Stmt]) -> Result<(), CompileError> {
        let start = self.here();
        self.lower_expr(condition)?;
        let exit = self.emit(Instr::JumpIfFalse(0));
        self.break_scopes.push(Vec::new());
        let result = self.lower_block(body);
        // Pop the scope even on error so the compiler state stays sane.
        let breaks = self.break_scopes.pop().unwrap_or_default();
        result?;
        self.emit(Instr::Jump(start));
        let end = self.here();
        self.patch_jump(exit, end);
        for site in breaks {
            self.patch_jump(site, end);
        }
        Ok(())
    }

    fn lower_try(
        &mut self,
        body: &[Stmt],
        binding: &str,
        handler: &[Stmt],
    ) -> Result<(), CompileError> {
        let setup = self.emit(Instr::SetupExcept(0));
        self.lower_block(body)?;
        self.emit(Instr::PopBlock);
        let skip = self.emit(Instr::Jump(0));
        let handler_entry = self.here();
        self.patch_jump(setup, handler_entry);
        self.emit(Instr::Store(binding.to_string()));
        self.lower_block(handler)?;
        let end = self.here();
        self.patch_jump(skip, end);
        Ok(())
    }

    /// Lowers a function body into a fresh buffer and records it as
    /// pending. Nothing is emitted at the definition site; the linker
    /// assigns the entry address.
    fn lower_func_def(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        let saved_code = std::mem::take(&mut self.code);
        let saved_scopes = std::mem::take(&mut self.break_scopes);

        let result = self.lower_block(body);
        if !matches!(self.code.last(), Some(Instr::Ret)) {
            self.emit(Instr::Ret);
        }
        let body_code = std::mem::replace(&mut self.code, saved_code);
        self.break_scopes = saved_scopes;
        result?;

        self.pending.push(PendingFunction {
            name: name.to_string(),
            params: params.to_vec(),
            body: body_code,
        });
        Ok(())
    }

    /// `return f(args)` with a bare-identifier callee is a tail call:
    /// builtins lower as `BUILTIN` + `RET`, raise forms as the raise
    /// followed by `RET`, anything else as `TCALL` (which returns
    /// directly to the caller, so no `RET` follows it).
    fn lower_return(&mut self, value: Option<&Expr>) -> Result<(), CompileError> {
        if let Some(Expr::Call { callee, args }) = value {
            if let Expr::Ident(name) = callee.as_ref() {
                if let Some(kind) = raise_kind(name) {
                    self.lower_raise(kind, args)?;
                    self.emit(Instr::Ret);
                    return Ok(());
                }
                for arg in args {
                    self.lower_expr(arg)?;
                }
                if self.builtins.contains(name.as_str()) {
                    self.emit(Instr::CallBuiltin(name.clone(), args.len() as u32));
                    self.emit(Instr::Ret);
                } else {
                    self.emit(Instr::TailCall(name.clone()));
                }
                return Ok(());
            }
        }
        match value {
            Some(expr) => self.lower_expr(expr)?,
            None => {
                self.emit(Instr::PushNone);
            }
        }
        self.emit(Instr::Ret);
        Ok(())
    }

    // --- expressions ----------------------------------------------------

    fn lower_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(value) => {
                self.emit(Instr::PushInt(*value));
            }
            Expr::Str(value) => {
                self.emit(Instr::PushStr(value.clone()));
            }
            Expr::Bool(value) => {
                self.emit(Instr::PushBool(*value));
            }
            Expr::Ident(name) => {
                self.emit(Instr::Load(name.clone()));
            }
            Expr::List(elements) => {
                for element in elements {
                    self.lower_expr(element)?;
                }
                self.emit(Instr::BuildList(elements.len() as u32));
            }
            Expr::Dict(pairs) => {
                for (key, value) in pairs {
                    self.emit(Instr::PushStr(key.clone()));
                    self.lower_expr(value)?;
                }
                self.emit(Instr::BuildDict(pairs.len() as u32));
            }
            Expr::Binary { op, left, right } => self.lower_binary(*op, left, right)?,
            Expr::Unary { op, operand } => {
                self.lower_expr(operand)?;
                match op {
                    UnOp::Neg => {
                        self.emit(Instr::Neg);
                    }
                    UnOp::BitNot => {
                        self.emit(Instr::Not);
                    }
                    UnOp::Plus => {}
                }
            }
            Expr::Index { target, index } => {
                self.lower_expr(target)?;
                self.lower_expr(index)?;
                self.emit(Instr::Index);
            }
            Expr::Slice { target, start, end } => {
                self.lower_expr(target)?;
                self.lower_expr(start)?;
                match end {
                    Some(end) => self.lower_expr(end)?,
                    None => {
                        self.emit(Instr::PushNone);
                    }
                }
                self.emit(Instr::Slice);
            }
            Expr::Attr { target, name } => {
                self.lower_expr(target)?;
                self.emit(Instr::Attr(name.clone()));
            }
            Expr::Call { callee, args } => self.lower_call(callee, args)?,
        }
        Ok(())
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<(), CompileError> {
        if let Expr::Ident(name) = callee {
            if let Some(kind) = raise_kind(name) {
                return self.lower_raise(kind, args);
            }
            for arg in args {
                self.lower_expr(arg)?;
            }
            if self.builtins.contains(name.as_str()) {
                self.emit(Instr::CallBuiltin(name.clone(), args.len() as u32));
            } else {
                self.emit(Instr::Call(name.clone()));
            }
            return Ok(());
        }
        // Computed callee: the value (a function name string) goes on
        // the stack beneath the arguments.
        self.lower_expr(callee)?;
        for arg in args {
            self.lower_expr(arg)?;
        }
        self.emit(Instr::CallValue(args.len() as u32));
        Ok(())
    }

    /// Raise special form: one message argument on the stack, the kind
    /// carried by the opcode. A missing argument becomes `""`.
    fn lower_raise(&mut self, kind: ErrorKind, args: &[Expr]) -> Result<(), CompileError> {
        match args.first() {
            Some(arg) => self.lower_expr(arg)?,
            None => {
                self.emit(Instr::PushStr(String::new()));
            }
        }
        self.emit(Instr::Raise(kind));
        Ok(())
    }

    /// Short-circuit lowering for `and`/`or`. Both forms produce a
    /// strict boolean and never evaluate the right operand when the
    /// left already decides the result.
    fn lower_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        match op {
            BinOp::And => {
                self.lower_expr(left)?;
                let fail_a = self.emit(Instr::JumpIfFalse(0));
                self.lower_expr(right)?;
                let fail_b = self.emit(Instr::JumpIfFalse(0));
                self.emit(Instr::PushBool(true));
                let done = self.emit(Instr::Jump(0));
                let on_false = self.here();
                self.patch_jump(fail_a, on_false);
                self.patch_jump(fail_b, on_false);
                self.emit(Instr::PushBool(false));
                let end = self.here();
                self.patch_jump(done, end);
            }
            BinOp::Or => {
                self.lower_expr(left)?;
                let try_right = self.emit(Instr::JumpIfFalse(0));
                self.emit(Instr::PushBool(true));
                let done_a = self.emit(Instr::Jump(0));
                let right_entry = self.here();
                self.patch_jump(try_right, right_entry);
                self.lower_expr(right)?;
                let fail = self.emit(Instr::JumpIfFalse(0));
                self.emit(Instr::PushBool(true));
                let done_b = self.emit(Instr::Jump(0));
                let on_false = self.here();
                self.patch_jump(fail, on_false);
                self.emit(Instr::PushBool(false));
                let end = self.here();
                self.patch_jump(done_a, end);
                self.patch_jump(done_b, end);
            }
            _ => {
                self.lower_expr(left)?;
                self.lower_expr(right)?;
                self.emit(match op {
                    BinOp::Add => Instr::Add,
                    BinOp::Sub => Instr::Sub,
                    BinOp::Mul => Instr::Mul,
                    BinOp::Div => Instr::Div,
                    BinOp::Mod => Instr::Mod,
                    BinOp::Eq => Instr::Eq,
                    BinOp::Ne => Instr::Ne,
                    BinOp::Lt => Instr::Lt,
                    BinOp::Le => Instr::Le,
                    BinOp::Gt => Instr::Gt,
                    BinOp::Ge => Instr::Ge,
                    BinOp::BitAnd => Instr::BitAnd,
                    BinOp::BitOr => Instr::BitOr,
                    BinOp::BitXor => Instr::BitXor,
                    BinOp::Shl => Instr::Shl,
                    BinOp::Shr => Instr::Shr,
                    BinOp::And | BinOp::Or => unreachable!(),
                });
            }
        }
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
