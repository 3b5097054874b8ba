//! The tree-walking interpreter.
//!
//! Executes parsed source directly, without going through bytecode.
//! It agrees with the VM on value semantics by sharing the operation
//! functions in [`crate::vm::arith`] and [`crate::vm::structural`],
//! and adds what only exists on this path: declaration checking,
//! first-class procs with captured environments, and module imports.
//!
//! Scoping is two-level. Module top level writes to the module's
//! global table; inside a proc, parameters and `alloc` declarations
//! live in a per-call local table, and assignment falls back to the
//! globals of the proc's defining module. `alloc` of a name already
//! present in the current scope is an error, as is assignment to a
//! name not declared anywhere.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tarn_bytecode::ErrorKind;
use tarn_parser::{parse_source, BinOp, Expr, Stmt, UnOp, SOURCE_HEADER};

use crate::builtins;
use crate::error::{EvalError, VmError};
use crate::value::{FuncValue, Value};
use crate::vm::{arith, structural};

/// One lexical scope: the local table of the current proc call (absent
/// at module top level) plus the global table of the defining module.
struct Env {
    locals: Option<HashMap<String, Value>>,
    globals: Rc<RefCell<HashMap<String, Value>>>,
}

impl Env {
    fn top_level(globals: Rc<RefCell<HashMap<String, Value>>>) -> Self {
        Env {
            locals: None,
            globals,
        }
    }

    fn contains(&self, name: &str) -> bool {
        match &self.locals {
            Some(locals) => locals.contains_key(name),
            None => self.globals.borrow().contains_key(name),
        }
    }

    /// Unconditionally binds `name` in the current scope.
    fn bind(&mut self, name: &str, value: Value) {
        match &mut self.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => {
                self.globals.borrow_mut().insert(name.to_string(), value);
            }
        }
    }

    fn load(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(locals) = &self.locals {
            if let Some(value) = locals.get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(value) = self.globals.borrow().get(name) {
            return Ok(value.clone());
        }
        Err(VmError::UndefinedIdent(name.to_string()).into())
    }
}

/// Control flow escaping a block.
enum Flow {
    Normal,
    Break,
    Return(Value),
}

/// Executes Tarn source directly against a persistent global table.
///
/// Output from `emit` goes to `W`; the default is stdout. The same
/// interpreter instance can evaluate multiple sources in sequence, so
/// a REPL keeps its declarations across lines.
pub struct Interpreter<W: Write> {
    globals: Rc<RefCell<HashMap<String, Value>>>,
    output: W,
    base_dir: PathBuf,
    import_stack: Vec<PathBuf>,
    modules: HashMap<PathBuf, Value>,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Self {
        Interpreter::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(output: W) -> Self {
        Interpreter {
            globals: Rc::new(RefCell::new(HashMap::new())),
            output,
            base_dir: PathBuf::from("."),
            import_stack: Vec::new(),
            modules: HashMap::new(),
        }
    }

    /// Consumes the interpreter and returns its output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs a script file. The file must start with the `;;;tarn`
    /// header. `script_args` are exposed to the program through the
    /// `args` global, after the script path itself.
    pub fn run_file(&mut self, path: &Path, script_args: &[String]) -> Result<(), EvalError> {
        let source = fs::read_to_string(path).map_err(|err| {
            EvalError::ModuleImport(format!("cannot read '{}': {}", path.display(), err))
        })?;
        if !has_header(&source) {
            return Err(EvalError::ModuleImport(format!(
                "'{}' is not a Tarn script (missing '{}' header)",
                path.display(),
                SOURCE_HEADER
            )));
        }

        let normalized = path.display().to_string().replace('\\', "/");
        let dir = match normalized.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        };
        let mut args = vec![Value::Str(normalized.clone())];
        args.extend(script_args.iter().map(|a| Value::Str(a.clone())));
        {
            let mut globals = self.globals.borrow_mut();
            globals.insert("args".to_string(), Value::list(args));
            globals.insert("module_file".to_string(), Value::Str(normalized));
            globals.insert("current_dir".to_string(), Value::Str(dir.clone()));
        }
        self.base_dir = PathBuf::from(dir);

        let program = parse_source(&source)?;
        let mut env = Env::top_level(self.globals.clone());
        let flow = self.exec_block(&program, &mut env)?;
        self.check_top_level_flow(flow)
    }

    /// Evaluates a source fragment against the persistent globals.
    /// Results of bare expression statements are echoed when not none,
    /// which is what a REPL wants.
    pub fn eval_source(&mut self, source: &str) -> Result<(), EvalError> {
        let program = parse_source(source)?;
        let globals = self.globals.clone();
        let mut env = Env::top_level(globals);
        for stmt in &program {
            if let Stmt::ExprStmt { expr, .. } = stmt {
                let value = self.eval_expr(expr, &env)?;
                if !matches!(value, Value::None) {
                    self.emit_line(&value)?;
                }
            } else {
                let flow = self.exec_stmt(stmt, &mut env)?;
                if !matches!(flow, Flow::Normal) {
                    return self.check_top_level_flow(flow);
                }
            }
        }
        Ok(())
    }

    fn check_top_level_flow(&self, flow: Flow) -> Result<(), EvalError> {
        match flow {
            Flow::Normal => Ok(()),
            Flow::Break => {
                Err(VmError::Syntax("'break' used outside of loop".to_string()).into())
            }
            Flow::Return(_) => {
                Err(VmError::Syntax("'return' used outside of procedure".to_string()).into())
            }
        }
    }

    fn emit_line(&mut self, value: &Value) -> Result<(), EvalError> {
        writeln!(self.output, "{}", value)
            .map_err(|err| VmError::Invariant(format!("emit failed: {}", err)))?;
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &mut Env) -> Result<Flow, EvalError> {
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &mut Env) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Decl { name, value, .. } => {
                let value = self.eval_expr(value, env)?;
                if env.contains(name) {
                    return Err(EvalError::AlreadyDeclared(name.clone()));
                }
                env.bind(name, value);
                Ok(Flow::Normal)
            }
            Stmt::Assign { name, value, .. } => {
                let value = self.eval_expr(value, env)?;
                if let Some(locals) = &mut env.locals {
                    if let Some(slot) = locals.get_mut(name) {
                        *slot = value;
                        return Ok(Flow::Normal);
                    }
                }
                let mut globals = env.globals.borrow_mut();
                match globals.get_mut(name) {
                    Some(slot) => {
                        *slot = value;
                        Ok(Flow::Normal)
                    }
                    None => Err(EvalError::AssignUndeclared(name.clone())),
                }
            }
            Stmt::AttrAssign {
                target, name, value, ..
            } => {
                let base = self.eval_expr(target, env)?;
                let value = self.eval_expr(value, env)?;
                structural::store_attr(base, name, value)?;
                Ok(Flow::Normal)
            }
            Stmt::IndexAssign {
                target,
                index,
                value,
                ..
            } => {
                let base = self.eval_expr(target, env)?;
                let index = self.eval_expr(index, env)?;
                let value = self.eval_expr(value, env)?;
                structural::store_index(base, index, value)?;
                Ok(Flow::Normal)
            }
            Stmt::ExprStmt { expr, .. } => {
                self.eval_expr(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Emit { value, .. } => {
                let value = self.eval_expr(value, env)?;
                self.emit_line(&value)?;
                Ok(Flow::Normal)
            }
            Stmt::Facts { condition, .. } => {
                if self.eval_expr(condition, env)?.as_bool() {
                    Ok(Flow::Normal)
                } else {
                    Err(VmError::Assertion.into())
                }
            }
            Stmt::If {
                condition,
                then_block,
                else_tail,
                ..
            } => {
                if self.eval_expr(condition, env)?.as_bool() {
                    self.exec_block(then_block, env)
                } else if let Some(tail) = else_tail {
                    self.exec_stmt(tail, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Loop {
                condition, body, ..
            } => {
                while self.eval_expr(condition, env)?.as_bool() {
                    match self.exec_block(body, env)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Try {
                body,
                binding,
                handler,
                ..
            } => match self.exec_block(body, env) {
                Ok(flow) => Ok(flow),
                Err(err @ EvalError::Parse(_)) => Err(err),
                Err(err) => {
                    env.bind(binding, Value::Str(err.to_string()));
                    self.exec_block(handler, env)
                }
            },
            Stmt::FuncDef {
                name, params, body, ..
            } => {
                let captured = match &env.locals {
                    Some(locals) => locals.clone(),
                    None => HashMap::new(),
                };
                let func = FuncValue {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    captured,
                    globals: env.globals.clone(),
                };
                env.bind(name, Value::Func(Rc::new(func)));
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Block { body, .. } => self.exec_block(body, env),
            Stmt::Import { path, alias, .. } => {
                let namespace = self.import_module(path)?;
                env.bind(alias, namespace);
                Ok(Flow::Normal)
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Result<Value, EvalError> {
        match expr {
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, env)?);
                }
                Ok(Value::list(values))
            }
            Expr::Dict(pairs) => {
                let mut map = HashMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    map.insert(key.clone(), self.eval_expr(value, env)?);
                }
                Ok(Value::dict(map))
            }
            Expr::Ident(name) => env.load(name),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, env),
            Expr::Unary { op, operand } => {
                let operand = self.eval_expr(operand, env)?;
                let result = match op {
                    UnOp::Neg => arith::neg(operand)?,
                    UnOp::BitNot => arith::not(operand)?,
                    UnOp::Plus => Value::Int(operand.as_int()?),
                };
                Ok(result)
            }
            Expr::Index { target, index } => {
                let base = self.eval_expr(target, env)?;
                let index = self.eval_expr(index, env)?;
                Ok(structural::index(base, index)?)
            }
            Expr::Slice { target, start, end } => {
                let base = self.eval_expr(target, env)?;
                let start = self.eval_expr(start, env)?;
                let end = match end {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::None,
                };
                Ok(structural::slice(base, start, end)?)
            }
            Expr::Attr { target, name } => {
                let base = self.eval_expr(target, env)?;
                Ok(structural::attr(base, name)?)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, env),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        env: &Env,
    ) -> Result<Value, EvalError> {
        // `and`/`or` short-circuit; the right side is untouched when
        // the left decides the answer. The result is always a bool.
        match op {
            BinOp::And => {
                if !self.eval_expr(left, env)?.as_bool() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval_expr(right, env)?.as_bool()));
            }
            BinOp::Or => {
                if self.eval_expr(left, env)?.as_bool() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval_expr(right, env)?.as_bool()));
            }
            _ => {}
        }
        let a = self.eval_expr(left, env)?;
        let b = self.eval_expr(right, env)?;
        let result = match op {
            BinOp::Add => arith::add(a, b)?,
            BinOp::Sub => arith::sub(a, b)?,
            BinOp::Mul => arith::mul(a, b)?,
            BinOp::Div => arith::div(a, b)?,
            BinOp::Mod => arith::modulo(a, b)?,
            BinOp::Eq => arith::eq(a, b),
            BinOp::Ne => arith::ne(a, b),
            BinOp::Lt => arith::lt(a, b)?,
            BinOp::Le => arith::le(a, b)?,
            BinOp::Gt => arith::gt(a, b)?,
            BinOp::Ge => arith::ge(a, b)?,
            BinOp::BitAnd => arith::band(a, b)?,
            BinOp::BitOr => arith::bor(a, b)?,
            BinOp::BitXor => arith::bxor(a, b)?,
            BinOp::Shl => arith::shl(a, b)?,
            BinOp::Shr => arith::shr(a, b)?,
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        };
        Ok(result)
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        env: &Env,
    ) -> Result<Value, EvalError> {
        // Raise forms and builtins are resolved by name before any
        // variable lookup, matching how compiled code binds them.
        if let Expr::Ident(name) = callee {
            if let Some(kind) = raise_kind(name) {
                let message = match args {
                    [] => String::new(),
                    [arg] => self.eval_expr(arg, env)?.to_string(),
                    _ => {
                        return Err(VmError::Type(format!(
                            "{}() expects at most one argument",
                            name
                        ))
                        .into())
                    }
                };
                return Err(VmError::from_kind(kind, message).into());
            }
            if builtins::is_builtin(name) {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, env)?);
                }
                return self.call_builtin(name, &values, env);
            }
        }

        let callee = self.eval_expr(callee, env)?;
        let func = match callee {
            Value::Func(func) => func,
            other => {
                return Err(VmError::Type(format!("{} is not callable", other)).into());
            }
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, env)?);
        }
        self.call_func(&func, values)
    }

    fn call_builtin(
        &mut self,
        name: &str,
        args: &[Value],
        env: &Env,
    ) -> Result<Value, EvalError> {
        let empty = HashMap::new();
        let locals = env.locals.as_ref().unwrap_or(&empty);
        let globals = env.globals.borrow();
        Ok(builtins::call_builtin(name, args, locals, &globals)?)
    }

    fn call_func(&mut self, func: &FuncValue, args: Vec<Value>) -> Result<Value, EvalError> {
        if args.len() != func.params.len() {
            return Err(VmError::Type(format!(
                "proc '{}' expects {} arguments, got {}",
                func.name,
                func.params.len(),
                args.len()
            ))
            .into());
        }
        let mut locals = func.captured.clone();
        for (param, arg) in func.params.iter().zip(args) {
            locals.insert(param.clone(), arg);
        }
        let mut env = Env {
            locals: Some(locals),
            globals: func.globals.clone(),
        };
        match self.exec_block(&func.body, &mut env)? {
            Flow::Return(value) => Ok(value),
            // Falling off the end returns 0, like the implicit RET in
            // compiled code.
            Flow::Normal => Ok(Value::Int(0)),
            Flow::Break => {
                Err(VmError::Syntax("'break' used outside of loop".to_string()).into())
            }
        }
    }

    fn import_module(&mut self, path: &str) -> Result<Value, EvalError> {
        let resolved = {
            let candidate = PathBuf::from(path.replace('\\', "/"));
            if candidate.is_relative() {
                self.base_dir.join(candidate)
            } else {
                candidate
            }
        };
        let canonical = resolved.canonicalize().map_err(|err| {
            EvalError::ModuleImport(format!("cannot import '{}': {}", path, err))
        })?;
        if let Some(cached) = self.modules.get(&canonical) {
            return Ok(cached.clone());
        }
        if self.import_stack.contains(&canonical) {
            return Err(EvalError::ModuleImport(format!(
                "circular import of '{}'",
                path
            )));
        }

        let source = fs::read_to_string(&canonical).map_err(|err| {
            EvalError::ModuleImport(format!("cannot import '{}': {}", path, err))
        })?;
        if !has_header(&source) {
            return Err(EvalError::ModuleImport(format!(
                "'{}' is not a Tarn module (missing '{}' header)",
                path, SOURCE_HEADER
            )));
        }
        let program = parse_source(&source)?;

        let normalized = canonical.display().to_string().replace('\\', "/");
        let dir = match normalized.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        };
        let module_globals = Rc::new(RefCell::new(HashMap::from([
            ("module_file".to_string(), Value::Str(normalized)),
            ("current_dir".to_string(), Value::Str(dir.clone())),
        ])));

        let saved_base = mem::replace(&mut self.base_dir, PathBuf::from(dir));
        self.import_stack.push(canonical.clone());
        let mut env = Env::top_level(module_globals.clone());
        let result = self.exec_block(&program, &mut env);
        self.import_stack.pop();
        self.base_dir = saved_base;
        self.check_top_level_flow(result?)?;

        let namespace = Value::FrozenDict(Rc::new(module_globals.borrow().clone()));
        self.modules.insert(canonical, namespace.clone());
        Ok(namespace)
    }
}

/// Names that raise instead of calling.
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

fn has_header(source: &str) -> bool {
    source.trim_start_matches('\u{feff}').starts_with(SOURCE_HEADER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> String {
        let mut interp = Interpreter::with_output(Vec::new());
        interp.eval_source(source).expect("evaluation failed");
        String::from_utf8(interp.into_output()).unwrap()
    }

    fn run_err(source: &str) -> EvalError {
        let mut interp = Interpreter::with_output(Vec::new());
        interp.eval_source(source).unwrap_err()
    }

    #[test]
    fn emit_and_precedence() {
        assert_eq!(run("emit 1 + 2 * 3"), "7\n");
        assert_eq!(run("emit (1 + 2) * 3"), "9\n");
    }

    #[test]
    fn bare_expressions_echo_non_none_results() {
        assert_eq!(run("1 + 2"), "3\n");
        // Statements and none results stay silent.
        assert_eq!(run("alloc x := 5"), "");
    }

    #[test]
    fn redeclaration_is_rejected() {
        let err = run_err("alloc x := 1\nalloc x := 2");
        assert_eq!(err, EvalError::AlreadyDeclared("x".to_string()));
    }

    #[test]
    fn assignment_requires_declaration() {
        let err = run_err("y := 1");
        assert_eq!(err, EvalError::AssignUndeclared("y".to_string()));
    }

    #[test]
    fn undefined_identifier() {
        let err = run_err("emit nope");
        assert_eq!(
            err,
            EvalError::Runtime(VmError::UndefinedIdent("nope".to_string()))
        );
    }

    #[test]
    fn procs_can_assign_module_globals() {
        let source = "\
alloc count := 0
proc bump() {
  count := count + 1
  return count
}
alloc first := bump()
emit bump()";
        assert_eq!(run(source), "2\n");
    }

    #[test]
    fn locals_shadow_globals() {
        let source = "\
alloc x := 1
proc f() {
  alloc x := 10
  return x
}
emit f()
emit x";
        assert_eq!(run(source), "10\n1\n");
    }

    #[test]
    fn short_circuit_skips_the_right_side() {
        let source = "\
alloc hits := 0
proc touch() {
  hits := hits + 1
  return true
}
emit false and touch()
emit true or touch()
emit hits";
        assert_eq!(run(source), "false\ntrue\n0\n");
    }

    #[test]
    fn nested_proc_captures_enclosing_locals() {
        let source = "\
proc outer(n) {
  proc inner() {
    return n * 2
  }
  return inner()
}
emit outer(21)";
        assert_eq!(run(source), "42\n");
    }

    #[test]
    fn recursion() {
        let source = "\
proc fact(n) {
  if n <= 1 {
    return 1
  }
  return n * fact(n - 1)
}
emit fact(6)";
        assert_eq!(run(source), "720\n");
    }

    #[test]
    fn falling_off_a_proc_returns_zero_and_bare_return_none() {
        assert_eq!(run("proc f() {\n}\nemit f() + 1"), "1\n");
        assert_eq!(run("proc g() {\n  return\n}\nemit g()"), "\n");
    }

    #[test]
    fn loop_with_break_runs_three_times() {
        let source = "\
alloc i := 0
loop true {
  i := i + 1
  if i == 3 {
    break
  }
}
emit i";
        assert_eq!(run(source), "3\n");
    }

    #[test]
    fn elif_chain_picks_one_branch() {
        let source = "\
proc label(n) {
  if n < 0 {
    return \"neg\"
  } elif n == 0 {
    return \"zero\"
  } else {
    return \"pos\"
  }
}
emit label(0 - 5)
emit label(0)
emit label(5)";
        assert_eq!(run(source), "neg\nzero\npos\n");
    }

    #[test]
    fn try_except_binds_the_message() {
        let source = "\
try {
  emit 1 / 0
} except (e) {
  emit e
}";
        assert_eq!(
            run(source),
            "ZeroDivisionError: integer division or modulo by zero\n"
        );
    }

    #[test]
    fn try_without_error_skips_the_handler() {
        let source = "\
try {
  emit \"ok\"
} except (e) {
  emit \"handler\"
}";
        assert_eq!(run(source), "ok\n");
    }

    #[test]
    fn raise_forms_are_catchable() {
        assert_eq!(
            run("try {\n  panic(\"boom\")\n} except (e) {\n  emit e\n}"),
            "RuntimeError: boom\n"
        );
        assert_eq!(
            run("try {\n  _tarn_vm_type_error_handle(\"bad\")\n} except (e) {\n  emit e\n}"),
            "TypeError: bad\n"
        );
        // Without a handler the error propagates.
        assert_eq!(
            run_err("panic(\"boom\")"),
            EvalError::Runtime(VmError::Raised("boom".to_string()))
        );
    }

    #[test]
    fn facts_raises_on_false() {
        assert_eq!(run_err("facts 1 == 2"), EvalError::Runtime(VmError::Assertion));
        assert_eq!(run("facts 1 == 1\nemit \"after\""), "after\n");
    }

    #[test]
    fn builtins_dispatch_by_name() {
        assert_eq!(run("emit length([1, 2, 3])"), "3\n");
        assert_eq!(run("emit hex(255)"), "ff\n");
    }

    #[test]
    fn state_persists_across_eval_calls() {
        let mut interp = Interpreter::with_output(Vec::new());
        interp.eval_source("alloc x := 40").unwrap();
        interp.eval_source("emit x + 2").unwrap();
        assert_eq!(String::from_utf8(interp.into_output()).unwrap(), "42\n");
    }

    #[test]
    fn lists_alias_across_bindings() {
        let source = "\
alloc a := [1]
alloc b := a
b[1] := 2
emit a";
        assert_eq!(run(source), "[1, 2]\n");
    }

    #[test]
    fn imports_expose_a_frozen_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().join("lib.tarn");
        fs::write(
            &module_path,
            ";;;tarn\nalloc answer := 42\nproc double(n) {\n  return n * 2\n}\n",
        )
        .unwrap();
        let main_path = dir.path().join("main.tarn");
        fs::write(
            &main_path,
            ";;;tarn\nimport \"lib.tarn\" as lib\nemit lib.answer\nemit lib.double(21)\n",
        )
        .unwrap();

        let mut interp = Interpreter::with_output(Vec::new());
        interp.run_file(&main_path, &[]).unwrap();
        assert_eq!(
            String::from_utf8(interp.into_output()).unwrap(),
            "42\n42\n"
        );
    }

    #[test]
    fn imported_modules_are_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().join("lib.tarn");
        fs::write(&module_path, ";;;tarn\nalloc answer := 42\n").unwrap();
        let main_path = dir.path().join("main.tarn");
        fs::write(
            &main_path,
            ";;;tarn\nimport \"lib.tarn\" as lib\nlib.answer := 0\n",
        )
        .unwrap();

        let mut interp = Interpreter::with_output(Vec::new());
        let err = interp.run_file(&main_path, &[]).unwrap_err();
        assert_eq!(err, EvalError::Runtime(VmError::FrozenWrite));
    }

    #[test]
    fn import_without_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().join("plain.tarn");
        fs::write(&module_path, "alloc x := 1\n").unwrap();
        let main_path = dir.path().join("main.tarn");
        fs::write(
            &main_path,
            ";;;tarn\nimport \"plain.tarn\" as plain\n",
        )
        .unwrap();

        let mut interp = Interpreter::with_output(Vec::new());
        assert!(matches!(
            interp.run_file(&main_path, &[]).unwrap_err(),
            EvalError::ModuleImport(_)
        ));
    }

    #[test]
    fn script_args_are_visible() {
        let dir = tempfile::tempdir().unwrap();
        let main_path = dir.path().join("main.tarn");
        fs::write(&main_path, ";;;tarn\nemit args[1]\n").unwrap();

        let mut interp = Interpreter::with_output(Vec::new());
        interp.run_file(&main_path, &["hello".to_string()]).unwrap();
        assert_eq!(String::from_utf8(interp.into_output()).unwrap(), "hello\n");
    }
}
