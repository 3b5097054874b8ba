//! Stack-machine interpreter for compiled Tarn programs.
//!
//! Execution model:
//! - an operand stack of [`Value`]s,
//! - a global table plus a current local frame backed by a frame stack,
//! - a return-address stack for `CALL`/`CALL_VALUE`,
//! - a block stack of exception handlers installed by `SETUP_EXCEPT`.
//!
//! Each step either completes and advances the program counter (jumps
//! and calls manage it themselves) or produces a [`VmError`]. An error
//! unwinds to the innermost handler block, restoring the recorded stack
//! and frame depths and pushing the error message string; with no
//! handler the run aborts with the error.

use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::path::PathBuf;

use tarn_bytecode::{Function, Instr, Program};

use crate::builtins;
use crate::error::VmError;
use crate::value::Value;

pub(crate) mod arith;
pub(crate) mod structural;

/// Exception-handler frame pushed by `SETUP_EXCEPT`.
struct Block {
    handler: usize,
    stack_size: usize,
    env_depth: usize,
    ret_depth: usize,
}

/// The virtual machine. `EMIT` output goes to the writer, which makes
/// program output observable in tests.
pub struct Vm<W: Write> {
    stack: Vec<Value>,
    globals: HashMap<String, Value>,
    env: HashMap<String, Value>,
    env_stack: Vec<HashMap<String, Value>>,
    ret_stack: Vec<usize>,
    block_stack: Vec<Block>,
    pc: usize,
    output: W,
}

impl Vm<io::Stdout> {
    /// A VM that prints to stdout.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Vm<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Vm<W> {
    pub fn with_output(output: W) -> Self {
        Vm {
            stack: Vec::new(),
            globals: HashMap::new(),
            env: HashMap::new(),
            env_stack: Vec::new(),
            ret_stack: Vec::new(),
            block_stack: Vec::new(),
            pc: 0,
            output,
        }
    }

    /// Consumes the VM and returns its output writer.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Executes a program to completion.
    ///
    /// `args` become the program's `args` global; the first argument,
    /// when present, also seeds `module_file` and `current_dir`.
    pub fn run(&mut self, program: &Program, args: &[String]) -> Result<(), VmError> {
        let code = &program.instructions;
        let funcs: HashMap<&str, &Function> = program
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();

        self.install_globals(args);
        self.pc = 0;

        while self.pc < code.len() {
            let mut advance = true;
            match self.step(&code[self.pc], code.len(), &funcs, &mut advance) {
                Ok(()) => {
                    if advance {
                        self.pc += 1;
                    }
                }
                Err(err) => {
                    self.unwind(err)?;
                }
            }
        }
        Ok(())
    }

    fn install_globals(&mut self, args: &[String]) {
        let arg_values: Vec<Value> = args.iter().map(|s| Value::Str(s.clone())).collect();
        self.globals
            .insert("args".to_string(), Value::list(arg_values));

        if let Some(first) = args.first() {
            let path = PathBuf::from(first.replace('\\', "/"));
            self.globals.insert(
                "module_file".to_string(),
                Value::Str(path.to_string_lossy().replace('\\', "/")),
            );
            let current_dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|| ".".to_string());
            self.globals
                .insert("current_dir".to_string(), Value::Str(current_dir));
        } else {
            self.globals
                .insert("module_file".to_string(), Value::Str("<stdin>".to_string()));
            self.globals
                .insert("current_dir".to_string(), Value::Str(".".to_string()));
        }
    }

    fn pop(&mut self) -> Result<Value, VmError> {
        self.stack
            .pop()
            .ok_or_else(|| VmError::Invariant("stack underflow".to_string()))
    }

    fn step(
        &mut self,
        instr: &Instr,
        code_len: usize,
        funcs: &HashMap<&str, &Function>,
        advance: &mut bool,
    ) -> Result<(), VmError> {
        match instr {
            Instr::PushInt(v) => self.stack.push(Value::Int(*v)),
            Instr::PushStr(s) => self.stack.push(Value::Str(s.clone())),
            Instr::PushBool(b) => self.stack.push(Value::Bool(*b)),
            Instr::PushNone => self.stack.push(Value::None),

            Instr::BuildList(n) => {
                let mut elements = Vec::with_capacity(*n as usize);
                for _ in 0..*n {
                    elements.push(self.pop()?);
                }
                elements.reverse();
                self.stack.push(Value::list(elements));
            }
            Instr::BuildDict(n) => {
                let mut map = HashMap::with_capacity(*n as usize);
                for _ in 0..*n {
                    let value = self.pop()?;
                    let key = self.pop()?.to_string();
                    map.insert(key, value);
                }
                self.stack.push(Value::dict(map));
            }

            Instr::Load(name) => {
                let value = self
                    .env
                    .get(name)
                    .or_else(|| self.globals.get(name))
                    .cloned()
                    .ok_or_else(|| VmError::UndefinedIdent(name.clone()))?;
                self.stack.push(value);
            }
            Instr::Store(name) => {
                // Store precedence: top level writes globals; inside a
                // frame an existing local wins, then an existing
                // global, then a fresh local is created.
                let value = self.pop()?;
                if self.env_stack.is_empty() {
                    self.globals.insert(name.clone(), value);
                } else if self.env.contains_key(name) {
                    self.env.insert(name.clone(), value);
                } else if self.globals.contains_key(name) {
                    self.globals.insert(name.clone(), value);
                } else {
                    self.env.insert(name.clone(), value);
                }
            }

            Instr::Add => self.binary(arith::add)?,
            Instr::Sub => self.binary(arith::sub)?,
            Instr::Mul => self.binary(arith::mul)?,
            Instr::Div => self.binary(arith::div)?,
            Instr::Mod => self.binary(arith::modulo)?,
            Instr::Eq => self.binary(|a, b| Ok(arith::eq(a, b)))?,
            Instr::Ne => self.binary(|a, b| Ok(arith::ne(a, b)))?,
            Instr::Lt => self.binary(arith::lt)?,
            Instr::Le => self.binary(arith::le)?,
            Instr::Gt => self.binary(arith::gt)?,
            Instr::Ge => self.binary(arith::ge)?,
            Instr::BitAnd => self.binary(arith::band)?,
            Instr::BitOr => self.binary(arith::bor)?,
            Instr::BitXor => self.binary(arith::bxor)?,
            Instr::Shl => self.binary(arith::shl)?,
            Instr::Shr => self.binary(arith::shr)?,
            Instr::And => self.binary(|a, b| Ok(arith::and(a, b)))?,
            Instr::Or => self.binary(|a, b| Ok(arith::or(a, b)))?,
            Instr::Not => {
                let v = self.pop()?;
                self.stack.push(arith::not(v)?);
            }
            Instr::Neg => {
                let v = self.pop()?;
                self.stack.push(arith::neg(v)?);
            }

            Instr::Index => {
                let idx = self.pop()?;
                let base = self.pop()?;
                self.stack.push(structural::index(base, idx)?);
            }
            Instr::Slice => {
                let end = self.pop()?;
                let start = self.pop()?;
                let base = self.pop()?;
                self.stack.push(structural::slice(base, start, end)?);
            }
            Instr::StoreIndex => {
                let value = self.pop()?;
                let idx = self.pop()?;
                let base = self.pop()?;
                structural::store_index(base, idx, value)?;
            }
            Instr::Attr(name) => {
                let base = self.pop()?;
                self.stack.push(structural::attr(base, name)?);
            }
            Instr::StoreAttr(name) => {
                let value = self.pop()?;
                let base = self.pop()?;
                structural::store_attr(base, name, value)?;
            }

            Instr::Jump(target) => {
                self.pc = *target as usize;
                *advance = false;
            }
            Instr::JumpIfFalse(target) => {
                if !self.pop()?.as_bool() {
                    self.pc = *target as usize;
                    *advance = false;
                }
            }

            Instr::Call(name) => {
                let func = lookup(funcs, name)?;
                let env = self.bind_params(func)?;
                self.env_stack.push(mem::take(&mut self.env));
                self.ret_stack.push(self.pc + 1);
                self.env = env;
                self.pc = func.address as usize;
                *advance = false;
            }
            Instr::TailCall(name) => {
                // Reuses the current frame: no env or return-address
                // growth, which is what bounds recursion depth.
                let func = lookup(funcs, name)?;
                self.env = self.bind_params(func)?;
                self.pc = func.address as usize;
                *advance = false;
            }
            Instr::CallValue(argc) => {
                let mut args = Vec::with_capacity(*argc as usize);
                for _ in 0..*argc {
                    args.push(self.pop()?);
                }
                args.reverse();
                let callee = self.pop()?;
                let name = match callee {
                    Value::Str(name) => name,
                    _ => {
                        return Err(VmError::Type(
                            "Call value expects function name".to_string(),
                        ))
                    }
                };
                let func = lookup(funcs, &name)?;
                let mut env = HashMap::new();
                for param in func.params.iter().rev() {
                    let arg = args.pop().ok_or_else(|| {
                        VmError::Invariant("argument count mismatch".to_string())
                    })?;
                    env.insert(param.clone(), arg);
                }
                self.env_stack.push(mem::take(&mut self.env));
                self.ret_stack.push(self.pc + 1);
                self.env = env;
                self.pc = func.address as usize;
                *advance = false;
            }
            Instr::CallBuiltin(name, argc) => {
                let mut args = Vec::with_capacity(*argc as usize);
                for _ in 0..*argc {
                    args.push(self.pop()?);
                }
                args.reverse();
                let result = builtins::call_builtin(name, &args, &self.env, &self.globals)?;
                self.stack.push(result);
            }
            Instr::Ret => {
                let ret_val = self.stack.pop().unwrap_or(Value::Int(0));
                self.pc = self
                    .ret_stack
                    .pop()
                    .ok_or_else(|| VmError::Invariant("return without call".to_string()))?;
                self.env = self
                    .env_stack
                    .pop()
                    .ok_or_else(|| VmError::Invariant("return without frame".to_string()))?;
                self.stack.push(ret_val);
                *advance = false;
            }

            Instr::Pop => {
                self.stack.pop();
            }
            Instr::Emit => {
                if let Some(v) = self.stack.pop() {
                    writeln!(self.output, "{}", v)
                        .map_err(|e| VmError::Invariant(e.to_string()))?;
                }
            }
            Instr::Assert => {
                if !self.pop()?.as_bool() {
                    return Err(VmError::Assertion);
                }
            }
            Instr::Halt => {
                self.pc = code_len;
                *advance = false;
            }

            Instr::SetupExcept(target) => {
                self.block_stack.push(Block {
                    handler: *target as usize,
                    stack_size: self.stack.len(),
                    env_depth: self.env_stack.len(),
                    ret_depth: self.ret_stack.len(),
                });
            }
            Instr::PopBlock => {
                self.block_stack.pop();
            }
            Instr::Raise(kind) => {
                let message = self.pop()?.to_string();
                return Err(VmError::from_kind(*kind, message));
            }
        }
        Ok(())
    }

    fn binary(
        &mut self,
        op: impl FnOnce(Value, Value) -> Result<Value, VmError>,
    ) -> Result<(), VmError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.stack.push(op(a, b)?);
        Ok(())
    }

    fn bind_params(&mut self, func: &Function) -> Result<HashMap<String, Value>, VmError> {
        let mut env = HashMap::new();
        for param in func.params.iter().rev() {
            env.insert(param.clone(), self.pop()?);
        }
        Ok(env)
    }

    /// Unwinds a raised error to the innermost handler block, or
    /// returns it if none is installed.
    fn unwind(&mut self, err: VmError) -> Result<(), VmError> {
        match self.block_stack.pop() {
            Some(block) => {
                while self.env_stack.len() > block.env_depth {
                    self.env = self.env_stack.pop().unwrap();
                }
                self.ret_stack.truncate(block.ret_depth);
                self.stack.truncate(block.stack_size);
                self.pc = block.handler;
                self.stack.push(Value::Str(err.to_string()));
                Ok(())
            }
            None => Err(err),
        }
    }
}

fn lookup<'a>(
    funcs: &HashMap<&str, &'a Function>,
    name: &str,
) -> Result<&'a Function, VmError> {
    funcs
        .get(name)
        .copied()
        .ok_or_else(|| VmError::UndefinedIdent(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_instrs(instructions: Vec<Instr>, functions: Vec<Function>) -> (String, Result<(), VmError>) {
        let mut program = Program::new();
        program.instructions = instructions;
        program.functions = functions;
        let mut vm = Vm::with_output(Vec::new());
        let result = vm.run(&program, &[]);
        (String::from_utf8(vm.into_output()).unwrap(), result)
    }

    #[test]
    fn emit_prints_display_form() {
        let (out, result) = run_instrs(
            vec![
                Instr::PushInt(1),
                Instr::PushInt(2),
                Instr::Add,
                Instr::Emit,
                Instr::Halt,
            ],
            vec![],
        );
        result.unwrap();
        assert_eq!(out, "3\n");
    }

    #[test]
    fn store_at_top_level_writes_globals() {
        let (out, result) = run_instrs(
            vec![
                Instr::PushInt(7),
                Instr::Store("x".to_string()),
                Instr::Load("x".to_string()),
                Instr::Emit,
                Instr::Halt,
            ],
            vec![],
        );
        result.unwrap();
        assert_eq!(out, "7\n");
    }

    #[test]
    fn load_of_unknown_name_is_an_error() {
        let (_, result) = run_instrs(vec![Instr::Load("ghost".to_string()), Instr::Halt], vec![]);
        assert_eq!(
            result.unwrap_err(),
            VmError::UndefinedIdent("ghost".to_string())
        );
    }

    #[test]
    fn call_and_ret_round_trip() {
        // emit double(21)
        let (out, result) = run_instrs(
            vec![
                Instr::PushInt(21),
                Instr::Call("double".to_string()),
                Instr::Emit,
                Instr::Halt,
                // double(n): return n * 2
                Instr::Load("n".to_string()),
                Instr::PushInt(2),
                Instr::Mul,
                Instr::Ret,
            ],
            vec![Function {
                name: "double".to_string(),
                params: vec!["n".to_string()],
                address: 4,
            }],
        );
        result.unwrap();
        assert_eq!(out, "42\n");
    }

    #[test]
    fn ret_with_empty_stack_returns_zero() {
        let (out, result) = run_instrs(
            vec![
                Instr::Call("nothing".to_string()),
                Instr::Emit,
                Instr::Halt,
                Instr::Ret,
            ],
            vec![Function {
                name: "nothing".to_string(),
                params: vec![],
                address: 3,
            }],
        );
        result.unwrap();
        assert_eq!(out, "0\n");
    }

    #[test]
    fn tail_call_does_not_grow_frames() {
        // countdown(n): if n == 0 { return 0 } return countdown(n - 1)
        // A depth impossible with real frames on CALL proves TCALL
        // reuses the frame.
        let (out, result) = run_instrs(
            vec![
                Instr::PushInt(500_000),
                Instr::Call("countdown".to_string()),
                Instr::Emit,
                Instr::Halt,
                // countdown:
                Instr::Load("n".to_string()),
                Instr::PushInt(0),
                Instr::Eq,
                Instr::JumpIfFalse(10),
                Instr::PushInt(0),
                Instr::Ret,
                Instr::Load("n".to_string()),
                Instr::PushInt(1),
                Instr::Sub,
                Instr::TailCall("countdown".to_string()),
            ],
            vec![Function {
                name: "countdown".to_string(),
                params: vec!["n".to_string()],
                address: 4,
            }],
        );
        result.unwrap();
        assert_eq!(out, "0\n");
    }

    #[test]
    fn call_value_dispatches_by_name_string() {
        let (out, result) = run_instrs(
            vec![
                Instr::PushStr("double".to_string()),
                Instr::PushInt(5),
                Instr::CallValue(1),
                Instr::Emit,
                Instr::Halt,
                Instr::Load("n".to_string()),
                Instr::PushInt(2),
                Instr::Mul,
                Instr::Ret,
            ],
            vec![Function {
                name: "double".to_string(),
                params: vec!["n".to_string()],
                address: 5,
            }],
        );
        result.unwrap();
        assert_eq!(out, "10\n");
    }

    #[test]
    fn raise_with_handler_unwinds_and_binds_message() {
        let (out, result) = run_instrs(
            vec![
                Instr::SetupExcept(5),
                Instr::PushStr("boom".to_string()),
                Instr::Raise(tarn_bytecode::ErrorKind::Generic),
                Instr::PopBlock,
                Instr::Jump(7),
                Instr::Store("e".to_string()),
                Instr::Jump(7),
                Instr::Load("e".to_string()),
                Instr::Emit,
                Instr::Halt,
            ],
            vec![],
        );
        result.unwrap();
        assert_eq!(out, "RuntimeError: boom\n");
    }

    #[test]
    fn raise_without_handler_aborts() {
        let (_, result) = run_instrs(
            vec![
                Instr::PushStr("fatal".to_string()),
                Instr::Raise(tarn_bytecode::ErrorKind::Value),
                Instr::Halt,
            ],
            vec![],
        );
        assert_eq!(result.unwrap_err(), VmError::Value("fatal".to_string()));
    }

    #[test]
    fn handler_restores_operand_stack_depth() {
        let (out, result) = run_instrs(
            vec![
                Instr::PushInt(9),           // survives the unwind
                Instr::SetupExcept(6),
                Instr::PushInt(1),           // truncated by the unwind
                Instr::PushInt(0),
                Instr::Div,                  // ZeroDivisionError
                Instr::Halt,                 // skipped
                Instr::Pop,                  // drop the error message
                Instr::Emit,                 // prints the surviving 9
                Instr::Halt,
            ],
            vec![],
        );
        result.unwrap();
        assert_eq!(out, "9\n");
    }

    #[test]
    fn assert_failure_message() {
        let (_, result) = run_instrs(
            vec![Instr::PushBool(false), Instr::Assert, Instr::Halt],
            vec![],
        );
        assert_eq!(
            result.unwrap_err().to_string(),
            "AssertionError: assertion failed"
        );
    }

    #[test]
    fn eager_and_or_opcodes_still_execute() {
        let (out, result) = run_instrs(
            vec![
                Instr::PushBool(true),
                Instr::PushInt(0),
                Instr::And,
                Instr::Emit,
                Instr::PushBool(false),
                Instr::PushStr("x".to_string()),
                Instr::Or,
                Instr::Emit,
                Instr::Halt,
            ],
            vec![],
        );
        result.unwrap();
        assert_eq!(out, "false\ntrue\n");
    }

    #[test]
    fn args_global_is_installed() {
        let mut program = Program::new();
        program.instructions = vec![
            Instr::Load("args".to_string()),
            Instr::Emit,
            Instr::Load("current_dir".to_string()),
            Instr::Emit,
            Instr::Halt,
        ];
        let mut vm = Vm::with_output(Vec::new());
        vm.run(&program, &["dir/prog.tarnb".to_string(), "x".to_string()])
            .unwrap();
        let out = String::from_utf8(vm.into_output()).unwrap();
        assert_eq!(out, "[dir/prog.tarnb, x]\ndir\n");
    }
}
