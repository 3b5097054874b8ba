//! `tarn run` — execute a program.
//!
//! `.tarnb` files run on the bytecode VM; anything else is treated as
//! source and handed to the evaluator, which also resolves imports.

use std::fs;
use std::path::Path;

use anyhow::Context;

use tarn_bytecode::Program;
use tarn_runtime::{Interpreter, Vm};

pub fn execute(input: &Path, args: &[String]) -> anyhow::Result<()> {
    if input.extension().and_then(|ext| ext.to_str()) == Some("tarnb") {
        let data =
            fs::read(input).with_context(|| format!("cannot read '{}'", input.display()))?;
        let program = Program::decode(&data)?;

        let mut vm_args = vec![input.display().to_string()];
        vm_args.extend(args.iter().cloned());
        let mut vm = Vm::new();
        vm.run(&program, &vm_args)?;
    } else {
        let mut interp = Interpreter::new();
        interp.run_file(input, args)?;
    }
    Ok(())
}
