//! `tarn verify` — structural validation of a compiled program.

use std::fs;
use std::path::Path;

use anyhow::Context;

pub fn execute(input: &Path) -> anyhow::Result<()> {
    let data = fs::read(input).with_context(|| format!("cannot read '{}'", input.display()))?;
    tarn_bytecode::verify(&data)?;
    println!("OK");
    Ok(())
}
