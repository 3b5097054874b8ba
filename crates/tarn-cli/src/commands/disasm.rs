//! `tarn disasm` — print the textual listing of a compiled program.
//!
//! `--start`/`--end` select a byte range of the listing, which keeps
//! large programs inspectable without dumping everything.

use std::fs;
use std::path::Path;

use anyhow::Context;

pub fn execute(input: &Path, start: Option<usize>, end: Option<usize>) -> anyhow::Result<()> {
    let data = fs::read(input).with_context(|| format!("cannot read '{}'", input.display()))?;
    let listing = tarn_bytecode::disassemble(&data)?;

    let from = start.unwrap_or(0).min(listing.len());
    let to = end.unwrap_or(listing.len()).min(listing.len());
    anyhow::ensure!(from <= to, "--start must not exceed --end");

    // Range ends may fall inside a multi-byte string operand.
    let slice = String::from_utf8_lossy(&listing.as_bytes()[from..to]);
    println!("{}", slice);
    Ok(())
}
