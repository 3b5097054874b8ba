//! `tarn compile` — compile a script to its binary form.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

pub fn execute(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("cannot read '{}'", input.display()))?;
    let ast = tarn_parser::parse_source(&source)?;
    let program = tarn_compiler::compile(&ast)?;

    let out_path = match output {
        Some(path) => path.to_path_buf(),
        None => default_output(input),
    };
    fs::write(&out_path, program.encode())
        .with_context(|| format!("cannot write '{}'", out_path.display()))?;
    println!("Compiled {} -> {}", input.display(), out_path.display());
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("tarnb")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_swaps_the_extension() {
        assert_eq!(
            default_output(Path::new("dir/prog.tarn")),
            PathBuf::from("dir/prog.tarnb")
        );
        assert_eq!(default_output(Path::new("bare")), PathBuf::from("bare.tarnb"));
    }

    #[test]
    fn compile_writes_a_verifiable_binary() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("hello.tarn");
        fs::write(&input, ";;;tarn\nemit \"hi\"\n").unwrap();

        execute(&input, None).unwrap();

        let bytes = fs::read(dir.path().join("hello.tarnb")).unwrap();
        tarn_bytecode::verify(&bytes).unwrap();
    }
}
