//! Tarn command-line tool.
//!
//! `tarn compile`, `tarn disasm`, `tarn verify`, and `tarn run` cover
//! the bytecode pipeline; invoking `tarn` without a subcommand starts
//! the interactive REPL.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tarn")]
#[command(about = "Tarn programming language toolchain", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a Tarn script to bytecode (.tarnb)
    Compile {
        /// Input file
        input: PathBuf,
        /// Output path (defaults to the input with a .tarnb extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Disassemble a compiled program
    Disasm {
        /// Compiled input file
        input: PathBuf,
        /// First byte of the listing to print
        #[arg(long)]
        start: Option<usize>,
        /// One past the last byte of the listing to print
        #[arg(long)]
        end: Option<usize>,
    },

    /// Verify a compiled program
    Verify {
        /// Compiled input file
        input: PathBuf,
    },

    /// Run a script (.tarn) or compiled program (.tarnb)
    Run {
        /// Input file
        input: PathBuf,
        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Compile { input, output }) => {
            commands::compile::execute(&input, output.as_deref())
        }
        Some(Commands::Disasm { input, start, end }) => {
            commands::disasm::execute(&input, start, end)
        }
        Some(Commands::Verify { input }) => commands::verify::execute(&input),
        Some(Commands::Run { input, args }) => commands::run::execute(&input, &args),
        None => commands::repl::execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_repl() {
        let cli = Cli::try_parse_from(["tarn"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn run_collects_trailing_args() {
        let cli = Cli::try_parse_from(["tarn", "run", "prog.tarn", "--", "a", "b"]).unwrap();
        match cli.command {
            Some(Commands::Run { input, args }) => {
                assert_eq!(input, PathBuf::from("prog.tarn"));
                assert_eq!(args, vec!["a".to_string(), "b".to_string()]);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn disasm_accepts_a_range() {
        let cli =
            Cli::try_parse_from(["tarn", "disasm", "prog.tarnb", "--start", "10", "--end", "90"])
                .unwrap();
        match cli.command {
            Some(Commands::Disasm { start, end, .. }) => {
                assert_eq!(start, Some(10));
                assert_eq!(end, Some(90));
            }
            _ => panic!("expected disasm subcommand"),
        }
    }
}
