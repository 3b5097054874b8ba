pub mod compile;
pub mod disasm;
pub mod repl;
pub mod run;
pub mod verify;
