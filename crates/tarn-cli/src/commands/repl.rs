//! Interactive REPL.
//!
//! A persistent evaluation session with line editing and history.
//! Declarations survive across inputs; a line with unbalanced brackets
//! switches to a continuation prompt until the input closes.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use tarn_runtime::Interpreter;

const PROMPT: &str = "tarn> ";
const CONTINUATION_PROMPT: &str = "  ... ";

pub fn execute() -> anyhow::Result<()> {
    let mut interp = Interpreter::new();
    let mut editor = DefaultEditor::new()?;

    let history_path = dirs::home_dir().map(|home| home.join(".tarn").join("history"));
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    println!("Tarn v{} REPL", env!("CARGO_PKG_VERSION"));
    println!("Ctrl-C cancels the line, Ctrl-D exits\n");

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };

        match editor.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim().is_empty() {
                    continue;
                }
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                if is_incomplete(&buffer) {
                    continue;
                }

                let source = std::mem::take(&mut buffer);
                let _ = editor.add_history_entry(&source);
                if let Err(err) = interp.eval_source(&source) {
                    eprintln!("{}", err);
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    if let Some(path) = &history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(path);
    }
    Ok(())
}

/// Whether the buffer still has open brackets outside string literals.
fn is_incomplete(source: &str) -> bool {
    let mut depth = 0_i64;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;
    for ch in source.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '#' => in_comment = true,
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            _ => {}
        }
    }
    depth > 0 || in_string
}
