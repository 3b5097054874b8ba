//! The builtin function library.
//!
//! Builtins are pure with respect to the VM: they receive evaluated
//! argument values plus the current environments (for `current_dir`
//! path resolution) and return a value or a [`VmError`]. The same
//! dispatcher backs the compiled `BUILTIN` instruction and builtin
//! calls in the tree-walking evaluator.
//!
//! File-descriptor I/O uses a process-local table of integer handles.
//! `file_open` modes: `r`/`w`/`a` are text (strings), `rb`/`wb`/`ab`
//! are binary (lists of byte integers 0-255).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::VmError;
use crate::value::Value;

/// Names the dispatcher recognizes.
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

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

struct FileEntry {
    file: fs::File,
    binary: bool,
}

static FILE_HANDLES: Lazy<Mutex<HashMap<i32, FileEntry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static NEXT_FD: AtomicI32 = AtomicI32::new(0);

/// Resolves a user path against `current_dir` from the environments.
/// Backslashes are normalized to forward slashes.
fn resolve_path(
    path: &str,
    env: &HashMap<String, Value>,
    globals: &HashMap<String, Value>,
) -> PathBuf {
    let mut resolved = PathBuf::from(path.replace('\\', "/"));
    if resolved.is_relative() {
        if let Some(Value::Str(cur)) = env
            .get("current_dir")
            .or_else(|| globals.get("current_dir"))
        {
            resolved = PathBuf::from(cur.replace('\\', "/")).join(resolved);
        }
    }
    resolved
}

/// Dispatches a builtin by name.
pub fn call_builtin(
    name: &str,
    args: &[Value],
    env: &HashMap<String, Value>,
    globals: &HashMap<String, Value>,
) -> Result<Value, VmError> {
    match name {
        "chr" => match args {
            [Value::Int(i)] => Ok(Value::Str((*i as u8 as char).to_string())),
            _ => Err(VmError::Type("chr() expects one integer".to_string())),
        },

        "ascii" => match args {
            [Value::Str(s)] if s.chars().count() == 1 => {
                Ok(Value::Int(s.chars().next().unwrap() as i64))
            }
            _ => Err(VmError::Type(
                "ascii() expects a single character (arity mismatch)".to_string(),
            )),
        },

        "hex" => match args {
            [Value::Int(i)] => Ok(Value::Str(format!("{:x}", i))),
            _ => Err(VmError::Type(
                "hex() expects one integer (arity mismatch)".to_string(),
            )),
        },

        "binary" => match args {
            [Value::Int(n)] => Ok(Value::Str(format!("{:b}", n))),
            [Value::Int(n), Value::Int(width)] => {
                if *width <= 0 {
                    return Err(VmError::Value("binary() width must be positive".to_string()));
                }
                // Mask to the requested width, then zero-pad.
                let mask = (1_i64 << width) - 1;
                Ok(Value::Str(format!(
                    "{:0width$b}",
                    n & mask,
                    width = *width as usize
                )))
            }
            _ => Err(VmError::Type(
                "binary() expects one or two integers (arity mismatch)".to_string(),
            )),
        },

        "length" => match args {
            [Value::List(list)] => Ok(Value::Int(list.borrow().len() as i64)),
            [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
            [Value::Dict(map)] => Ok(Value::Int(map.borrow().len() as i64)),
            [Value::FrozenDict(map)] => Ok(Value::Int(map.len() as i64)),
            [_] => Err(VmError::Type(
                "length() expects list or string (type mismatch)".to_string(),
            )),
            _ => Err(VmError::Type(
                "length() expects one positional argument (arity mismatch)".to_string(),
            )),
        },

        "freeze" => match args {
            [Value::Dict(map)] => Ok(Value::FrozenDict(Rc::new(map.borrow().clone()))),
            [Value::FrozenDict(map)] => Ok(Value::FrozenDict(map.clone())),
            _ => Err(VmError::Type(
                "freeze() expects a dict (type mismatch)".to_string(),
            )),
        },

        // Reachable through call_builtin() dynamic dispatch; direct
        // calls are intercepted by the compiler as RAISE.
        "panic" | "raise" => match args {
            [Value::Str(msg)] => Err(VmError::Raised(msg.clone())),
            _ => Err(VmError::Type(format!("{}() expects a string", name))),
        },

        "read_file" => match args {
            [Value::Str(path)] => {
                let path = resolve_path(path, env, globals);
                fs::read_to_string(&path).map(Value::Str).map_err(|err| {
                    VmError::ModuleImport(format!(
                        "failed to read '{}': {}",
                        path.display(),
                        err
                    ))
                })
            }
            _ => Err(VmError::Type("read_file() expects a file path".to_string())),
        },

        "write_file" => match args {
            [Value::Str(path), Value::Str(data)] => {
                let path = resolve_path(path, env, globals);
                fs::write(&path, data).map_err(|err| {
                    VmError::Value(format!("cannot write '{}': {}", path.display(), err))
                })?;
                Ok(Value::Int(data.len() as i64))
            }
            _ => Err(VmError::Type(
                "write_file() expects a path and a string".to_string(),
            )),
        },

        "file_open" => match args {
            [Value::Str(path), Value::Str(mode)] => {
                let path = resolve_path(path, env, globals);
                let mut opts = OpenOptions::new();
                let binary = mode.contains('b');
                match mode.as_str() {
                    "r" | "rb" => {
                        opts.read(true);
                    }
                    "w" | "wb" => {
                        opts.write(true).create(true).truncate(true);
                    }
                    "a" | "ab" => {
                        opts.write(true).create(true).append(true);
                    }
                    _ => return Err(VmError::Value("invalid file mode".to_string())),
                }
                let file = opts.open(&path).map_err(|err| {
                    VmError::Value(format!("cannot open '{}': {}", path.display(), err))
                })?;
                let handle = NEXT_FD.fetch_add(1, Ordering::SeqCst);
                FILE_HANDLES
                    .lock()
                    .unwrap()
                    .insert(handle, FileEntry { file, binary });
                Ok(Value::Int(handle as i64))
            }
            _ => Err(VmError::Type(
                "file_open() expects path and mode".to_string(),
            )),
        },

        "file_read" => match args {
            [Value::Int(handle)] => {
                let mut table = FILE_HANDLES.lock().unwrap();
                let entry = table
                    .get_mut(&(*handle as i32))
                    .ok_or_else(|| VmError::Value("invalid file handle".to_string()))?;
                if entry.binary {
                    let mut buf = Vec::new();
                    entry
                        .file
                        .read_to_end(&mut buf)
                        .map_err(|e| VmError::Value(e.to_string()))?;
                    let bytes = buf.into_iter().map(|b| Value::Int(b as i64)).collect();
                    Ok(Value::List(Rc::new(RefCell::new(bytes))))
                } else {
                    let mut text = String::new();
                    entry
                        .file
                        .read_to_string(&mut text)
                        .map_err(|e| VmError::Value(e.to_string()))?;
                    Ok(Value::Str(text))
                }
            }
            _ => Err(VmError::Type("file_read() expects a handle".to_string())),
        },

        "file_write" => match args {
            [Value::Int(handle), Value::Str(data)] => {
                let mut table = FILE_HANDLES.lock().unwrap();
                let entry = table
                    .get_mut(&(*handle as i32))
                    .ok_or_else(|| VmError::Value("invalid file handle".to_string()))?;
                if entry.binary {
                    return Err(VmError::Type(
                        "file_write() binary handle expects list".to_string(),
                    ));
                }
                entry
                    .file
                    .write_all(data.as_bytes())
                    .map_err(|e| VmError::Value(e.to_string()))?;
                Ok(Value::Int(data.len() as i64))
            }
            [Value::Int(handle), Value::List(list)] => {
                let mut table = FILE_HANDLES.lock().unwrap();
                let entry = table
                    .get_mut(&(*handle as i32))
                    .ok_or_else(|| VmError::Value("invalid file handle".to_string()))?;
                if !entry.binary {
                    return Err(VmError::Type(
                        "file_write() text handle expects string".to_string(),
                    ));
                }
                let bytes = list
                    .borrow()
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) if (0..=255).contains(i) => Ok(*i as u8),
                        _ => Err(VmError::Type(
                            "file_write() expects bytes 0-255".to_string(),
                        )),
                    })
                    .collect::<Result<Vec<u8>, VmError>>()?;
                entry
                    .file
                    .write_all(&bytes)
                    .map_err(|e| VmError::Value(e.to_string()))?;
                Ok(Value::Int(bytes.len() as i64))
            }
            _ => Err(VmError::Type(
                "file_write() expects handle and data".to_string(),
            )),
        },

        "file_close" => match args {
            [Value::Int(handle)] => {
                let mut table = FILE_HANDLES.lock().unwrap();
                if table.remove(&(*handle as i32)).is_some() {
                    Ok(Value::None)
                } else {
                    Err(VmError::Value("invalid file handle".to_string()))
                }
            }
            _ => Err(VmError::Type("file_close() expects handle".to_string())),
        },

        "file_exists" => match args {
            [Value::Str(path)] => {
                Ok(Value::Bool(resolve_path(path, env, globals).exists()))
            }
            _ => Err(VmError::Type("file_exists() expects a path".to_string())),
        },

        "call_builtin" => match args {
            [Value::Str(inner), Value::List(list)] => {
                let inner_args = list.borrow().clone();
                call_builtin(inner, &inner_args, env, globals)
            }
            _ => Err(VmError::Type(
                "call_builtin() expects a name and argument list".to_string(),
            )),
        },

        _ => Err(VmError::Type(format!("unknown builtin: {}", name))),
    }
}
