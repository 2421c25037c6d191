//! Script runner: evaluates each file argument at Global in one
//! interpreter and prints the final completion value. Uncaught exceptions
//! print with their location and call traceback.

use std::{env, fs, process::ExitCode};

use sedge::{Compat, ExecMode, Interp, StringInput, Value};

fn main() -> ExitCode {
    let mut compat = Compat::default();
    let mut mode = ExecMode::TreeWalk;
    let mut files = Vec::new();

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "-b" | "--bytecode" => mode = ExecMode::Bytecode,
            "-x" | "--extensions" => compat |= Compat::EXT1 | Compat::ANNEX_B,
            "-u" | "--undefdef" => compat |= Compat::UNDEFDEF,
            "-h" | "--help" => {
                eprintln!("usage: sedge [-b] [-x] [-u] file.js ...");
                return ExitCode::SUCCESS;
            }
            other => files.push(other.to_owned()),
        }
    }
    if files.is_empty() {
        eprintln!("usage: sedge [-b] [-x] [-u] file.js ...");
        return ExitCode::FAILURE;
    }

    let mut interp = Interp::new(compat);
    interp.set_exec_mode(mode);

    let mut last = Value::Undefined;
    for file in &files {
        let source = match fs::read(file) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("{file}: {err}");
                return ExitCode::FAILURE;
            }
        };
        let mut input = match StringInput::from_utf8(&source) {
            Ok(input) => input.with_filename(file.clone()),
            Err(err) => {
                eprintln!("{file}: invalid UTF-8: {err}");
                return ExitCode::FAILURE;
            }
        };
        match interp.global_eval_input(&mut input) {
            Ok(value) => last = value,
            Err(exc) => {
                eprintln!("{file}: {exc}");
                return ExitCode::FAILURE;
            }
        }
    }

    match describe(&mut interp, &last) {
        Some(text) => println!("{text}"),
        None => println!("undefined"),
    }
    ExitCode::SUCCESS
}

/// Renders the final value the way a shell user expects; conversion may
/// itself throw (a hostile `toString`), in which case we fall back.
fn describe(interp: &mut Interp, value: &Value) -> Option<String> {
    match value {
        Value::Undefined => None,
        other => interp.display_value(other).ok(),
    }
}
