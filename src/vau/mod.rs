// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/mod.rs

// The language runtime: a ground environment plus an evaluation
// stack, and the file runner and REPL built on top of them.

// <>

use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use log::{debug, info};

pub mod bind;
pub mod core;
pub mod error;
pub mod eval;
pub mod frame;
pub mod parser;
pub mod stdenv;
pub mod symtab;

pub use self::core::{Fexpr, NativeFn, Number, Pair, PairRole, PrimKind, Primitive, Value};
pub use self::error::{Error, ErrorKind, Result};
pub use self::eval::EvalStack;
pub use self::frame::Env;
pub use self::symtab::{symbol, Symbol};

/// Library operatives evaluated into the ground environment at startup
pub const PRELUDE: &str = include_str!("../../scripts/prelude.qop");

/// Options for building a [`Runtime`]
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Initial room on the evaluation stack; it grows past this as needed
    pub stack_capacity: usize,
    /// Whether to load [`PRELUDE`] into the ground environment
    pub load_prelude: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            stack_capacity: 1024,
            load_prelude: true,
        }
    }
}

/// An interpreter instance
pub struct Runtime {
    ground: Env,
    stack: EvalStack,
}

impl Runtime {
    /// A runtime with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        let mut runtime = Runtime {
            ground: stdenv::ground_env(),
            stack: EvalStack::new(config.stack_capacity),
        };

        if config.load_prelude {
            runtime.execute(PRELUDE)?;
            debug!(
                "prelude loaded; ground environment holds {} bindings",
                runtime.ground.len()
            );
        }

        Ok(runtime)
    }

    /// The root environment holding the primitives
    pub fn ground(&self) -> &Env {
        &self.ground
    }

    /// Evaluates one term in `env`, or in the ground environment when
    /// `env` is `None`
    pub fn interpret(&mut self, env: Option<&Env>, term: Value) -> Result<Value> {
        let env = env.unwrap_or(&self.ground).clone();
        if !self.stack.start(env, term) {
            return Err(Error::consistency("evaluation stack is already in use"));
        }
        self.stack.run(&self.ground)
    }

    /// Parses `code` and interprets each term in the ground
    /// environment, returning the value of the last one (or `()`)
    pub fn execute(&mut self, code: &str) -> Result<Value> {
        let mut out = Value::Nil;
        for term in parser::parse(code)? {
            out = self.interpret(None, term)?;
        }
        Ok(out)
    }
}

/// Runs every term in the file at `path`, writing the value of each to
/// `output` when `echo` is set
pub fn run_file<W: Write>(
    runtime: &mut Runtime,
    path: impl AsRef<Path>,
    echo: bool,
    output: &mut W,
) -> Result<Value> {
    let path = path.as_ref();
    let code = fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    let terms = parser::parse(&code)?;
    info!("running {} terms from {}", terms.len(), path.display());

    let mut out = Value::Nil;
    for term in terms {
        out = runtime.interpret(None, term)?;
        if echo {
            writeln!(output, "{}", out)?;
        }
    }
    Ok(out)
}

/// Reads terms from `input` until it ends, printing each result or
/// error to `output`. Input is collected until its parentheses balance.
pub fn repl<R: BufRead, W: Write>(runtime: &mut Runtime, input: R, output: &mut W) -> Result<()> {
    let mut pending = String::new();
    let mut lines = input.lines();

    loop {
        write!(output, "{}", if pending.is_empty() { "-> " } else { ".. " })?;
        output.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => {
                writeln!(output)?;
                return Ok(());
            }
        };

        pending.push_str(&line);
        pending.push('\n');

        if pending.trim().is_empty() {
            pending.clear();
            continue;
        }
        if parser::open_depth(&pending) > 0 {
            continue;
        }

        let code = std::mem::take(&mut pending);
        let terms = match parser::parse(&code) {
            Ok(terms) => terms,
            Err(e) => {
                writeln!(output, "error: {}", e)?;
                continue;
            }
        };

        for term in terms {
            match runtime.interpret(None, term) {
                Ok(value) => writeln!(output, "{}", value)?,
                Err(e) => {
                    writeln!(output, "error: {}", e)?;
                    break;
                }
            }
        }
    }
}
