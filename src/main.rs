// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/main.rs

// Command-line driver: runs a program file, or a REPL without one.

// <>

use clap::{ArgAction, Parser};
use log::LevelFilter;
use quoppa::vau::{self, Runtime, RuntimeConfig};

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "quoppa", version)]
#[command(about = "A minimal vau-calculus Lisp")]
struct Args {
    /// Program to run; starts a REPL when absent
    file: Option<PathBuf>,

    /// Start with only the primitive operatives
    #[arg(long)]
    no_prelude: bool,

    /// Do not print the value of each top-level term
    #[arg(short, long)]
    quiet: bool,

    /// More log output; repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn log_level(verbose: u8) -> LevelFilter {
    if let Ok(level) = env::var("QUOPPA_LOG") {
        if let Ok(level) = LevelFilter::from_str(&level) {
            return level;
        }
    }

    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(log_level(args.verbose))
        .init()
    {
        eprintln!("warning: logging unavailable: {}", e);
    }

    let config = RuntimeConfig {
        load_prelude: !args.no_prelude,
        ..RuntimeConfig::default()
    };

    let result = Runtime::with_config(config).and_then(|mut runtime| match &args.file {
        Some(path) => vau::run_file(&mut runtime, path, !args.quiet, &mut io::stdout()).map(|_| ()),
        None => vau::repl(&mut runtime, io::stdin().lock(), &mut io::stdout()),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
