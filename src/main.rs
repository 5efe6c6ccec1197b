//! Accumulator machine runner.
//!
//! Loads a program image, normalizes its numerals and runs it on the
//! terminal.
//!
//! # Usage
//! ```text
//! lmc <program.lmc> [OPTIONS]
//! ```
//!
//! # Options
//! - `-b, --base <bin|dec|hex>`: Declared base (defaults to `$LMC_BASE`, then `dec`)
//! - `--branch <scan|flag>`: How `JPE`/`JPN` find their comparison
//! - `--halt-on-end`: Stop at the first `END`
//! - `-q, --quiet`: Only log warnings and errors
//! - `--trace`: Log every executed instruction
//! - `--no-timestamp`: Omit timestamps from log lines

use lmc::session::{RunOptions, run_with};
use lmc::utils::log::{self, Level, SHOW_TIMESTAMP};
use lmc::virtual_machine::numeral::Base;
use lmc::virtual_machine::vm::console::StdConsole;
use lmc::virtual_machine::vm::{BranchMode, EndBehavior};
use lmc::{error, info};
use std::env;
use std::path::Path;
use std::process;
use std::sync::atomic::Ordering;

const BASE_ENV: &str = "LMC_BASE";

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut options = RunOptions::new(default_base());

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--base" | "-b") => {
                let value = required_value(&args, i, k);
                options.base = parse_base(value);
                i += 2;
            }
            k @ "--branch" => {
                options.exec.branch_mode = match required_value(&args, i, k) {
                    "scan" => BranchMode::HistoryScan,
                    "flag" => BranchMode::ComparisonFlag,
                    other => {
                        error!("Invalid branch mode: '{}' (expected scan or flag)", other);
                        process::exit(1);
                    }
                };
                i += 2;
            }
            "--halt-on-end" => {
                options.exec.end_behavior = EndBehavior::Halt;
                i += 1;
            }
            "--quiet" | "-q" => {
                log::set_max_level(Level::Warn);
                i += 1;
            }
            "--trace" => {
                log::set_max_level(Level::Debug);
                i += 1;
            }
            "--no-timestamp" => {
                SHOW_TIMESTAMP.store(false, Ordering::Relaxed);
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    if let Err(e) = run_with(input_path, &options, StdConsole::new()) {
        error!("Run failed: {}", e);
        process::exit(1);
    }
}

/// Declared base from the environment, decimal when unset.
fn default_base() -> Base {
    match env::var(BASE_ENV) {
        Ok(value) => parse_base(&value),
        Err(_) => Base::default(),
    }
}

fn parse_base(value: &str) -> Base {
    value.parse().unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    })
}

/// Returns the argument following flag `k`, exiting if there is none.
fn required_value<'a>(args: &'a [String], i: usize, k: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            error!("{k} requires an argument");
            process::exit(1);
        }
    }
}

const USAGE: &str = "\
Accumulator Machine Runner

USAGE:
    {program} <program.lmc> [OPTIONS]

ARGS:
    <program.lmc>    Program image to run

OPTIONS:
    -b, --base <bin|dec|hex>   Declared numeral base (defaults to $LMC_BASE, then dec)
        --branch <scan|flag>   Branch resolution: scan back for CMP, or use the last CMP result
        --halt-on-end          Stop at the first END instead of continuing
    -q, --quiet                Only log warnings and errors
        --trace                Log every executed instruction
        --no-timestamp         Omit timestamps from log lines
    -h, --help                 Print this help message

EXAMPLES:
    # Run a decimal program
    {program} countdown.lmc

    # Run a binary program and stop at END
    {program} blink.lmc -b bin --halt-on-end

    # Trace execution with a flags register
    {program} countdown.lmc --branch flag --trace
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
