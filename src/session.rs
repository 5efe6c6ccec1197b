//! Run entry points.
//!
//! A run loads a program image, normalizes it once in the declared base and
//! interprets it from the program origin. The machine is owned by the run
//! and handed back in its final state.

use crate::info;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::loader::first_pass;
use crate::virtual_machine::normalizer::normalize;
use crate::virtual_machine::numeral::Base;
use crate::virtual_machine::state::Machine;
use crate::virtual_machine::vm::console::{Console, StdConsole};
use crate::virtual_machine::vm::{ExecOptions, VM};
use std::path::Path;

/// Options for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Declared base for bare numerals.
    pub base: Base,
    pub exec: ExecOptions,
}

impl RunOptions {
    pub fn new(base: Base) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }
}

/// Runs the program image at `path` on stdin/stdout with default options.
pub fn run<P: AsRef<Path>>(base: Base, path: P) -> Result<Machine, VMError> {
    run_with(path, &RunOptions::new(base), StdConsole::new())
}

/// Runs the program image at `path` with explicit options and console.
pub fn run_with<P: AsRef<Path>, C: Console>(
    path: P,
    options: &RunOptions,
    console: C,
) -> Result<Machine, VMError> {
    let path = path.as_ref();
    let machine = first_pass(path, options.base)?;
    info!(
        "Loaded {}: {} instructions, {} memory cells",
        path.display(),
        machine.program.len(),
        machine.memory.len()
    );
    run_machine(machine, options, console)
}

/// Normalizes and runs a machine fresh from the loader.
///
/// The machine must not have been normalized already: normalization is not
/// idempotent.
pub fn run_machine<C: Console>(
    mut machine: Machine,
    options: &RunOptions,
    console: C,
) -> Result<Machine, VMError> {
    if machine.program.is_empty() {
        return Err(VMError::EmptyProgram);
    }

    machine.base = options.base;
    normalize(&mut machine, options.base)?;
    info!("Normalized {} numerals to decimal", options.base);

    let mut vm = VM::new(machine, console, options.exec);
    if let Some(origin) = vm.machine().program.origin() {
        info!("Starting at address {origin}");
    }
    vm.run()?;
    info!("Finished after {} steps", vm.steps());

    Ok(vm.into_machine())
}
