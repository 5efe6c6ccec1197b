//! Accumulator machine interpreter.
//!
//! The [`VM`] walks the program image by index. A taken jump moves the
//! program counter to the target instruction, which is equivalent to
//! restarting on the slice of the image at or after the target address.
//! All arithmetic uses wrapping 64-bit semantics.
//!
//! Conditional branches do not carry a predicate. By default they find the
//! comparison that governs them by looking back through the program image
//! (see [`BranchMode::HistoryScan`]).

pub mod console;
pub mod registers;

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::numeral::{Base, Numeral};
use crate::virtual_machine::state::Machine;
use crate::virtual_machine::validator::{
    code_address, decode_cell, decode_immediate, memory_address, pointer_address, register,
};
use crate::{debug, warn};
use console::Console;
use registers::Register;
use std::fmt::Write;

const OUTPUT_HEADER: &str = "OUTPUT\n";
const MEMORY_HEADER: &str = "MEMORY\n";
const REGISTERS_HEADER: &str = "REGISTERS\n";

/// How `JPE`/`JPN` find the comparison they test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchMode {
    /// `JPE` needs a `CMP`/`CMI` directly before it. `JPN` walks back over
    /// a contiguous run of compares and branches to the nearest compare.
    /// The compare is evaluated when the branch executes.
    #[default]
    HistoryScan,
    /// `CMP`/`CMI` record their outcome when executed and branches read it.
    ComparisonFlag,
}

/// What `END` does after dumping the machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndBehavior {
    /// Keep executing the instructions that follow.
    #[default]
    Continue,
    /// Stop the run.
    Halt,
}

/// Interpreter options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOptions {
    pub branch_mode: BranchMode,
    pub end_behavior: EndBehavior,
}

/// Interpreter for one run over an owned [`Machine`].
pub struct VM<C: Console> {
    machine: Machine,
    console: C,
    options: ExecOptions,
    /// Index of the next instruction to execute.
    pc: usize,
    /// Index of the instruction being executed.
    current: usize,
    halted: bool,
    steps: u64,
    /// Outcome of the last `CMP`/`CMI` (flag mode only).
    comparison: Option<bool>,
    output_started: bool,
    /// Characters were printed since the last newline.
    line_open: bool,
    warned_after_end: bool,
    warned_scan: bool,
}

impl<C: Console> VM<C> {
    /// Creates a VM over a normalized machine.
    pub fn new(machine: Machine, console: C, options: ExecOptions) -> Self {
        Self {
            machine,
            console,
            options,
            pc: 0,
            current: 0,
            halted: false,
            steps: 0,
            comparison: None,
            output_started: false,
            line_open: false,
            warned_after_end: false,
            warned_scan: false,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn into_machine(self) -> Machine {
        self.machine
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs from the program origin until the image is exhausted, an `END`
    /// halts the run, or an instruction fails.
    pub fn run(&mut self) -> Result<(), VMError> {
        let origin = self
            .machine
            .program
            .origin()
            .cloned()
            .ok_or(VMError::EmptyProgram)?;
        self.run_from(&origin)
    }

    /// Runs the instructions whose address is at or after `start`.
    pub fn run_from(&mut self, start: &Numeral) -> Result<(), VMError> {
        self.pc = self.first_at_or_after(start)?;
        self.halted = false;

        while !self.halted {
            let Some(instr) = self.machine.program.get(self.pc) else {
                break;
            };
            debug!("{instr}");
            let opcode = instr.opcode;
            let operand = instr.operand.clone();

            self.current = self.pc;
            self.pc += 1;
            self.steps += 1;
            self.exec(opcode, operand.as_ref())?;
        }
        Ok(())
    }

    /// Index of the first instruction at or after address `start`.
    fn first_at_or_after(&self, start: &Numeral) -> Result<usize, VMError> {
        let start_value = start
            .decode(Base::Decimal)
            .map_err(|_| VMError::invalid_operand("START", start))?;
        let position = self
            .machine
            .program
            .iter()
            .position(|instr| matches!(instr.address.decode(Base::Decimal), Ok(a) if a >= start_value));
        Ok(position.unwrap_or(self.machine.program.len()))
    }

    /// Executes a single instruction.
    fn exec(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        match opcode {
            // Loads and stores
            Opcode::Ldm => self.op_ldm(opcode, operand),
            Opcode::Ldd => self.op_ldd(opcode, operand),
            Opcode::Ldi => self.op_ldi(opcode, operand),
            Opcode::Ldx => self.op_ldx(opcode, operand),
            Opcode::Ldr => self.op_ldr(opcode, operand),
            Opcode::Mov => self.op_mov(opcode, operand),
            Opcode::Sto => self.op_sto(opcode, operand),
            // Arithmetic
            Opcode::Add => self.op_add(opcode, operand),
            Opcode::Sub => self.op_sub(opcode, operand),
            Opcode::Inc => self.op_step_register(opcode, operand, 1),
            Opcode::Dec => self.op_step_register(opcode, operand, -1),
            // Comparison and branches
            Opcode::Jmp => self.op_jmp(opcode, operand),
            Opcode::Cmp | Opcode::Cmi => self.op_compare(opcode, operand),
            Opcode::Jpe => self.op_branch(opcode, operand, true),
            Opcode::Jpn => self.op_branch(opcode, operand, false),
            // Bitwise
            Opcode::Lsl => self.op_lsl(opcode, operand),
            Opcode::Lsr => self.op_lsr(opcode, operand),
            Opcode::And => self.op_bitwise(opcode, operand, |a, b| a & b),
            Opcode::Or => self.op_bitwise(opcode, operand, |a, b| a | b),
            Opcode::Xor => self.op_bitwise(opcode, operand, |a, b| a ^ b),
            // Console and halting
            Opcode::In => self.op_in(),
            Opcode::Out => self.op_out(opcode),
            Opcode::End => self.op_end(),
        }
    }

    fn acc(&self, opcode: Opcode) -> Result<i64, VMError> {
        self.machine
            .registers
            .get_int(Register::Acc, opcode.mnemonic())
    }

    fn set_acc(&mut self, value: i64) {
        self.machine.registers.set(Register::Acc, value);
    }

    /// Decodes the memory cell at a validated `address`.
    fn cell_value(
        &self,
        opcode: Opcode,
        operand: Option<&Numeral>,
        address: &str,
    ) -> Result<i64, VMError> {
        let value = self.machine.memory.get(address).ok_or_else(|| {
            VMError::invalid_operand(opcode.mnemonic(), address)
        })?;
        decode_cell(opcode, operand, value, self.machine.base)
    }

    /// Follows the pointer stored at `operand` and returns the address it names.
    fn indirect_address(&self, opcode: Opcode, operand: Option<&Numeral>) -> Result<String, VMError> {
        let memory = &self.machine.memory;
        let address = memory_address(opcode, operand, memory)?;
        let pointer = memory
            .get(address)
            .ok_or_else(|| VMError::invalid_operand(opcode.mnemonic(), address))?;
        pointer_address(opcode, operand, pointer, memory, self.machine.base)
    }

    /// Value of an immediate operand, or of the memory cell a bare operand names.
    fn operand_value(&self, opcode: Opcode, operand: Option<&Numeral>) -> Result<i64, VMError> {
        match operand {
            Some(Numeral::Immediate(_)) => decode_immediate(opcode, operand),
            _ => {
                let address = memory_address(opcode, operand, &self.machine.memory)?;
                self.cell_value(opcode, operand, address)
            }
        }
    }

    fn op_ldm(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let value = decode_immediate(opcode, operand)?;
        self.set_acc(value);
        Ok(())
    }

    fn op_ldd(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let address = memory_address(opcode, operand, &self.machine.memory)?;
        let value = self.cell_value(opcode, operand, address)?;
        self.set_acc(value);
        Ok(())
    }

    fn op_ldi(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let address = self.indirect_address(opcode, operand)?;
        let value = self.cell_value(opcode, operand, &address)?;
        self.set_acc(value);
        Ok(())
    }

    fn op_ldx(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let invalid = || {
            VMError::invalid_operand(
                opcode.mnemonic(),
                operand.map(Numeral::to_string).unwrap_or_default(),
            )
        };
        let base_address = match operand {
            Some(Numeral::Bare(text)) => text.parse::<i64>().map_err(|_| invalid())?,
            _ => return Err(invalid()),
        };
        let offset = self
            .machine
            .registers
            .get_int(Register::Ix, opcode.mnemonic())?;
        let effective = base_address.wrapping_add(offset).to_string();
        if !self.machine.memory.contains(&effective) {
            return Err(invalid());
        }
        let value = self.cell_value(opcode, operand, &effective)?;
        self.set_acc(value);
        Ok(())
    }

    fn op_ldr(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let value = decode_immediate(opcode, operand)?;
        self.machine.registers.set(Register::Ix, value);
        Ok(())
    }

    fn op_mov(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let reg = register(opcode, operand)?;
        let value = self.acc(opcode)?;
        self.machine.registers.set(reg, value);
        Ok(())
    }

    fn op_sto(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let address = memory_address(opcode, operand, &self.machine.memory)?;
        let value = self.acc(opcode)?;
        self.machine.memory.store(address, Numeral::Immediate(value));
        Ok(())
    }

    fn op_add(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let value = self.operand_value(opcode, operand)?;
        let acc = self.acc(opcode)?;
        self.set_acc(acc.wrapping_add(value));
        Ok(())
    }

    fn op_sub(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let value = self.operand_value(opcode, operand)?;
        let acc = self.acc(opcode)?;
        self.set_acc(value.wrapping_neg().wrapping_add(acc));
        Ok(())
    }

    fn op_step_register(
        &mut self,
        opcode: Opcode,
        operand: Option<&Numeral>,
        delta: i64,
    ) -> Result<(), VMError> {
        let reg = register(opcode, operand)?;
        let value = self.machine.registers.get_int(reg, opcode.mnemonic())?;
        self.machine.registers.set(reg, value.wrapping_add(delta));
        Ok(())
    }

    fn op_jmp(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        self.pc = code_address(opcode, operand, &self.machine.program)?;
        Ok(())
    }

    /// Evaluates `ACC == operand` for a `CMP` or `CMI`.
    fn compare(&self, opcode: Opcode, operand: Option<&Numeral>) -> Result<bool, VMError> {
        let value = match opcode {
            Opcode::Cmi => {
                let address = self.indirect_address(opcode, operand)?;
                self.cell_value(opcode, operand, &address)?
            }
            _ => self.operand_value(opcode, operand)?,
        };
        Ok(self.acc(opcode)? == value)
    }

    fn op_compare(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        if self.options.branch_mode == BranchMode::ComparisonFlag {
            self.comparison = Some(self.compare(opcode, operand)?);
        }
        Ok(())
    }

    fn op_branch(
        &mut self,
        opcode: Opcode,
        operand: Option<&Numeral>,
        jump_if_equal: bool,
    ) -> Result<(), VMError> {
        let target = code_address(opcode, operand, &self.machine.program)?;
        let equal = match self.options.branch_mode {
            BranchMode::HistoryScan => {
                let index = self.governing_comparison(opcode, operand)?;
                let instr = self
                    .machine
                    .program
                    .get(index)
                    .ok_or_else(|| VMError::invalid_operand(opcode.mnemonic(), target))?;
                self.compare(instr.opcode, instr.operand.as_ref())?
            }
            BranchMode::ComparisonFlag => self.comparison.ok_or(VMError::MissingComparison {
                opcode: opcode.mnemonic(),
            })?,
        };
        if equal == jump_if_equal {
            self.pc = target;
        }
        Ok(())
    }

    /// Finds the index of the `CMP`/`CMI` a branch at `self.current` tests.
    ///
    /// `JPE` only looks at the instruction directly before it. `JPN` skips
    /// back over compares and branches to the nearest compare.
    fn governing_comparison(
        &mut self,
        opcode: Opcode,
        operand: Option<&Numeral>,
    ) -> Result<usize, VMError> {
        let invalid = || {
            VMError::invalid_operand(
                opcode.mnemonic(),
                operand.map(Numeral::to_string).unwrap_or_default(),
            )
        };
        let program = &self.machine.program;

        if opcode == Opcode::Jpe {
            let previous = self.current.checked_sub(1).ok_or_else(invalid)?;
            return match program.get(previous) {
                Some(instr) if instr.opcode.is_compare() => Ok(previous),
                _ => Err(invalid()),
            };
        }

        let mut skipped = 0usize;
        let mut index = self.current;
        while let Some(previous) = index.checked_sub(1) {
            let Some(instr) = program.get(previous) else {
                break;
            };
            if instr.opcode.is_compare() {
                if skipped > 0 && !self.warned_scan {
                    self.warned_scan = true;
                    warn!(
                        "{} at {} skipped {} branch(es) to reuse the comparison at {}",
                        opcode,
                        self.current_address(),
                        skipped,
                        instr.address
                    );
                }
                return Ok(previous);
            }
            if !instr.opcode.is_compare_or_branch() {
                break;
            }
            skipped += 1;
            index = previous;
        }
        Err(invalid())
    }

    fn current_address(&self) -> String {
        self.machine
            .program
            .get(self.current)
            .map(|instr| instr.address.to_string())
            .unwrap_or_default()
    }

    fn shift_amount(opcode: Opcode, operand: Option<&Numeral>) -> Result<u32, VMError> {
        let amount = decode_immediate(opcode, operand)?;
        u32::try_from(amount).map_err(|_| {
            VMError::invalid_operand(
                opcode.mnemonic(),
                operand.map(Numeral::to_string).unwrap_or_default(),
            )
        })
    }

    fn op_lsl(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let amount = Self::shift_amount(opcode, operand)?;
        let acc = self.acc(opcode)?;
        self.set_acc(acc.checked_shl(amount).unwrap_or(0));
        Ok(())
    }

    fn op_lsr(&mut self, opcode: Opcode, operand: Option<&Numeral>) -> Result<(), VMError> {
        let amount = Self::shift_amount(opcode, operand)?;
        let acc = self.acc(opcode)?;
        let fill = if acc < 0 { -1 } else { 0 };
        self.set_acc(acc.checked_shr(amount).unwrap_or(fill));
        Ok(())
    }

    fn op_bitwise(
        &mut self,
        opcode: Opcode,
        operand: Option<&Numeral>,
        f: impl Fn(i64, i64) -> i64,
    ) -> Result<(), VMError> {
        let value = self.operand_value(opcode, operand)?;
        let acc = self.acc(opcode)?;
        self.set_acc(f(acc, value));
        Ok(())
    }

    fn op_in(&mut self) -> Result<(), VMError> {
        let line = self.console.read_line()?;
        let mut chars = line.chars();
        if let (Some(c), None) = (chars.next(), chars.next())
            && c.is_ascii()
        {
            self.set_acc(c as i64);
        }
        Ok(())
    }

    fn op_out(&mut self, opcode: Opcode) -> Result<(), VMError> {
        if !self.output_started {
            self.output_started = true;
            self.console.write_str(OUTPUT_HEADER)?;
        }
        let acc = self.acc(opcode)?;
        if let Some(c) = u8::try_from(acc).ok().filter(u8::is_ascii).map(char::from) {
            self.console.write_str(c.encode_utf8(&mut [0; 4]))?;
            self.line_open = c != '\n';
        }
        Ok(())
    }

    fn op_end(&mut self) -> Result<(), VMError> {
        self.dump()?;
        match self.options.end_behavior {
            EndBehavior::Halt => self.halted = true,
            EndBehavior::Continue => {
                if self.pc < self.machine.program.len() && !self.warned_after_end {
                    self.warned_after_end = true;
                    warn!(
                        "END at {} does not stop the run; instructions after it still execute",
                        self.current_address()
                    );
                }
            }
        }
        Ok(())
    }

    /// Writes every memory cell and register to the console.
    fn dump(&mut self) -> Result<(), VMError> {
        let mut text = String::new();
        if self.line_open {
            text.push('\n');
            self.line_open = false;
        }
        text.push_str(MEMORY_HEADER);
        for (address, value) in self.machine.memory.entries() {
            let _ = writeln!(text, "{address} : {value}");
        }
        text.push_str(REGISTERS_HEADER);
        for (reg, value) in self.machine.registers.iter() {
            let _ = writeln!(text, "{reg} : {value}");
        }
        self.console.write_str(&text)?;
        Ok(())
    }
}
