//! Program image representation.
//!
//! A [`Program`] is the ordered list of [`Instruction`]s produced by the first
//! pass. Its order never changes after loading: the interpreter addresses it
//! by index and the first entry's address is the program origin.

use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::numeral::Numeral;
use std::fmt;

/// One line of the program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address token; canonical decimal once normalized.
    pub address: Numeral,
    pub opcode: Opcode,
    /// Operand token, absent for `IN`, `OUT` and `END`.
    pub operand: Option<Numeral>,
}

impl Instruction {
    pub fn new(address: Numeral, opcode: Opcode, operand: Option<Numeral>) -> Self {
        Self {
            address,
            opcode,
            operand,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {} {}", self.address, self.opcode, operand),
            None => write!(f, "{} {}", self.address, self.opcode),
        }
    }
}

/// Address-ordered instruction sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Wraps an already sorted instruction list.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Address of the first instruction.
    pub fn origin(&self) -> Option<&Numeral> {
        self.instructions.first().map(|instr| &instr.address)
    }

    /// Index of the first instruction whose address token equals `address`.
    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.instructions
            .iter()
            .position(|instr| matches!(&instr.address, Numeral::Bare(text) if text == address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Instruction> {
        self.instructions.iter_mut()
    }
}
