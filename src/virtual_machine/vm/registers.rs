use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::numeral::{Base, Numeral};
use std::fmt;
use std::str::FromStr;

/// Declared register names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    /// Accumulator.
    Acc,
    /// Index register, the offset used by `LDX`.
    Ix,
}

impl Register {
    pub const ALL: [Register; 2] = [Register::Acc, Register::Ix];

    pub const fn name(self) -> &'static str {
        match self {
            Register::Acc => "ACC",
            Register::Ix => "IX",
        }
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Register::ALL
            .into_iter()
            .find(|reg| reg.name() == s)
            .ok_or(())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register file.
///
/// Holds one [`Numeral`] per declared register, `#0` initially. Values
/// written by the interpreter are always Immediates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    acc: Numeral,
    ix: Numeral,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    pub fn new() -> Self {
        Self {
            acc: Numeral::Immediate(0),
            ix: Numeral::Immediate(0),
        }
    }

    /// Returns the token held by `reg`.
    pub fn get(&self, reg: Register) -> &Numeral {
        match reg {
            Register::Acc => &self.acc,
            Register::Ix => &self.ix,
        }
    }

    pub fn get_mut(&mut self, reg: Register) -> &mut Numeral {
        match reg {
            Register::Acc => &mut self.acc,
            Register::Ix => &mut self.ix,
        }
    }

    /// Returns the integer held by `reg`.
    ///
    /// Returns [`VMError::InvalidOperand`] naming `opcode` and the register if
    /// the value is not a decodable literal.
    pub fn get_int(&self, reg: Register, opcode: &'static str) -> Result<i64, VMError> {
        let value = self.get(reg);
        if !value.is_literal() {
            return Err(VMError::invalid_operand(opcode, reg));
        }
        value
            .decode(Base::Decimal)
            .map_err(|_| VMError::invalid_operand(opcode, reg))
    }

    /// Stores an integer into `reg` as an Immediate.
    pub fn set(&mut self, reg: Register, value: i64) {
        *self.get_mut(reg) = Numeral::Immediate(value);
    }

    /// Iterates registers in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, &Numeral)> {
        Register::ALL.into_iter().map(|reg| (reg, self.get(reg)))
    }
}
