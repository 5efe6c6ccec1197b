//! Operand validation.
//!
//! Pure checks shared by the interpreter: decode an operand as an Immediate,
//! or resolve it in one of the three addressing modes ([`memory_address`],
//! [`register`], [`code_address`]). Every failure is a
//! [`VMError::InvalidOperand`] naming the opcode and the offending token;
//! nothing is coerced silently.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::numeral::{Base, Numeral};
use crate::virtual_machine::program::Program;
use crate::virtual_machine::state::Memory;
use crate::virtual_machine::vm::registers::Register;

fn invalid(opcode: Opcode, operand: Option<&Numeral>) -> VMError {
    VMError::invalid_operand(
        opcode.mnemonic(),
        operand.map(Numeral::to_string).unwrap_or_default(),
    )
}

/// Decodes an operand that must be an Immediate (`#n`).
pub fn decode_immediate(opcode: Opcode, operand: Option<&Numeral>) -> Result<i64, VMError> {
    match operand {
        Some(Numeral::Immediate(value)) => Ok(*value),
        other => Err(invalid(opcode, other)),
    }
}

/// Resolves a bare operand to a memory key that exists.
pub fn memory_address<'a>(
    opcode: Opcode,
    operand: Option<&'a Numeral>,
    memory: &Memory,
) -> Result<&'a str, VMError> {
    match operand {
        Some(Numeral::Bare(address)) if memory.contains(address) => Ok(address.as_str()),
        other => Err(invalid(opcode, other)),
    }
}

/// Resolves an operand to a declared register.
pub fn register(opcode: Opcode, operand: Option<&Numeral>) -> Result<Register, VMError> {
    match operand {
        Some(Numeral::Bare(name)) => name.parse().map_err(|_| invalid(opcode, operand)),
        other => Err(invalid(opcode, other)),
    }
}

/// Resolves a bare operand to the index of the instruction at that address.
pub fn code_address(
    opcode: Opcode,
    operand: Option<&Numeral>,
    program: &Program,
) -> Result<usize, VMError> {
    match operand {
        Some(Numeral::Bare(address)) => program
            .index_of(address)
            .ok_or_else(|| invalid(opcode, operand)),
        other => Err(invalid(opcode, other)),
    }
}

/// Decodes the contents of a memory cell reached through `operand`.
///
/// Tagged values use their own radix, bare values the declared `base`.
/// Empty cells cannot be decoded.
pub fn decode_cell(
    opcode: Opcode,
    operand: Option<&Numeral>,
    value: &Numeral,
    base: Base,
) -> Result<i64, VMError> {
    value.decode(base).map_err(|_| invalid(opcode, operand))
}

/// Reads a memory cell holding the address of another cell and returns
/// that address in canonical decimal, checked against `memory`.
pub fn pointer_address(
    opcode: Opcode,
    operand: Option<&Numeral>,
    value: &Numeral,
    memory: &Memory,
    base: Base,
) -> Result<String, VMError> {
    let address = decode_cell(opcode, operand, value, base)?.to_string();
    if memory.contains(&address) {
        Ok(address)
    } else {
        Err(invalid(opcode, Some(value)))
    }
}
