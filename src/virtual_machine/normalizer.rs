//! One-shot numeral base normalization.
//!
//! [`normalize`] rewrites every instruction address and memory key into
//! canonical decimal. Operands get the same treatment, except that a tagged
//! `&` or `B` operand always becomes an Immediate, whatever its addressing
//! mode; a tagged operand of an address opcode then fails validation. Tagged
//! register values become Immediates and memory values are left untouched.
//!
//! The pass is not idempotent: bare tokens are decoded in the declared base
//! every time it runs, so a second pass reinterprets already-decimal text.
//! It must run exactly once, before the interpreter starts.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::OperandKind;
use crate::virtual_machine::numeral::{Base, Numeral};
use crate::virtual_machine::state::{Machine, Memory};
use crate::virtual_machine::vm::registers::Register;

/// Context named in errors raised while rekeying memory.
pub const DATA_CONTEXT: &str = "DATA";
/// Context named in errors raised while normalizing register values.
pub const REGISTER_CONTEXT: &str = "REGISTER";

/// Normalizes `machine` in place, reading bare numerals in `base`.
///
/// Fails on the first token whose digits do not parse in their required
/// base; the machine is then left partly rewritten and must be discarded.
pub fn normalize(machine: &mut Machine, base: Base) -> Result<(), VMError> {
    for instr in machine.program.iter_mut() {
        let context = instr.opcode.mnemonic();
        instr.address = normalize_address(&instr.address, base, context)?;

        let kind = instr.opcode.operand_kind();
        if let Some(operand) = instr.operand.as_mut() {
            *operand = match kind {
                OperandKind::None | OperandKind::Register => continue,
                _ => normalize_value(operand, base, context)?,
            };
        }
    }

    machine.memory = rekey_memory(std::mem::take(&mut machine.memory), base)?;

    for reg in Register::ALL {
        let value = machine.registers.get_mut(reg);
        if matches!(value, Numeral::Hex(_) | Numeral::Bin(_)) {
            *value = normalize_value(value, base, REGISTER_CONTEXT)?;
        }
    }

    Ok(())
}

/// Rewrites an address token to a canonical-decimal bare numeral.
///
/// Tagged literals are decoded in their own radix and bare text in `base`;
/// a decimal base leaves bare text as it is. Immediates are not addresses and
/// pass through unchanged, to be rejected by address validation later.
fn normalize_address(token: &Numeral, base: Base, context: &'static str) -> Result<Numeral, VMError> {
    match token {
        Numeral::Immediate(_) => Ok(token.clone()),
        Numeral::Bare(_) if base == Base::Decimal => Ok(token.clone()),
        _ => token
            .decode(base)
            .map(|value| Numeral::Bare(value.to_string()))
            .map_err(|_| VMError::invalid_operand(context, token)),
    }
}

/// Rewrites a value token: tagged literals become Immediates, bare text is
/// canonicalized like an address.
fn normalize_value(token: &Numeral, base: Base, context: &'static str) -> Result<Numeral, VMError> {
    match token {
        Numeral::Hex(_) | Numeral::Bin(_) => token
            .decode(base)
            .map(Numeral::Immediate)
            .map_err(|_| VMError::invalid_operand(context, token)),
        _ => normalize_address(token, base, context),
    }
}

fn rekey_memory(mut memory: Memory, base: Base) -> Result<Memory, VMError> {
    let mut rekeyed = Memory::new();
    let keys: Vec<String> = memory.keys().cloned().collect();
    for key in keys {
        let value = memory.remove(&key).unwrap_or_else(Numeral::empty);
        let new_key = match Numeral::parse(&key) {
            Ok(token) => normalize_address(&token, base, DATA_CONTEXT)?,
            Err(_) => return Err(VMError::invalid_operand(DATA_CONTEXT, &key)),
        };
        let Numeral::Bare(new_key) = new_key else {
            return Err(VMError::invalid_operand(DATA_CONTEXT, &key));
        };
        if !rekeyed.insert_new(new_key, value) {
            return Err(VMError::invalid_operand(DATA_CONTEXT, &key));
        }
    }
    Ok(rekeyed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::isa::Opcode;
    use crate::virtual_machine::program::{Instruction, Program};
    use crate::virtual_machine::vm::registers::Registers;

    fn bare(text: &str) -> Numeral {
        Numeral::Bare(text.into())
    }

    fn machine(instructions: Vec<Instruction>, cells: &[(&str, Numeral)], base: Base) -> Machine {
        let mut memory = Memory::new();
        for (key, value) in cells {
            memory.insert_new(key.to_string(), value.clone());
        }
        Machine::new(Program::new(instructions), memory, Registers::new(), base)
    }

    #[test]
    fn binary_addresses_become_decimal() {
        let mut m = machine(
            vec![
                Instruction::new(bare("0"), Opcode::Ldd, Some(bare("1010"))),
                Instruction::new(bare("1"), Opcode::Jmp, Some(bare("0"))),
                Instruction::new(bare("10"), Opcode::End, None),
            ],
            &[("1010", Numeral::Immediate(4))],
            Base::Binary,
        );
        normalize(&mut m, Base::Binary).unwrap();

        let instrs: Vec<_> = m.program.iter().cloned().collect();
        assert_eq!(instrs[0].operand, Some(bare("10")));
        assert_eq!(instrs[1].address, bare("1"));
        assert_eq!(instrs[2].address, bare("2"));
        assert!(m.memory.contains("10"));
        assert!(!m.memory.contains("1010"));
        assert_eq!(m.memory.get("10"), Some(&Numeral::Immediate(4)));
    }

    #[test]
    fn hex_addresses_become_decimal() {
        let mut m = machine(
            vec![Instruction::new(bare("1F"), Opcode::Sto, Some(bare("FF")))],
            &[("FF", Numeral::empty())],
            Base::Hex,
        );
        normalize(&mut m, Base::Hex).unwrap();
        assert_eq!(m.program.origin(), Some(&bare("31")));
        assert_eq!(m.program.get(0).unwrap().operand, Some(bare("255")));
        assert!(m.memory.contains("255"));
    }

    #[test]
    fn tagged_value_operands_become_immediates() {
        let mut m = machine(
            vec![
                Instruction::new(bare("0"), Opcode::Ldm, Some(Numeral::Hex("1F".into()))),
                Instruction::new(bare("1"), Opcode::Add, Some(Numeral::Bin("101".into()))),
                Instruction::new(bare("10"), Opcode::Sub, Some(Numeral::Immediate(3))),
            ],
            &[],
            Base::Binary,
        );
        normalize(&mut m, Base::Binary).unwrap();
        let operands: Vec<_> = m.program.iter().map(|i| i.operand.clone().unwrap()).collect();
        assert_eq!(
            operands,
            [
                Numeral::Immediate(31),
                Numeral::Immediate(5),
                Numeral::Immediate(3)
            ]
        );
    }

    #[test]
    fn tagged_address_operands_become_immediates() {
        let mut m = machine(
            vec![
                Instruction::new(bare("0"), Opcode::Ldd, Some(Numeral::Hex("0A".into()))),
                Instruction::new(bare("1"), Opcode::Jmp, Some(Numeral::Bin("0".into()))),
                Instruction::new(bare("2"), Opcode::Sto, Some(bare("1010"))),
            ],
            &[("1010", Numeral::empty())],
            Base::Binary,
        );
        normalize(&mut m, Base::Binary).unwrap();
        assert_eq!(m.program.get(0).unwrap().operand, Some(Numeral::Immediate(10)));
        assert_eq!(m.program.get(1).unwrap().operand, Some(Numeral::Immediate(0)));
        assert_eq!(m.program.get(2).unwrap().operand, Some(bare("10")));
    }

    #[test]
    fn register_operands_and_memory_values_untouched() {
        let mut m = machine(
            vec![
                Instruction::new(bare("0"), Opcode::Mov, Some(bare("IX"))),
                Instruction::new(bare("1"), Opcode::End, None),
            ],
            &[("11", Numeral::Hex("FF".into())), ("100", bare("11"))],
            Base::Binary,
        );
        normalize(&mut m, Base::Binary).unwrap();
        assert_eq!(m.program.get(0).unwrap().operand, Some(bare("IX")));
        assert_eq!(m.memory.get("3"), Some(&Numeral::Hex("FF".into())));
        assert_eq!(m.memory.get("4"), Some(&bare("11")));
    }

    #[test]
    fn decimal_base_leaves_bare_text() {
        let mut m = machine(
            vec![Instruction::new(bare("007"), Opcode::Sto, Some(bare("10")))],
            &[("10", Numeral::empty())],
            Base::Decimal,
        );
        let before = m.clone();
        normalize(&mut m, Base::Decimal).unwrap();
        assert_eq!(m, before);
    }

    #[test]
    fn register_literals_resolved() {
        let mut m = machine(vec![], &[], Base::Decimal);
        *m.registers.get_mut(Register::Ix) = Numeral::Hex("0A".into());
        normalize(&mut m, Base::Decimal).unwrap();
        assert_eq!(m.registers.get(Register::Ix), &Numeral::Immediate(10));
    }

    #[test]
    fn invalid_digits_name_the_opcode() {
        let mut m = machine(
            vec![Instruction::new(bare("0"), Opcode::Ldd, Some(bare("12")))],
            &[],
            Base::Binary,
        );
        let err = normalize(&mut m, Base::Binary).unwrap_err();
        assert!(matches!(
            err,
            VMError::InvalidOperand { opcode: "LDD", ref operand } if operand == "12"
        ));
    }

    #[test]
    fn invalid_memory_key_names_data() {
        let mut m = machine(vec![], &[("102", Numeral::empty())], Base::Binary);
        assert!(matches!(
            normalize(&mut m, Base::Binary),
            Err(VMError::InvalidOperand { opcode: DATA_CONTEXT, .. })
        ));
    }

    #[test]
    fn colliding_memory_keys_rejected() {
        let mut m = machine(
            vec![],
            &[("A", Numeral::empty()), ("0A", Numeral::empty())],
            Base::Hex,
        );
        assert!(normalize(&mut m, Base::Hex).is_err());
    }

    #[test]
    fn second_pass_is_not_idempotent() {
        let mut m = machine(
            vec![Instruction::new(bare("0"), Opcode::Ldd, Some(bare("1100")))],
            &[("1100", Numeral::Immediate(1))],
            Base::Binary,
        );
        normalize(&mut m, Base::Binary).unwrap();
        assert!(m.memory.contains("12"));
        // "12" is not binary, so the stale reading fails
        assert!(normalize(&mut m, Base::Binary).is_err());
    }
}
