//! Instruction set definitions.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode table and hands it to a callback macro, so the [`Opcode`] enum, its
//! mnemonics and its operand kinds are all generated from one list.

use std::str::FromStr;

/// What an opcode expects in its operand slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand (`IN`, `OUT`, `END`).
    None,
    /// A `#`, `&` or `B` literal.
    Literal,
    /// A literal or the address of a memory cell holding the value.
    Value,
    /// The address of a memory cell.
    Memory,
    /// A register name.
    Register,
    /// The address of an instruction.
    CodeAddress,
}

/// Invokes a callback macro with the complete opcode list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Loads and stores
            // =========================
            /// LDM #n ; ACC = n
            Ldm, "LDM" => Literal,
            /// LDD addr ; ACC = mem[addr]
            Ldd, "LDD" => Memory,
            /// LDI addr ; ACC = mem[mem[addr]]
            Ldi, "LDI" => Memory,
            /// LDX addr ; ACC = mem[addr + IX]
            Ldx, "LDX" => Memory,
            /// LDR #n ; IX = n
            Ldr, "LDR" => Literal,
            /// MOV reg ; reg = ACC
            Mov, "MOV" => Register,
            /// STO addr ; mem[addr] = ACC
            Sto, "STO" => Memory,
            // =========================
            // Arithmetic
            // =========================
            /// ADD #n|addr ; ACC = ACC + value
            Add, "ADD" => Value,
            /// SUB #n|addr ; ACC = ACC - value
            Sub, "SUB" => Value,
            /// INC reg ; reg = reg + 1
            Inc, "INC" => Register,
            /// DEC reg ; reg = reg - 1
            Dec, "DEC" => Register,
            // =========================
            // Comparison and branches
            // =========================
            /// JMP addr ; continue at addr
            Jmp, "JMP" => CodeAddress,
            /// CMP #n|addr ; compare ACC with value
            Cmp, "CMP" => Value,
            /// CMI addr ; compare ACC with mem[mem[addr]]
            Cmi, "CMI" => Memory,
            /// JPE addr ; continue at addr if the comparison was equal
            Jpe, "JPE" => CodeAddress,
            /// JPN addr ; continue at addr if the comparison was not equal
            Jpn, "JPN" => CodeAddress,
            // =========================
            // Bitwise
            // =========================
            /// LSL #n ; ACC = ACC << n
            Lsl, "LSL" => Literal,
            /// LSR #n ; ACC = ACC >> n
            Lsr, "LSR" => Literal,
            /// AND #n|addr ; ACC = ACC & value
            And, "AND" => Value,
            /// OR #n|addr ; ACC = ACC | value
            Or, "OR" => Value,
            /// XOR #n|addr ; ACC = ACC ^ value
            Xor, "XOR" => Value,
            // =========================
            // Console and halting
            // =========================
            /// IN ; ACC = ordinal of one character read from the console
            In, "IN" => None,
            /// OUT ; print ACC as a character
            Out, "OUT" => None,
            /// END ; dump memory and registers
            End, "END" => None,
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident, $mnemonic:literal => $kind:ident
        ),* $(,)?
    ) => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name,
            )*
        }

        impl Opcode {
            /// Every opcode in table order.
            pub const ALL: &'static [Opcode] = &[$( Opcode::$name, )*];

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns what this opcode expects in its operand slot.
            pub const fn operand_kind(&self) -> OperandKind {
                match self {
                    $( Opcode::$name => OperandKind::$kind, )*
                }
            }

            /// Looks an opcode up by mnemonic, ignoring case.
            pub fn from_mnemonic(name: &str) -> Option<Self> {
                $(
                    if name.eq_ignore_ascii_case($mnemonic) {
                        return Some(Opcode::$name);
                    }
                )*
                None
            }
        }
    };
}

for_each_opcode!(define_opcodes);

impl Opcode {
    /// True for the instructions a `JPN` history scan may step over.
    pub const fn is_compare_or_branch(&self) -> bool {
        matches!(self, Opcode::Cmp | Opcode::Cmi | Opcode::Jpe | Opcode::Jpn)
    }

    pub const fn is_compare(&self) -> bool {
        matches!(self, Opcode::Cmp | Opcode::Cmi)
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::from_mnemonic(s).ok_or(())
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_are_unique() {
        for (i, a) in Opcode::ALL.iter().enumerate() {
            for b in &Opcode::ALL[i + 1..] {
                assert_ne!(a.mnemonic(), b.mnemonic());
            }
        }
    }

    #[test]
    fn from_mnemonic_round_trips() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(*op));
        }
    }

    #[test]
    fn from_mnemonic_ignores_case() {
        assert_eq!(Opcode::from_mnemonic("ldm"), Some(Opcode::Ldm));
        assert_eq!("Jpn".parse::<Opcode>(), Ok(Opcode::Jpn));
    }

    #[test]
    fn from_mnemonic_unknown() {
        assert_eq!(Opcode::from_mnemonic("HLT"), None);
        assert_eq!(Opcode::from_mnemonic(""), None);
    }

    #[test]
    fn operand_kinds() {
        assert_eq!(Opcode::End.operand_kind(), OperandKind::None);
        assert_eq!(Opcode::Ldm.operand_kind(), OperandKind::Literal);
        assert_eq!(Opcode::Cmi.operand_kind(), OperandKind::Memory);
        assert_eq!(Opcode::Mov.operand_kind(), OperandKind::Register);
        assert_eq!(Opcode::Jpe.operand_kind(), OperandKind::CodeAddress);
    }

    #[test]
    fn compare_and_branch_classes() {
        assert!(Opcode::Cmp.is_compare());
        assert!(!Opcode::Jpe.is_compare());
        assert!(Opcode::Jpe.is_compare_or_branch());
        assert!(!Opcode::Jmp.is_compare_or_branch());
    }
}
