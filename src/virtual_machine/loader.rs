//! Program image loader (first pass).
//!
//! Reads a textual program image into a [`Machine`]. Addresses are already
//! numeric; no symbolic labels are resolved.
//!
//! # Syntax
//!
//! ```text
//! ; comment to end of line
//! [ program ]          ; optional, lines before any section are program lines
//! 0    LDM  #5         ; <address> <OPCODE> [operand]
//! 1    STO  10
//! 2    END
//! [ memory ]
//! 10                   ; <address> [value], a missing value is an empty cell
//! 11   #3
//! [ registers ]
//! IX   &0A             ; <ACC|IX> <value>
//! ```
//!
//! - Opcodes and section markers are case-insensitive
//! - `IN`, `OUT` and `END` take no operand, every other opcode exactly one
//! - Instructions are sorted by address decoded in the declared base
//! - Memory keys keep their declared-base text until normalization

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Opcode, OperandKind};
use crate::virtual_machine::normalizer::{DATA_CONTEXT, REGISTER_CONTEXT};
use crate::virtual_machine::numeral::{Base, Numeral};
use crate::virtual_machine::program::{Instruction, Program};
use crate::virtual_machine::state::{Machine, Memory};
use crate::virtual_machine::vm::registers::{Register, Registers};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = ';';
const SECTION_PROGRAM: &str = "program";
const SECTION_MEMORY: &str = "memory";
const SECTION_REGISTERS: &str = "registers";

/// Return the line/message pair for errors tied to a source line.
fn load_error_location(err: &VMError) -> Option<(usize, String)> {
    match err {
        VMError::ParseError { line, message } => Some((*line, message.clone())),
        VMError::InvalidInstructionName { line, name } => {
            Some((*line, format!("unknown opcode '{name}'")))
        }
        VMError::DuplicateAddress { line, address } => {
            Some((*line, format!("duplicate address '{address}'")))
        }
        _ => None,
    }
}

/// Formats a compiler-style diagnostic for load failures.
fn render_load_diagnostic(file: &str, source: &str, line: usize, message: &str) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  | {}", "^".repeat(line_text.trim_end().len().max(1)));
    }

    diag
}

/// Emit a diagnostic to stderr for load errors.
fn log_load_error(file: &str, source: &str, err: &VMError) {
    match load_error_location(err) {
        Some((line, message)) => {
            eprintln!("{}", render_load_diagnostic(file, source, line, &message))
        }
        None => eprintln!("error: {err}"),
    }
}

/// Section of the image being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Program,
    Memory,
    Registers,
}

/// Checks if a line is a section marker and returns the section if so.
fn parse_section_marker(line: &str) -> Option<Section> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.eq_ignore_ascii_case(SECTION_PROGRAM) {
        Some(Section::Program)
    } else if inner.eq_ignore_ascii_case(SECTION_MEMORY) {
        Some(Section::Memory)
    } else if inner.eq_ignore_ascii_case(SECTION_REGISTERS) {
        Some(Section::Registers)
    } else {
        None
    }
}

fn strip_comment(line: &str) -> &str {
    line.split_once(COMMENT_CHAR).map_or(line, |(code, _)| code)
}

fn parse_token(token: &str, context: &'static str) -> Result<Numeral, VMError> {
    Numeral::parse(token).map_err(|_| VMError::invalid_operand(context, token))
}

fn parse_error(line: usize, message: impl Into<String>) -> VMError {
    VMError::ParseError {
        line,
        message: message.into(),
    }
}

/// Parses `<address> <OPCODE> [operand]`, returning the decoded address too.
fn parse_instruction(line: usize, tokens: &[&str], base: Base) -> Result<(i64, Instruction), VMError> {
    let [address, name, rest @ ..] = tokens else {
        return Err(parse_error(line, "expected '<address> <OPCODE> [operand]'"));
    };
    let opcode = Opcode::from_mnemonic(name).ok_or_else(|| VMError::InvalidInstructionName {
        line,
        name: name.to_string(),
    })?;

    let operand = match (opcode.operand_kind(), rest) {
        (OperandKind::None, []) => None,
        (OperandKind::None, _) => {
            return Err(parse_error(line, format!("{opcode} takes no operand")));
        }
        (_, [token]) => Some(parse_token(token, opcode.mnemonic())?),
        (_, _) => {
            return Err(parse_error(line, format!("{opcode} takes exactly one operand")));
        }
    };

    let address = parse_token(address, opcode.mnemonic())?;
    if address.is_literal() {
        return Err(parse_error(line, format!("address '{address}' must be a bare number")));
    }
    let key = address.decode(base).map_err(|_| {
        parse_error(line, format!("address '{address}' is not a {base} number"))
    })?;

    Ok((key, Instruction::new(address, opcode, operand)))
}

/// Parses `<address> [value]` into `memory`.
fn parse_memory_line(line: usize, tokens: &[&str], memory: &mut Memory) -> Result<(), VMError> {
    let (address, value) = match tokens {
        [address] => (*address, Numeral::empty()),
        [address, value] => (*address, parse_token(value, DATA_CONTEXT)?),
        _ => return Err(parse_error(line, "expected '<address> [value]'")),
    };
    if !memory.insert_new(address.to_string(), value) {
        return Err(VMError::DuplicateAddress {
            line,
            address: address.to_string(),
        });
    }
    Ok(())
}

/// Parses `<ACC|IX> <value>` into `registers`.
fn parse_register_line(
    line: usize,
    tokens: &[&str],
    registers: &mut Registers,
    seen: &mut HashSet<Register>,
) -> Result<(), VMError> {
    let [name, value] = tokens else {
        return Err(parse_error(line, "expected '<ACC|IX> <value>'"));
    };
    let reg: Register = name
        .parse()
        .map_err(|_| parse_error(line, format!("unknown register '{name}'")))?;
    if !seen.insert(reg) {
        return Err(VMError::DuplicateAddress {
            line,
            address: reg.to_string(),
        });
    }
    let value = parse_token(value, REGISTER_CONTEXT)?;
    if !value.is_literal() {
        return Err(parse_error(
            line,
            format!("register value '{value}' must be a #, & or B literal"),
        ));
    }
    *registers.get_mut(reg) = value;
    Ok(())
}

/// Parses a whole program image.
fn parse_image(source: &str, base: Base) -> Result<Machine, VMError> {
    let mut section = Section::Program;
    let mut instructions: Vec<(i64, Instruction)> = Vec::new();
    let mut addresses: HashMap<i64, usize> = HashMap::new();
    let mut memory = Memory::new();
    let mut registers = Registers::new();
    let mut seen_registers = HashSet::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(next) = parse_section_marker(line) {
            section = next;
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match section {
            Section::Program => {
                let (key, instr) = parse_instruction(line_no, &tokens, base)?;
                if addresses.insert(key, line_no).is_some() {
                    return Err(VMError::DuplicateAddress {
                        line: line_no,
                        address: instr.address.to_string(),
                    });
                }
                instructions.push((key, instr));
            }
            Section::Memory => parse_memory_line(line_no, &tokens, &mut memory)?,
            Section::Registers => {
                parse_register_line(line_no, &tokens, &mut registers, &mut seen_registers)?
            }
        }
    }

    if instructions.is_empty() {
        return Err(VMError::EmptyProgram);
    }
    instructions.sort_by_key(|(key, _)| *key);
    let program = Program::new(instructions.into_iter().map(|(_, instr)| instr).collect());

    Ok(Machine::new(program, memory, registers, base))
}

/// Loads a program image from source text, reading bare numerals in `base`.
pub fn load_source(source: impl Into<String>, base: Base) -> Result<Machine, VMError> {
    load_source_with_name(&source.into(), "<source>", base)
}

/// Loads source with an associated filename for error diagnostics.
fn load_source_with_name(source: &str, source_name: &str, base: Base) -> Result<Machine, VMError> {
    let result = parse_image(source, base);
    if let Err(err) = &result {
        log_load_error(source_name, source, err);
    }
    result
}

/// Loads a program image file.
pub fn first_pass<P: AsRef<Path>>(path: P, base: Base) -> Result<Machine, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;
    load_source_with_name(&source, &path_ref.display().to_string(), base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn bare(text: &str) -> Numeral {
        Numeral::Bare(text.into())
    }

    #[test]
    fn load_minimal_program() {
        let machine = load_source("0 LDM #5\n1 STO 10\n2 END\n[ memory ]\n10\n", Base::Decimal)
            .unwrap();
        assert_eq!(machine.program.len(), 3);
        assert_eq!(machine.program.origin(), Some(&bare("0")));
        assert_eq!(
            machine.program.get(0).unwrap().operand,
            Some(Numeral::Immediate(5))
        );
        assert_eq!(machine.memory.get("10"), Some(&Numeral::empty()));
        assert_eq!(machine.registers.get(Register::Acc), &Numeral::Immediate(0));
        assert_eq!(machine.base, Base::Decimal);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let source = "; header\n\n   \n0 END ; stop here\n";
        let machine = load_source(source, Base::Decimal).unwrap();
        assert_eq!(machine.program.len(), 1);
    }

    #[test]
    fn section_markers_case_insensitive() {
        let source = "[ PROGRAM ]\n0 end\n[Memory]\n5 #1\n[ registers ]\nIX &0A\n";
        let machine = load_source(source, Base::Decimal).unwrap();
        assert_eq!(machine.program.get(0).unwrap().opcode, Opcode::End);
        assert_eq!(machine.memory.get("5"), Some(&Numeral::Immediate(1)));
        assert_eq!(machine.registers.get(Register::Ix), &Numeral::Hex("0A".into()));
    }

    #[test]
    fn program_sorted_by_declared_base_address() {
        // In binary, "10" is 2 and "1" is 1.
        let source = "10 END\n1 OUT\n0 IN\n";
        let machine = load_source(source, Base::Binary).unwrap();
        let order: Vec<_> = machine.program.iter().map(|i| i.opcode).collect();
        assert_eq!(order, [Opcode::In, Opcode::Out, Opcode::End]);
    }

    #[test]
    fn memory_keys_keep_their_text() {
        let machine = load_source("0 END\n[ memory ]\n1010 #1\n", Base::Binary).unwrap();
        assert!(machine.memory.contains("1010"));
    }

    #[test]
    fn unknown_opcode() {
        let err = load_source("0 NOP\n", Base::Decimal).unwrap_err();
        assert!(matches!(
            err,
            VMError::InvalidInstructionName { line: 1, ref name } if name == "NOP"
        ));
    }

    #[test]
    fn wrong_arity() {
        assert!(matches!(
            load_source("0 END 5\n", Base::Decimal),
            Err(VMError::ParseError { line: 1, .. })
        ));
        assert!(matches!(
            load_source("0 OUT\n1 LDD\n", Base::Decimal),
            Err(VMError::ParseError { line: 2, .. })
        ));
        assert!(matches!(
            load_source("0 ADD 1 2\n", Base::Decimal),
            Err(VMError::ParseError { line: 1, .. })
        ));
    }

    #[test]
    fn invalid_immediate() {
        assert!(matches!(
            load_source("0 LDM #x\n", Base::Decimal),
            Err(VMError::InvalidOperand { opcode: "LDM", .. })
        ));
        assert!(matches!(
            load_source("0 END\n[ memory ]\n1 #\n", Base::Decimal),
            Err(VMError::InvalidOperand { opcode: DATA_CONTEXT, .. })
        ));
    }

    #[test]
    fn address_must_decode_in_base() {
        let err = load_source("2 END\n", Base::Binary).unwrap_err();
        assert!(matches!(err, VMError::ParseError { line: 1, .. }));
    }

    #[test]
    fn tagged_instruction_address_rejected() {
        for source in ["#3 END\n", "&3 END\n", "0 IN\nB1 END\n"] {
            assert!(
                matches!(
                    load_source(source, Base::Decimal),
                    Err(VMError::ParseError { .. })
                ),
                "{source:?}"
            );
        }
        let err = load_source("0 IN\n#1 END\n", Base::Decimal).unwrap_err();
        assert!(matches!(err, VMError::ParseError { line: 2, .. }));
    }

    #[test]
    fn register_value_must_be_tagged() {
        for value in ["5", "junk", "10"] {
            let source = format!("0 END\n[ registers ]\nACC {value}\n");
            assert!(
                matches!(
                    load_source(&source, Base::Decimal),
                    Err(VMError::ParseError { line: 3, .. })
                ),
                "{value}"
            );
        }
        let machine =
            load_source("0 END\n[ registers ]\nACC #-4\nIX B11\n", Base::Decimal).unwrap();
        assert_eq!(machine.registers.get(Register::Acc), &Numeral::Immediate(-4));
        assert_eq!(machine.registers.get(Register::Ix), &Numeral::Bin("11".into()));
    }

    #[test]
    fn duplicate_addresses() {
        assert!(matches!(
            load_source("1 IN\n01 OUT\n", Base::Decimal),
            Err(VMError::DuplicateAddress { line: 2, .. })
        ));
        assert!(matches!(
            load_source("0 END\n[ memory ]\n5\n5 #1\n", Base::Decimal),
            Err(VMError::DuplicateAddress { line: 4, .. })
        ));
        assert!(matches!(
            load_source("0 END\n[ registers ]\nACC #1\nACC #2\n", Base::Decimal),
            Err(VMError::DuplicateAddress { line: 4, .. })
        ));
    }

    #[test]
    fn unknown_register() {
        assert!(matches!(
            load_source("0 END\n[ registers ]\nR1 #1\n", Base::Decimal),
            Err(VMError::ParseError { line: 3, .. })
        ));
    }

    #[test]
    fn empty_program() {
        assert!(matches!(
            load_source("[ memory ]\n10 #1\n", Base::Decimal),
            Err(VMError::EmptyProgram)
        ));
        assert!(matches!(load_source("", Base::Decimal), Err(VMError::EmptyProgram)));
    }

    #[test]
    fn section_marker_parsing() {
        assert_eq!(parse_section_marker("[ program ]"), Some(Section::Program));
        assert_eq!(parse_section_marker("[memory]"), Some(Section::Memory));
        assert_eq!(parse_section_marker("  [ Registers ]  "), Some(Section::Registers));
        assert_eq!(parse_section_marker("[ data ]"), None);
        assert_eq!(parse_section_marker("program"), None);
    }

    #[test]
    fn diagnostic_points_at_line() {
        let source = "0 LDM #1\n1 FOO 3\n";
        let diag = render_load_diagnostic("prog.lmc", source, 2, "unknown opcode 'FOO'");
        assert!(diag.starts_with("error: unknown opcode 'FOO'\n"));
        assert!(diag.contains(" --> prog.lmc:2"));
        assert!(diag.contains("   2 | 1 FOO 3"));
    }

    #[test]
    fn first_pass_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0 LDD 11\n1 END\n[ memory ]\n11 &FF").unwrap();
        let machine = first_pass(file.path(), Base::Hex).unwrap();
        assert_eq!(machine.program.len(), 2);
        assert_eq!(machine.memory.get("11"), Some(&Numeral::Hex("FF".into())));
        assert_eq!(machine.base, Base::Hex);
    }

    #[test]
    fn first_pass_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.lmc");
        assert!(matches!(
            first_pass(&path, Base::Decimal),
            Err(VMError::IoError { .. })
        ));
    }
}
