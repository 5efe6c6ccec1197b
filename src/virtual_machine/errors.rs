use thiserror::Error;

/// Errors that can occur while loading, normalizing or executing a program.
#[derive(Debug, Error)]
pub enum VMError {
    /// Operand failed its addressing-mode or numeral-decode contract.
    #[error("invalid operand for {opcode}: '{operand}'")]
    InvalidOperand {
        opcode: &'static str,
        operand: String,
    },
    /// Conditional branch executed before any comparison (flag mode only).
    #[error("{opcode} executed without a preceding comparison")]
    MissingComparison { opcode: &'static str },
    /// Unrecognized opcode mnemonic in the program image.
    #[error("line {line}: unknown opcode '{name}'")]
    InvalidInstructionName { line: usize, name: String },
    /// Malformed line in the program image.
    #[error("line {line}: {message}")]
    ParseError { line: usize, message: String },
    /// Two instructions or memory cells share an address.
    #[error("line {line}: duplicate address '{address}'")]
    DuplicateAddress { line: usize, address: String },
    /// The program image holds no instructions, so it has no origin.
    #[error("program image contains no instructions")]
    EmptyProgram,
    /// Program image could not be read.
    #[error("io error on {path}: {reason}")]
    IoError { path: String, reason: String },
    /// Console read or write failed during execution.
    #[error("console error: {0}")]
    Io(#[from] std::io::Error),
}

impl VMError {
    /// Shorthand for [`VMError::InvalidOperand`].
    pub fn invalid_operand(opcode: &'static str, operand: impl ToString) -> Self {
        VMError::InvalidOperand {
            opcode,
            operand: operand.to_string(),
        }
    }
}
