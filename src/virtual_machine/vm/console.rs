//! Console seam for `IN`, `OUT` and `END`.
//!
//! The [`Console`] trait is the only way the interpreter touches the outside
//! world, so tests can script input and capture output.

use std::io::{self, BufRead, Write};

/// Line-oriented console used by the interpreter.
pub trait Console {
    /// Reads one line without its line terminator. Returns an empty string
    /// at end of input.
    fn read_line(&mut self) -> io::Result<String>;
    /// Writes `text` and makes it visible immediately.
    fn write_str(&mut self, text: &str) -> io::Result<()>;
}

impl<C: Console + ?Sized> Console for &mut C {
    fn read_line(&mut self) -> io::Result<String> {
        (**self).read_line()
    }

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        (**self).write_str(text)
    }
}

/// Strips one trailing `\n` or `\r\n`.
pub(crate) fn trim_line_end(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Console bound to the process's standard input and output.
#[derive(Default)]
pub struct StdConsole;

impl StdConsole {
    pub fn new() -> Self {
        Self
    }
}

impl Console for StdConsole {
    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(trim_line_end(&line).to_string())
    }

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    }
}
