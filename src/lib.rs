//! Little Man Computer style accumulator machine.
//!
//! Loads a textual program image, normalizes its numerals to decimal and
//! interprets it against a console. See [`session`] for the entry points.

pub mod session;
pub mod utils;
pub mod virtual_machine;
