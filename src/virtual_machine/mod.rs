//! Accumulator machine: program image, numerals and interpreter.
//!
//! A run goes through three stages, each owning the [`state::Machine`] in
//! turn:
//!
//! 1. [`loader`] reads a program image file in the declared base
//! 2. [`normalizer`] rewrites addresses to canonical decimal, exactly once
//! 3. [`vm`] interprets the image from its first instruction
//!
//! # Machine model
//!
//! - **Registers**: `ACC` (accumulator) and `IX` (index), both `#0` initially
//! - **Memory**: address-keyed map of [`numeral::Numeral`] cells, fixed at load
//! - **Program**: address-sorted instructions; the first address is the origin
//! - **Numerals**: `#` immediates, `&` hex, `B` binary, bare text in the
//!   declared [`numeral::Base`]
//!
//! # Modules
//!
//! - [`errors`]: Load and execution error type
//! - [`isa`]: Opcode table and operand kinds
//! - [`loader`]: Program image parser and diagnostics
//! - [`normalizer`]: One-shot base normalization
//! - [`numeral`]: Tagged numeral tokens and declared bases
//! - [`program`]: Instruction and program image types
//! - [`state`]: Memory map and machine bundle
//! - [`validator`]: Operand decoding and addressing-mode checks
//! - [`vm`]: Interpreter, registers and console seam

pub mod errors;
pub mod isa;
pub mod loader;
pub mod normalizer;
pub mod numeral;
pub mod program;
pub mod state;
pub mod validator;
pub mod vm;
