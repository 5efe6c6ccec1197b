//! Machine state owned by a run.
//!
//! [`Memory`] is the address-keyed data store and [`Machine`] bundles it with
//! the program image and register file. A machine is built once by the first
//! pass, rewritten once by the normalizer and then handed to a single
//! [`VM`](crate::virtual_machine::vm::VM) which owns it until the run ends.

use crate::virtual_machine::numeral::{Base, Numeral};
use crate::virtual_machine::program::Program;
use crate::virtual_machine::vm::registers::Registers;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Address-keyed data store.
///
/// Keys are address text: in the declared base when loaded, canonical
/// decimal after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    cells: BTreeMap<String, Numeral>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell, returning false if the key already exists.
    pub fn insert_new(&mut self, address: String, value: Numeral) -> bool {
        match self.cells.entry(address) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.cells.contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<&Numeral> {
        self.cells.get(address)
    }

    /// Overwrites an existing cell. Returns false if there is no such cell.
    pub fn store(&mut self, address: &str, value: Numeral) -> bool {
        match self.cells.get_mut(address) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Removes a cell, handing back its value.
    pub fn remove(&mut self, address: &str) -> Option<Numeral> {
        self.cells.remove(address)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.cells.keys()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in ascending numeric address order; keys that are not decimal
    /// numbers sort last, by text.
    pub fn entries(&self) -> Vec<(&String, &Numeral)> {
        let mut entries: Vec<_> = self.cells.iter().collect();
        let numeric = |key: &str| key.parse::<u64>().unwrap_or(u64::MAX);
        entries.sort_by(|(a, _), (b, _)| numeric(a).cmp(&numeric(b)).then_with(|| a.cmp(b)));
        entries
    }
}

/// Program image, memory and registers of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub program: Program,
    pub memory: Memory,
    pub registers: Registers,
    /// Declared base; bare memory values are decoded with it.
    pub base: Base,
}

impl Machine {
    pub fn new(program: Program, memory: Memory, registers: Registers, base: Base) -> Self {
        Self {
            program,
            memory,
            registers,
            base,
        }
    }
}
