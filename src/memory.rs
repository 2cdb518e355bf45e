// memory.rs
//
// A flat, sparse, integer-addressed memory. Reads of unset addresses return
// 0; there is no cache hierarchy or alignment enforcement.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Memory {
    cells: HashMap<i64, i64>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, address: i64) -> i64 {
        self.cells.get(&address).copied().unwrap_or(0)
    }

    pub fn write(&mut self, address: i64, value: i64) {
        self.cells.insert(address, value);
    }

    /// Addresses that have been written, for diagnostic dumps.
    pub fn touched(&self) -> impl Iterator<Item = (&i64, &i64)> {
        self.cells.iter()
    }
}
