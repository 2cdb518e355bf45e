// regfile.rs
//
// The architectural register file. Registers are named (free-form symbolic
// names from the trace, e.g. "R0", "R1", ...) rather than fixed-index, since
// the trace format never constrains the register namespace.

use std::collections::HashMap;

pub const ZERO_REGISTER: &str = "R0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub value: i64,
    pub busy: bool,
    pub rename_tag: Option<usize>,
}

impl Default for Register {
    fn default() -> Self {
        Self { value: 0, busy: false, rename_tag: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    registers: HashMap<String, Register>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a register with this name exists (value 0 if newly created).
    pub fn ensure(&mut self, name: &str) {
        self.registers.entry(name.to_string()).or_default();
    }

    pub fn read(&self, name: &str) -> i64 {
        self.registers.get(name).map(|r| r.value).unwrap_or(0)
    }

    pub fn get(&self, name: &str) -> Register {
        self.registers.get(name).copied().unwrap_or_default()
    }

    pub fn is_busy(&self, name: &str) -> bool {
        self.registers.get(name).map(|r| r.busy).unwrap_or(false)
    }

    pub fn rename_tag(&self, name: &str) -> Option<usize> {
        self.registers.get(name).and_then(|r| r.rename_tag)
    }

    /// Set the raw value of a register, bypassing rename state. Used by the
    /// seed loader and by commit-time writeback.
    pub fn set_value(&mut self, name: &str, value: i64) {
        if name == ZERO_REGISTER {
            return;
        }
        let entry = self.registers.entry(name.to_string()).or_default();
        entry.value = value;
    }

    /// Rename `name` to point at `rob_index`. A no-op on R0.
    pub fn rename(&mut self, name: &str, rob_index: usize) {
        if name == ZERO_REGISTER {
            return;
        }
        let entry = self.registers.entry(name.to_string()).or_default();
        entry.busy = true;
        entry.rename_tag = Some(rob_index);
    }

    /// Clear the busy/rename state of a register, leaving its value intact.
    pub fn clear_rename(&mut self, name: &str) {
        if let Some(entry) = self.registers.get_mut(name) {
            entry.busy = false;
            entry.rename_tag = None;
        }
    }

    /// Commit-time writeback: only effective if the register's current
    /// rename tag still matches `rob_index` (a younger instruction may have
    /// already claimed it).
    pub fn writeback(&mut self, name: &str, rob_index: usize, value: i64) {
        if name == ZERO_REGISTER {
            return;
        }
        if self.rename_tag(name) == Some(rob_index) {
            self.set_value(name, value);
            self.clear_rename(name);
        }
    }

    /// Pin R0 to its architectural constant-zero state.
    pub fn pin_zero_register(&mut self) {
        self.registers.insert(ZERO_REGISTER.to_string(), Register::default());
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.registers.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Register)> {
        self.registers.iter()
    }

    /// Used by misprediction recovery: clear the busy/rename state of
    /// every register whose tag falls in the flushed set, or whose tag is
    /// absent while it is (inconsistently) marked busy.
    pub fn clear_renames_in(&mut self, flushed: &std::collections::HashSet<usize>) {
        for (name, reg) in self.registers.iter_mut() {
            if name == ZERO_REGISTER {
                *reg = Register::default();
                continue;
            }
            let stale = match reg.rename_tag {
                Some(tag) => flushed.contains(&tag),
                None => reg.busy,
            };
            if stale {
                reg.busy = false;
                reg.rename_tag = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_register_ignores_rename_and_writes() {
        let mut rf = RegisterFile::new();
        rf.pin_zero_register();
        rf.rename(ZERO_REGISTER, 3);
        rf.set_value(ZERO_REGISTER, 99);
        let r0 = rf.get(ZERO_REGISTER);
        assert_eq!(r0.value, 0);
        assert!(!r0.busy);
        assert_eq!(r0.rename_tag, None);
    }

    #[test]
    fn writeback_is_ignored_if_tag_no_longer_matches() {
        let mut rf = RegisterFile::new();
        rf.ensure("R1");
        rf.rename("R1", 2);
        rf.rename("R1", 5); // a younger instruction re-claims R1
        rf.writeback("R1", 2, 42); // stale writeback from the older tag
        assert_eq!(rf.read("R1"), 0);
        assert!(rf.is_busy("R1"));
        assert_eq!(rf.rename_tag("R1"), Some(5));
    }

    #[test]
    fn writeback_clears_busy_when_tag_matches() {
        let mut rf = RegisterFile::new();
        rf.ensure("R1");
        rf.rename("R1", 2);
        rf.writeback("R1", 2, 42);
        assert_eq!(rf.read("R1"), 42);
        assert!(!rf.is_busy("R1"));
    }
}
