// seed.rs
//
// The seed contract: the initial register/memory state the core
// accepts as an input to construction and to `reset()`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::warn;

use crate::errors::EngineError;
use crate::memory::Memory;
use crate::regfile::RegisterFile;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seed {
    pub registers: BTreeMap<String, i64>,
    pub memory: BTreeMap<i64, i64>,
}

impl Seed {
    /// The published seed contract: R1=5, R2=5, mem[12]=7, mem[16]=0, mem[108]=5.
    /// R0 is pinned to zero by the register file itself, regardless of seed
    /// contents.
    pub fn default_contract() -> Seed {
        let mut registers = BTreeMap::new();
        registers.insert("R1".to_string(), 5);
        registers.insert("R2".to_string(), 5);

        let mut memory = BTreeMap::new();
        memory.insert(12, 7);
        memory.insert(16, 0);
        memory.insert(108, 5);

        Seed { registers, memory }
    }

    /// Parse a side file of `reg NAME VALUE` / `mem ADDRESS VALUE` lines.
    /// Malformed lines warn and are skipped, mirroring the trace parser's
    /// discipline.
    pub fn parse(text: &str) -> Seed {
        let mut seed = Seed::default();
        for (line_no, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["reg", name, value] => match value.parse::<i64>() {
                    Ok(v) => {
                        seed.registers.insert((*name).to_string(), v);
                    },
                    Err(_) => warn!("seed line {}: invalid register value: {}", line_no + 1, line),
                },
                ["mem", addr, value] => match (addr.parse::<i64>(), value.parse::<i64>()) {
                    (Ok(a), Ok(v)) => {
                        seed.memory.insert(a, v);
                    },
                    _ => warn!("seed line {}: invalid memory cell: {}", line_no + 1, line),
                },
                _ => warn!("seed line {}: unrecognized seed directive: {}", line_no + 1, line),
            }
        }
        seed
    }

    pub fn load(path: &Path) -> Result<Seed, EngineError> {
        let text = fs::read_to_string(path).map_err(EngineError::SeedLoad)?;
        Ok(Seed::parse(&text))
    }

    pub fn apply(&self, regfile: &mut RegisterFile, memory: &mut Memory) {
        for (name, value) in &self.registers {
            regfile.ensure(name);
            regfile.set_value(name, *value);
        }
        for (address, value) in &self.memory {
            memory.write(*address, *value);
        }
        regfile.pin_zero_register();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_contract_matches_the_published_seed() {
        let seed = Seed::default_contract();
        assert_eq!(seed.registers.get("R1"), Some(&5));
        assert_eq!(seed.registers.get("R2"), Some(&5));
        assert_eq!(seed.memory.get(&12), Some(&7));
        assert_eq!(seed.memory.get(&16), Some(&0));
        assert_eq!(seed.memory.get(&108), Some(&5));
    }

    #[test]
    fn parse_reads_reg_and_mem_directives() {
        let seed = Seed::parse("reg R1 9\nmem 108 42\n# comment\n\n");
        assert_eq!(seed.registers.get("R1"), Some(&9));
        assert_eq!(seed.memory.get(&108), Some(&42));
    }

    #[test]
    fn malformed_seed_lines_are_skipped() {
        let seed = Seed::parse("reg R1 not_a_number\nmem oops 5\nbogus line\n");
        assert!(seed.registers.is_empty());
        assert!(seed.memory.is_empty());
    }

    #[test]
    fn apply_pins_zero_register_after_writes() {
        let seed = Seed::parse("reg R0 99\nreg R1 5\n");
        let mut regfile = RegisterFile::new();
        let mut memory = Memory::new();
        seed.apply(&mut regfile, &mut memory);
        assert_eq!(regfile.read(crate::regfile::ZERO_REGISTER), 0);
        assert_eq!(regfile.read("R1"), 5);
    }
}
