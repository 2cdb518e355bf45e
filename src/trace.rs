// trace.rs
//
// The textual trace parser. This is an "external collaborator"
// relative to the pipeline engine in the sense that `Engine::new` consumes
// its output (a `Program`) rather than reaching into the filesystem itself,
// but it is the concrete implementation of the interface the core requires.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::warn;

use crate::decode::{DecodedInstruction, Opcode};
use crate::errors::EngineError;

/// A parsed trace: the decoded instruction list plus every register name
/// mentioned, in source order, and a count of lines that were skipped.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub instructions: Vec<DecodedInstruction>,
    pub register_names: BTreeSet<String>,
    pub skipped_lines: usize,
}

impl Program {
    pub fn parse(text: &str) -> Program {
        let mut program = Program::default();

        for (line_no, raw_line) in text.lines().enumerate() {
            let source_line = line_no + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let tokens: Vec<String> =
                line.split_whitespace().map(|t| t.trim_end_matches(',').to_string()).collect();

            match Self::decode_line(&tokens, program.instructions.len(), source_line) {
                Some(instr) => {
                    if let Some(s) = &instr.src1 {
                        program.register_names.insert(s.clone());
                    }
                    if let Some(s) = &instr.src2 {
                        program.register_names.insert(s.clone());
                    }
                    if let Some(d) = &instr.dest {
                        program.register_names.insert(d.clone());
                    }
                    program.instructions.push(instr);
                },
                None => {
                    warn!("trace line {}: skipping unrecognized instruction: {}", source_line, line);
                    program.skipped_lines += 1;
                },
            }
        }

        program
    }

    pub fn load(path: &Path) -> Result<Program, EngineError> {
        let text = fs::read_to_string(path).map_err(EngineError::TraceLoad)?;
        Ok(Program::parse(&text))
    }

    fn decode_line(tokens: &[String], program_index: usize, source_line: usize) -> Option<DecodedInstruction> {
        let (mnemonic, rest) = tokens.split_first()?;
        let opcode = Opcode::from_mnemonic(mnemonic)?;

        let parse_int = |s: &str| -> Option<i64> { s.parse::<i64>().ok() };

        use Opcode::*;
        match opcode {
            Slli | Srli => {
                let [dest, src1, imm] = rest else { return None };
                let immediate = parse_int(imm)?;
                Some(DecodedInstruction::new(
                    opcode,
                    Some(src1.clone()),
                    None,
                    Some(dest.clone()),
                    immediate,
                    0,
                    program_index,
                    source_line,
                ))
            },
            Lw | Lb => {
                let [dest, src1, offset] = rest else { return None };
                let address = parse_int(offset)?;
                Some(DecodedInstruction::new(
                    opcode,
                    Some(src1.clone()),
                    None,
                    Some(dest.clone()),
                    0,
                    address,
                    program_index,
                    source_line,
                ))
            },
            Sw | Sb => {
                let [value_reg, base_reg, offset] = rest else { return None };
                let address = parse_int(offset)?;
                Some(DecodedInstruction::new(
                    opcode,
                    Some(base_reg.clone()),
                    Some(value_reg.clone()),
                    None,
                    0,
                    address,
                    program_index,
                    source_line,
                ))
            },
            Beq | Bne => {
                let [src1, src2, target] = rest else { return None };
                let target_index = parse_int(target)?;
                Some(DecodedInstruction::new(
                    opcode,
                    Some(src1.clone()),
                    Some(src2.clone()),
                    None,
                    0,
                    target_index,
                    program_index,
                    source_line,
                ))
            },
            Add | Sub | Or | And | Mul | Div => {
                let [dest, src1, src2] = rest else { return None };
                Some(DecodedInstruction::new(
                    opcode,
                    Some(src1.clone()),
                    Some(src2.clone()),
                    Some(dest.clone()),
                    0,
                    0,
                    program_index,
                    source_line,
                ))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_lines() {
        let program = Program::parse("\n# a comment\n   \nADD R3, R1, R2\n");
        assert_eq!(program.instructions.len(), 1);
        assert_eq!(program.skipped_lines, 0);
    }

    #[test]
    fn unrecognized_opcode_warns_and_skips() {
        let program = Program::parse("FOO R1, R2, R3\nADD R3, R1, R2\n");
        assert_eq!(program.instructions.len(), 1);
        assert_eq!(program.skipped_lines, 1);
    }

    #[test]
    fn malformed_operand_count_is_skipped() {
        let program = Program::parse("ADD R3, R1\n");
        assert_eq!(program.instructions.len(), 0);
        assert_eq!(program.skipped_lines, 1);
    }

    #[test]
    fn trailing_commas_are_stripped() {
        let program = Program::parse("ADD R3, R1, R2");
        let instr = &program.instructions[0];
        assert_eq!(instr.dest.as_deref(), Some("R3"));
        assert_eq!(instr.src1.as_deref(), Some("R1"));
        assert_eq!(instr.src2.as_deref(), Some("R2"));
    }

    #[test]
    fn store_operand_order_is_value_then_base_then_offset() {
        let program = Program::parse("SW R3, R0, 108");
        let instr = &program.instructions[0];
        assert_eq!(instr.src2.as_deref(), Some("R3")); // value
        assert_eq!(instr.src1.as_deref(), Some("R0")); // base
        assert_eq!(instr.address, 108);
    }

    #[test]
    fn register_names_are_collected_across_operand_positions() {
        let program = Program::parse("ADD R3, R1, R2\nBEQ R3, R0, 7");
        assert!(program.register_names.contains("R1"));
        assert!(program.register_names.contains("R2"));
        assert!(program.register_names.contains("R3"));
        assert!(program.register_names.contains("R0"));
    }
}
