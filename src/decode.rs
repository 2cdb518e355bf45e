// decode.rs
//
// Decoded instruction records. An instruction is immutable once decoded from
// the trace (see trace.rs); only its pipeline timestamps and remaining-cycle
// counter mutate as it moves through the engine.

use std::fmt;

/// The fixed opcode set this core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Or,
    And,
    Slli,
    Srli,
    Beq,
    Bne,
    Mul,
    Div,
    Lw,
    Lb,
    Sw,
    Sb,
}

impl Opcode {
    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        match s.to_ascii_uppercase().as_str() {
            "ADD" => Some(Opcode::Add),
            "SUB" => Some(Opcode::Sub),
            "OR" => Some(Opcode::Or),
            "AND" => Some(Opcode::And),
            "SLLI" => Some(Opcode::Slli),
            "SRLI" => Some(Opcode::Srli),
            "BEQ" => Some(Opcode::Beq),
            "BNE" => Some(Opcode::Bne),
            "MUL" => Some(Opcode::Mul),
            "DIV" => Some(Opcode::Div),
            "LW" => Some(Opcode::Lw),
            "LB" => Some(Opcode::Lb),
            "SW" => Some(Opcode::Sw),
            "SB" => Some(Opcode::Sb),
            _ => None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Or => "OR",
            Opcode::And => "AND",
            Opcode::Slli => "SLLI",
            Opcode::Srli => "SRLI",
            Opcode::Beq => "BEQ",
            Opcode::Bne => "BNE",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Lw => "LW",
            Opcode::Lb => "LB",
            Opcode::Sw => "SW",
            Opcode::Sb => "SB",
        }
    }

    /// Latency in cycles, per the opcode table.
    pub fn latency(self) -> usize {
        match self {
            Opcode::Add | Opcode::Sub | Opcode::Or | Opcode::And => 1,
            Opcode::Slli | Opcode::Srli => 1,
            Opcode::Beq | Opcode::Bne => 1,
            Opcode::Mul => 4,
            Opcode::Div => 10,
            Opcode::Lw | Opcode::Lb => 2,
            Opcode::Sw | Opcode::Sb => 2,
        }
    }

    /// The reservation-station class this opcode must dispatch through.
    pub fn rs_class(self) -> RsClass {
        match self {
            Opcode::Add | Opcode::Sub => RsClass::Add,
            Opcode::Or | Opcode::And => RsClass::Branch,
            Opcode::Slli | Opcode::Srli => RsClass::Branch,
            Opcode::Beq | Opcode::Bne => RsClass::Branch,
            Opcode::Mul | Opcode::Div => RsClass::Mul,
            Opcode::Lw | Opcode::Lb | Opcode::Sw | Opcode::Sb => RsClass::Mem,
        }
    }

    pub fn kind(self) -> InstructionKind {
        match self {
            Opcode::Add | Opcode::Sub | Opcode::Or | Opcode::And | Opcode::Slli | Opcode::Srli => {
                InstructionKind::Alu
            },
            Opcode::Mul | Opcode::Div => InstructionKind::Alu,
            Opcode::Lw | Opcode::Lb => InstructionKind::Load,
            Opcode::Sw | Opcode::Sb => InstructionKind::Store,
            Opcode::Beq | Opcode::Bne => InstructionKind::Branch,
        }
    }

    pub fn has_destination_register(self) -> bool {
        !matches!(self.kind(), InstructionKind::Store | InstructionKind::Branch)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, Opcode::Slli | Opcode::Srli)
    }

    pub fn is_branch(self) -> bool {
        matches!(self.kind(), InstructionKind::Branch)
    }

    pub fn is_load(self) -> bool {
        matches!(self.kind(), InstructionKind::Load)
    }

    pub fn is_store(self) -> bool {
        matches!(self.kind(), InstructionKind::Store)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// The reservation-station class an opcode is routed to.
///
/// The ADD/BRANCH split does not mirror a real ALU/branch-unit split: it is
/// the contract handed down by the opcode table (OR/AND/SLLI/SRLI/BEQ/BNE all
/// share the BRANCH-class pool) and must be preserved as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RsClass {
    Mem,
    Add,
    Branch,
    Mul,
}

impl RsClass {
    pub const ALL: [RsClass; 4] = [RsClass::Mem, RsClass::Add, RsClass::Branch, RsClass::Mul];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Alu,
    Load,
    Store,
    Branch,
}

/// A decoded instruction, immutable apart from its pipeline timestamps.
#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    pub opcode: Opcode,
    pub src1: Option<String>,
    pub src2: Option<String>,
    pub dest: Option<String>,
    pub immediate: i64,
    pub address: i64,
    /// Program-order index in the trace (0-based).
    pub program_index: usize,
    /// 1-based line number in the trace file, for diagnostics.
    pub source_line: usize,

    pub timestamps: Timestamps,
    pub cycles_remaining: usize,
    pub ready_to_write: bool,
}

impl DecodedInstruction {
    pub fn new(
        opcode: Opcode,
        src1: Option<String>,
        src2: Option<String>,
        dest: Option<String>,
        immediate: i64,
        address: i64,
        program_index: usize,
        source_line: usize,
    ) -> Self {
        Self {
            opcode,
            src1,
            src2,
            dest,
            immediate,
            address,
            program_index,
            source_line,
            timestamps: Timestamps::default(),
            cycles_remaining: opcode.latency(),
            ready_to_write: false,
        }
    }
}

/// The four pipeline timestamps, each -1 until recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub issue: i64,
    pub execute_start: i64,
    pub write_result: i64,
    pub commit: i64,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self { issue: -1, execute_start: -1, write_result: -1, commit: -1 }
    }
}

/// A computed result. Modeled as a sum type rather than an integer-plus-flag
/// pair, so "exactly one of value-or-sentinel" is an invariant the type
/// system enforces rather than a convention callers must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    Value(i64),
    DivByZero,
    MemStored,
    BranchEvaluated,
}

impl ExecResult {
    /// The numeric value this result carries, if any. Branch/store
    /// sentinels and divide-by-zero have none.
    pub fn as_value(self) -> Option<i64> {
        match self {
            ExecResult::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ExecResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecResult::Value(v) => write!(f, "{}", v),
            ExecResult::DivByZero => write!(f, "DIV_BY_ZERO_ERROR"),
            ExecResult::MemStored => write!(f, "MEM_STORED"),
            ExecResult::BranchEvaluated => write!(f, "BRANCH_EVALUATED"),
        }
    }
}

/// Taken/not-taken direction for a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Taken,
    NotTaken,
}
