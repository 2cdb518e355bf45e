// engine.rs
//
// The pipeline driver: advances the global cycle counter and runs
// Commit -> Write-Result -> Execute -> Issue per tick, in that reverse-
// pipeline order, and maintains the snapshot history that makes stepping
// reversible.

use std::collections::HashSet;

use crate::decode::{DecodedInstruction, Direction, ExecResult, InstructionKind, Opcode};
use crate::errors::EngineError;
use crate::memory::Memory;
use crate::regfile::RegisterFile;
use crate::seed::Seed;
use crate::tomasulo::rob::{RobRing, RobState};
use crate::tomasulo::rs::{Operand, RsPool};
use crate::decode::RsClass;
use crate::trace::Program;

/// Enumerated configuration for the RS pools and ROB capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub num_mem_rs: usize,
    pub num_add_rs: usize,
    pub num_logic_rs: usize,
    pub num_mult_rs: usize,
    pub rob_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { num_mem_rs: 2, num_add_rs: 3, num_logic_rs: 2, num_mult_rs: 1, rob_size: 8 }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.num_mem_rs == 0 || self.num_add_rs == 0 || self.num_logic_rs == 0 || self.num_mult_rs == 0 {
            return Err(EngineError::ConfigInvalid(
                "every reservation-station pool must have at least one slot".to_string(),
            ));
        }
        if self.rob_size == 0 {
            return Err(EngineError::ConfigInvalid("rob_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Aggregate pools for each RS class, separately sized per configuration.
#[derive(Debug, Clone)]
pub struct RsBank {
    pub mem: RsPool,
    pub add: RsPool,
    pub branch: RsPool,
    pub mul: RsPool,
}

impl RsBank {
    fn new(config: &EngineConfig) -> Self {
        Self {
            mem: RsPool::new(RsClass::Mem, config.num_mem_rs),
            add: RsPool::new(RsClass::Add, config.num_add_rs),
            branch: RsPool::new(RsClass::Branch, config.num_logic_rs),
            mul: RsPool::new(RsClass::Mul, config.num_mult_rs),
        }
    }

    pub fn pool(&self, class: RsClass) -> &RsPool {
        match class {
            RsClass::Mem => &self.mem,
            RsClass::Add => &self.add,
            RsClass::Branch => &self.branch,
            RsClass::Mul => &self.mul,
        }
    }

    pub fn pool_mut(&mut self, class: RsClass) -> &mut RsPool {
        match class {
            RsClass::Mem => &mut self.mem,
            RsClass::Add => &mut self.add,
            RsClass::Branch => &mut self.branch,
            RsClass::Mul => &mut self.mul,
        }
    }

    fn for_each_pool_mut(&mut self) -> [&mut RsPool; 4] {
        [&mut self.mem, &mut self.add, &mut self.branch, &mut self.mul]
    }
}

/// All mutable engine state: exactly what a snapshot captures and a
/// `step_back()` wholesale-restores. Plain owned fields only, so `Clone`
/// is a deep, alias-free copy with no extra work.
#[derive(Debug, Clone)]
pub struct State {
    pub regfile: RegisterFile,
    pub memory: Memory,
    pub rs: RsBank,
    pub rob: RobRing,
    pub pc: usize,
    pub cycle: usize,
    pub committed: usize,
    pub bubbles: usize,
    pub retired: Vec<DecodedInstruction>,
}

impl State {
    fn new(config: &EngineConfig) -> Self {
        Self {
            regfile: RegisterFile::new(),
            memory: Memory::new(),
            rs: RsBank::new(config),
            rob: RobRing::new(config.rob_size),
            pc: 0,
            cycle: 0,
            committed: 0,
            bubbles: 0,
            retired: Vec::new(),
        }
    }
}

/// Snapshot of metrics exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Metrics {
    pub total_cycles: usize,
    pub committed_instructions: usize,
    pub ipc: f64,
    pub bubble_cycles: usize,
    pub program_counter: usize,
}

pub struct Engine {
    config: EngineConfig,
    program: Program,
    seed: Seed,
    state: State,
    history: Vec<State>,
}

impl Engine {
    pub fn new(config: EngineConfig, program: Program, seed: Seed) -> Result<Self, EngineError> {
        config.validate()?;
        let mut state = State::new(&config);
        seed.apply(&mut state.regfile, &mut state.memory);
        for name in &program.register_names {
            state.regfile.ensure(name);
        }
        state.regfile.pin_zero_register();
        Ok(Self { config, program, seed, state, history: Vec::new() })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Re-load the program and reseed, discarding all in-flight state and
    /// the snapshot history.
    pub fn reset(&mut self) {
        let mut state = State::new(&self.config);
        self.seed.apply(&mut state.regfile, &mut state.memory);
        for name in &self.program.register_names {
            state.regfile.ensure(name);
        }
        state.regfile.pin_zero_register();
        self.state = state;
        self.history.clear();
    }

    pub fn is_finished(&self) -> bool {
        self.state.pc >= self.program.instructions.len() && self.state.rob.is_empty()
    }

    pub fn metrics(&self) -> Metrics {
        let ipc = if self.state.cycle > 0 {
            self.state.committed as f64 / self.state.cycle as f64
        } else {
            0.0
        };
        Metrics {
            total_cycles: self.state.cycle,
            committed_instructions: self.state.committed,
            ipc,
            bubble_cycles: self.state.bubbles,
            program_counter: self.state.pc,
        }
    }

    /// Advance the engine by one logical cycle.
    pub fn tick(&mut self) {
        self.history.push(self.state.clone());

        self.state.cycle += 1;

        let committed_this_cycle = self.commit_stage();
        self.write_result_stage();
        self.execute_stage();
        let issued_this_cycle = self.issue_stage();

        if !issued_this_cycle && !committed_this_cycle && !self.is_finished() {
            self.state.bubbles += 1;
        }
    }

    /// Pop the most recent snapshot and restore it wholesale. Returns false
    /// if there is no history to pop.
    pub fn step_back(&mut self) -> bool {
        match self.history.pop() {
            Some(prev) => {
                self.state = prev;
                true
            },
            None => false,
        }
    }

    // ---- Issue -------------------------------------------------------

    fn issue_stage(&mut self) -> bool {
        if self.state.pc >= self.program.instructions.len() {
            return false;
        }
        if self.state.rob.is_full() {
            return false;
        }
        let template = self.program.instructions[self.state.pc].clone();
        let class = template.opcode.rs_class();
        let rs_idx = match self.state.rs.pool(class).find_free() {
            Some(i) => i,
            None => return false,
        };

        let rob_idx = self.state.rob.tail;
        let mut instruction = template;
        instruction.timestamps.issue = self.state.cycle as i64;
        instruction.program_index = self.state.pc;

        let predicted = if instruction.opcode.is_branch() { Some(Direction::NotTaken) } else { None };
        let target_index = if instruction.opcode.is_branch() {
            Some(instruction.address as usize)
        } else {
            None
        };

        let (op1, op2) = self.capture_operands(&instruction);

        let dest_reg = if instruction.opcode.has_destination_register() {
            instruction.dest.clone()
        } else {
            None
        };
        if let Some(ref d) = dest_reg {
            self.state.regfile.ensure(d);
            self.state.regfile.rename(d, rob_idx);
        }

        self.state.rs.pool_mut(class).stations[rs_idx].issue(instruction.opcode, op1, op2, rob_idx);

        let entry = &mut self.state.rob.entries[rob_idx];
        entry.busy = true;
        entry.state = RobState::Issued;
        entry.program_index = self.state.pc;
        entry.kind = Some(instruction.opcode.kind());
        entry.dest_register = dest_reg;
        entry.value = None;
        entry.producing_rs = Some((class, rs_idx));
        entry.predicted = predicted;
        entry.actual = None;
        entry.target_index = target_index;
        entry.instruction = Some(instruction);

        self.state.rob.advance_tail();
        self.state.pc += 1;
        true
    }

    /// Resolve one source-register name into an operand, per the shared
    /// protocol used for both source positions.
    fn resolve_register_operand(&self, name: &str) -> Operand {
        if !self.state.regfile.is_busy(name) {
            return Operand::Value(self.state.regfile.read(name));
        }
        let tag = self.state.regfile.rename_tag(name).expect("busy register must carry a tag");
        let entry = &self.state.rob.entries[tag];
        if entry.state == RobState::WriteResult {
            if let Some(value) = entry.value {
                return Operand::Value(forward_raw(value));
            }
        }
        Operand::Pending(tag)
    }

    fn capture_operands(&self, instruction: &DecodedInstruction) -> (Option<Operand>, Option<Operand>) {
        use Opcode::*;
        match instruction.opcode {
            Slli | Srli => {
                let op1 = instruction.src1.as_deref().map(|s| self.resolve_register_operand(s));
                let op2 = Some(Operand::Value(instruction.immediate));
                (op1, op2)
            },
            Lw | Lb => {
                let op1 = instruction.src1.as_deref().map(|s| self.resolve_register_operand(s));
                (op1, None)
            },
            Sw | Sb => {
                // src1 = base register (address arithmetic), src2 = value to store.
                let op1 = instruction.src1.as_deref().map(|s| self.resolve_register_operand(s));
                let op2 = instruction.src2.as_deref().map(|s| self.resolve_register_operand(s));
                (op1, op2)
            },
            Beq | Bne | Add | Sub | Or | And | Mul | Div => {
                let op1 = instruction.src1.as_deref().map(|s| self.resolve_register_operand(s));
                let op2 = instruction.src2.as_deref().map(|s| self.resolve_register_operand(s));
                (op1, op2)
            },
        }
    }

    // ---- Execute -------------------------------------------------------

    fn execute_stage(&mut self) {
        // Clear any RS whose destination ROB entry is no longer busy
        // (flushed by a misprediction earlier this tick).
        for pool in self.state.rs.for_each_pool_mut() {
            for rs in &mut pool.stations {
                if rs.busy {
                    let rob_idx = rs.dest_rob.expect("busy RS must have a destination");
                    if !self.state.rob.entries[rob_idx].busy {
                        rs.clear();
                    }
                }
            }
        }

        // Already-executing stations: decrement, and finish those that
        // reach zero remaining cycles.
        let mut to_finish = Vec::new();
        for class in RsClass::ALL {
            for rs_idx in 0..self.state.rs.pool(class).stations.len() {
                let rob_idx = match self.state.rs.pool(class).stations[rs_idx].dest_rob {
                    Some(r) if self.state.rs.pool(class).stations[rs_idx].busy => r,
                    _ => continue,
                };
                let already_executing =
                    self.state.rob.entries[rob_idx].instruction.as_ref().map(|i| i.timestamps.execute_start != -1).unwrap_or(false);
                if !already_executing {
                    continue;
                }
                let instr = self.state.rob.entries[rob_idx].instruction.as_mut().unwrap();
                instr.cycles_remaining = instr.cycles_remaining.saturating_sub(1);
                if instr.cycles_remaining == 0 {
                    to_finish.push((class, rs_idx, rob_idx));
                }
            }
        }
        for (class, rs_idx, rob_idx) in to_finish {
            self.finish_execution(class, rs_idx, rob_idx);
        }

        // Ready-to-start stations: at most one per class may begin this
        // cycle; oldest-first by destination ROB index.
        for class in RsClass::ALL {
            let mut candidates: Vec<(usize, usize)> = Vec::new();
            for (rs_idx, rs) in self.state.rs.pool(class).stations.iter().enumerate() {
                if !rs.busy {
                    continue;
                }
                let rob_idx = rs.dest_rob.unwrap();
                let not_started = self.state.rob.entries[rob_idx]
                    .instruction
                    .as_ref()
                    .map(|i| i.timestamps.execute_start == -1)
                    .unwrap_or(false);
                if not_started && rs.operands_ready() {
                    candidates.push((rob_idx, rs_idx));
                }
            }
            candidates.sort_by_key(|&(rob_idx, _)| rob_idx);

            if let Some(&(rob_idx, rs_idx)) = candidates.first() {
                let cycle = self.state.cycle as i64;
                let instr = self.state.rob.entries[rob_idx].instruction.as_mut().unwrap();
                instr.timestamps.execute_start = cycle;
                instr.cycles_remaining = instr.cycles_remaining.saturating_sub(1);
                let finished = instr.cycles_remaining == 0;
                self.state.rob.entries[rob_idx].state = RobState::Executing;
                if finished {
                    self.finish_execution(class, rs_idx, rob_idx);
                }
            }
        }
    }

    fn finish_execution(&mut self, class: RsClass, rs_idx: usize, rob_idx: usize) {
        let rs = &self.state.rs.pool(class).stations[rs_idx];
        let vj = rs.op1.and_then(|o| o.value()).unwrap_or(0);
        let vk = rs.op2.and_then(|o| o.value()).unwrap_or(0);
        let opcode = self.state.rob.entries[rob_idx]
            .instruction
            .as_ref()
            .expect("executing entry must carry its instruction")
            .opcode;
        let address = self.state.rob.entries[rob_idx].instruction.as_ref().unwrap().address;

        let (result, actual) = compute_result(opcode, vj, vk, address, &mut self.state.memory);

        let entry = &mut self.state.rob.entries[rob_idx];
        entry.value = Some(result);
        entry.state = RobState::ReadyToWrite;
        if let Some(dir) = actual {
            entry.actual = Some(dir);
        }
        if let Some(instr) = entry.instruction.as_mut() {
            instr.ready_to_write = true;
        }
    }

    // ---- Write-Result ---------------------------------------------------

    fn write_result_stage(&mut self) {
        let candidate = self
            .state
            .rob
            .entries
            .iter()
            .filter(|e| {
                e.busy
                    && e.state == RobState::ReadyToWrite
                    && e.instruction.as_ref().map(|i| i.timestamps.write_result == -1).unwrap_or(false)
            })
            .min_by_key(|e| e.index)
            .map(|e| e.index);

        let rob_idx = match candidate {
            Some(i) => i,
            None => return,
        };

        let value = self.state.rob.entries[rob_idx].value.expect("ready-to-write entry must carry a value");
        let raw = forward_raw(value);

        self.state.rob.entries[rob_idx].state = RobState::WriteResult;
        if let Some(instr) = self.state.rob.entries[rob_idx].instruction.as_mut() {
            instr.timestamps.write_result = self.state.cycle as i64;
        }

        for pool in self.state.rs.for_each_pool_mut() {
            for rs in &mut pool.stations {
                rs.snoop_broadcast(rob_idx, raw);
            }
        }

        if let Some((class, rs_idx)) = self.state.rob.entries[rob_idx].producing_rs {
            if self.state.rs.pool(class).stations[rs_idx].dest_rob == Some(rob_idx) {
                self.state.rs.pool_mut(class).stations[rs_idx].clear();
            }
        }
    }

    // ---- Commit ----------------------------------------------------------

    /// Returns true if an instruction retired this cycle.
    fn commit_stage(&mut self) -> bool {
        let head = self.state.rob.head;
        if !self.state.rob.entries[head].busy {
            return false;
        }

        match self.state.rob.entries[head].state {
            RobState::WriteResult => {
                self.state.rob.entries[head].state = RobState::Commit;
                if let Some(instr) = self.state.rob.entries[head].instruction.as_mut() {
                    instr.timestamps.commit = self.state.cycle as i64;
                }
                false
            },
            RobState::Commit => {
                let was_commit_timestamp_previous_cycle = self.state.rob.entries[head]
                    .instruction
                    .as_ref()
                    .map(|i| i.timestamps.commit < self.state.cycle as i64)
                    .unwrap_or(false);
                if !was_commit_timestamp_previous_cycle {
                    return false;
                }
                self.retire_head()
            },
            _ => false,
        }
    }

    fn retire_head(&mut self) -> bool {
        let head = self.state.rob.head;
        let kind = self.state.rob.entries[head].kind.expect("committing entry must carry a kind");

        if kind == InstructionKind::Branch {
            let predicted = self.state.rob.entries[head].predicted.unwrap_or(Direction::NotTaken);
            let actual = self.state.rob.entries[head].actual.unwrap_or(Direction::NotTaken);
            if predicted != actual {
                self.handle_misprediction(head, actual);
                self.state.committed += 1;
                self.state.bubbles += 1;
                return true;
            }
            self.finish_retire(head);
            self.state.committed += 1;
            return true;
        }

        if kind == InstructionKind::Alu || kind == InstructionKind::Load {
            if let (Some(dest), Some(value)) =
                (self.state.rob.entries[head].dest_register.clone(), self.state.rob.entries[head].value)
            {
                self.state.regfile.writeback(&dest, head, forward_raw(value));
            }
        }

        self.finish_retire(head);
        self.state.committed += 1;
        true
    }

    fn finish_retire(&mut self, head: usize) {
        if let Some(instr) = self.state.rob.entries[head].instruction.clone() {
            self.state.retired.push(instr);
        }
        self.state.rob.entries[head].clear();
        self.state.rob.advance_head();
    }

    /// Flush and redirect on a mispredicted branch.
    fn handle_misprediction(&mut self, branch_rob_idx: usize, actual: Direction) {
        let program_index = self.state.rob.entries[branch_rob_idx].program_index;
        let target = self.state.rob.entries[branch_rob_idx].target_index.unwrap_or(program_index + 1);

        self.state.pc = match actual {
            Direction::Taken => target,
            Direction::NotTaken => program_index + 1,
        };

        let mut flushed: HashSet<usize> = self.state.rob.indices_younger_than_head().into_iter().collect();
        flushed.insert(branch_rob_idx);

        self.state.regfile.clear_renames_in(&flushed);

        for pool in self.state.rs.for_each_pool_mut() {
            for rs in &mut pool.stations {
                rs.clear();
            }
        }

        if let Some(instr) = self.state.rob.entries[branch_rob_idx].instruction.clone() {
            self.state.retired.push(instr);
        }
        self.state.rob.entries[branch_rob_idx].clear();

        let post_branch = (branch_rob_idx + 1) % self.state.rob.capacity();
        self.state.rob.head = post_branch;
        self.state.rob.tail = post_branch;
        self.state.rob.occupancy = 0;
        for entry in &mut self.state.rob.entries {
            if entry.busy {
                entry.clear();
            }
        }
    }
}

/// Convert a computed result to the raw integer form used for register
/// writeback and CDB forwarding. Non-numeric sentinels forward as 0: they
/// are control/store markers, never meant to feed further arithmetic.
fn forward_raw(result: ExecResult) -> i64 {
    result.as_value().unwrap_or(0)
}

fn compute_result(
    opcode: Opcode,
    vj: i64,
    vk: i64,
    address: i64,
    memory: &mut Memory,
) -> (ExecResult, Option<Direction>) {
    use Opcode::*;
    match opcode {
        Add => (ExecResult::Value(vj.wrapping_add(vk)), None),
        Sub => (ExecResult::Value(vj.wrapping_sub(vk)), None),
        Or => (ExecResult::Value(vj | vk), None),
        And => (ExecResult::Value(vj & vk), None),
        Mul => (ExecResult::Value(vj.wrapping_mul(vk)), None),
        Div => {
            if vk == 0 {
                (ExecResult::DivByZero, None)
            } else {
                (ExecResult::Value(vj.wrapping_div(vk)), None)
            }
        },
        Slli => (ExecResult::Value(((vj as u64) << (vk & 63)) as i64), None),
        Srli => (ExecResult::Value(((vj as u64) >> (vk & 63)) as i64), None),
        Lw | Lb => {
            let effective = vj.wrapping_add(address);
            (ExecResult::Value(memory.read(effective)), None)
        },
        Sw | Sb => {
            let effective = vj.wrapping_add(address);
            memory.write(effective, vk);
            (ExecResult::MemStored, None)
        },
        Beq => {
            let taken = vj == vk;
            (ExecResult::BranchEvaluated, Some(if taken { Direction::Taken } else { Direction::NotTaken }))
        },
        Bne => {
            let taken = vj != vk;
            (ExecResult::BranchEvaluated, Some(if taken { Direction::Taken } else { Direction::NotTaken }))
        },
    }
}
