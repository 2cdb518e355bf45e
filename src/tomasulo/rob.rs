// tomasulo/rob.rs
//
// The reorder buffer: a fixed-size circular buffer that is the single source
// of truth for program order. Entries are indexed by their stable ring
// position; ROB "index" and "tag" are used interchangeably throughout.

use crate::decode::{DecodedInstruction, Direction, ExecResult, InstructionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobState {
    Empty,
    Issued,
    Executing,
    ReadyToWrite,
    WriteResult,
    Commit,
}

#[derive(Debug, Clone)]
pub struct RobEntry {
    pub index: usize,
    pub busy: bool,
    pub state: RobState,
    pub instruction: Option<DecodedInstruction>,
    pub dest_register: Option<String>,
    pub value: Option<ExecResult>,
    pub program_index: usize,
    pub producing_rs: Option<(crate::decode::RsClass, usize)>,
    pub kind: Option<InstructionKind>,
    pub predicted: Option<Direction>,
    pub actual: Option<Direction>,
    pub target_index: Option<usize>,
}

impl RobEntry {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            busy: false,
            state: RobState::Empty,
            instruction: None,
            dest_register: None,
            value: None,
            program_index: 0,
            producing_rs: None,
            kind: None,
            predicted: None,
            actual: None,
            target_index: None,
        }
    }

    pub fn clear(&mut self) {
        let index = self.index;
        *self = RobEntry::new(index);
    }
}

/// The ROB ring. Head is where commit retires; tail is where issue writes.
#[derive(Debug, Clone)]
pub struct RobRing {
    pub entries: Vec<RobEntry>,
    pub head: usize,
    pub tail: usize,
    pub occupancy: usize,
}

impl RobRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: (0..capacity).map(RobEntry::new).collect(),
            head: 0,
            tail: 0,
            occupancy: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy == 0
    }

    pub fn is_full(&self) -> bool {
        self.entries[self.tail].busy
    }

    fn advance(&mut self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }

    pub fn advance_tail(&mut self) {
        self.tail = self.advance(self.tail);
        self.occupancy += 1;
    }

    pub fn advance_head(&mut self) {
        self.head = self.advance(self.head);
        self.occupancy -= 1;
    }

    /// ROB indices strictly younger than head, walking tail-ward from
    /// head+1 up to (but not including) tail - used by misprediction
    /// recovery to find the flush set.
    pub fn indices_younger_than_head(&self) -> Vec<usize> {
        let cap = self.capacity();
        let mut out = Vec::new();
        let mut i = self.advance(self.head);
        while i != self.tail {
            if self.entries[i].busy {
                out.push(i);
            }
            i = (i + 1) % cap;
        }
        out
    }
}
