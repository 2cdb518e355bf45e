// tomasulo/rs.rs
//
// Reservation stations. Pooled by class (MEM/ADD/BRANCH/MUL per the opcode
// table's RS-class contract); each slot holds either a resolved operand
// value or a pending producer tag, never both.

use crate::decode::{Opcode, RsClass};

/// An operand slot: either a resolved value (Vj/Vk) or a pending ROB index
/// to wait on (Qj/Qk). The two are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Value(i64),
    Pending(usize),
}

impl Operand {
    pub fn value(self) -> Option<i64> {
        match self {
            Operand::Value(v) => Some(v),
            Operand::Pending(_) => None,
        }
    }

    pub fn pending_tag(self) -> Option<usize> {
        match self {
            Operand::Pending(tag) => Some(tag),
            Operand::Value(_) => None,
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, Operand::Value(_))
    }
}

#[derive(Debug, Clone)]
pub struct ReservationStation {
    pub class: RsClass,
    pub busy: bool,
    pub opcode: Option<Opcode>,
    pub op1: Option<Operand>,
    pub op2: Option<Operand>,
    /// Backreference to the instruction record, which lives in the ROB
    /// entry at this index (relational, not owning - see design notes).
    pub dest_rob: Option<usize>,
}

impl ReservationStation {
    pub fn new(class: RsClass) -> Self {
        Self { class, busy: false, opcode: None, op1: None, op2: None, dest_rob: None }
    }

    pub fn clear(&mut self) {
        self.busy = false;
        self.opcode = None;
        self.op1 = None;
        self.op2 = None;
        self.dest_rob = None;
    }

    pub fn issue(
        &mut self,
        opcode: Opcode,
        op1: Option<Operand>,
        op2: Option<Operand>,
        dest_rob: usize,
    ) {
        self.busy = true;
        self.opcode = Some(opcode);
        self.op1 = op1;
        self.op2 = op2;
        self.dest_rob = Some(dest_rob);
    }

    /// Both operands resolved (or absent, for ops that don't need them) and
    /// execution has not yet started.
    pub fn operands_ready(&self) -> bool {
        let op1_ready = self.op1.map(|o| o.is_ready()).unwrap_or(true);
        let op2_ready = self.op2.map(|o| o.is_ready()).unwrap_or(true);
        op1_ready && op2_ready
    }

    /// Resolve any operand waiting on `producing_rob` via the CDB broadcast.
    pub fn snoop_broadcast(&mut self, producing_rob: usize, value: i64) {
        if !self.busy {
            return;
        }
        if let Some(Operand::Pending(tag)) = self.op1 {
            if tag == producing_rob {
                self.op1 = Some(Operand::Value(value));
            }
        }
        if let Some(Operand::Pending(tag)) = self.op2 {
            if tag == producing_rob {
                self.op2 = Some(Operand::Value(value));
            }
        }
    }
}

/// A typed pool of reservation stations for one RS class.
#[derive(Debug, Clone)]
pub struct RsPool {
    pub class: RsClass,
    pub stations: Vec<ReservationStation>,
}

impl RsPool {
    pub fn new(class: RsClass, count: usize) -> Self {
        Self { class, stations: (0..count).map(|_| ReservationStation::new(class)).collect() }
    }

    pub fn find_free(&self) -> Option<usize> {
        self.stations.iter().position(|rs| !rs.busy)
    }
}
