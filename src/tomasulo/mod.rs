pub mod rob;
pub mod rs;

pub use rob::{RobEntry, RobRing, RobState};
pub use rs::{Operand, ReservationStation, RsPool};
