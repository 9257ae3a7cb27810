//! Execution units split by functional block.
//!
//! `control`, `compute` and `transfer` are the dispatch entry points; each
//! returns true when it handled the instruction. `alu`, `mac`, `shifter` and
//! `memory` hold the datapath helpers they share.
pub mod alu;
pub mod compute;
pub mod control;
pub mod mac;
pub mod memory;
pub mod shifter;
pub mod transfer;

use super::Adsp21xx;
use crate::isa::{ComputeFunc, ComputeOp};

/// Run one ALU or MAC operation.
pub(crate) fn compute_op(cpu: &mut Adsp21xx, op: &ComputeOp) {
    match op.func {
        ComputeFunc::Alu(func) => alu::alu_op(cpu, func, op.xop, op.yop, op.feedback),
        ComputeFunc::Mac(func) => mac::mac_op(cpu, func, op.xop, op.yop, op.feedback),
    }
}
