use super::super::Adsp21xx;
use super::{alu, compute_op, mac, shifter};
use crate::isa::DspInstr;

/// Execute register-only ALU, MAC and shifter instructions. Returns true if handled.
///
/// Combined compute + move forms read the move source before the operation
/// and write the destination after it.
pub fn execute(cpu: &mut Adsp21xx, instr: &DspInstr) -> bool {
    match *instr {
        DspInstr::Compute { cond, op } => {
            if cpu.condition(cond) {
                compute_op(cpu, &op);
            }
        }
        DspInstr::ComputeMove { op, dst, src } => {
            let value = cpu.read_dreg(src);
            compute_op(cpu, &op);
            cpu.write_dreg(dst, value);
        }
        DspInstr::Shift { cond, op } => {
            if cpu.condition(cond) {
                shifter::shift_op(cpu, &op);
            }
        }
        DspInstr::ShiftImm { op, count } => shifter::shift_by(cpu, &op, count),
        DspInstr::ShiftMove { op, dst, src } => {
            let value = cpu.read_dreg(src);
            shifter::shift_op(cpu, &op);
            cpu.write_dreg(dst, value);
        }
        DspInstr::SaturateMr => mac::saturate_mr(cpu),
        DspInstr::Divs { xop, yop } => alu::divs(cpu, xop, yop),
        DspInstr::Divq { xop } => alu::divq(cpu, xop),
        _ => return false,
    }
    true
}
