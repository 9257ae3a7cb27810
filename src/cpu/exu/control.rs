use super::super::Adsp21xx;
use crate::isa::DspInstr;

/// Execute program-flow and mode instructions. Returns true if handled.
pub fn execute(cpu: &mut Adsp21xx, instr: &DspInstr) -> bool {
    match *instr {
        DspInstr::Nop => {}
        DspInstr::Idle => {
            cpu.state.idle = true;
            cpu.end_slice();
        }
        DspInstr::FlagOut { cond, reset, toggle } => {
            if cpu.condition(cond) {
                if reset {
                    cpu.state.flag_out = false;
                }
                if toggle {
                    cpu.state.flag_out = !cpu.state.flag_out;
                }
            }
        }
        DspInstr::JumpOnFlagIn { target, when_set, call } => {
            if cpu.state.flag_in == when_set {
                if call {
                    cpu.state.push_pc();
                }
                cpu.state.pc = target & 0x3fff;
            }
        }
        DspInstr::StackControl(ops) => {
            if ops.pop_pc {
                cpu.state.pop_pc_value();
            }
            if ops.pop_loop {
                cpu.state.pop_loop();
            }
            if ops.pop_cntr {
                cpu.state.pop_cntr();
            }
            if ops.push_status {
                cpu.state.push_status();
            }
            if ops.pop_status {
                cpu.state.pop_status();
                cpu.check_irqs();
            }
        }
        DspInstr::Return { cond, from_interrupt } => {
            if cpu.condition(cond) {
                cpu.state.pop_pc();
                if from_interrupt {
                    cpu.state.pop_status();
                    cpu.check_irqs();
                }
            }
        }
        DspInstr::JumpIndirect { cond, ireg, call } => {
            if cpu.condition(cond) {
                if call {
                    cpu.state.push_pc();
                }
                cpu.state.pc = cpu.state.dag[(ireg & 7) as usize].i & 0x3fff;
            }
        }
        DspInstr::ModeControl { mask, value } => {
            let mstat = (cpu.state.mstat & !mask) | (value & mask);
            cpu.state.set_mstat(mstat & cpu.variant.mstat_bits());
        }
        DspInstr::DoUntil { end, term } => {
            cpu.state.push_loop(((end as u32 & 0x3fff) << 4) | term.code() as u32);
            cpu.state.push_pc();
        }
        DspInstr::Jump { cond, target } => {
            if cpu.condition(cond) {
                cpu.state.pc = target & 0x3fff;
                // 跳转到自身：忙等待，提前结束本切片
                if cpu.state.pc == cpu.state.ppc {
                    cpu.end_slice();
                }
            }
        }
        DspInstr::Call { cond, target } => {
            if cpu.condition(cond) {
                cpu.state.push_pc();
                cpu.state.pc = target & 0x3fff;
            }
        }
        _ => return false,
    }
    true
}
