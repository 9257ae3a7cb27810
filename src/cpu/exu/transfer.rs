use super::super::regs::dreg;
use super::super::Adsp21xx;
use super::memory::{self, data_byte_addr};
use super::{compute_op, shifter};
use crate::isa::{DspInstr, MemSpace};
use crate::memory::DspMemory;

/// Execute register transfers and memory accesses. Returns true if handled.
///
/// When an access is combined with a compute or shift, a memory write stores
/// the register value from before the operation and a memory read lands
/// after it.
pub fn execute(cpu: &mut Adsp21xx, mem: &mut dyn DspMemory, instr: &DspInstr) -> bool {
    match *instr {
        DspInstr::RegMove { dst, src } => {
            let value = cpu.read_reg(src);
            cpu.write_reg(dst, value);
        }
        DspInstr::LoadReg { dst, value } => cpu.write_reg(dst, value),
        DspInstr::ComputeMem { op, space, dag, reg, write } => {
            if write {
                let value = cpu.read_dreg(reg);
                memory::write(cpu, mem, space, dag, value);
                compute_op(cpu, &op);
            } else {
                compute_op(cpu, &op);
                let value = memory::read(cpu, mem, space, dag);
                cpu.write_dreg(reg, value);
            }
        }
        DspInstr::ShiftMem { op, space, dag, reg, write } => {
            if write {
                let value = cpu.read_dreg(reg);
                memory::write(cpu, mem, space, dag, value);
                shifter::shift_op(cpu, &op);
            } else {
                shifter::shift_op(cpu, &op);
                let value = memory::read(cpu, mem, space, dag);
                cpu.write_dreg(reg, value);
            }
        }
        DspInstr::DmDirect { reg, addr, write } => {
            if write {
                let value = cpu.read_reg(reg);
                mem.write_data(data_byte_addr(addr), value);
            } else {
                let value = mem.read_data(data_byte_addr(addr));
                cpu.write_reg(reg, value);
            }
        }
        DspInstr::DmWriteImm { dag, value } => memory::write(cpu, mem, MemSpace::Data, dag, value),
        DspInstr::DualRead { op, dm_dst, pm_dst, dm, pm } => {
            compute_op(cpu, &op);
            let x = memory::read(cpu, mem, MemSpace::Data, dm);
            let y = memory::read(cpu, mem, MemSpace::Program, pm);
            // DM -> AX0/AX1/MX0/MX1, PM -> AY0/AY1/MY0/MY1
            cpu.write_dreg(dreg::AX0 + (dm_dst & 3), x);
            cpu.write_dreg(dreg::AY0 + (pm_dst & 3), y);
        }
        DspInstr::Modify { dag } => memory::modify(cpu, dag),
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::ChipVariant;
    use crate::isa::{
        Accumulate, AluFunc, ComputeFunc, ComputeOp, DagRef, MacFunc, RegRef, Signedness,
    };
    use crate::memory::FlatMemory;

    fn setup() -> (Adsp21xx, FlatMemory) {
        (Adsp21xx::new(ChipVariant::Adsp2100).unwrap(), FlatMemory::new())
    }

    #[test]
    fn test_reg_move_across_groups() {
        let (mut cpu, mut mem) = setup();
        cpu.write_dreg(dreg::AR, 0x0123);
        let instr = DspInstr::RegMove { dst: RegRef::new(2, 0), src: RegRef::data(dreg::AR) };
        assert!(execute(&mut cpu, &mut mem, &instr));
        assert_eq!(cpu.state.dag[4].i, 0x0123);
    }

    #[test]
    fn test_compute_with_dm_write_stores_old_value() {
        let (mut cpu, mut mem) = setup();
        cpu.write_dreg(dreg::AX0, 1);
        cpu.write_dreg(dreg::AY0, 2);
        cpu.write_dreg(dreg::AR, 0x55);
        cpu.state.dag[0].set_i(0x10);
        let op =
            ComputeOp { func: ComputeFunc::Alu(AluFunc::Add), xop: 0, yop: 0, feedback: false };
        let instr = DspInstr::ComputeMem {
            op,
            space: MemSpace::Data,
            dag: DagRef::dag1(0, 0),
            reg: dreg::AR,
            write: true,
        };
        execute(&mut cpu, &mut mem, &instr);
        assert_eq!(mem.data_word(0x10).unwrap(), 0x55);
        assert_eq!(cpu.read_dreg(dreg::AR), 3);
    }

    #[test]
    fn test_compute_with_dm_read_lands_after() {
        let (mut cpu, mut mem) = setup();
        mem.set_data_word(0x10, 0x99).unwrap();
        cpu.write_dreg(dreg::AX0, 1);
        cpu.write_dreg(dreg::AY0, 2);
        cpu.state.dag[0].set_i(0x10);
        let op =
            ComputeOp { func: ComputeFunc::Alu(AluFunc::Add), xop: 0, yop: 0, feedback: false };
        let instr = DspInstr::ComputeMem {
            op,
            space: MemSpace::Data,
            dag: DagRef::dag1(0, 0),
            reg: dreg::AR,
            write: false,
        };
        execute(&mut cpu, &mut mem, &instr);
        assert_eq!(cpu.read_dreg(dreg::AR), 0x99);
    }

    #[test]
    fn test_direct_dm_access() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(RegRef::new(3, 0), 0x0012); // ASTAT
        let store = DspInstr::DmDirect { reg: RegRef::new(3, 0), addr: 0x3000, write: true };
        execute(&mut cpu, &mut mem, &store);
        assert_eq!(mem.data_word(0x3000).unwrap(), 0x0012);
        let load = DspInstr::DmDirect { reg: RegRef::data(dreg::SI), addr: 0x3000, write: false };
        execute(&mut cpu, &mut mem, &load);
        assert_eq!(cpu.read_dreg(dreg::SI), 0x0012);
    }

    #[test]
    fn test_dual_read_feeds_multiplier() {
        let (mut cpu, mut mem) = setup();
        mem.set_data_word(0x20, 0x4000).unwrap();
        mem.load_program(0x300, &[0x40_0011]).unwrap();
        cpu.state.dag[0].set_i(0x20);
        cpu.state.dag[1].set_m(1);
        cpu.state.dag[4].set_i(0x300);
        cpu.state.dag[5].set_m(1);
        cpu.write_dreg(dreg::MX0, 0x4000);
        cpu.write_dreg(dreg::MY0, 0x2000);
        let op = ComputeOp {
            func: ComputeFunc::Mac(MacFunc::Multiply {
                acc: Accumulate::Replace,
                sign: Signedness::Ss,
            }),
            xop: 0,
            yop: 0,
            feedback: false,
        };
        let instr = DspInstr::DualRead {
            op,
            dm_dst: 2,
            pm_dst: 2,
            dm: DagRef::dag1(0, 1),
            pm: DagRef::dag2(0, 1),
        };
        execute(&mut cpu, &mut mem, &instr);
        // 乘法使用旧的 MX0/MY0
        assert_eq!(cpu.read_dreg(dreg::MR1), 0x1000);
        assert_eq!(cpu.read_dreg(dreg::MX0), 0x4000);
        assert_eq!(cpu.read_dreg(dreg::MY0), 0x4000);
        assert_eq!(cpu.state.px, 0x11);
        assert_eq!(cpu.state.dag[0].i, 0x21);
        assert_eq!(cpu.state.dag[4].i, 0x301);
    }

    #[test]
    fn test_modify_and_immediate_write() {
        let (mut cpu, mut mem) = setup();
        cpu.state.dag[6].set_i(0x40);
        cpu.state.dag[7].set_m(0x3ffc); // -4
        execute(&mut cpu, &mut mem, &DspInstr::Modify { dag: DagRef::dag2(2, 3) });
        assert_eq!(cpu.state.dag[6].i, 0x3c);
        let write = DspInstr::DmWriteImm { dag: DagRef::dag2(2, 3), value: 0xbeef };
        execute(&mut cpu, &mut mem, &write);
        assert_eq!(mem.data_word(0x3c).unwrap(), 0xbeef);
        assert_eq!(cpu.state.dag[6].i, 0x38);
    }
}
