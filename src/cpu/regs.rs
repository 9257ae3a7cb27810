//! 寄存器访问
//!
//! 两条访问路径：
//! - 指令路径：按 2-bit 组号 + 4-bit 编号间接访问（`read_reg` / `write_reg`），带写副作用
//! - 宿主路径：按编号 snoop 任意架构寄存器和栈内容（`get_register` / `set_register`）

use crate::isa::RegRef;

use super::status::PC_STACK_DEPTH;
use super::{Adsp21xx, IrqLineState};

/// 组 0 数据寄存器编号
pub mod dreg {
    pub const AX0: u8 = 0x0;
    pub const AX1: u8 = 0x1;
    pub const MX0: u8 = 0x2;
    pub const MX1: u8 = 0x3;
    pub const AY0: u8 = 0x4;
    pub const AY1: u8 = 0x5;
    pub const MY0: u8 = 0x6;
    pub const MY1: u8 = 0x7;
    pub const SI: u8 = 0x8;
    pub const SE: u8 = 0x9;
    pub const AR: u8 = 0xa;
    pub const MR0: u8 = 0xb;
    pub const MR1: u8 = 0xc;
    pub const MR2: u8 = 0xd;
    pub const SR0: u8 = 0xe;
    pub const SR1: u8 = 0xf;
}

/// 组 3 寄存器编号
mod g3 {
    pub const ASTAT: u8 = 0x0;
    pub const MSTAT: u8 = 0x1;
    pub const SSTAT: u8 = 0x2;
    pub const IMASK: u8 = 0x3;
    pub const ICNTL: u8 = 0x4;
    pub const CNTR: u8 = 0x5;
    pub const SB: u8 = 0x6;
    pub const PX: u8 = 0x7;
    pub const RX0: u8 = 0x8;
    pub const TX0: u8 = 0x9;
    pub const RX1: u8 = 0xa;
    pub const TX1: u8 = 0xb;
    pub const IFC: u8 = 0xc;
    pub const OWRCNTR: u8 = 0xd;
    pub const TOPPCSTACK: u8 = 0xf;
}

/// 宿主可见的寄存器编号
///
/// 编号固定；`PcStack(n)` 为 PC 栈顶往下第 n 项（64 + n）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    Pc,
    Ax0,
    Ax1,
    Ay0,
    Ay1,
    Ar,
    Af,
    Mx0,
    Mx1,
    My0,
    My1,
    Mr0,
    Mr1,
    Mr2,
    Mf,
    Si,
    Se,
    Sb,
    Sr0,
    Sr1,
    I(u8),
    L(u8),
    M(u8),
    Px,
    Cntr,
    Astat,
    Sstat,
    Mstat,
    PcSp,
    CntrSp,
    StatSp,
    LoopSp,
    Imask,
    Icntl,
    IrqState(u8),
    FlagIn,
    FlagOut,
    PreviousPc,
    PcStack(u8),
}

const PC_STACK_BASE: u32 = 64;

impl Reg {
    pub fn id(self) -> u32 {
        use Reg::*;
        match self {
            Pc => 1,
            Ax0 => 2,
            Ax1 => 3,
            Ay0 => 4,
            Ay1 => 5,
            Ar => 6,
            Af => 7,
            Mx0 => 8,
            Mx1 => 9,
            My0 => 10,
            My1 => 11,
            Mr0 => 12,
            Mr1 => 13,
            Mr2 => 14,
            Mf => 15,
            Si => 16,
            Se => 17,
            Sb => 18,
            Sr0 => 19,
            Sr1 => 20,
            I(n) => 21 + (n & 7) as u32,
            L(n) => 29 + (n & 7) as u32,
            M(n) => 37 + (n & 7) as u32,
            Px => 45,
            Cntr => 46,
            Astat => 47,
            Sstat => 48,
            Mstat => 49,
            PcSp => 50,
            CntrSp => 51,
            StatSp => 52,
            LoopSp => 53,
            Imask => 54,
            Icntl => 55,
            IrqState(n) => 56 + (n & 3) as u32,
            FlagIn => 60,
            FlagOut => 61,
            PreviousPc => 62,
            PcStack(n) => PC_STACK_BASE + n as u32,
        }
    }

    /// 编号到寄存器；未定义的编号返回 `None`
    pub fn from_id(id: u32) -> Option<Self> {
        use Reg::*;
        const SIMPLE: [Reg; 20] = [
            Pc, Ax0, Ax1, Ay0, Ay1, Ar, Af, Mx0, Mx1, My0, My1, Mr0, Mr1, Mr2, Mf, Si, Se, Sb,
            Sr0, Sr1,
        ];
        const STATUS: [Reg; 11] =
            [Px, Cntr, Astat, Sstat, Mstat, PcSp, CntrSp, StatSp, LoopSp, Imask, Icntl];
        let reg = match id {
            1..=20 => SIMPLE[id as usize - 1],
            21..=28 => I((id - 21) as u8),
            29..=36 => L((id - 29) as u8),
            37..=44 => M((id - 37) as u8),
            45..=55 => STATUS[id as usize - 45],
            56..=59 => IrqState((id - 56) as u8),
            60 => FlagIn,
            61 => FlagOut,
            62 => PreviousPc,
            _ if (PC_STACK_BASE..PC_STACK_BASE + PC_STACK_DEPTH as u32).contains(&id) => {
                PcStack((id - PC_STACK_BASE) as u8)
            }
            _ => return None,
        };
        Some(reg)
    }
}

impl Adsp21xx {
    // ========== 指令路径 ==========

    /// 读当前寄存器组中的组 0 寄存器
    pub(crate) fn read_dreg(&self, index: u8) -> u16 {
        let b = self.state.bank();
        match index & 0xf {
            dreg::AX0 => b.ax0,
            dreg::AX1 => b.ax1,
            dreg::MX0 => b.mx0,
            dreg::MX1 => b.mx1,
            dreg::AY0 => b.ay0,
            dreg::AY1 => b.ay1,
            dreg::MY0 => b.my0,
            dreg::MY1 => b.my1,
            dreg::SI => b.si,
            dreg::SE => b.se,
            dreg::AR => b.ar,
            dreg::MR0 => b.mr.mr0(),
            dreg::MR1 => b.mr.mr1(),
            dreg::MR2 => b.mr.mr2(),
            dreg::SR0 => b.sr.sr0(),
            _ => b.sr.sr1(),
        }
    }

    /// 写组 0 寄存器；MR1 同时改写 MR2 的符号扩展，MR2/SE 保留 8 位
    pub(crate) fn write_dreg(&mut self, index: u8, value: u16) {
        let b = self.state.bank_mut();
        match index & 0xf {
            dreg::AX0 => b.ax0 = value,
            dreg::AX1 => b.ax1 = value,
            dreg::MX0 => b.mx0 = value,
            dreg::MX1 => b.mx1 = value,
            dreg::AY0 => b.ay0 = value,
            dreg::AY1 => b.ay1 = value,
            dreg::MY0 => b.my0 = value,
            dreg::MY1 => b.my1 = value,
            dreg::SI => b.si = value,
            dreg::SE => b.set_se(value),
            dreg::AR => b.ar = value,
            dreg::MR0 => b.mr.set_mr0(value),
            dreg::MR1 => b.mr.set_mr1(value),
            dreg::MR2 => b.mr.set_mr2(value),
            dreg::SR0 => b.sr.set_sr0(value),
            _ => b.sr.set_sr1(value),
        }
    }

    /// 组 1/2：I、M、L 寄存器，编号 12..=15 保留
    fn read_dag_reg(&self, group: u8, index: u8) -> u16 {
        let n = (index & 3) as usize + if group == 2 { 4 } else { 0 };
        let dag = &self.state.dag[n];
        match index >> 2 {
            0 => dag.i,
            1 => dag.m,
            2 => dag.l,
            _ => 0,
        }
    }

    fn write_dag_reg(&mut self, group: u8, index: u8, value: u16) {
        let n = (index & 3) as usize + if group == 2 { 4 } else { 0 };
        let tables = self.tables;
        let dag = &mut self.state.dag[n];
        match index >> 2 {
            0 => dag.set_i(value),
            1 => dag.set_m(value),
            2 => dag.set_l(value, tables),
            _ => {}
        }
    }

    /// 读分组寄存器
    ///
    /// 读 TOPPCSTACK 会弹出 PC 栈，读 RX0/RX1 会调用串口钩子，因此需要 `&mut self`。
    pub(crate) fn read_reg(&mut self, reg: RegRef) -> u16 {
        match reg.group {
            0 => self.read_dreg(reg.index),
            1 | 2 => self.read_dag_reg(reg.group, reg.index),
            _ => self.read_g3(reg.index),
        }
    }

    /// 写分组寄存器
    pub(crate) fn write_reg(&mut self, reg: RegRef, value: u16) {
        match reg.group {
            0 => self.write_dreg(reg.index, value),
            1 | 2 => self.write_dag_reg(reg.group, reg.index, value),
            _ => self.write_g3(reg.index, value),
        }
    }

    fn read_g3(&mut self, index: u8) -> u16 {
        let st = &self.state;
        match index {
            g3::ASTAT => st.astat,
            g3::MSTAT => st.mstat,
            g3::SSTAT => st.sstat,
            g3::IMASK => st.imask,
            g3::ICNTL => st.icntl,
            g3::CNTR => st.cntr,
            g3::SB => st.bank().sb,
            g3::PX => st.px,
            g3::RX0 | g3::RX1 if self.variant.has_peripherals() => {
                let port = ((index - g3::RX0) >> 1) as usize;
                self.serial_mut().map_or(0, |sp| sp.receive(port))
            }
            g3::TOPPCSTACK => self.state.pop_pc_value(),
            _ => 0,
        }
    }

    fn write_g3(&mut self, index: u8, value: u16) {
        let peripherals = self.variant.has_peripherals();
        match index {
            g3::ASTAT => self.state.astat = value & 0xff,
            g3::MSTAT => self.state.set_mstat(value & self.variant.mstat_bits()),
            g3::SSTAT => {}
            g3::IMASK => {
                self.state.imask = value & self.variant.imask_bits();
                self.check_irqs();
            }
            g3::ICNTL => {
                self.state.icntl = value & 0x1f;
                self.check_irqs();
            }
            g3::CNTR => {
                self.state.push_cntr();
                self.state.cntr = value & 0x3fff;
            }
            g3::SB => self.state.bank_mut().set_sb(value),
            g3::PX => self.state.px = value & 0xff,
            g3::TX0 | g3::TX1 if peripherals => {
                let port = ((index - g3::TX0) >> 1) as usize;
                if let Some(sp) = self.serial_mut() {
                    sp.transmit(port, value);
                }
            }
            g3::IFC if peripherals => self.write_ifc(value),
            g3::OWRCNTR if peripherals => self.state.cntr = value & 0x3fff,
            g3::TOPPCSTACK => self.state.push_pc_value(value & 0x3fff),
            _ => {}
        }
    }

    // ========== 宿主路径 ==========

    /// 按编号读寄存器；未定义的编号读作 0
    pub fn get_register(&self, id: u32) -> u32 {
        Reg::from_id(id).map_or(0, |reg| self.snoop(reg))
    }

    /// 按编号写寄存器；未定义的编号被忽略
    pub fn set_register(&mut self, id: u32, value: u32) {
        if let Some(reg) = Reg::from_id(id) {
            self.poke(reg, value);
        }
    }

    /// 读寄存器，无副作用
    pub fn snoop(&self, reg: Reg) -> u32 {
        let st = &self.state;
        let b = st.bank();
        let value = match reg {
            Reg::Pc => st.pc,
            Reg::Ax0 => b.ax0,
            Reg::Ax1 => b.ax1,
            Reg::Ay0 => b.ay0,
            Reg::Ay1 => b.ay1,
            Reg::Ar => b.ar,
            Reg::Af => b.af,
            Reg::Mx0 => b.mx0,
            Reg::Mx1 => b.mx1,
            Reg::My0 => b.my0,
            Reg::My1 => b.my1,
            Reg::Mr0 => b.mr.mr0(),
            Reg::Mr1 => b.mr.mr1(),
            Reg::Mr2 => b.mr.mr2(),
            Reg::Mf => b.mf,
            Reg::Si => b.si,
            Reg::Se => b.se,
            Reg::Sb => b.sb,
            Reg::Sr0 => b.sr.sr0(),
            Reg::Sr1 => b.sr.sr1(),
            Reg::I(n) => st.dag[(n & 7) as usize].i,
            Reg::L(n) => st.dag[(n & 7) as usize].l,
            Reg::M(n) => st.dag[(n & 7) as usize].m,
            Reg::Px => st.px,
            Reg::Cntr => st.cntr,
            Reg::Astat => st.astat,
            Reg::Sstat => st.sstat,
            Reg::Mstat => st.mstat,
            Reg::PcSp => st.pc_stack.depth() as u16,
            Reg::CntrSp => st.cntr_stack.depth() as u16,
            Reg::StatSp => st.stat_stack.depth() as u16,
            Reg::LoopSp => st.loop_stack.depth() as u16,
            Reg::Imask => st.imask,
            Reg::Icntl => st.icntl,
            Reg::IrqState(n) => st.irq_state[(n & 3) as usize] as u16,
            Reg::FlagIn => st.flag_in as u16,
            Reg::FlagOut => st.flag_out as u16,
            Reg::PreviousPc => st.ppc,
            Reg::PcStack(n) => st.pc_stack.peek(n as usize).unwrap_or(0),
        };
        value as u32
    }

    /// 写寄存器
    ///
    /// 写 IMASK/ICNTL/IRQ 状态会重新仲裁中断；写栈指针直接移动指针。
    pub fn poke(&mut self, reg: Reg, value: u32) {
        let v = value as u16;
        let tables = self.tables;
        let st = &mut self.state;
        match reg {
            Reg::Pc => st.pc = v & 0x3fff,
            Reg::Ax0 => st.bank_mut().ax0 = v,
            Reg::Ax1 => st.bank_mut().ax1 = v,
            Reg::Ay0 => st.bank_mut().ay0 = v,
            Reg::Ay1 => st.bank_mut().ay1 = v,
            Reg::Ar => st.bank_mut().ar = v,
            Reg::Af => st.bank_mut().af = v,
            Reg::Mx0 => st.bank_mut().mx0 = v,
            Reg::Mx1 => st.bank_mut().mx1 = v,
            Reg::My0 => st.bank_mut().my0 = v,
            Reg::My1 => st.bank_mut().my1 = v,
            Reg::Mr0 => st.bank_mut().mr.set_mr0(v),
            Reg::Mr1 => st.bank_mut().mr.set_mr1(v),
            Reg::Mr2 => st.bank_mut().mr.set_mr2(v),
            Reg::Mf => st.bank_mut().mf = v,
            Reg::Si => st.bank_mut().si = v,
            Reg::Se => st.bank_mut().set_se(v),
            Reg::Sb => st.bank_mut().set_sb(v),
            Reg::Sr0 => st.bank_mut().sr.set_sr0(v),
            Reg::Sr1 => st.bank_mut().sr.set_sr1(v),
            Reg::I(n) => st.dag[(n & 7) as usize].set_i(v),
            Reg::L(n) => st.dag[(n & 7) as usize].set_l(v, tables),
            Reg::M(n) => st.dag[(n & 7) as usize].set_m(v),
            Reg::Px => st.px = v & 0xff,
            Reg::Cntr => st.cntr = v & 0x3fff,
            Reg::Astat => st.astat = v & 0xff,
            Reg::Sstat => st.sstat = v & 0xff,
            Reg::Mstat => st.set_mstat(v & self.variant.mstat_bits()),
            Reg::PcSp => st.pc_stack.set_depth(v as usize),
            Reg::CntrSp => st.cntr_stack.set_depth(v as usize),
            Reg::StatSp => st.stat_stack.set_depth(v as usize),
            Reg::LoopSp => st.loop_stack.set_depth(v as usize),
            Reg::Imask => self.write_g3(g3::IMASK, v),
            Reg::Icntl => self.write_g3(g3::ICNTL, v),
            Reg::IrqState(n) => {
                let state = if v != 0 { IrqLineState::Asserted } else { IrqLineState::Clear };
                self.set_irq_line((n & 3) as usize, state);
            }
            Reg::FlagIn => st.flag_in = v != 0,
            Reg::FlagOut => st.flag_out = v != 0,
            Reg::PreviousPc => st.ppc = v,
            Reg::PcStack(n) => {
                st.pc_stack.poke(n as usize, v & 0x3fff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::ChipVariant;
    use crate::cpu::status::{MSTAT_BANK, SSTAT_COUNT_EMPTY, SSTAT_PC_EMPTY};

    fn cpu() -> Adsp21xx {
        Adsp21xx::new(ChipVariant::Adsp2100).unwrap()
    }

    #[test]
    fn test_reg_id_roundtrip() {
        for id in 0..128 {
            match Reg::from_id(id) {
                Some(reg) => assert_eq!(reg.id(), id),
                None => assert!(id == 0 || id == 63 || id >= 80, "id {id}"),
            }
        }
        assert_eq!(Reg::from_id(6), Some(Reg::Ar));
        assert_eq!(Reg::from_id(66), Some(Reg::PcStack(2)));
    }

    #[test]
    fn test_out_of_range_snoop_reads_zero() {
        let mut cpu = cpu();
        cpu.set_register(Reg::Ar.id(), 0x1234);
        assert_eq!(cpu.get_register(0), 0);
        assert_eq!(cpu.get_register(63), 0);
        assert_eq!(cpu.get_register(9999), 0);
        cpu.set_register(9999, 1);
        assert_eq!(cpu.get_register(Reg::Ar.id()), 0x1234);
    }

    #[test]
    fn test_mr1_write_sign_extends_into_mr2() {
        let mut cpu = cpu();
        cpu.write_dreg(dreg::MR1, 0x8000);
        assert_eq!(cpu.read_dreg(dreg::MR2), 0xffff);
        cpu.write_dreg(dreg::MR1, 0x7fff);
        assert_eq!(cpu.read_dreg(dreg::MR2), 0x0000);
        cpu.write_dreg(dreg::MR2, 0x0180);
        assert_eq!(cpu.read_dreg(dreg::MR2), 0xff80);
        cpu.write_dreg(dreg::SE, 0x00ff);
        assert_eq!(cpu.read_dreg(dreg::SE), 0xffff);
    }

    #[test]
    fn test_dag_group_access() {
        let mut cpu = cpu();
        cpu.write_reg(RegRef::new(2, 0x5), 0x3ffe); // M5 = -2
        assert_eq!(cpu.read_reg(RegRef::new(2, 0x5)), 0xfffe);
        assert_eq!(cpu.state().dag[5].m, 0xfffe);
        cpu.write_reg(RegRef::new(1, 0x9), 8); // L1
        assert_eq!(cpu.state().dag[1].l, 8);
        cpu.write_reg(RegRef::new(1, 0xd), 0x55);
        assert_eq!(cpu.read_reg(RegRef::new(1, 0xd)), 0);
    }

    #[test]
    fn test_cntr_write_pushes_previous() {
        let mut cpu = cpu();
        cpu.write_reg(RegRef::new(3, 5), 10);
        cpu.write_reg(RegRef::new(3, 5), 20);
        assert_eq!(cpu.state().cntr, 20);
        assert_eq!(cpu.state().cntr_stack.depth(), 2);
        assert_eq!(cpu.state().cntr_stack.top(), 10);
        assert_eq!(cpu.state().sstat & SSTAT_COUNT_EMPTY, 0);
    }

    #[test]
    fn test_toppcstack_read_pops_write_pushes() {
        let mut cpu = cpu();
        cpu.write_reg(RegRef::new(3, 0xf), 0x0123);
        assert_eq!(cpu.state().pc_stack.depth(), 1);
        assert_eq!(cpu.get_register(Reg::PcStack(0).id()), 0x0123);
        assert_eq!(cpu.read_reg(RegRef::new(3, 0xf)), 0x0123);
        assert_eq!(cpu.state().pc_stack.depth(), 0);
        assert_ne!(cpu.state().sstat & SSTAT_PC_EMPTY, 0);
    }

    #[test]
    fn test_sstat_is_read_only() {
        let mut cpu = cpu();
        cpu.write_reg(RegRef::new(3, 2), 0);
        assert_eq!(cpu.read_reg(RegRef::new(3, 2)), 0x55);
    }

    #[test]
    fn test_peripheral_registers_absent_on_2100() {
        let mut cpu = cpu();
        cpu.write_reg(RegRef::new(3, 0xd), 0x100); // OWRCNTR
        assert_eq!(cpu.state().cntr, 0);
        assert_eq!(cpu.read_reg(RegRef::new(3, 0x8)), 0);
    }

    #[test]
    fn test_snoop_pc_stack_depths() {
        let mut cpu = cpu();
        cpu.poke(Reg::PcSp, 3);
        cpu.poke(Reg::PcStack(0), 0x30);
        cpu.poke(Reg::PcStack(2), 0x10);
        assert_eq!(cpu.snoop(Reg::PcSp), 3);
        assert_eq!(cpu.snoop(Reg::PcStack(0)), 0x30);
        assert_eq!(cpu.snoop(Reg::PcStack(2)), 0x10);
        assert_eq!(cpu.snoop(Reg::PcStack(3)), 0);
    }

    #[test]
    fn test_bank_switch_via_mstat_snoop() {
        let mut cpu = cpu();
        cpu.poke(Reg::Ax0, 1);
        cpu.poke(Reg::Mstat, MSTAT_BANK as u32);
        assert_eq!(cpu.snoop(Reg::Ax0), 0);
        cpu.poke(Reg::Ax0, 2);
        cpu.poke(Reg::Mstat, 0);
        assert_eq!(cpu.snoop(Reg::Ax0), 1);
    }
}
