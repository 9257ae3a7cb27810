use super::super::status::{CoreBank, MSTAT_SATURATE};
use super::super::Adsp21xx;
use crate::isa::tables::{AC, AN, AQ, AS, AV, AZ};
use crate::isa::AluFunc;

/// ALU X operand: AX0, AX1, AR, MR0, MR1, MR2, SR0, SR1.
pub(crate) fn x_operand(bank: &CoreBank, xop: u8) -> u16 {
    match xop & 7 {
        0 => bank.ax0,
        1 => bank.ax1,
        2 => bank.ar,
        3 => bank.mr.mr0(),
        4 => bank.mr.mr1(),
        5 => bank.mr.mr2(),
        6 => bank.sr.sr0(),
        _ => bank.sr.sr1(),
    }
}

/// ALU Y operand: AY0, AY1, AF, 0.
pub(crate) fn y_operand(bank: &CoreBank, yop: u8) -> u16 {
    match yop & 3 {
        0 => bank.ay0,
        1 => bank.ay1,
        2 => bank.af,
        _ => bank.zero(),
    }
}

#[inline]
fn nz(r: u32) -> u16 {
    let mut flags = 0;
    if r & 0xffff == 0 {
        flags |= AZ;
    }
    if r & 0x8000 != 0 {
        flags |= AN;
    }
    flags
}

#[inline]
fn overflow(s: u32, d: u32, r: u32) -> u16 {
    if (s ^ d ^ r ^ (r >> 1)) & 0x8000 != 0 { AV } else { 0 }
}

#[inline]
fn nzvc_add(s: u32, d: u32, r: u32) -> u16 {
    nz(r) | overflow(s, d, r) | if r & 0x1_0000 != 0 { AC } else { 0 }
}

#[inline]
fn nzvc_sub(s: u32, d: u32, r: u32) -> u16 {
    nz(r) | overflow(s, d, r) | if r & 0x1_0000 == 0 { AC } else { 0 }
}

/// Execute an ALU function, writing AR (or AF when `feedback`) and ASTAT.
pub(crate) fn alu_op(cpu: &mut Adsp21xx, func: AluFunc, xop: u8, yop: u8, feedback: bool) {
    let bank = cpu.state.bank();
    let x = x_operand(bank, xop) as u32;
    let y = y_operand(bank, yop) as u32;
    let carry = (cpu.state.astat & AC != 0) as u32;
    let mut astat = cpu.state.astat & cpu.state.astat_clear;

    let res = match func {
        AluFunc::PassY => {
            astat |= nz(y);
            y
        }
        AluFunc::IncY => {
            let r = y + 1;
            astat |= nz(r);
            match y {
                0x7fff => astat |= AV,
                0xffff => astat |= AC,
                _ => {}
            }
            r
        }
        AluFunc::AddWithCarry => {
            let r = x + y + carry;
            astat |= nzvc_add(x, y, r);
            r
        }
        AluFunc::Add => {
            let r = x + y;
            astat |= nzvc_add(x, y, r);
            r
        }
        AluFunc::NotY => {
            let r = !y;
            astat |= nz(r);
            r
        }
        AluFunc::NegY => {
            let r = y.wrapping_neg();
            astat |= nz(r);
            match y {
                0x8000 => astat |= AV,
                0x0000 => astat |= AC,
                _ => {}
            }
            r
        }
        AluFunc::SubWithBorrow => {
            let r = x.wrapping_sub(y).wrapping_add(carry).wrapping_sub(1);
            astat |= nzvc_sub(x, y, r);
            r
        }
        AluFunc::Sub => {
            let r = x.wrapping_sub(y);
            astat |= nzvc_sub(x, y, r);
            r
        }
        AluFunc::DecY => {
            let r = y.wrapping_sub(1);
            astat |= nz(r);
            match y {
                0x8000 => astat |= AV,
                0x0000 => astat |= AC,
                _ => {}
            }
            r
        }
        AluFunc::RevSub => {
            let r = y.wrapping_sub(x);
            astat |= nzvc_sub(y, x, r);
            r
        }
        AluFunc::RevSubWithBorrow => {
            let r = y.wrapping_sub(x).wrapping_add(carry).wrapping_sub(1);
            astat |= nzvc_sub(y, x, r);
            r
        }
        AluFunc::NotX => {
            let r = !x;
            astat |= nz(r);
            r
        }
        AluFunc::And => {
            let r = x & y;
            astat |= nz(r);
            r
        }
        AluFunc::Or => {
            let r = x | y;
            astat |= nz(r);
            r
        }
        AluFunc::Xor => {
            let r = x ^ y;
            astat |= nz(r);
            r
        }
        AluFunc::Abs => {
            astat &= !AS;
            if x == 0 {
                astat |= AZ;
            }
            if x == 0x8000 {
                astat |= AN | AV;
            }
            if x & 0x8000 != 0 {
                astat |= AS;
                x.wrapping_neg()
            } else {
                x
            }
        }
    };

    cpu.state.astat = astat;
    if feedback {
        cpu.state.bank_mut().af = res as u16;
        return;
    }

    let res = if cpu.state.mstat & MSTAT_SATURATE != 0 && astat & AV != 0 {
        if astat & AC != 0 { 0x8000 } else { 0x7fff }
    } else {
        res as u16
    };
    cpu.state.bank_mut().ar = res;
}

/// DIVS: first step of a signed division, sets AQ from the operand signs.
pub(crate) fn divs(cpu: &mut Adsp21xx, xop: u8, yop: u8) {
    let bank = cpu.state.bank();
    let x = x_operand(bank, xop);
    let y = y_operand(bank, yop);
    let temp = x ^ y;
    set_quotient_flag(cpu, temp);
    let bank = cpu.state.bank_mut();
    bank.af = (y << 1) | (bank.ay0 >> 15);
    bank.ay0 = (bank.ay0 << 1) | (temp >> 15);
}

/// DIVQ: one non-restoring division step.
pub(crate) fn divq(cpu: &mut Adsp21xx, xop: u8) {
    let x = x_operand(cpu.state.bank(), xop);
    let af = cpu.state.bank().af;
    let res = if cpu.state.astat & AQ != 0 { af.wrapping_add(x) } else { af.wrapping_sub(x) };
    let temp = res ^ x;
    set_quotient_flag(cpu, temp);
    let bank = cpu.state.bank_mut();
    bank.af = (res << 1) | (bank.ay0 >> 15);
    bank.ay0 = (bank.ay0 << 1) | ((!temp >> 15) & 1);
}

fn set_quotient_flag(cpu: &mut Adsp21xx, temp: u16) {
    if temp & 0x8000 != 0 {
        cpu.state.astat |= AQ;
    } else {
        cpu.state.astat &= !AQ;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::status::MSTAT_STICKYV;
    use crate::cpu::ChipVariant;

    fn cpu_with(ax0: u16, ay0: u16) -> Adsp21xx {
        let mut cpu = Adsp21xx::new(ChipVariant::Adsp2100).unwrap();
        cpu.state.bank_mut().ax0 = ax0;
        cpu.state.bank_mut().ay0 = ay0;
        cpu
    }

    #[test]
    fn test_add_flags() {
        let mut cpu = cpu_with(0x7fff, 0x0001);
        alu_op(&mut cpu, AluFunc::Add, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 0x8000);
        assert_eq!(cpu.state.astat & (AN | AV | AC | AZ), AN | AV);

        let mut cpu = cpu_with(0xffff, 0x0001);
        alu_op(&mut cpu, AluFunc::Add, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 0);
        assert_eq!(cpu.state.astat & (AN | AV | AC | AZ), AZ | AC);
    }

    #[test]
    fn test_sub_carry_means_no_borrow() {
        let mut cpu = cpu_with(5, 3);
        alu_op(&mut cpu, AluFunc::Sub, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 2);
        assert_ne!(cpu.state.astat & AC, 0);

        let mut cpu = cpu_with(3, 5);
        alu_op(&mut cpu, AluFunc::Sub, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 0xfffe);
        assert_eq!(cpu.state.astat & (AC | AN), AN);

        let mut cpu = cpu_with(0x8000, 1);
        alu_op(&mut cpu, AluFunc::Sub, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 0x7fff);
        assert_ne!(cpu.state.astat & AV, 0);
    }

    #[test]
    fn test_rev_sub_and_carry_variants() {
        let mut cpu = cpu_with(3, 5);
        alu_op(&mut cpu, AluFunc::RevSub, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 2);

        let mut cpu = cpu_with(1, 1);
        cpu.state.astat = AC;
        alu_op(&mut cpu, AluFunc::AddWithCarry, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 3);

        let mut cpu = cpu_with(5, 3);
        alu_op(&mut cpu, AluFunc::SubWithBorrow, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 1);
    }

    #[test]
    fn test_abs_of_min_value() {
        let mut cpu = cpu_with(0x8000, 0);
        alu_op(&mut cpu, AluFunc::Abs, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 0x8000);
        assert_eq!(cpu.state.astat & (AN | AV | AS), AN | AV | AS);

        let mut cpu = cpu_with(0xfffb, 0);
        alu_op(&mut cpu, AluFunc::Abs, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 5);
        assert_ne!(cpu.state.astat & AS, 0);
    }

    #[test]
    fn test_y_operand_zero_and_feedback() {
        let mut cpu = cpu_with(0x1234, 0x5555);
        alu_op(&mut cpu, AluFunc::Add, 0, 3, true);
        assert_eq!(cpu.state.bank().af, 0x1234);
        assert_eq!(cpu.state.bank().ar, 0);
    }

    #[test]
    fn test_inc_and_neg_edge_flags() {
        let mut cpu = cpu_with(0, 0x7fff);
        alu_op(&mut cpu, AluFunc::IncY, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 0x8000);
        assert_ne!(cpu.state.astat & AV, 0);

        let mut cpu = cpu_with(0, 0);
        alu_op(&mut cpu, AluFunc::NegY, 0, 0, false);
        assert_eq!(cpu.state.astat & (AC | AZ), AC | AZ);
    }

    #[test]
    fn test_ar_saturation() {
        let mut cpu = cpu_with(0x7fff, 0x7fff);
        cpu.state.set_mstat(MSTAT_SATURATE);
        alu_op(&mut cpu, AluFunc::Add, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 0x7fff);

        let mut cpu = cpu_with(0x8000, 0x8000);
        cpu.state.set_mstat(MSTAT_SATURATE);
        alu_op(&mut cpu, AluFunc::Add, 0, 0, false);
        assert_eq!(cpu.state.bank().ar, 0x8000);

        // AF 不饱和
        let mut cpu = cpu_with(0x7fff, 0x7fff);
        cpu.state.set_mstat(MSTAT_SATURATE);
        alu_op(&mut cpu, AluFunc::Add, 0, 0, true);
        assert_eq!(cpu.state.bank().af, 0xfffe);
    }

    #[test]
    fn test_sticky_overflow_survives() {
        let mut cpu = cpu_with(0x7fff, 1);
        cpu.state.set_mstat(MSTAT_STICKYV);
        alu_op(&mut cpu, AluFunc::Add, 0, 0, false);
        assert_ne!(cpu.state.astat & AV, 0);
        alu_op(&mut cpu, AluFunc::PassY, 0, 0, false);
        assert_ne!(cpu.state.astat & AV, 0);

        cpu.state.set_mstat(0);
        alu_op(&mut cpu, AluFunc::PassY, 0, 0, false);
        assert_eq!(cpu.state.astat & AV, 0);
    }

    #[test]
    fn test_unsigned_division() {
        // AF:AY0 holds the dividend shifted left by one: 100 / 7
        let mut cpu = cpu_with(7, 200);
        cpu.state.bank_mut().af = 0;
        cpu.state.astat &= !AQ;
        for _ in 0..16 {
            divq(&mut cpu, 0);
        }
        assert_eq!(cpu.state.bank().ay0, 14);
    }

    #[test]
    fn test_divs_sets_quotient_sign() {
        let mut cpu = cpu_with(0x8000, 0x0001);
        divs(&mut cpu, 0, 0);
        assert_ne!(cpu.state.astat & AQ, 0);
        assert_eq!(cpu.state.bank().af, 0x0002);
        assert_eq!(cpu.state.bank().ay0, 0x0003);
    }
}
