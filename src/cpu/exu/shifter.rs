use super::super::status::{CoreBank, ShiftResult};
use super::super::Adsp21xx;
use crate::isa::tables::{AC, AV, SS};
use crate::isa::{ShiftFunc, ShiftOp};

/// Shifter X operand: SI, SI, AR, MR0, MR1, MR2, SR0, SR1.
pub(crate) fn x_operand(bank: &CoreBank, xop: u8) -> u16 {
    match xop & 7 {
        0 | 1 => bank.si,
        2 => bank.ar,
        3 => bank.mr.mr0(),
        4 => bank.mr.mr1(),
        5 => bank.mr.mr2(),
        6 => bank.sr.sr0(),
        _ => bank.sr.sr1(),
    }
}

fn logical(value: u32, sc: i32) -> u32 {
    if sc > 0 {
        if sc < 32 { value << sc } else { 0 }
    } else if sc > -32 {
        value >> -sc
    } else {
        0
    }
}

fn arithmetic(value: i32, sc: i32) -> u32 {
    if sc > 0 {
        if sc < 32 { (value << sc) as u32 } else { 0 }
    } else if sc > -32 {
        (value >> -sc) as u32
    } else {
        (value >> 31) as u32
    }
}

/// Leading sign bits of a 32-bit value, minus one.
fn exponent(mut value: i32) -> i16 {
    let mut res = 0;
    if value < 0 {
        while value & 0x4000_0000 != 0 {
            res += 1;
            value <<= 1;
        }
    } else {
        value |= 0x8000;
        while value & 0x4000_0000 == 0 {
            res += 1;
            value <<= 1;
        }
    }
    res
}

/// Shift by the count in SE.
pub(crate) fn shift_op(cpu: &mut Adsp21xx, op: &ShiftOp) {
    let sc = cpu.state.bank().shift_count();
    shift_by(cpu, op, sc);
}

/// Shift by an explicit signed count; positive counts shift left.
pub(crate) fn shift_by(cpu: &mut Adsp21xx, op: &ShiftOp, count: i8) {
    let x = x_operand(cpu.state.bank(), op.xop);
    let sc = count as i32;
    let hi = (x as i16 as i32) << 16;

    let res = match op.func {
        ShiftFunc::LshiftHi | ShiftFunc::LshiftHiOr => logical((x as u32) << 16, sc),
        ShiftFunc::LshiftLo | ShiftFunc::LshiftLoOr => logical(x as u32, sc),
        ShiftFunc::AshiftHi | ShiftFunc::AshiftHiOr => arithmetic(hi, sc),
        ShiftFunc::AshiftLo | ShiftFunc::AshiftLoOr => arithmetic(x as i16 as i32, sc),
        ShiftFunc::NormHi | ShiftFunc::NormHiOr => {
            if sc > 0 {
                let carry = if cpu.state.astat & AC != 0 { 0x8000_0000 } else { 0 };
                let value = (((hi as u32) >> 1) | carry) as i32;
                arithmetic(value, -(sc - 1))
            } else {
                logical(hi as u32, -sc)
            }
        }
        ShiftFunc::NormLo | ShiftFunc::NormLoOr => logical(x as u32, -sc),
        ShiftFunc::ExpHi => {
            exp_hi(cpu, hi);
            return;
        }
        ShiftFunc::ExpHix => {
            if cpu.state.astat & AV != 0 {
                cpu.state.bank_mut().set_se(1);
                set_ss(cpu, hi >= 0);
            } else {
                exp_hi(cpu, hi);
            }
            return;
        }
        ShiftFunc::ExpLo => {
            exp_lo(cpu, x);
            return;
        }
        ShiftFunc::ExpAdj => {
            let res = exponent(hi);
            let bank = cpu.state.bank_mut();
            if res < -(bank.sb as i16) {
                bank.set_sb((-res) as u16);
            }
            return;
        }
    };

    let bank = cpu.state.bank_mut();
    let res = if op.func.is_or() { res | bank.sr.value() } else { res };
    bank.sr = ShiftResult::new(res);
}

fn set_ss(cpu: &mut Adsp21xx, on: bool) {
    if on {
        cpu.state.astat |= SS;
    } else {
        cpu.state.astat &= !SS;
    }
}

fn exp_hi(cpu: &mut Adsp21xx, hi: i32) {
    set_ss(cpu, hi < 0);
    let res = exponent(hi);
    cpu.state.bank_mut().set_se((-res) as u16);
}

/// EXP (LO) only refines an exponent of -15 left by EXP (HI).
fn exp_lo(cpu: &mut Adsp21xx, x: u16) {
    if cpu.state.bank().shift_count() != -15 {
        return;
    }
    let mut value = x as i16 as i32;
    let mut res: i16 = 15;
    if cpu.state.astat & SS != 0 {
        while value & 0x8000 != 0 {
            res += 1;
            value <<= 1;
        }
    } else {
        value = (value << 1) | 1;
        while value & 0x1_0000 == 0 {
            res += 1;
            value <<= 1;
        }
    }
    cpu.state.bank_mut().set_se((-res) as u16);
}
