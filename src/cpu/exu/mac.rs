use super::super::status::{CoreBank, MacResult, MSTAT_INTEGER};
use super::super::Adsp21xx;
use crate::isa::tables::MV;
use crate::isa::{Accumulate, MacFunc, Signedness};

/// MAC X operand: MX0, MX1, AR, MR0, MR1, MR2, SR0, SR1.
pub(crate) fn x_operand(bank: &CoreBank, xop: u8) -> u16 {
    match xop & 7 {
        0 => bank.mx0,
        1 => bank.mx1,
        2 => bank.ar,
        3 => bank.mr.mr0(),
        4 => bank.mr.mr1(),
        5 => bank.mr.mr2(),
        6 => bank.sr.sr0(),
        _ => bank.sr.sr1(),
    }
}

/// MAC Y operand: MY0, MY1, MF, 0.
pub(crate) fn y_operand(bank: &CoreBank, yop: u8) -> u16 {
    match yop & 3 {
        0 => bank.my0,
        1 => bank.my1,
        2 => bank.mf,
        _ => bank.zero(),
    }
}

#[inline]
fn widen(value: u16, signed: bool) -> i64 {
    if signed { value as i16 as i64 } else { value as i64 }
}

/// Unbiased rounding at bit 15: a tie leaves bit 16 cleared.
#[inline]
fn round(res: i64) -> i64 {
    if res & 0xffff == 0x8000 {
        (res + 0x8000) & !0x1_0000
    } else {
        res + 0x8000
    }
}

/// Execute a MAC function, writing MR (with MV) or MF when `feedback`.
pub(crate) fn mac_op(cpu: &mut Adsp21xx, func: MacFunc, xop: u8, yop: u8, feedback: bool) {
    let MacFunc::Multiply { acc, sign } = func else {
        return;
    };
    let shift = if cpu.state.mstat & MSTAT_INTEGER != 0 { 0 } else { 1 };

    let bank = cpu.state.bank();
    let x = widen(x_operand(bank, xop), sign.x_signed());
    let y = widen(y_operand(bank, yop), sign.y_signed());
    let product = (x * y) << shift;
    let mr = bank.mr.value();

    let mut res = match acc {
        Accumulate::Replace => product,
        Accumulate::Add => mr + product,
        Accumulate::Sub => mr - product,
    };
    if sign == Signedness::Rnd {
        res = round(res);
    }
    let res = MacResult::new(res);

    if feedback {
        cpu.state.bank_mut().mf = res.mr1();
        return;
    }

    cpu.state.bank_mut().mr = res;
    let top = res.value() >> 31;
    if top == 0 || top == -1 {
        cpu.state.astat &= !MV;
    } else {
        cpu.state.astat |= MV;
    }
}

/// SATURATE MR: clamp MR to a 32-bit signed value when MV is set.
pub(crate) fn saturate_mr(cpu: &mut Adsp21xx) {
    if cpu.state.astat & MV == 0 {
        return;
    }
    let mr = &mut cpu.state.bank_mut().mr;
    if mr.mr2() & 0x80 != 0 {
        mr.set_slices(0xffff, 0x8000, 0x0000);
    } else {
        mr.set_slices(0x0000, 0x7fff, 0xffff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::ChipVariant;

    fn multiply(acc: Accumulate, sign: Signedness) -> MacFunc {
        MacFunc::Multiply { acc, sign }
    }

    fn cpu_with(mx0: u16, my0: u16) -> Adsp21xx {
        let mut cpu = Adsp21xx::new(ChipVariant::Adsp2100).unwrap();
        cpu.state.bank_mut().mx0 = mx0;
        cpu.state.bank_mut().my0 = my0;
        cpu
    }

    #[test]
    fn test_fractional_multiply() {
        // 0.5 * 0.5 = 0.25 in 1.15 format
        let mut cpu = cpu_with(0x4000, 0x4000);
        mac_op(&mut cpu, multiply(Accumulate::Replace, Signedness::Ss), 0, 0, false);
        assert_eq!(cpu.state.bank().mr.mr1(), 0x2000);
        assert_eq!(cpu.state.bank().mr.mr0(), 0);
    }

    #[test]
    fn test_integer_mode_skips_shift() {
        let mut cpu = cpu_with(3, 0xfffe);
        cpu.state.set_mstat(MSTAT_INTEGER);
        mac_op(&mut cpu, multiply(Accumulate::Replace, Signedness::Ss), 0, 0, false);
        assert_eq!(cpu.state.bank().mr.value(), -6);

        mac_op(&mut cpu, multiply(Accumulate::Replace, Signedness::Su), 0, 0, false);
        assert_eq!(cpu.state.bank().mr.value(), 3 * 0xfffe);
    }

    #[test]
    fn test_accumulate_and_subtract() {
        let mut cpu = cpu_with(2, 3);
        cpu.state.set_mstat(MSTAT_INTEGER);
        mac_op(&mut cpu, multiply(Accumulate::Add, Signedness::Uu), 0, 0, false);
        mac_op(&mut cpu, multiply(Accumulate::Add, Signedness::Uu), 0, 0, false);
        assert_eq!(cpu.state.bank().mr.value(), 12);
        mac_op(&mut cpu, multiply(Accumulate::Sub, Signedness::Uu), 0, 0, false);
        assert_eq!(cpu.state.bank().mr.value(), 6);
    }

    #[test]
    fn test_unbiased_rounding() {
        let mut cpu = cpu_with(0, 0);
        cpu.state.set_mstat(MSTAT_INTEGER);
        cpu.state.bank_mut().mr = MacResult::new(0x1_8000);
        mac_op(&mut cpu, multiply(Accumulate::Add, Signedness::Rnd), 0, 0, false);
        assert_eq!(cpu.state.bank().mr.mr1(), 0x0002);

        cpu.state.bank_mut().mr = MacResult::new(0x2_8000);
        mac_op(&mut cpu, multiply(Accumulate::Add, Signedness::Rnd), 0, 0, false);
        assert_eq!(cpu.state.bank().mr.mr1(), 0x0002);

        cpu.state.bank_mut().mr = MacResult::new(0x2_8001);
        mac_op(&mut cpu, multiply(Accumulate::Add, Signedness::Rnd), 0, 0, false);
        assert_eq!(cpu.state.bank().mr.mr1(), 0x0003);
    }

    #[test]
    fn test_mv_and_saturate() {
        let mut cpu = cpu_with(0x7fff, 0x7fff);
        cpu.state.bank_mut().mr.set_slices(0x00, 0x7fff, 0xffff);
        mac_op(&mut cpu, multiply(Accumulate::Add, Signedness::Ss), 0, 0, false);
        assert_ne!(cpu.state.astat & MV, 0);
        saturate_mr(&mut cpu);
        let mr = cpu.state.bank().mr;
        assert_eq!((mr.mr2(), mr.mr1(), mr.mr0()), (0x0000, 0x7fff, 0xffff));

        let mut cpu = cpu_with(0x7fff, 0x8000);
        cpu.state.bank_mut().mr.set_slices(0xff, 0x8000, 0x0000);
        mac_op(&mut cpu, multiply(Accumulate::Add, Signedness::Ss), 0, 0, false);
        assert_ne!(cpu.state.astat & MV, 0);
        saturate_mr(&mut cpu);
        let mr = cpu.state.bank().mr;
        assert_eq!((mr.mr2(), mr.mr1(), mr.mr0()), (0xffff, 0x8000, 0x0000));
    }

    #[test]
    fn test_feedback_writes_mf_only() {
        let mut cpu = cpu_with(0x4000, 0x4000);
        cpu.state.astat = MV;
        mac_op(&mut cpu, multiply(Accumulate::Replace, Signedness::Ss), 0, 0, true);
        assert_eq!(cpu.state.bank().mf, 0x2000);
        assert_eq!(cpu.state.bank().mr.value(), 0);
        assert_ne!(cpu.state.astat & MV, 0);
    }

    #[test]
    fn test_nop_leaves_state() {
        let mut cpu = cpu_with(0x4000, 0x4000);
        let before = cpu.get_context();
        mac_op(&mut cpu, MacFunc::Nop, 0, 0, false);
        assert_eq!(cpu.get_context(), before);
    }
}
