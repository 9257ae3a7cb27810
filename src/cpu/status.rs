//! DSP architectural state: register banks, address generators, hardware stacks.

use log::warn;

use crate::isa::tables::{Tables, AC, AN, AV, AZ};

// MSTAT bits
pub const MSTAT_BANK: u16 = 0x01;
pub const MSTAT_REVERSE: u16 = 0x02;
pub const MSTAT_STICKYV: u16 = 0x04;
pub const MSTAT_SATURATE: u16 = 0x08;
pub const MSTAT_INTEGER: u16 = 0x10;

// SSTAT bits
pub const SSTAT_PC_EMPTY: u16 = 0x01;
pub const SSTAT_PC_OVER: u16 = 0x02;
pub const SSTAT_COUNT_EMPTY: u16 = 0x04;
pub const SSTAT_COUNT_OVER: u16 = 0x08;
pub const SSTAT_STATUS_EMPTY: u16 = 0x10;
pub const SSTAT_STATUS_OVER: u16 = 0x20;
pub const SSTAT_LOOP_EMPTY: u16 = 0x40;
pub const SSTAT_LOOP_OVER: u16 = 0x80;

/// SSTAT after reset: every stack empty.
pub const SSTAT_RESET: u16 = 0x55;

pub const PC_STACK_DEPTH: usize = 16;
pub const LOOP_STACK_DEPTH: usize = 4;
pub const CNTR_STACK_DEPTH: usize = 4;
pub const STAT_STACK_DEPTH: usize = 4;

/// "No loop active" / "no previous instruction" marker; outside the 14-bit PC range.
pub const NO_ADDRESS: u16 = 0xffff;

/// 40-bit MAC accumulator, held sign-extended in an `i64`.
///
/// MR0 is bits 15..0, MR1 bits 31..16, MR2 the sign-extended upper byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacResult(i64);

impl MacResult {
    /// Truncate to 40 bits and sign-extend.
    #[inline]
    pub fn new(value: i64) -> Self {
        Self((value << 24) >> 24)
    }

    #[inline]
    pub fn value(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn mr0(self) -> u16 {
        self.0 as u16
    }

    #[inline]
    pub fn mr1(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Upper byte, sign-extended to 16 bits.
    #[inline]
    pub fn mr2(self) -> u16 {
        (self.0 >> 32) as u16
    }

    #[inline]
    pub fn set_mr0(&mut self, value: u16) {
        self.0 = (self.0 & !0xffff) | value as i64;
    }

    /// Writing MR1 also loads MR2 with the sign of the value.
    #[inline]
    pub fn set_mr1(&mut self, value: u16) {
        let low = self.0 & 0xffff;
        *self = Self::new(((value as i16 as i64) << 16) | low);
    }

    /// Only the low 8 bits of the value are kept.
    #[inline]
    pub fn set_mr2(&mut self, value: u16) {
        let low = self.0 & 0xffff_ffff;
        *self = Self::new(((value as i8 as i64) << 32) | low);
    }

    /// Set all three slices at once (`mr2` sign-extended from 8 bits).
    pub fn set_slices(&mut self, mr2: u16, mr1: u16, mr0: u16) {
        *self = Self::new(((mr2 as i8 as i64) << 32) | ((mr1 as i64) << 16) | mr0 as i64);
    }
}

/// 32-bit shifter result SR = SR1:SR0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShiftResult(u32);

impl ShiftResult {
    #[inline]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn sr0(self) -> u16 {
        self.0 as u16
    }

    #[inline]
    pub fn sr1(self) -> u16 {
        (self.0 >> 16) as u16
    }

    #[inline]
    pub fn set_sr0(&mut self, value: u16) {
        self.0 = (self.0 & 0xffff_0000) | value as u32;
    }

    #[inline]
    pub fn set_sr1(&mut self, value: u16) {
        self.0 = (self.0 & 0x0000_ffff) | ((value as u32) << 16);
    }
}

/// One bank of computation-unit registers.
///
/// `se` and `sb` are stored sign-extended (8 and 5 significant bits).
/// The bank's zero register has no storage: it always reads 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreBank {
    pub ax0: u16,
    pub ax1: u16,
    pub ay0: u16,
    pub ay1: u16,
    pub ar: u16,
    pub af: u16,
    pub mx0: u16,
    pub mx1: u16,
    pub my0: u16,
    pub my1: u16,
    pub mr: MacResult,
    pub mf: u16,
    pub si: u16,
    pub se: u16,
    pub sb: u16,
    pub sr: ShiftResult,
}

impl CoreBank {
    #[inline]
    pub fn zero(&self) -> u16 {
        0
    }

    /// Shift code in SE as a signed count.
    #[inline]
    pub fn shift_count(&self) -> i8 {
        self.se as i8
    }

    #[inline]
    pub fn set_se(&mut self, value: u16) {
        self.se = value as i8 as i16 as u16;
    }

    #[inline]
    pub fn set_sb(&mut self, value: u16) {
        self.sb = (((value << 11) as i16) >> 11) as u16;
    }
}

/// One data address generator: index, modify, length plus the derived wrap base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressGenerator {
    /// 14-bit index.
    pub i: u16,
    /// Modify value, sign-extended from 14 bits.
    pub m: u16,
    /// 14-bit circular buffer length; 0 means linear addressing.
    pub l: u16,
    /// Fixed high bits of the index for the current length.
    pub lmask: u16,
    /// Start of the circular buffer containing `i`.
    pub base: u16,
}

impl Default for AddressGenerator {
    fn default() -> Self {
        Self { i: 0, m: 0, l: 0, lmask: 0x3fff, base: 0 }
    }
}

impl AddressGenerator {
    pub fn set_i(&mut self, value: u16) {
        self.i = value & 0x3fff;
        self.base = self.i & self.lmask;
    }

    pub fn set_m(&mut self, value: u16) {
        self.m = (((value << 2) as i16) >> 2) as u16;
    }

    pub fn set_l(&mut self, value: u16, tables: &Tables) {
        self.l = value & 0x3fff;
        self.lmask = tables.mask(self.l);
        self.base = self.i & self.lmask;
    }

    /// Post-modify the index by `modify`, wrapping inside `[base, base + l)`.
    pub fn post_modify(&mut self, modify: u16) {
        let base = self.base as i32;
        let length = self.l as i32;
        let mut i = self.i as i32 + modify as i16 as i32;
        if i < base {
            i += length;
        } else if i >= base + length {
            i -= length;
        }
        self.i = (i & 0x3fff) as u16;
    }
}

/// Fixed-depth hardware stack.
///
/// Overflow and underflow are reported to the caller, which owns the
/// matching SSTAT bits. A pop on an empty stack leaves the pointer at 0 and
/// yields slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwStack<T: Copy + Default, const N: usize> {
    entries: [T; N],
    sp: usize,
}

impl<T: Copy + Default, const N: usize> Default for HwStack<T, N> {
    fn default() -> Self {
        Self { entries: [T::default(); N], sp: 0 }
    }
}

impl<T: Copy + Default, const N: usize> HwStack<T, N> {
    #[inline]
    pub fn depth(&self) -> usize {
        self.sp
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.sp == N
    }

    /// Returns false (and drops the value) when full.
    pub fn push(&mut self, value: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries[self.sp] = value;
        self.sp += 1;
        true
    }

    pub fn pop(&mut self) -> T {
        if self.sp > 0 {
            self.sp -= 1;
        }
        self.entries[self.sp]
    }

    /// Top entry without popping; slot 0 when empty.
    pub fn top(&self) -> T {
        self.entries[self.sp.saturating_sub(1)]
    }

    /// Entry `depth` positions below the top.
    pub fn peek(&self, depth: usize) -> Option<T> {
        self.sp.checked_sub(depth + 1).map(|idx| self.entries[idx])
    }

    pub fn poke(&mut self, depth: usize, value: T) -> bool {
        match self.sp.checked_sub(depth + 1) {
            Some(idx) => {
                self.entries[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Move the stack pointer directly (debugger access), clamped to the depth.
    pub fn set_depth(&mut self, sp: usize) {
        self.sp = sp.min(N);
    }
}

/// The complete machine state: the unit of context save/restore.
///
/// Plain data, `Copy`, with no pointers into itself: the active register
/// bank is selected by the MSTAT bank bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineState {
    pub banks: [CoreBank; 2],
    pub dag: [AddressGenerator; 8],

    pub pc: u16,
    pub ppc: u16,
    /// Address of the last instruction of the active loop.
    pub loop_end: u16,
    /// Continuation condition of the active loop.
    pub loop_cond: u8,
    pub cntr: u16,

    pub astat: u16,
    pub mstat: u16,
    pub sstat: u16,
    /// ASTAT bits that survive the start of an ALU operation.
    pub astat_clear: u16,

    pub px: u16,
    pub pc_stack: HwStack<u16, PC_STACK_DEPTH>,
    /// Entries are `end << 4 | cond`.
    pub loop_stack: HwStack<u32, LOOP_STACK_DEPTH>,
    pub cntr_stack: HwStack<u16, CNTR_STACK_DEPTH>,
    /// Entries are `[astat, mstat, imask]`.
    pub stat_stack: HwStack<[u16; 3], STAT_STACK_DEPTH>,

    pub flag_in: bool,
    pub flag_out: bool,

    pub imask: u16,
    pub icntl: u16,
    pub irq_state: [bool; 4],
    pub irq_latch: [bool; 4],
    pub interrupt_cycles: i32,
    pub idle: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            banks: [CoreBank::default(); 2],
            dag: [AddressGenerator::default(); 8],
            pc: 0,
            ppc: NO_ADDRESS,
            loop_end: NO_ADDRESS,
            loop_cond: 0,
            cntr: 0,
            astat: 0,
            mstat: 0,
            sstat: SSTAT_RESET,
            astat_clear: !(AZ | AN | AV | AC),
            px: 0,
            pc_stack: HwStack::default(),
            loop_stack: HwStack::default(),
            cntr_stack: HwStack::default(),
            stat_stack: HwStack::default(),
            flag_in: false,
            flag_out: false,
            imask: 0,
            icntl: 0,
            irq_state: [false; 4],
            irq_latch: [false; 4],
            interrupt_cycles: 0,
            idle: false,
        }
    }
}

impl MachineState {
    /// Index of the active register bank.
    #[inline]
    pub fn bank_index(&self) -> usize {
        (self.mstat & MSTAT_BANK) as usize
    }

    #[inline]
    pub fn bank(&self) -> &CoreBank {
        &self.banks[self.bank_index()]
    }

    #[inline]
    pub fn bank_mut(&mut self) -> &mut CoreBank {
        let idx = self.bank_index();
        &mut self.banks[idx]
    }

    /// Write MSTAT. The bank bit switches the active bank without copying;
    /// the sticky-overflow bit decides whether AV survives the next ALU op.
    pub fn set_mstat(&mut self, value: u16) {
        self.mstat = value;
        self.astat_clear = if value & MSTAT_STICKYV != 0 {
            !(AZ | AN | AC)
        } else {
            !(AZ | AN | AV | AC)
        };
    }

    /// ASTAT as the 8-bit key of the condition table.
    #[inline]
    pub fn flags_byte(&self) -> u8 {
        self.astat as u8
    }

    // ========== PC stack ==========

    pub fn push_pc_value(&mut self, value: u16) {
        if self.pc_stack.push(value) {
            self.sstat &= !SSTAT_PC_EMPTY;
        } else {
            self.sstat |= SSTAT_PC_OVER;
            warn!("PC stack overflow at PC 0x{:04x}", self.pc);
        }
    }

    pub fn push_pc(&mut self) {
        self.push_pc_value(self.pc);
    }

    pub fn pop_pc_value(&mut self) -> u16 {
        if self.pc_stack.is_empty() {
            warn!("PC stack underflow at PC 0x{:04x}", self.pc);
        }
        let value = self.pc_stack.pop();
        if self.pc_stack.is_empty() {
            self.sstat |= SSTAT_PC_EMPTY;
        }
        value
    }

    /// Pop into PC.
    pub fn pop_pc(&mut self) {
        self.pc = self.pop_pc_value() & 0x3fff;
    }

    // ========== loop stack ==========

    pub fn push_loop(&mut self, entry: u32) {
        if self.loop_stack.push(entry) {
            self.loop_end = ((entry >> 4) & 0x3fff) as u16;
            self.loop_cond = (entry & 0xf) as u8;
            self.sstat &= !SSTAT_LOOP_EMPTY;
        } else {
            self.sstat |= SSTAT_LOOP_OVER;
            warn!("loop stack overflow at PC 0x{:04x}", self.pc);
        }
    }

    /// Pop the loop stack; the next entry (if any) becomes the active loop.
    pub fn pop_loop(&mut self) {
        if self.loop_stack.is_empty() {
            warn!("loop stack underflow at PC 0x{:04x}", self.pc);
            return;
        }
        self.loop_stack.pop();
        if self.loop_stack.is_empty() {
            self.loop_end = NO_ADDRESS;
            self.loop_cond = 0;
            self.sstat |= SSTAT_LOOP_EMPTY;
        } else {
            let entry = self.loop_stack.top();
            self.loop_end = ((entry >> 4) & 0x3fff) as u16;
            self.loop_cond = (entry & 0xf) as u8;
        }
    }

    // ========== counter stack ==========

    pub fn push_cntr(&mut self) {
        if self.cntr_stack.push(self.cntr) {
            self.sstat &= !SSTAT_COUNT_EMPTY;
        } else {
            self.sstat |= SSTAT_COUNT_OVER;
            warn!("counter stack overflow at PC 0x{:04x}", self.pc);
        }
    }

    pub fn pop_cntr(&mut self) {
        if self.cntr_stack.is_empty() {
            warn!("counter stack underflow at PC 0x{:04x}", self.pc);
        }
        self.cntr = self.cntr_stack.pop();
        if self.cntr_stack.is_empty() {
            self.sstat |= SSTAT_COUNT_EMPTY;
        }
    }

    // ========== status stack ==========

    pub fn push_status(&mut self) {
        if self.stat_stack.push([self.astat, self.mstat, self.imask]) {
            self.sstat &= !SSTAT_STATUS_EMPTY;
        } else {
            self.sstat |= SSTAT_STATUS_OVER;
            warn!("status stack overflow at PC 0x{:04x}", self.pc);
        }
    }

    /// Restore ASTAT/MSTAT/IMASK. Interrupt arbitration is the caller's job.
    pub fn pop_status(&mut self) {
        if self.stat_stack.is_empty() {
            warn!("status stack underflow at PC 0x{:04x}", self.pc);
        }
        let [astat, mstat, imask] = self.stat_stack.pop();
        if self.stat_stack.is_empty() {
            self.sstat |= SSTAT_STATUS_EMPTY;
        }
        self.astat = astat;
        self.set_mstat(mstat);
        self.imask = imask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_result_slices() {
        let mut mr = MacResult::default();
        mr.set_mr1(0x8000);
        assert_eq!(mr.mr2(), 0xffff);
        assert_eq!(mr.value(), -0x8000_0000);
        mr.set_mr2(0x0012);
        assert_eq!(mr.mr2(), 0x0012);
        assert_eq!(mr.mr1(), 0x8000);
        mr.set_mr0(0xabcd);
        assert_eq!(mr.value(), 0x12_8000_abcd);
        // 40-bit wrap
        assert_eq!(MacResult::new(0x80_0000_0000).value(), -0x80_0000_0000);
    }

    #[test]
    fn test_shift_result_slices() {
        let mut sr = ShiftResult::new(0x1234_5678);
        assert_eq!(sr.sr1(), 0x1234);
        assert_eq!(sr.sr0(), 0x5678);
        sr.set_sr1(0xffff);
        assert_eq!(sr.value(), 0xffff_5678);
    }

    #[test]
    fn test_bank_sign_extension() {
        let mut bank = CoreBank::default();
        bank.set_se(0x00f0);
        assert_eq!(bank.se, 0xfff0);
        assert_eq!(bank.shift_count(), -16);
        bank.set_sb(0x0010);
        assert_eq!(bank.sb, 0xfff0);
        assert_eq!(bank.zero(), 0);
    }

    #[test]
    fn test_address_generator_wrap() {
        let tables = Tables::get().unwrap();
        let mut dag = AddressGenerator::default();
        dag.set_l(3, tables);
        dag.set_i(0x0102);
        assert_eq!(dag.base, 0x0100);
        dag.post_modify(1);
        assert_eq!(dag.i, 0x0100);
        dag.set_m(0x3fff); // -1
        dag.post_modify(dag.m);
        assert_eq!(dag.i, 0x0102);
    }

    #[test]
    fn test_linear_addressing_wraps_14_bits() {
        let mut dag = AddressGenerator::default();
        dag.set_i(0x3fff);
        dag.post_modify(1);
        assert_eq!(dag.i, 0);
    }

    #[test]
    fn test_hw_stack_overflow_and_underflow() {
        let mut stack: HwStack<u16, 2> = HwStack::default();
        assert!(stack.push(1));
        assert!(stack.push(2));
        assert!(!stack.push(3));
        assert_eq!(stack.peek(0), Some(2));
        assert_eq!(stack.peek(1), Some(1));
        assert_eq!(stack.peek(2), None);
        assert_eq!(stack.pop(), 2);
        assert_eq!(stack.pop(), 1);
        // 空栈弹出返回槽位 0
        assert_eq!(stack.pop(), 1);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_state_stacks_track_sstat() {
        let mut state = MachineState::default();
        state.pc = 0x10;
        state.push_pc();
        assert_eq!(state.sstat & SSTAT_PC_EMPTY, 0);
        for _ in 0..PC_STACK_DEPTH {
            state.push_pc();
        }
        assert_ne!(state.sstat & SSTAT_PC_OVER, 0);
        assert_eq!(state.pc_stack.depth(), PC_STACK_DEPTH);

        state.push_loop((0x20 << 4) | 0xf);
        state.push_loop((0x30 << 4) | 0x0);
        assert_eq!(state.loop_end, 0x30);
        state.pop_loop();
        assert_eq!((state.loop_end, state.loop_cond), (0x20, 0xf));
        state.pop_loop();
        assert_eq!(state.loop_end, NO_ADDRESS);
        assert_ne!(state.sstat & SSTAT_LOOP_EMPTY, 0);
    }

    #[test]
    fn test_sticky_overflow_changes_clear_mask() {
        let mut state = MachineState::default();
        state.set_mstat(MSTAT_STICKYV);
        assert_ne!(state.astat_clear & AV, 0);
        state.set_mstat(0);
        assert_eq!(state.astat_clear & AV, 0);
    }
}
