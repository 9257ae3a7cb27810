//! 指令定义结构
//!
//! 统一的指令定义，同时用于解码和冲突检测。
//! 每个定义覆盖一类编码（通常以主操作码的若干高位区分）。

use super::fields::*;
use super::instr::{
    ComputeFunc, ComputeOp, Condition, DagRef, DecodedInstr, DspInstr, MemSpace, RegRef,
    ShiftFunc, ShiftOp, StackOps,
};

/// 指令定义
///
/// 一处定义，两处使用：
/// - 解码：通过 mask/match 匹配后调用 decode 函数
/// - 冲突检测：通过 mask/match 判断两条指令是否可能冲突
#[derive(Clone)]
pub struct InstrDef {
    /// 指令名称（用于调试和冲突报告）
    pub name: &'static str,
    /// 匹配掩码（24-bit）
    pub mask: u32,
    /// 匹配值
    pub match_val: u32,
    /// 解码函数：从原始编码提取字段并构造 DspInstr
    pub decode: fn(u32) -> DspInstr,
}

impl InstrDef {
    pub const fn new(
        name: &'static str,
        mask: u32,
        match_val: u32,
        decode: fn(u32) -> DspInstr,
    ) -> Self {
        Self { name, mask, match_val, decode }
    }

    /// 检查指令是否匹配此定义
    #[inline]
    pub fn matches(&self, raw: u32) -> bool {
        (raw & self.mask) == self.match_val
    }

    /// 是否可能匹配某个主操作码（只比较 [23:16]）
    #[inline]
    pub fn covers_primary(&self, primary: u8) -> bool {
        let mask = (self.mask >> 16) as u8;
        let want = (self.match_val >> 16) as u8;
        primary & mask == want
    }

    #[inline]
    pub fn decode_instr(&self, raw: u32) -> DecodedInstr {
        DecodedInstr { raw, instr: (self.decode)(raw) }
    }

    /// 两个定义冲突当且仅当存在某个指令字同时匹配两者
    pub fn conflicts_with(&self, other: &InstrDef) -> bool {
        let common_mask = self.mask & other.mask;
        (self.match_val & common_mask) == (other.match_val & common_mask)
    }
}

impl std::fmt::Debug for InstrDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrDef")
            .field("name", &self.name)
            .field("mask", &format_args!("0x{:06X}", self.mask))
            .field("match_val", &format_args!("0x{:06X}", self.match_val))
            .finish()
    }
}

// ========== 掩码常量 ==========

/// 精确匹配 8-bit 主操作码
pub const PRIMARY_MASK: u32 = 0xff_0000;
/// 主操作码高 6 位（DO UNTIL / JUMP / CALL）
pub const PRIMARY6_MASK: u32 = 0xfc_0000;
/// 主操作码高 5 位
pub const PRIMARY5_MASK: u32 = 0xf8_0000;
/// 主操作码高 4 位
pub const PRIMARY4_MASK: u32 = 0xf0_0000;
/// 主操作码高 3 位
pub const PRIMARY3_MASK: u32 = 0xe0_0000;
/// 主操作码高 2 位
pub const PRIMARY2_MASK: u32 = 0xc0_0000;

/// 由主操作码构造 match 值
#[inline]
pub const fn op_match(primary: u8) -> u32 {
    (primary as u32) << 16
}

// ========== 字段组合辅助 ==========

fn compute_op(raw: u32, feedback: bool) -> ComputeOp {
    ComputeOp {
        func: ComputeFunc::from_amf(amf(raw)),
        xop: xop(raw),
        yop: yop(raw),
        feedback,
    }
}

fn shift_op(raw: u32) -> ShiftOp {
    ShiftOp { func: ShiftFunc::from_bits(shift_func(raw)), xop: xop(raw) }
}

fn dag_at(raw: u32, dag2: bool) -> DagRef {
    DagRef { dag2, i: ireg(raw), m: mreg(raw) }
}

fn shift_mem(raw: u32, space: MemSpace, dag2: bool) -> DspInstr {
    DspInstr::ShiftMem {
        op: shift_op(raw),
        space,
        dag: dag_at(raw, dag2),
        reg: dreg(raw),
        write: shift_write(raw),
    }
}

/// 模式控制字段：每对 (变更位, 取值位) 对应一个 MSTAT 位
const MODE_FIELDS: [(u32, u16); 5] = [
    (4, 0x01),  // 寄存器组切换
    (6, 0x02),  // 位反转寻址
    (8, 0x04),  // AV 锁存
    (10, 0x08), // AR 饱和
    (12, 0x10), // 整数乘法模式
];

fn mode_control(raw: u32) -> DspInstr {
    let mut mask = 0;
    let mut value = 0;
    for (shift, bit) in MODE_FIELDS {
        if raw & (2 << shift) != 0 {
            mask |= bit;
            if raw & (1 << shift) != 0 {
                value |= bit;
            }
        }
    }
    DspInstr::ModeControl { mask, value }
}

/// ADSP-21xx 指令定义表
pub static DSP_INSTRS: &[InstrDef] = &[
    // ========== 程序流控制 ==========
    InstrDef::new("NOP", PRIMARY_MASK, op_match(OP_NOP), |_| DspInstr::Nop),
    InstrDef::new("IDLE", 0xff_8000, op_match(OP_FLAG_IDLE) | 0x8000, |_| DspInstr::Idle),
    InstrDef::new("FLAG_OUT", 0xff_8000, op_match(OP_FLAG_IDLE), |raw| DspInstr::FlagOut {
        cond: Condition::from_bits(cond(raw)),
        reset: raw & 0x20 != 0,
        toggle: raw & 0x10 != 0,
    }),
    InstrDef::new("FLAG_IN_JUMP", PRIMARY_MASK, op_match(OP_FLAG_JUMP), |raw| {
        DspInstr::JumpOnFlagIn {
            target: flag_jump_addr(raw),
            when_set: raw & 0x2 != 0,
            call: raw & 0x1 != 0,
        }
    }),
    InstrDef::new("STACK", PRIMARY_MASK, op_match(OP_STACK), |raw| {
        DspInstr::StackControl(StackOps {
            pop_pc: raw & 0x10 != 0,
            pop_loop: raw & 0x08 != 0,
            pop_cntr: raw & 0x04 != 0,
            push_status: raw & 0x03 == 0x02,
            pop_status: raw & 0x03 == 0x03,
        })
    }),
    InstrDef::new("SAT_MR", PRIMARY_MASK, op_match(OP_SAT_MR), |_| DspInstr::SaturateMr),
    InstrDef::new("DIVS", PRIMARY_MASK, op_match(OP_DIVS), |raw| DspInstr::Divs {
        xop: xop(raw),
        yop: yop(raw),
    }),
    InstrDef::new("DIVQ", PRIMARY_MASK, op_match(OP_DIVQ), |raw| DspInstr::Divq { xop: xop(raw) }),
    InstrDef::new("MODIFY", PRIMARY_MASK, op_match(OP_MODIFY), |raw| DspInstr::Modify {
        dag: dag_at(raw, raw & 0x10 != 0),
    }),
    InstrDef::new("RETURN", PRIMARY_MASK, op_match(OP_RETURN), |raw| DspInstr::Return {
        cond: Condition::from_bits(cond(raw)),
        from_interrupt: raw & 0x10 != 0,
    }),
    InstrDef::new("JUMP_IND", PRIMARY_MASK, op_match(OP_JUMP_IND), |raw| {
        DspInstr::JumpIndirect {
            cond: Condition::from_bits(cond(raw)),
            ireg: 4 + ((raw >> 6) & 3) as u8,
            call: raw & 0x10 != 0,
        }
    }),
    InstrDef::new("MODE", PRIMARY_MASK, op_match(OP_MODE), mode_control),
    InstrDef::new("REG_MOVE", PRIMARY_MASK, op_match(OP_REG_MOVE), |raw| DspInstr::RegMove {
        dst: RegRef::new(((raw >> 10) & 3) as u8, dreg(raw)),
        src: RegRef::new(((raw >> 8) & 3) as u8, sreg(raw)),
    }),
    // ========== 移位器 ==========
    InstrDef::new("SHIFT", PRIMARY_MASK, op_match(OP_SHIFT_COND), |raw| DspInstr::Shift {
        cond: Condition::from_bits(cond(raw)),
        op: shift_op(raw),
    }),
    InstrDef::new("SHIFT_IMM", PRIMARY_MASK, op_match(OP_SHIFT_IMM), |raw| {
        DspInstr::ShiftImm { op: shift_op(raw), count: shift_imm(raw) }
    }),
    InstrDef::new("SHIFT_MOVE", PRIMARY_MASK, op_match(OP_SHIFT_MOVE), |raw| {
        DspInstr::ShiftMove { op: shift_op(raw), dst: dreg(raw), src: sreg(raw) }
    }),
    InstrDef::new("SHIFT_PM", PRIMARY_MASK, op_match(OP_SHIFT_PM), |raw| {
        shift_mem(raw, MemSpace::Program, true)
    }),
    InstrDef::new("SHIFT_DM1", PRIMARY_MASK, op_match(OP_SHIFT_DM1), |raw| {
        shift_mem(raw, MemSpace::Data, false)
    }),
    InstrDef::new("SHIFT_DM2", PRIMARY_MASK, op_match(OP_SHIFT_DM2), |raw| {
        shift_mem(raw, MemSpace::Data, true)
    }),
    // ========== 循环 / 跳转 ==========
    InstrDef::new("DO_UNTIL", PRIMARY6_MASK, op_match(OP_DO_UNTIL), |raw| DspInstr::DoUntil {
        end: addr14(raw),
        term: Condition::from_bits(cond(raw)),
    }),
    InstrDef::new("JUMP", PRIMARY6_MASK, op_match(OP_JUMP), |raw| DspInstr::Jump {
        cond: Condition::from_bits(cond(raw)),
        target: addr14(raw),
    }),
    InstrDef::new("CALL", PRIMARY6_MASK, op_match(OP_CALL), |raw| DspInstr::Call {
        cond: Condition::from_bits(cond(raw)),
        target: addr14(raw),
    }),
    // ========== ALU / MAC ==========
    InstrDef::new("COMPUTE", PRIMARY5_MASK, op_match(OP_COMPUTE), |raw| DspInstr::Compute {
        cond: Condition::from_bits(cond(raw)),
        op: compute_op(raw, z(raw)),
    }),
    InstrDef::new("COMPUTE_MOVE", PRIMARY5_MASK, op_match(OP_COMPUTE_MOVE), |raw| {
        DspInstr::ComputeMove { op: compute_op(raw, z(raw)), dst: dreg(raw), src: sreg(raw) }
    }),
    // ========== 立即数装载 ==========
    InstrDef::new("LOAD_REG", PRIMARY4_MASK, op_match(OP_LOAD_NONDATA), |raw| {
        DspInstr::LoadReg { dst: RegRef::new(group(raw), sreg(raw)), value: imm14(raw) }
    }),
    InstrDef::new("LOAD_DREG", PRIMARY4_MASK, op_match(OP_LOAD_DATA), |raw| {
        DspInstr::LoadReg { dst: RegRef::data(sreg(raw)), value: data16(raw) }
    }),
    // ========== 运算 + 访存 ==========
    InstrDef::new("COMPUTE_PM", PRIMARY4_MASK, op_match(OP_COMPUTE_PM), |raw| {
        DspInstr::ComputeMem {
            op: compute_op(raw, z(raw)),
            space: MemSpace::Program,
            dag: dag_at(raw, true),
            reg: dreg(raw),
            write: raw & 0x08_0000 != 0,
        }
    }),
    InstrDef::new("COMPUTE_DM", PRIMARY3_MASK, op_match(OP_COMPUTE_DM), |raw| {
        DspInstr::ComputeMem {
            op: compute_op(raw, z(raw)),
            space: MemSpace::Data,
            dag: dag_at(raw, raw & 0x08_0000 != 0),
            reg: dreg(raw),
            write: raw & 0x10_0000 != 0,
        }
    }),
    InstrDef::new("DM_DIRECT", PRIMARY3_MASK, op_match(OP_DM_DIRECT), |raw| {
        DspInstr::DmDirect {
            reg: RegRef::new(group(raw), sreg(raw)),
            addr: addr14(raw),
            write: raw & 0x10_0000 != 0,
        }
    }),
    InstrDef::new("DM_IMM", PRIMARY3_MASK, op_match(OP_DM_IMM), |raw| DspInstr::DmWriteImm {
        dag: dag_at(raw, raw & 0x10_0000 != 0),
        value: data16(raw),
    }),
    InstrDef::new("DUAL_READ", PRIMARY2_MASK, op_match(OP_DUAL_READ), |raw| {
        DspInstr::DualRead {
            op: compute_op(raw, false),
            dm_dst: ((raw >> 18) & 3) as u8,
            pm_dst: ((raw >> 20) & 3) as u8,
            dm: DagRef::dag1(ireg(raw), mreg(raw)),
            pm: DagRef::dag2(((raw >> 6) & 3) as u8, ((raw >> 4) & 3) as u8),
        }
    }),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str) -> &'static InstrDef {
        DSP_INSTRS.iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn test_no_conflicts_in_table() {
        for (i, a) in DSP_INSTRS.iter().enumerate() {
            for b in DSP_INSTRS.iter().skip(i + 1) {
                assert!(!a.conflicts_with(b), "{} conflicts with {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_idle_and_flag_out_share_primary() {
        let idle = def("IDLE");
        let flag = def("FLAG_OUT");
        assert!(idle.covers_primary(0x02));
        assert!(flag.covers_primary(0x02));
        assert!(idle.matches(0x02_8000));
        assert!(!flag.matches(0x02_8000));
        assert!(flag.matches(0x02_003f));
    }

    #[test]
    fn test_covers_primary_ranges() {
        let dual = def("DUAL_READ");
        assert!(dual.covers_primary(0xc0));
        assert!(dual.covers_primary(0xff));
        assert!(!dual.covers_primary(0xbf));
        let jump = def("JUMP");
        assert!((0x18..=0x1b).all(|p| jump.covers_primary(p)));
        assert!(!jump.covers_primary(0x1c));
    }

    #[test]
    fn test_mode_control_fields() {
        // ENA BIT_REV (0xc0), DIS SEC_REG (0x20)
        let instr = (def("MODE").decode)(0x0c_00e0);
        assert_eq!(instr, DspInstr::ModeControl { mask: 0x03, value: 0x02 });
    }
}
