//! 定义指令的语义表达式，用于解码和执行阶段

use std::fmt;

/// 4-bit 条件码
///
/// 0..=13 由 `ASTAT` 标志决定（查条件表），14 为 `NOT CE`（计数器测试），15 恒真。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition(u8);

impl Condition {
    pub const EQ: Condition = Condition(0x0);
    pub const NE: Condition = Condition(0x1);
    pub const GT: Condition = Condition(0x2);
    pub const LE: Condition = Condition(0x3);
    pub const LT: Condition = Condition(0x4);
    pub const GE: Condition = Condition(0x5);
    pub const AV: Condition = Condition(0x6);
    pub const NOT_AV: Condition = Condition(0x7);
    pub const AC: Condition = Condition(0x8);
    pub const NOT_AC: Condition = Condition(0x9);
    pub const NEG: Condition = Condition(0xa);
    pub const POS: Condition = Condition(0xb);
    pub const MV: Condition = Condition(0xc);
    pub const NOT_MV: Condition = Condition(0xd);
    pub const NOT_CE: Condition = Condition(0xe);
    pub const ALWAYS: Condition = Condition(0xf);

    /// 从低 4 位构造
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Condition(bits & 0xf)
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self.0
    }

    /// 是否为计数器条件（求值有副作用）
    #[inline]
    pub const fn is_counter(self) -> bool {
        self.0 == 0xe
    }

    pub fn mnemonic(self) -> &'static str {
        const NAMES: [&str; 16] = [
            "EQ", "NE", "GT", "LE", "LT", "GE", "AV", "NOT AV", "AC", "NOT AC", "NEG", "POS", "MV",
            "NOT MV", "NOT CE", "TRUE",
        ];
        NAMES[self.0 as usize]
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// ALU 功能（AMF 0x10..=0x1f 的低 4 位）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluFunc {
    /// R = Y
    PassY,
    /// R = Y + 1
    IncY,
    /// R = X + Y + C
    AddWithCarry,
    /// R = X + Y
    Add,
    /// R = NOT Y
    NotY,
    /// R = -Y
    NegY,
    /// R = X - Y + C - 1
    SubWithBorrow,
    /// R = X - Y
    Sub,
    /// R = Y - 1
    DecY,
    /// R = Y - X
    RevSub,
    /// R = Y - X + C - 1
    RevSubWithBorrow,
    /// R = NOT X
    NotX,
    And,
    Or,
    Xor,
    /// R = ABS X
    Abs,
}

impl AluFunc {
    pub fn from_bits(bits: u8) -> Self {
        use AluFunc::*;
        match bits & 0xf {
            0x0 => PassY,
            0x1 => IncY,
            0x2 => AddWithCarry,
            0x3 => Add,
            0x4 => NotY,
            0x5 => NegY,
            0x6 => SubWithBorrow,
            0x7 => Sub,
            0x8 => DecY,
            0x9 => RevSub,
            0xa => RevSubWithBorrow,
            0xb => NotX,
            0xc => And,
            0xd => Or,
            0xe => Xor,
            _ => Abs,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// MAC 累加方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulate {
    /// MR = X * Y
    Replace,
    /// MR = MR + X * Y
    Add,
    /// MR = MR - X * Y
    Sub,
}

/// 乘法操作数的符号格式，第一个字母为 X，第二个为 Y
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signedness {
    /// 有符号 × 有符号，并做无偏舍入
    Rnd,
    Ss,
    Su,
    Us,
    Uu,
}

impl Signedness {
    pub fn x_signed(self) -> bool {
        matches!(self, Signedness::Rnd | Signedness::Ss | Signedness::Su)
    }

    pub fn y_signed(self) -> bool {
        matches!(self, Signedness::Rnd | Signedness::Ss | Signedness::Us)
    }
}

/// MAC 功能（AMF 0x00..=0x0f）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacFunc {
    Nop,
    Multiply { acc: Accumulate, sign: Signedness },
}

impl MacFunc {
    pub fn from_bits(bits: u8) -> Self {
        use Accumulate as A;
        use Signedness as S;
        let (acc, sign) = match bits & 0xf {
            0x0 => return MacFunc::Nop,
            0x1 => (A::Replace, S::Rnd),
            0x2 => (A::Add, S::Rnd),
            0x3 => (A::Sub, S::Rnd),
            0x4 => (A::Replace, S::Ss),
            0x5 => (A::Replace, S::Su),
            0x6 => (A::Replace, S::Us),
            0x7 => (A::Replace, S::Uu),
            0x8 => (A::Add, S::Ss),
            0x9 => (A::Add, S::Su),
            0xa => (A::Add, S::Us),
            0xb => (A::Add, S::Uu),
            0xc => (A::Sub, S::Ss),
            0xd => (A::Sub, S::Su),
            0xe => (A::Sub, S::Us),
            _ => (A::Sub, S::Uu),
        };
        MacFunc::Multiply { acc, sign }
    }

    pub fn bits(self) -> u8 {
        use Accumulate as A;
        use Signedness as S;
        match self {
            MacFunc::Nop => 0x0,
            MacFunc::Multiply { acc, sign: S::Rnd } => match acc {
                A::Replace => 0x1,
                A::Add => 0x2,
                A::Sub => 0x3,
            },
            MacFunc::Multiply { acc, sign } => {
                let base = match acc {
                    A::Replace => 0x4,
                    A::Add => 0x8,
                    A::Sub => 0xc,
                };
                base + match sign {
                    S::Ss | S::Rnd => 0,
                    S::Su => 1,
                    S::Us => 2,
                    S::Uu => 3,
                }
            }
        }
    }
}

/// 运算单元选择：AMF 最高位为 1 时是 ALU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeFunc {
    Alu(AluFunc),
    Mac(MacFunc),
}

impl ComputeFunc {
    pub fn from_amf(amf: u8) -> Self {
        if amf & 0x10 != 0 {
            ComputeFunc::Alu(AluFunc::from_bits(amf))
        } else {
            ComputeFunc::Mac(MacFunc::from_bits(amf))
        }
    }

    pub fn amf(self) -> u8 {
        match self {
            ComputeFunc::Alu(f) => 0x10 | f.bits(),
            ComputeFunc::Mac(f) => f.bits(),
        }
    }
}

/// ALU/MAC 操作
///
/// `xop`/`yop` 为操作数选择码，具体寄存器由所用运算单元决定；
/// `feedback` 为真时结果写入 AF/MF，否则写入 AR/MR。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeOp {
    pub func: ComputeFunc,
    pub xop: u8,
    pub yop: u8,
    pub feedback: bool,
}

/// 移位功能（SF 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftFunc {
    LshiftHi,
    LshiftHiOr,
    LshiftLo,
    LshiftLoOr,
    AshiftHi,
    AshiftHiOr,
    AshiftLo,
    AshiftLoOr,
    NormHi,
    NormHiOr,
    NormLo,
    NormLoOr,
    ExpHi,
    ExpHix,
    ExpLo,
    ExpAdj,
}

impl ShiftFunc {
    pub fn from_bits(bits: u8) -> Self {
        use ShiftFunc::*;
        match bits & 0xf {
            0x0 => LshiftHi,
            0x1 => LshiftHiOr,
            0x2 => LshiftLo,
            0x3 => LshiftLoOr,
            0x4 => AshiftHi,
            0x5 => AshiftHiOr,
            0x6 => AshiftLo,
            0x7 => AshiftLoOr,
            0x8 => NormHi,
            0x9 => NormHiOr,
            0xa => NormLo,
            0xb => NormLoOr,
            0xc => ExpHi,
            0xd => ExpHix,
            0xe => ExpLo,
            _ => ExpAdj,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// 结果是否与 SR 原值相或
    pub fn is_or(self) -> bool {
        matches!(
            self,
            ShiftFunc::LshiftHiOr | ShiftFunc::LshiftLoOr | ShiftFunc::AshiftHiOr
                | ShiftFunc::AshiftLoOr | ShiftFunc::NormHiOr | ShiftFunc::NormLoOr
        )
    }
}

/// 移位操作：功能 + X 操作数选择码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftOp {
    pub func: ShiftFunc,
    pub xop: u8,
}

/// DAG 寄存器选择
///
/// `i`/`m` 为组内编号 0..=3；DAG2 对应 I4..I7 / M4..M7。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DagRef {
    pub dag2: bool,
    pub i: u8,
    pub m: u8,
}

impl DagRef {
    pub const fn dag1(i: u8, m: u8) -> Self {
        Self { dag2: false, i: i & 3, m: m & 3 }
    }

    pub const fn dag2(i: u8, m: u8) -> Self {
        Self { dag2: true, i: i & 3, m: m & 3 }
    }

    /// 全局 I 寄存器编号 0..=7
    #[inline]
    pub fn index_reg(self) -> usize {
        self.i as usize + if self.dag2 { 4 } else { 0 }
    }

    /// 全局 M 寄存器编号 0..=7
    #[inline]
    pub fn modify_reg(self) -> usize {
        self.m as usize + if self.dag2 { 4 } else { 0 }
    }
}

/// 分组寄存器引用：2-bit 组号 + 4-bit 组内编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegRef {
    pub group: u8,
    pub index: u8,
}

impl RegRef {
    pub const fn new(group: u8, index: u8) -> Self {
        Self { group: group & 3, index: index & 0xf }
    }

    /// 组 0 数据寄存器
    pub const fn data(index: u8) -> Self {
        Self::new(0, index)
    }
}

/// 访存空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemSpace {
    /// 程序存储器（24-bit 字，经 DAG2）
    Program,
    /// 数据存储器（16-bit 字）
    Data,
}

/// 栈控制位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackOps {
    pub pop_pc: bool,
    pub pop_loop: bool,
    pub pop_cntr: bool,
    pub push_status: bool,
    pub pop_status: bool,
}

/// ADSP-21xx 指令的语义化表示
///
/// 解码阶段一次性提取全部字段，执行阶段只按变体分派。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DspInstr {
    Nop,
    /// IDLE：停机等待中断
    Idle,
    /// 条件修改 FLAG_OUT：`reset` 清零，`toggle` 取反（先清后翻）
    FlagOut { cond: Condition, reset: bool, toggle: bool },
    /// 按 FLAG_IN 引脚跳转/调用
    JumpOnFlagIn { target: u16, when_set: bool, call: bool },
    StackControl(StackOps),
    /// MV 置位时把 MR 饱和到 32-bit 有符号范围
    SaturateMr,
    /// 除法首步
    Divs { xop: u8, yop: u8 },
    /// 除法迭代步
    Divq { xop: u8 },
    /// 只做 DAG 后修改，不访存
    Modify { dag: DagRef },
    /// 条件返回；`from_interrupt` 为 RTI（同时弹出状态栈）
    Return { cond: Condition, from_interrupt: bool },
    /// 经 I4..I7 间接跳转/调用，`ireg` 为全局编号
    JumpIndirect { cond: Condition, ireg: u8, call: bool },
    /// 模式控制：`mask` 中的 MSTAT 位被设为 `value` 的对应位
    ModeControl { mask: u16, value: u16 },
    /// 通用寄存器传送
    RegMove { dst: RegRef, src: RegRef },
    /// 条件移位（移位量取自 SE）
    Shift { cond: Condition, op: ShiftOp },
    /// 立即数移位
    ShiftImm { op: ShiftOp, count: i8 },
    /// 移位 + 组 0 寄存器传送
    ShiftMove { op: ShiftOp, dst: u8, src: u8 },
    /// 移位 + 访存
    ShiftMem { op: ShiftOp, space: MemSpace, dag: DagRef, reg: u8, write: bool },
    /// 硬件循环：`end` 为循环末条指令地址，`term` 为继续条件
    DoUntil { end: u16, term: Condition },
    Jump { cond: Condition, target: u16 },
    Call { cond: Condition, target: u16 },
    /// 条件 ALU/MAC
    Compute { cond: Condition, op: ComputeOp },
    /// ALU/MAC + 组 0 寄存器传送
    ComputeMove { op: ComputeOp, dst: u8, src: u8 },
    /// ALU/MAC + 访存
    ComputeMem { op: ComputeOp, space: MemSpace, dag: DagRef, reg: u8, write: bool },
    /// 立即数装载
    LoadReg { dst: RegRef, value: u16 },
    /// 数据存储器直接寻址读写
    DmDirect { reg: RegRef, addr: u16, write: bool },
    /// 立即数经 DAG 写入数据存储器
    DmWriteImm { dag: DagRef, value: u16 },
    /// ALU/MAC（结果写 AR/MR）+ 同时读 DM（DAG1）与 PM（DAG2）
    ///
    /// `dm_dst` 选 AX0/AX1/MX0/MX1，`pm_dst` 选 AY0/AY1/MY0/MY1。
    DualRead { op: ComputeOp, dm_dst: u8, pm_dst: u8, dm: DagRef, pm: DagRef },
    /// 保留编码，按空操作执行
    Reserved { raw: u32 },
}

impl DspInstr {
    /// 指令助记名（调试与日志）
    pub fn name(&self) -> &'static str {
        match self {
            DspInstr::Nop => "NOP",
            DspInstr::Idle => "IDLE",
            DspInstr::FlagOut { .. } => "FLAG_OUT",
            DspInstr::JumpOnFlagIn { call: true, .. } => "CALL FLAG_IN",
            DspInstr::JumpOnFlagIn { .. } => "JUMP FLAG_IN",
            DspInstr::StackControl(_) => "STACK",
            DspInstr::SaturateMr => "SAT MR",
            DspInstr::Divs { .. } => "DIVS",
            DspInstr::Divq { .. } => "DIVQ",
            DspInstr::Modify { .. } => "MODIFY",
            DspInstr::Return { from_interrupt: true, .. } => "RTI",
            DspInstr::Return { .. } => "RTS",
            DspInstr::JumpIndirect { call: true, .. } => "CALL (I)",
            DspInstr::JumpIndirect { .. } => "JUMP (I)",
            DspInstr::ModeControl { .. } => "ENA/DIS",
            DspInstr::RegMove { .. } => "MOVE",
            DspInstr::Shift { .. } => "SHIFT",
            DspInstr::ShiftImm { .. } => "SHIFT IMM",
            DspInstr::ShiftMove { .. } => "SHIFT+MOVE",
            DspInstr::ShiftMem { .. } => "SHIFT+MEM",
            DspInstr::DoUntil { .. } => "DO UNTIL",
            DspInstr::Jump { .. } => "JUMP",
            DspInstr::Call { .. } => "CALL",
            DspInstr::Compute { .. } => "COMPUTE",
            DspInstr::ComputeMove { .. } => "COMPUTE+MOVE",
            DspInstr::ComputeMem { .. } => "COMPUTE+MEM",
            DspInstr::LoadReg { .. } => "LOAD",
            DspInstr::DmDirect { write: true, .. } => "DM WRITE",
            DspInstr::DmDirect { .. } => "DM READ",
            DspInstr::DmWriteImm { .. } => "DM WRITE IMM",
            DspInstr::DualRead { .. } => "DUAL READ",
            DspInstr::Reserved { .. } => "RESERVED",
        }
    }
}

/// 已解码的指令
///
/// 包含原始编码与解码后的语义信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstr {
    /// 原始 24-bit 指令编码
    pub raw: u32,
    /// 解码后的语义表示
    pub instr: DspInstr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_func_bits_roundtrip_all_codes() {
        for bits in 0..16u8 {
            assert_eq!(MacFunc::from_bits(bits).bits(), bits);
            assert_eq!(AluFunc::from_bits(bits).bits(), bits);
            assert_eq!(ShiftFunc::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn test_compute_func_split() {
        assert_eq!(ComputeFunc::from_amf(0x13), ComputeFunc::Alu(AluFunc::Add));
        assert_eq!(ComputeFunc::from_amf(0x00), ComputeFunc::Mac(MacFunc::Nop));
        assert_eq!(ComputeFunc::from_amf(0x13).amf(), 0x13);
    }

    #[test]
    fn test_dag_ref_global_index() {
        let d = DagRef::dag2(3, 1);
        assert_eq!(d.index_reg(), 7);
        assert_eq!(d.modify_reg(), 5);
        assert_eq!(DagRef::dag1(2, 0).index_reg(), 2);
    }

    #[test]
    fn test_condition_names() {
        assert_eq!(Condition::ALWAYS.to_string(), "TRUE");
        assert!(Condition::NOT_CE.is_counter());
        assert_eq!(Condition::from_bits(0x14), Condition::LT);
    }
}
