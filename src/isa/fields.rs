//! 指令字段提取辅助函数
//!
//! 提供从 24-bit 指令字中提取各字段的工具函数

/// 主操作码 [23:16]，用于 256 路分派
#[inline]
pub fn primary(raw: u32) -> u8 {
    ((raw >> 16) & 0xff) as u8
}

/// 条件码 COND [3:0]
#[inline]
pub fn cond(raw: u32) -> u8 {
    (raw & 0xf) as u8
}

/// ALU/MAC 功能码 AMF [17:13]
#[inline]
pub fn amf(raw: u32) -> u8 {
    ((raw >> 13) & 0x1f) as u8
}

/// Y 操作数选择 YOP [12:11]
#[inline]
pub fn yop(raw: u32) -> u8 {
    ((raw >> 11) & 0x3) as u8
}

/// X 操作数选择 XOP [10:8]
#[inline]
pub fn xop(raw: u32) -> u8 {
    ((raw >> 8) & 0x7) as u8
}

/// 结果寄存器选择 Z [18]：0 = AR/MR，1 = AF/MF
#[inline]
pub fn z(raw: u32) -> bool {
    raw & 0x04_0000 != 0
}

/// 目的数据寄存器 DREG [7:4]
#[inline]
pub fn dreg(raw: u32) -> u8 {
    ((raw >> 4) & 0xf) as u8
}

/// 源数据寄存器 / 立即数形式的目的寄存器 [3:0]
#[inline]
pub fn sreg(raw: u32) -> u8 {
    (raw & 0xf) as u8
}

/// DAG 索引寄存器 I [3:2]（组内编号）
#[inline]
pub fn ireg(raw: u32) -> u8 {
    ((raw >> 2) & 0x3) as u8
}

/// DAG 修改寄存器 M [1:0]（组内编号）
#[inline]
pub fn mreg(raw: u32) -> u8 {
    (raw & 0x3) as u8
}

/// 14-bit 地址 [17:4]
#[inline]
pub fn addr14(raw: u32) -> u16 {
    ((raw >> 4) & 0x3fff) as u16
}

/// 16-bit 立即数 [19:4]
#[inline]
pub fn data16(raw: u32) -> u16 {
    ((raw >> 4) & 0xffff) as u16
}

/// 14-bit 有符号立即数 [17:4]，符号扩展到 16 位
#[inline]
pub fn imm14(raw: u32) -> u16 {
    ((((raw << 14) as i32) >> 18) & 0xffff) as u16
}

/// 寄存器组 RGP [19:18]
#[inline]
pub fn group(raw: u32) -> u8 {
    ((raw >> 18) & 0x3) as u8
}

/// 移位功能码 SF [14:11]
#[inline]
pub fn shift_func(raw: u32) -> u8 {
    ((raw >> 11) & 0xf) as u8
}

/// 移位立即数 [7:0]，有符号
#[inline]
pub fn shift_imm(raw: u32) -> i8 {
    (raw & 0xff) as u8 as i8
}

/// 存储器访问方向位 [15]（移位类指令）
#[inline]
pub fn shift_write(raw: u32) -> bool {
    raw & 0x8000 != 0
}

/// 按 FLAG_IN 跳转的目标地址：低 12 位在 [15:4]，高 2 位在 [3:2]
#[inline]
pub fn flag_jump_addr(raw: u32) -> u16 {
    (((raw >> 4) & 0x0fff) | ((raw << 10) & 0x3000)) as u16
}

// ========== 主操作码常量 ==========
pub const OP_NOP: u8 = 0x00;
pub const OP_FLAG_IDLE: u8 = 0x02;
pub const OP_FLAG_JUMP: u8 = 0x03;
pub const OP_STACK: u8 = 0x04;
pub const OP_SAT_MR: u8 = 0x05;
pub const OP_DIVS: u8 = 0x06;
pub const OP_DIVQ: u8 = 0x07;
pub const OP_MODIFY: u8 = 0x09;
pub const OP_RETURN: u8 = 0x0a;
pub const OP_JUMP_IND: u8 = 0x0b;
pub const OP_MODE: u8 = 0x0c;
pub const OP_REG_MOVE: u8 = 0x0d;
pub const OP_SHIFT_COND: u8 = 0x0e;
pub const OP_SHIFT_IMM: u8 = 0x0f;
pub const OP_SHIFT_MOVE: u8 = 0x10;
pub const OP_SHIFT_PM: u8 = 0x11;
pub const OP_SHIFT_DM1: u8 = 0x12;
pub const OP_SHIFT_DM2: u8 = 0x13;
pub const OP_DO_UNTIL: u8 = 0x14;
pub const OP_JUMP: u8 = 0x18;
pub const OP_CALL: u8 = 0x1c;
pub const OP_COMPUTE: u8 = 0x20;
pub const OP_COMPUTE_MOVE: u8 = 0x28;
pub const OP_LOAD_NONDATA: u8 = 0x30;
pub const OP_LOAD_DATA: u8 = 0x40;
pub const OP_COMPUTE_PM: u8 = 0x50;
pub const OP_COMPUTE_DM: u8 = 0x60;
pub const OP_DM_DIRECT: u8 = 0x80;
pub const OP_DM_IMM: u8 = 0xa0;
pub const OP_DUAL_READ: u8 = 0xc0;
