//! 预计算查找表
//!
//! 执行核心依赖三张只读表，进程内只构建一次，所有核心实例共享：
//! - 位反转表：14-bit 地址的位反序，用于 DAG1 的位反转寻址
//! - 掩码表：由循环缓冲长度 L 得到索引中固定不变的高位掩码
//! - 条件表：`ASTAT` 标志字节 × 16 种条件码 → 布尔结果
//!
//! 表通过 [`Tables::get`] 惰性初始化；分配失败时返回 [`TableError`]，
//! 宿主必须把它视为致命错误。

use std::sync::OnceLock;

use thiserror::Error;

/// 14-bit 地址空间的大小
pub const ADDR_SPACE: usize = 0x4000;

/// 条件表大小：256 种标志组合 × 16 种条件码
pub const CONDITION_TABLE_SIZE: usize = 0x1000;

// ASTAT 标志位
pub const AZ: u16 = 0x01;
pub const AN: u16 = 0x02;
pub const AV: u16 = 0x04;
pub const AC: u16 = 0x08;
pub const AS: u16 = 0x10;
pub const AQ: u16 = 0x20;
pub const MV: u16 = 0x40;
pub const SS: u16 = 0x80;

static TABLES: OnceLock<Tables> = OnceLock::new();

/// 查找表构建失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TableError {
    /// 无法为某张表分配内存
    #[error("failed to allocate {name} lookup table ({entries} entries)")]
    Alloc { name: &'static str, entries: usize },
}

/// 三张预计算表
pub struct Tables {
    reverse: Vec<u16>,
    mask: Vec<u16>,
    condition: Vec<bool>,
}

impl Tables {
    /// 获取进程级共享表，首次调用时构建
    ///
    /// 重复调用是幂等的，只返回已存在的表。
    pub fn get() -> Result<&'static Tables, TableError> {
        if let Some(tables) = TABLES.get() {
            return Ok(tables);
        }
        let built = Self::build()?;
        Ok(TABLES.get_or_init(|| built))
    }

    /// 构建一份独立的表（不经过全局缓存）
    pub fn build() -> Result<Self, TableError> {
        let mut reverse = alloc_table("bit-reverse", ADDR_SPACE)?;
        let mut mask = alloc_table("mask", ADDR_SPACE)?;
        let mut condition = alloc_table("condition", CONDITION_TABLE_SIZE)?;

        reverse.extend((0..ADDR_SPACE as u16).map(bit_reverse14));
        mask.extend((0..ADDR_SPACE as u16).map(length_mask));
        condition.extend((0..CONDITION_TABLE_SIZE).map(|index| {
            condition_from_flags((index & 0xff) as u8, (index >> 8) as u8)
        }));

        Ok(Self { reverse, mask, condition })
    }

    /// 14-bit 位反转
    #[inline]
    pub fn reverse(&self, index: u16) -> u16 {
        self.reverse[(index & 0x3fff) as usize]
    }

    /// 长度 L 对应的基址掩码
    #[inline]
    pub fn mask(&self, length: u16) -> u16 {
        self.mask[(length & 0x3fff) as usize]
    }

    /// 以 `flags | (code << 8)` 为键的条件查表
    #[inline]
    pub fn condition(&self, flags: u8, code: u8) -> bool {
        self.condition[flags as usize | ((code as usize & 0xf) << 8)]
    }
}

impl std::fmt::Debug for Tables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tables")
            .field("reverse", &self.reverse.len())
            .field("mask", &self.mask.len())
            .field("condition", &self.condition.len())
            .finish()
    }
}

fn alloc_table<T>(name: &'static str, entries: usize) -> Result<Vec<T>, TableError> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(entries)
        .map_err(|_| TableError::Alloc { name, entries })?;
    Ok(table)
}

/// 位 0 与位 13 互换，位 1 与位 12 互换……
pub fn bit_reverse14(index: u16) -> u16 {
    (index & 0x3fff).reverse_bits() >> 2
}

/// 长度为 `length` 的循环缓冲在索引寄存器中保持不变的高位
///
/// 缓冲按不小于 `length` 的 2 的幂对齐，因此掩码是该幂次以上的 14-bit 位。
/// 长度为 0 或 1 时所有位都属于基址。
pub fn length_mask(length: u16) -> u16 {
    const THRESHOLDS: [(u16, u16); 13] = [
        (0x2000, 0x0000),
        (0x1000, 0x2000),
        (0x0800, 0x3000),
        (0x0400, 0x3800),
        (0x0200, 0x3c00),
        (0x0100, 0x3e00),
        (0x0080, 0x3f00),
        (0x0040, 0x3f80),
        (0x0020, 0x3fc0),
        (0x0010, 0x3fe0),
        (0x0008, 0x3ff0),
        (0x0004, 0x3ff8),
        (0x0002, 0x3ffc),
    ];

    let length = length & 0x3fff;
    for (threshold, mask) in THRESHOLDS {
        if length > threshold {
            return mask;
        }
    }
    if length > 0x0001 { 0x3ffe } else { 0x3fff }
}

/// 直接由标志位计算条件码结果（条件表的参考实现）
///
/// 条件码 14（计数器未到期）与计数器状态有关，不由标志决定，表中恒为 false。
pub fn condition_from_flags(flags: u8, code: u8) -> bool {
    let flags = flags as u16;
    let az = flags & AZ != 0;
    let an = flags & AN != 0;
    let av = flags & AV != 0;
    let ac = flags & AC != 0;
    let as_ = flags & AS != 0;
    let mv = flags & MV != 0;

    match code & 0xf {
        0x0 => az,
        0x1 => !az,
        0x2 => !((an ^ av) | az),
        0x3 => (an ^ av) | az,
        0x4 => an ^ av,
        0x5 => !(an ^ av),
        0x6 => av,
        0x7 => !av,
        0x8 => ac,
        0x9 => !ac,
        0xa => as_,
        0xb => !as_,
        0xc => mv,
        0xd => !mv,
        0xe => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tables_are_shared() {
        let a = Tables::get().unwrap();
        let b = Tables::get().unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_bit_reverse_endpoints() {
        let t = Tables::get().unwrap();
        assert_eq!(t.reverse(0x0001), 0x2000);
        assert_eq!(t.reverse(0x2000), 0x0001);
        assert_eq!(t.reverse(0x0002), 0x1000);
        assert_eq!(t.reverse(0x3fff), 0x3fff);
        assert_eq!(t.reverse(0x0000), 0x0000);
    }

    #[test]
    fn test_mask_thresholds() {
        assert_eq!(length_mask(0), 0x3fff);
        assert_eq!(length_mask(1), 0x3fff);
        assert_eq!(length_mask(2), 0x3ffe);
        assert_eq!(length_mask(3), 0x3ffc);
        assert_eq!(length_mask(4), 0x3ffc);
        assert_eq!(length_mask(5), 0x3ff8);
        assert_eq!(length_mask(0x2000), 0x2000);
        assert_eq!(length_mask(0x2001), 0x0000);
        assert_eq!(length_mask(0x3fff), 0x0000);
    }

    #[test]
    fn test_condition_spot_checks() {
        let t = Tables::get().unwrap();
        assert!(t.condition(AZ as u8, 0x0));
        assert!(!t.condition(0, 0x0));
        // LT 在溢出时取反
        assert!(t.condition(AN as u8, 0x4));
        assert!(!t.condition((AN | AV) as u8, 0x4));
        assert!(t.condition(AV as u8, 0x4));
        for flags in 0..=255u8 {
            assert!(t.condition(flags, 0xf));
            assert!(!t.condition(flags, 0xe));
        }
    }

    proptest! {
        #[test]
        fn prop_bit_reverse_involution(x in 0u16..0x4000) {
            let t = Tables::get().unwrap();
            prop_assert_eq!(t.reverse(t.reverse(x)), x);
        }

        #[test]
        fn prop_condition_table_agrees(flags in any::<u8>(), code in 0u8..16) {
            let t = Tables::get().unwrap();
            prop_assert_eq!(t.condition(flags, code), condition_from_flags(flags, code));
        }

        #[test]
        fn prop_mask_covers_length(length in 1u16..0x4000) {
            // 低位（~mask）必须能容纳 length - 1
            let low = !length_mask(length) & 0x3fff;
            prop_assert!(low >= length - 1);
            prop_assert_eq!(low & low.wrapping_add(1), 0);
        }
    }
}
