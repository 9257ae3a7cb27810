//! 解码器
//!
//! 由指令定义表构建 256 路主操作码分派表：每个主操作码预先记录可能匹配的定义，
//! 解码时只在该槽位内做 mask/match 比较。

use std::sync::OnceLock;

use super::instr::{DecodedInstr, DspInstr};
use super::instr_def::{InstrDef, DSP_INSTRS};

static STANDARD: OnceLock<Decoder> = OnceLock::new();

/// 两个定义的编码空间重叠
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictInfo {
    pub first: &'static str,
    pub second: &'static str,
    /// 同时匹配两者的示例编码
    pub example_raw: u32,
}

impl std::fmt::Display for ConflictInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "conflict: {} and {} (example: 0x{:06X})",
            self.first, self.second, self.example_raw
        )
    }
}

/// 表驱动解码器
pub struct Decoder {
    defs: &'static [InstrDef],
    /// 每个主操作码对应的候选定义下标
    slots: [Vec<u8>; 256],
}

impl Decoder {
    /// 由定义表构建分派表；同一槽位内按表中顺序匹配
    pub fn new(defs: &'static [InstrDef]) -> Self {
        let mut slots: [Vec<u8>; 256] = std::array::from_fn(|_| Vec::new());
        for (primary, slot) in slots.iter_mut().enumerate() {
            for (idx, def) in defs.iter().enumerate() {
                if def.covers_primary(primary as u8) {
                    slot.push(idx as u8);
                }
            }
        }
        Self { defs, slots }
    }

    /// 进程级共享的标准 ADSP-21xx 解码器
    pub fn standard() -> &'static Decoder {
        STANDARD.get_or_init(|| Decoder::new(DSP_INSTRS))
    }

    /// 解码一条 24-bit 指令，未定义编码解码为 `Reserved`
    pub fn decode(&self, raw: u32) -> DecodedInstr {
        let raw = raw & 0xff_ffff;
        let primary = (raw >> 16) as usize;
        for &idx in &self.slots[primary] {
            let def = &self.defs[idx as usize];
            if def.matches(raw) {
                return def.decode_instr(raw);
            }
        }
        DecodedInstr { raw, instr: DspInstr::Reserved { raw } }
    }

    /// 检测定义表内的编码重叠
    pub fn detect_conflicts(&self) -> Vec<ConflictInfo> {
        let mut conflicts = Vec::new();
        for (i, a) in self.defs.iter().enumerate() {
            for b in self.defs.iter().skip(i + 1) {
                if a.conflicts_with(b) {
                    conflicts.push(ConflictInfo {
                        first: a.name,
                        second: b.name,
                        example_raw: (a.match_val & a.mask) | (b.match_val & b.mask),
                    });
                }
            }
        }
        conflicts
    }

    /// 主操作码槽位中的定义名称（调试用）
    pub fn slot_names(&self, primary: u8) -> Vec<&'static str> {
        self.slots[primary as usize]
            .iter()
            .map(|&idx| self.defs[idx as usize].name)
            .collect()
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.slots.iter().filter(|s| !s.is_empty()).count();
        f.debug_struct("Decoder")
            .field("defs", &self.defs.len())
            .field("used_slots", &used)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static OVERLAPPING: &[InstrDef] = &[
        InstrDef::new("A", 0xff_0000, 0x01_0000, |_| DspInstr::Nop),
        InstrDef::new("B", 0xfe_0000, 0x00_0000, |_| DspInstr::Idle),
    ];

    #[test]
    fn test_standard_has_no_conflicts() {
        assert!(Decoder::standard().detect_conflicts().is_empty());
    }

    #[test]
    fn test_conflict_detected() {
        let decoder = Decoder::new(OVERLAPPING);
        let conflicts = decoder.detect_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].example_raw, 0x01_0000);
    }

    #[test]
    fn test_unassigned_primaries_are_reserved() {
        let decoder = Decoder::standard();
        assert!(decoder.slot_names(0x01).is_empty());
        assert!(decoder.slot_names(0x08).is_empty());
        assert_eq!(decoder.decode(0x08_1234).instr, DspInstr::Reserved { raw: 0x08_1234 });
    }

    #[test]
    fn test_every_other_primary_has_a_handler() {
        let decoder = Decoder::standard();
        for primary in 0..=255u8 {
            if primary == 0x01 || primary == 0x08 {
                continue;
            }
            assert!(!decoder.slot_names(primary).is_empty(), "primary 0x{primary:02x}");
        }
    }
}
