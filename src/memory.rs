//! 内存抽象层
//!
//! 本模块定义了执行核心访问宿主存储器的接口 `DspMemory`，
//! 以及用于功能验证的简单线性实现 `FlatMemory`。
//!
//! 核心把字地址换算成宿主字节地址后再调用接口：
//! - 程序存储器：每个 24-bit 字占 4 字节，字节地址 = `(addr & 0x3fff) << 2`
//! - 数据存储器：每个 16-bit 字占 2 字节，字节地址 = `addr << 1`

use thiserror::Error;

use crate::isa::MemSpace;
use crate::isa::tables::ADDR_SPACE;

/// 宿主侧存储器访问错误
///
/// 只在装载镜像、调试读写等宿主操作中出现，执行核心的访问不会失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemError {
    /// 字节范围越界
    #[error("out-of-range {space:?} access at byte 0x{addr:05x} (len {len}, size 0x{size:05x})")]
    OutOfRange { space: MemSpace, addr: u32, len: usize, size: usize },
}

pub type MemResult<T> = Result<T, MemError>;

/// 执行核心使用的存储器端口，由宿主实现
///
/// 所有地址都是宿主字节地址。读操作取 `&mut self`，以便宿主在读时触发外设副作用。
pub trait DspMemory {
    /// 取指：读程序存储器并截断到 24 位
    fn read_opcode(&mut self, addr: u32) -> u32 {
        self.read_program(addr) & 0xff_ffff
    }

    /// 读程序存储器中的 32-bit 单元
    fn read_program(&mut self, addr: u32) -> u32;

    /// 写程序存储器中的 32-bit 单元
    fn write_program(&mut self, addr: u32, value: u32);

    /// 读数据存储器中的 16-bit 字
    fn read_data(&mut self, addr: u32) -> u16;

    /// 写数据存储器中的 16-bit 字
    fn write_data(&mut self, addr: u32, value: u16);
}

/// 简单线性内存实现
///
/// 程序空间与数据空间各为完整的 16K 字，小端序存放。
/// 核心访问按空间大小回绕；宿主辅助方法做越界检查。
#[derive(Clone)]
pub struct FlatMemory {
    program: Vec<u8>,
    data: Vec<u8>,
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatMemory {
    /// 程序空间字节数
    pub const PROGRAM_BYTES: usize = ADDR_SPACE * 4;
    /// 数据空间字节数
    pub const DATA_BYTES: usize = ADDR_SPACE * 2;

    /// 创建清零的存储器
    ///
    /// # 示例
    ///
    /// ```
    /// use adsp21xx_sim::memory::FlatMemory;
    ///
    /// let mut mem = FlatMemory::new();
    /// mem.load_program(0, &[0x41_2344]).unwrap();
    /// assert_eq!(mem.program_word(0).unwrap(), 0x41_2344);
    /// ```
    pub fn new() -> Self {
        Self { program: vec![0; Self::PROGRAM_BYTES], data: vec![0; Self::DATA_BYTES] }
    }

    fn region(&self, space: MemSpace) -> &[u8] {
        match space {
            MemSpace::Program => &self.program,
            MemSpace::Data => &self.data,
        }
    }

    fn region_mut(&mut self, space: MemSpace) -> &mut [u8] {
        match space {
            MemSpace::Program => &mut self.program,
            MemSpace::Data => &mut self.data,
        }
    }

    fn bounds_check(&self, space: MemSpace, addr: u32, len: usize) -> MemResult<usize> {
        let size = self.region(space).len();
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= size => Ok(start),
            _ => Err(MemError::OutOfRange { space, addr, len, size }),
        }
    }

    /// 批量写入原始字节
    pub fn write_bytes(&mut self, space: MemSpace, addr: u32, bytes: &[u8]) -> MemResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let start = self.bounds_check(space, addr, bytes.len())?;
        self.region_mut(space)[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// 把 `[addr, addr + len)` 填为 `value`，先检查范围再写入
    pub fn fill_bytes(
        &mut self,
        space: MemSpace,
        addr: u32,
        len: usize,
        value: u8,
    ) -> MemResult<()> {
        if len == 0 {
            return Ok(());
        }
        let start = self.bounds_check(space, addr, len)?;
        self.region_mut(space)[start..start + len].fill(value);
        Ok(())
    }

    /// 批量读取原始字节
    pub fn read_bytes(&self, space: MemSpace, addr: u32, len: usize) -> MemResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let start = self.bounds_check(space, addr, len)?;
        Ok(self.region(space)[start..start + len].to_vec())
    }

    /// 从字地址 `start` 起写入程序字（取低 24 位）
    pub fn load_program(&mut self, start: u16, words: &[u32]) -> MemResult<()> {
        let addr = (start as u32) << 2;
        self.bounds_check(MemSpace::Program, addr, words.len() * 4)?;
        for (n, word) in words.iter().enumerate() {
            let at = addr as usize + n * 4;
            self.program[at..at + 4].copy_from_slice(&(word & 0xff_ffff).to_le_bytes());
        }
        Ok(())
    }

    /// 从字地址 `start` 起写入数据字
    pub fn load_data(&mut self, start: u16, words: &[u16]) -> MemResult<()> {
        let addr = (start as u32) << 1;
        self.bounds_check(MemSpace::Data, addr, words.len() * 2)?;
        for (n, word) in words.iter().enumerate() {
            let at = addr as usize + n * 2;
            self.data[at..at + 2].copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    /// 按字地址读程序字
    pub fn program_word(&self, addr: u16) -> MemResult<u32> {
        let at = self.bounds_check(MemSpace::Program, (addr as u32) << 2, 4)?;
        let b = &self.program[at..at + 4];
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// 按字地址读数据字
    pub fn data_word(&self, addr: u16) -> MemResult<u16> {
        let at = self.bounds_check(MemSpace::Data, (addr as u32) << 1, 2)?;
        Ok(u16::from_le_bytes([self.data[at], self.data[at + 1]]))
    }

    /// 按字地址写数据字
    pub fn set_data_word(&mut self, addr: u16, value: u16) -> MemResult<()> {
        self.load_data(addr, &[value])
    }

    #[inline]
    fn program_index(addr: u32) -> usize {
        (addr as usize & (Self::PROGRAM_BYTES - 1)) & !3
    }

    #[inline]
    fn data_index(addr: u32) -> usize {
        (addr as usize & (Self::DATA_BYTES - 1)) & !1
    }
}

impl DspMemory for FlatMemory {
    fn read_program(&mut self, addr: u32) -> u32 {
        let at = Self::program_index(addr);
        let b = &self.program[at..at + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn write_program(&mut self, addr: u32, value: u32) {
        let at = Self::program_index(addr);
        self.program[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn read_data(&mut self, addr: u32) -> u16 {
        let at = Self::data_index(addr);
        u16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    fn write_data(&mut self, addr: u32, value: u16) {
        let at = Self::data_index(addr);
        self.data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }
}

impl std::fmt::Debug for FlatMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatMemory")
            .field("program_bytes", &self.program.len())
            .field("data_bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_memory_word_layout() {
        let mut mem = FlatMemory::new();

        mem.load_program(1, &[0x12_3456]).unwrap();
        // 程序字小端存放在 4 字节单元中
        assert_eq!(mem.read_bytes(MemSpace::Program, 4, 4).unwrap(), vec![0x56, 0x34, 0x12, 0x00]);
        assert_eq!(mem.read_opcode(4), 0x12_3456);

        mem.load_data(3, &[0xbeef]).unwrap();
        assert_eq!(mem.read_data(6), 0xbeef);
        assert_eq!(mem.read_bytes(MemSpace::Data, 6, 2).unwrap(), vec![0xef, 0xbe]);
    }

    #[test]
    fn test_opcode_fetch_masks_to_24_bits() {
        let mut mem = FlatMemory::new();
        mem.write_program(0, 0xff12_3456);
        assert_eq!(mem.read_program(0), 0xff12_3456);
        assert_eq!(mem.read_opcode(0), 0x12_3456);
    }

    #[test]
    fn test_core_access_wraps() {
        let mut mem = FlatMemory::new();
        mem.write_data(0, 0x1111);
        assert_eq!(mem.read_data(FlatMemory::DATA_BYTES as u32), 0x1111);
    }

    #[test]
    fn test_host_helpers_check_bounds() {
        let mut mem = FlatMemory::new();
        let err = mem.load_program(0x3fff, &[1, 2]).unwrap_err();
        assert!(matches!(err, MemError::OutOfRange { space: MemSpace::Program, .. }));
        assert!(mem.load_data(0x3fff, &[7]).is_ok());
    }

    #[test]
    fn test_fill_bytes_checks_range_first() {
        let mut mem = FlatMemory::new();
        mem.load_data(0x10, &[0xffff, 0xffff]).unwrap();
        mem.fill_bytes(MemSpace::Data, 0x10 << 1, 2, 0).unwrap();
        assert_eq!(mem.data_word(0x10).unwrap(), 0);
        assert_eq!(mem.data_word(0x11).unwrap(), 0xffff);

        let err = mem.fill_bytes(MemSpace::Data, 0x20, usize::MAX, 0).unwrap_err();
        assert!(matches!(err, MemError::OutOfRange { space: MemSpace::Data, addr: 0x20, .. }));
        assert_eq!(mem.data_word(0x10).unwrap(), 0);
    }
}
