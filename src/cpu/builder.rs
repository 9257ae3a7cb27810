//! DSP 核心配置器
//!
//! 提供统一的接口来选择芯片型号并注入宿主钩子（中断应答、串口）。
//!
//! # 示例
//!
//! ```
//! use adsp21xx_sim::cpu::{ChipVariant, CpuBuilder};
//!
//! let cpu = CpuBuilder::new()
//!     .with_variant(ChipVariant::Adsp2105)
//!     .with_irq_callback(|line: usize| if line == 3 { Some(0x0200) } else { None })
//!     .build()
//!     .expect("查找表构建成功");
//! assert_eq!(cpu.pc(), 0x0000);
//! ```

use super::interrupt::{ChipVariant, IrqCallback, SerialPort};
use super::Adsp21xx;
use crate::isa::{TableError, Tables};

/// DSP 核心构建器
///
/// 统一配置：
/// - 芯片型号（中断优先级、向量、复位地址、组 3 寄存器）
/// - 中断应答策略（可覆盖向量地址）
/// - 串口外设（仅 ADSP-2105 使用）
#[derive(Default)]
pub struct CpuBuilder {
    variant: ChipVariant,
    irq_callback: Option<Box<dyn IrqCallback>>,
    serial: Option<Box<dyn SerialPort>>,
}

impl CpuBuilder {
    /// 创建新的构建器，默认型号为 ADSP-2100
    pub fn new() -> Self {
        Self::default()
    }

    /// 选择芯片型号
    pub fn with_variant(mut self, variant: ChipVariant) -> Self {
        self.variant = variant;
        self
    }

    /// 按名称选择芯片型号，未知名称回退到 ADSP-2100
    pub fn with_chip_name(mut self, name: &str) -> Self {
        self.variant = ChipVariant::from_name(name);
        self
    }

    /// 注入中断应答回调
    pub fn with_irq_callback(mut self, callback: impl IrqCallback + 'static) -> Self {
        self.irq_callback = Some(Box::new(callback));
        self
    }

    /// 注入串口外设
    pub fn with_serial_port(mut self, serial: impl SerialPort + 'static) -> Self {
        self.serial = Some(Box::new(serial));
        self
    }

    /// 构建并复位 DSP 核心
    ///
    /// 返回 `Err` 如果共享查找表无法分配
    pub fn build(self) -> Result<Adsp21xx, TableError> {
        let tables = Tables::get()?;
        Ok(Adsp21xx::with_hooks(self.variant, tables, self.irq_callback, self.serial))
    }
}

impl std::fmt::Debug for CpuBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuBuilder")
            .field("variant", &self.variant)
            .field("irq_callback", &self.irq_callback.is_some())
            .field("serial", &self.serial.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_2100() {
        let cpu = CpuBuilder::new().build().unwrap();
        assert_eq!(cpu.variant(), ChipVariant::Adsp2100);
        assert_eq!(cpu.pc(), 0x0004);
    }

    #[test]
    fn test_builder_chip_name() {
        let cpu = CpuBuilder::new().with_chip_name("adsp-2105").build().unwrap();
        assert_eq!(cpu.variant(), ChipVariant::Adsp2105);
        assert_eq!(cpu.pc(), 0x0000);
    }
}
