//! ADSP-21xx ISA 抽象与解码框架
//!
//! 本模块提供表驱动的指令解码系统：
//! - `DspInstr`: 指令的语义表示
//! - `InstrDef`: 统一的指令定义，同时用于解码和冲突检测
//! - `Decoder`: 由定义表构建的 256 路主操作码分派
//! - `Tables`: 执行核心共享的预计算查找表
//! - `encode`: 把语义表示编回指令字

mod decoder;
pub mod encode;
mod fields;
mod instr;
mod instr_def;
pub mod tables;

pub use decoder::{ConflictInfo, Decoder};
pub use fields::*;
pub use instr::{
    Accumulate, AluFunc, ComputeFunc, ComputeOp, Condition, DagRef, DecodedInstr, DspInstr,
    MacFunc, MemSpace, RegRef, ShiftFunc, ShiftOp, Signedness, StackOps,
};
pub use instr_def::{InstrDef, DSP_INSTRS};
pub use tables::{TableError, Tables};

/// 便捷函数：使用标准解码器解码指令
pub fn decode(raw: u32) -> DecodedInstr {
    Decoder::standard().decode(raw)
}
