//! adsp21xx_sim: ADSP-21xx 定点 DSP 指令集仿真库
//!
//! 按周期步进的解释执行核心：24-bit 指令经表驱动解码后分派到 ALU、MAC、
//! 移位器、地址发生器和程序控制单元，每条指令计 1 个周期。
//! 宿主通过 `DspMemory` 提供存储器，通过中断线和回调驱动外部事件。
//!
//! # 模块结构
//!
//! - `isa`: 指令解码、查找表与编码辅助
//! - `cpu`: 执行核心、寄存器文件与中断控制器
//! - `memory`: 存储器端口抽象与线性实现
//! - `sim_env`: 仿真环境（配置、ELF/镜像装载、运行循环）

pub mod cpu;
pub mod isa;
pub mod memory;
pub mod sim_env;
