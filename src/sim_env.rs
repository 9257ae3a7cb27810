//! 仿真环境初始化模块
//!
//! 本模块负责：
//! - 读取并解析仿真配置（TOML）
//! - 解析 ELF 文件或原始镜像
//! - 初始化核心和存储器
//! - 以切片方式驱动核心运行
//!
//! # 示例
//!
//! ```no_run
//! use adsp21xx_sim::sim_env::{SimConfig, SimEnv};
//!
//! let config = SimConfig::default()
//!     .with_program_bin("fir.bin")
//!     .with_chip("ADSP-2105");
//!
//! let mut env = SimEnv::from_config(config).expect("Failed to create sim env");
//! env.run(10_000);
//! ```

use std::fs;
use std::io;
use std::path::Path;

use elf::ElfBytes;
use elf::abi::{PF_X, PT_LOAD};
use elf::endian::AnyEndian;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::{Adsp21xx, CpuBuilder};
use crate::isa::MemSpace;
use crate::isa::tables::TableError;
use crate::memory::{FlatMemory, MemError};

/// 仿真环境错误
#[derive(Debug, Error)]
pub enum SimError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// ELF 解析错误
    #[error("ELF parse error: {0}")]
    ElfParse(String),
    /// 配置错误
    #[error("config error: {0}")]
    Config(String),
    /// 镜像超出存储器范围
    #[error("memory error: {0}")]
    Memory(#[from] MemError),
    /// 查找表初始化失败
    #[error("core init failed: {0}")]
    TableInit(#[from] TableError),
}

/// 仿真配置
///
/// 所有字段都可省略，缺省值见 `Default`。
///
/// ```toml
/// program_bin = "fir.bin"
/// data_bin = "coeffs.bin"
/// chip = "ADSP-2105"
/// max_cycles = 100000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// ELF 文件路径（优先于原始镜像）
    pub elf_path: Option<String>,
    /// 原始程序镜像：每字 3 字节，大端序，从地址 0 装载
    pub program_bin: Option<String>,
    /// 原始数据镜像：每字 2 字节，大端序，从地址 0 装载
    pub data_bin: Option<String>,
    /// 芯片型号名称
    pub chip: String,
    /// 入口 PC（缺省取 ELF 入口或复位地址）
    pub entry_pc: Option<u16>,
    /// `run_to_limit` 的周期上限
    pub max_cycles: u64,
    /// 每次调用 `execute` 的周期预算
    pub cycles_per_slice: i32,
    /// 运行结束后打印寄存器
    pub verbose: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            elf_path: None,
            program_bin: None,
            data_bin: None,
            chip: "ADSP-2100".to_string(),
            entry_pc: None,
            max_cycles: 100_000,
            cycles_per_slice: 64,
            verbose: false,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文件读取配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SimError> {
        let config: Self = toml::from_str(text).map_err(|e| SimError::Config(e.to_string()))?;
        if config.cycles_per_slice <= 0 {
            return Err(SimError::Config(format!(
                "cycles_per_slice must be positive, got {}",
                config.cycles_per_slice
            )));
        }
        Ok(config)
    }

    pub fn with_elf_path(mut self, path: impl Into<String>) -> Self {
        self.elf_path = Some(path.into());
        self
    }

    pub fn with_program_bin(mut self, path: impl Into<String>) -> Self {
        self.program_bin = Some(path.into());
        self
    }

    pub fn with_data_bin(mut self, path: impl Into<String>) -> Self {
        self.data_bin = Some(path.into());
        self
    }

    pub fn with_chip(mut self, chip: impl Into<String>) -> Self {
        self.chip = chip.into();
        self
    }

    pub fn with_entry_pc(mut self, pc: u16) -> Self {
        self.entry_pc = Some(pc & 0x3fff);
        self
    }

    pub fn with_max_cycles(mut self, max: u64) -> Self {
        self.max_cycles = max;
        self
    }

    /// 设置切片大小（至少 1 个周期）
    pub fn with_cycles_per_slice(mut self, cycles: i32) -> Self {
        self.cycles_per_slice = cycles.max(1);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// ELF 可装载段
#[derive(Debug, Clone)]
pub struct ElfSegment {
    /// 宿主字节地址
    pub addr: u32,
    /// 段数据（不含 bss）
    pub data: Vec<u8>,
    /// 内存中的大小
    pub mem_size: usize,
    /// 可执行段装入程序存储器，其余装入数据存储器
    pub executable: bool,
}

impl ElfSegment {
    pub fn space(&self) -> MemSpace {
        if self.executable { MemSpace::Program } else { MemSpace::Data }
    }
}

/// ELF 文件解析结果
///
/// 段地址和入口都是宿主字节地址：程序字占 4 字节（小端），数据字占 2 字节（小端）。
#[derive(Debug, Clone)]
pub struct ElfImage {
    /// 入口字节地址
    pub entry: u32,
    pub segments: Vec<ElfSegment>,
}

impl ElfImage {
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let data = fs::read(path.as_ref())?;
        Self::parse_bytes(&data)
    }

    /// 从字节数组解析 ELF（使用 elf crate）
    pub fn parse_bytes(data: &[u8]) -> Result<Self, SimError> {
        let file = ElfBytes::<AnyEndian>::minimal_parse(data)
            .map_err(|e| SimError::ElfParse(format!("failed to parse ELF: {e}")))?;

        let mut segments = Vec::new();
        if let Some(phdrs) = file.segments() {
            for phdr in phdrs.iter().filter(|p| p.p_type == PT_LOAD) {
                let bytes = file
                    .segment_data(&phdr)
                    .map_err(|e| SimError::ElfParse(format!("failed to read segment data: {e}")))?;
                let addr = u32::try_from(phdr.p_vaddr).map_err(|_| {
                    SimError::ElfParse(format!("segment address 0x{:x} out of range", phdr.p_vaddr))
                })?;
                segments.push(ElfSegment {
                    addr,
                    data: bytes.to_vec(),
                    mem_size: phdr.p_memsz as usize,
                    executable: phdr.p_flags & PF_X != 0,
                });
            }
        }

        Ok(Self { entry: file.ehdr.e_entry as u32, segments })
    }

    /// 入口 PC（字地址）
    pub fn entry_pc(&self) -> u16 {
        ((self.entry >> 2) & 0x3fff) as u16
    }

    /// 把所有段写入存储器，bss 部分清零
    pub fn load_into(&self, mem: &mut FlatMemory) -> Result<(), SimError> {
        for seg in &self.segments {
            mem.write_bytes(seg.space(), seg.addr, &seg.data)?;
            if seg.mem_size > seg.data.len() {
                // write_bytes 已确认 addr + data.len() 在存储器内
                let bss_addr = seg.addr + seg.data.len() as u32;
                mem.fill_bytes(seg.space(), bss_addr, seg.mem_size - seg.data.len(), 0)?;
            }
        }
        Ok(())
    }
}

/// 解析原始程序镜像：每字 3 字节，大端序
pub fn parse_program_image(bytes: &[u8]) -> Result<Vec<u32>, SimError> {
    if bytes.len() % 3 != 0 {
        return Err(SimError::Config(format!(
            "program image length {} is not a multiple of 3",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(3)
        .map(|b| ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32)
        .collect())
}

/// 解析原始数据镜像：每字 2 字节，大端序
pub fn parse_data_image(bytes: &[u8]) -> Result<Vec<u16>, SimError> {
    if bytes.len() % 2 != 0 {
        return Err(SimError::Config(format!("data image length {} is odd", bytes.len())));
    }
    Ok(bytes.chunks_exact(2).map(|b| u16::from_be_bytes([b[0], b[1]])).collect())
}

/// 仿真环境：一个核心 + 一块 `FlatMemory`
pub struct SimEnv {
    pub cpu: Adsp21xx,
    pub memory: FlatMemory,
    pub config: SimConfig,
    /// 累计消耗的周期数
    pub cycles: u64,
}

impl SimEnv {
    /// 从配置创建仿真环境
    pub fn from_config(config: SimConfig) -> Result<Self, SimError> {
        let cpu = CpuBuilder::new().with_chip_name(&config.chip).build()?;
        let mut env = SimEnv { cpu, memory: FlatMemory::new(), config, cycles: 0 };
        env.load_images()?;
        Ok(env)
    }

    /// 直接加载 ELF 文件，其余配置取缺省值
    pub fn from_elf<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        Self::from_config(SimConfig::new().with_elf_path(path))
    }

    /// 按配置装载镜像并设置入口 PC
    fn load_images(&mut self) -> Result<(), SimError> {
        let mut entry = None;

        if let Some(path) = &self.config.elf_path {
            let image = ElfImage::parse(path)?;
            image.load_into(&mut self.memory)?;
            info!(
                "loaded ELF {path}: {} segments, entry 0x{:04x}",
                image.segments.len(),
                image.entry_pc()
            );
            entry = Some(image.entry_pc());
        } else if let Some(path) = &self.config.program_bin {
            let words = parse_program_image(&fs::read(path)?)?;
            self.memory.load_program(0, &words)?;
            info!("loaded program image {path}: {} words", words.len());
        }

        if let Some(path) = &self.config.data_bin {
            let words = parse_data_image(&fs::read(path)?)?;
            self.memory.load_data(0, &words)?;
            info!("loaded data image {path}: {} words", words.len());
        }

        if let Some(pc) = self.config.entry_pc.or(entry) {
            self.cpu.set_pc(pc);
        }
        info!("{} ready at PC 0x{:04x}", self.cpu.variant().name(), self.cpu.pc());
        Ok(())
    }

    /// 执行一条指令，返回消耗的周期数
    pub fn step(&mut self) -> i32 {
        let used = self.cpu.step(&mut self.memory);
        self.cycles += used as u64;
        used
    }

    /// 以切片方式运行最多 `max_cycles` 个周期，核心进入 IDLE 时提前停止
    ///
    /// 返回本次消耗的周期数。中断服务周期可能使结果略超出上限。
    pub fn run(&mut self, max_cycles: u64) -> u64 {
        let slice = self.config.cycles_per_slice.max(1) as u64;
        let mut used = 0u64;
        while used < max_cycles {
            let budget = slice.min(max_cycles - used) as i32;
            used += self.cpu.execute(&mut self.memory, budget) as u64;
            if self.cpu.is_idle() {
                info!("core idle at PC 0x{:04x} after {used} cycles", self.cpu.pc());
                break;
            }
        }
        self.cycles += used;
        used
    }

    /// 按配置中的周期上限运行
    pub fn run_to_limit(&mut self) -> u64 {
        self.run(self.config.max_cycles)
    }

    pub fn cpu(&self) -> &Adsp21xx {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Adsp21xx {
        &mut self.cpu
    }

    pub fn memory(&self) -> &FlatMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut FlatMemory {
        &mut self.memory
    }

    /// 打印寄存器状态
    pub fn dump(&self) {
        println!("Cycles: {}", self.cycles);
        self.cpu.dump_regs();
    }

    /// 复位核心并重新装载镜像
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.cpu.reset();
        self.memory = FlatMemory::new();
        self.cycles = 0;
        self.load_images()
    }
}
