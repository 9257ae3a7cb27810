//! DSP 核心与执行引擎
//!
//! 本模块定义了 ADSP-21xx 定点 DSP 核心 `Adsp21xx`：
//! 寄存器文件、地址发生器、硬件栈、中断控制器以及按周期预算运行的取指-解码-执行循环。

use log::{debug, trace};

use crate::isa::{Condition, DecodedInstr, Decoder, TableError, Tables};
use crate::memory::DspMemory;

mod builder;
mod exu;
mod interrupt;
mod regs;
pub mod status;

pub use builder::CpuBuilder;
pub use interrupt::{ChipVariant, IrqCallback, IrqLineState, IrqSource, SerialPort, ICNTL_NESTING};
pub use regs::{dreg, Reg};
pub use status::{AddressGenerator, CoreBank, HwStack, MacResult, MachineState, ShiftResult};

/// ADSP-21xx 核心
///
/// 设计约定：
/// - 全部架构状态集中在可整体复制的 [`MachineState`] 中
/// - 当前寄存器组由 MSTAT 的 bank 位索引，不存在指向寄存器组的指针
/// - 查找表与解码器是进程级只读共享数据
/// - 单线程、不可重入：宿主负责串行化所有调用
pub struct Adsp21xx {
    /// 架构状态
    state: MachineState,
    /// 芯片型号
    variant: ChipVariant,
    /// 共享查找表
    tables: &'static Tables,
    /// 指令解码器
    decoder: &'static Decoder,
    /// 中断应答回调（可覆盖向量地址）
    irq_callback: Option<Box<dyn IrqCallback>>,
    /// 串口外设（仅 ADSP-2105）
    serial: Option<Box<dyn SerialPort>>,
    /// 本次 `execute` 剩余的周期预算
    icount: i32,
}

impl Adsp21xx {
    /// 创建并复位一个核心
    ///
    /// 首次调用时构建共享查找表；构建失败是致命错误。
    ///
    /// # 示例
    ///
    /// ```
    /// use adsp21xx_sim::cpu::{Adsp21xx, ChipVariant};
    ///
    /// let cpu = Adsp21xx::new(ChipVariant::Adsp2100).unwrap();
    /// assert_eq!(cpu.pc(), 0x0004);
    /// ```
    pub fn new(variant: ChipVariant) -> Result<Self, TableError> {
        Ok(Self::with_hooks(variant, Tables::get()?, None, None))
    }

    pub(crate) fn with_hooks(
        variant: ChipVariant,
        tables: &'static Tables,
        irq_callback: Option<Box<dyn IrqCallback>>,
        serial: Option<Box<dyn SerialPort>>,
    ) -> Self {
        let mut cpu = Self {
            state: MachineState::default(),
            variant,
            tables,
            decoder: Decoder::standard(),
            irq_callback,
            serial,
            icount: 0,
        };
        cpu.reset();
        cpu
    }

    /// 复位：清空全部状态，PC 置为型号的复位地址
    pub fn reset(&mut self) {
        self.state = MachineState { pc: self.variant.reset_pc(), ..MachineState::default() };
        self.icount = 0;
        debug!("{} reset, PC=0x{:04x}", self.variant.name(), self.state.pc);
    }

    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    pub fn pc(&self) -> u16 {
        self.state.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.state.pc = pc & 0x3fff;
    }

    /// 只读访问架构状态
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// 当前寄存器组
    pub fn bank(&self) -> &CoreBank {
        self.state.bank()
    }

    pub(crate) fn tables(&self) -> &'static Tables {
        self.tables
    }

    pub fn is_idle(&self) -> bool {
        self.state.idle
    }

    pub fn flag_out(&self) -> bool {
        self.state.flag_out
    }

    /// 驱动 FLAG_IN 输入引脚
    pub fn set_flag_in(&mut self, level: bool) {
        self.state.flag_in = level;
    }

    /// 替换中断应答回调
    pub fn set_irq_callback(&mut self, callback: Option<Box<dyn IrqCallback>>) {
        self.irq_callback = callback;
    }

    /// 替换串口外设
    pub fn set_serial_port(&mut self, serial: Option<Box<dyn SerialPort>>) {
        self.serial = serial;
    }

    pub(crate) fn serial_mut(&mut self) -> Option<&mut (dyn SerialPort + 'static)> {
        self.serial.as_deref_mut()
    }

    /// 保存完整上下文
    pub fn get_context(&self) -> MachineState {
        self.state
    }

    /// 恢复完整上下文，随后立即做一次中断仲裁
    pub fn set_context(&mut self, context: &MachineState) {
        self.state = *context;
        debug!("context restored, PC=0x{:04x}", self.state.pc);
        self.check_irqs();
    }

    /// 条件求值
    ///
    /// `NOT CE` 会先把 CNTR 减一；计数到期时弹出计数栈并返回 false。
    pub fn condition(&mut self, cond: Condition) -> bool {
        if cond.is_counter() {
            self.state.cntr = self.state.cntr.wrapping_sub(1);
            if (self.state.cntr as i16) > 0 {
                true
            } else {
                self.state.pop_cntr();
                false
            }
        } else {
            self.tables.condition(self.state.flags_byte(), cond.code())
        }
    }

    /// 运行 `cycles` 个周期，返回实际消耗的周期数
    ///
    /// 每条指令 1 个周期，至少执行一条指令；中断服务的额外周期在入口和出口整体扣除。
    /// IDLE 状态下直接消耗全部预算。
    pub fn execute(&mut self, mem: &mut dyn DspMemory, cycles: i32) -> i32 {
        self.icount = cycles - self.state.interrupt_cycles;
        self.state.interrupt_cycles = 0;

        if self.state.idle {
            self.icount = 0;
        } else {
            loop {
                self.step_instruction(mem);
                if self.icount <= 0 {
                    break;
                }
            }
        }

        self.icount -= self.state.interrupt_cycles;
        self.state.interrupt_cycles = 0;
        cycles - self.icount
    }

    /// 单步：以 1 个周期的预算执行
    pub fn step(&mut self, mem: &mut dyn DspMemory) -> i32 {
        self.execute(mem, 1)
    }

    /// 结束当前 `execute` 切片（IDLE 与忙等待跳转使用）
    pub(crate) fn end_slice(&mut self) {
        self.icount = 0;
    }

    fn step_instruction(&mut self, mem: &mut dyn DspMemory) {
        self.state.ppc = self.state.pc;
        let raw = mem.read_opcode(((self.state.pc & 0x3fff) as u32) << 2);
        self.advance_pc();
        self.icount -= 1;

        let decoded = self.decoder.decode(raw);
        trace!("{:04x}: {:06x}  {}", self.state.ppc, raw, decoded.instr.name());
        self.dispatch(mem, decoded);
    }

    /// PC 前进；到达循环末地址时检查继续条件
    fn advance_pc(&mut self) {
        if self.state.pc != self.state.loop_end {
            self.state.pc = (self.state.pc + 1) & 0x3fff;
        } else if self.condition(Condition::from_bits(self.state.loop_cond)) {
            self.state.pc = self.state.pc_stack.top() & 0x3fff;
        } else {
            self.state.pop_loop();
            self.state.pop_pc_value();
            self.state.pc = (self.state.pc + 1) & 0x3fff;
        }
    }

    /// 执行已解码的指令，委托到各执行单元
    fn dispatch(&mut self, mem: &mut dyn DspMemory, decoded: DecodedInstr) {
        let instr = decoded.instr;

        if exu::control::execute(self, &instr) {
            return;
        }

        if exu::compute::execute(self, &instr) {
            return;
        }

        if exu::transfer::execute(self, mem, &instr) {
            return;
        }

        debug!("reserved opcode 0x{:06x} at 0x{:04x}", decoded.raw, self.state.ppc);
    }

    /// 打印所有寄存器（用于调试）
    pub fn dump_regs(&self) {
        let st = &self.state;
        let b = st.bank();
        println!("═══════════════════════════════════════════════════════════════════");
        println!("{} Status Dump", self.variant.name());
        println!("═══════════════════════════════════════════════════════════════════");
        println!(
            "PC: 0x{:04x}  PPC: 0x{:04x}  CNTR: 0x{:04x}  Idle: {}  Bank: {}",
            st.pc,
            st.ppc,
            st.cntr,
            st.idle,
            st.bank_index()
        );
        println!();

        println!("─── Computation Units ─────────────────────────────────────────────");
        println!(
            "  AX0: 0x{:04x}  AX1: 0x{:04x}  AY0: 0x{:04x}  AY1: 0x{:04x}  AR: 0x{:04x}  AF: 0x{:04x}",
            b.ax0, b.ax1, b.ay0, b.ay1, b.ar, b.af
        );
        println!(
            "  MX0: 0x{:04x}  MX1: 0x{:04x}  MY0: 0x{:04x}  MY1: 0x{:04x}  MF: 0x{:04x}",
            b.mx0, b.mx1, b.my0, b.my1, b.mf
        );
        println!(
            "  MR: 0x{:02x}_{:04x}_{:04x}",
            b.mr.mr2() & 0xff,
            b.mr.mr1(),
            b.mr.mr0()
        );
        println!(
            "  SI: 0x{:04x}  SE: 0x{:04x}  SB: 0x{:04x}  SR: 0x{:04x}_{:04x}",
            b.si,
            b.se,
            b.sb,
            b.sr.sr1(),
            b.sr.sr0()
        );

        println!();
        println!("─── Data Address Generators ───────────────────────────────────────");
        for (n, dag) in st.dag.iter().enumerate() {
            println!(
                "  I{n}: 0x{:04x}  M{n}: 0x{:04x}  L{n}: 0x{:04x}",
                dag.i, dag.m, dag.l
            );
        }

        println!();
        println!("─── Status ────────────────────────────────────────────────────────");
        println!(
            "  ASTAT: 0x{:02x}  MSTAT: 0x{:02x}  SSTAT: 0x{:02x}  IMASK: 0x{:02x}  ICNTL: 0x{:02x}  PX: 0x{:02x}",
            st.astat, st.mstat, st.sstat, st.imask, st.icntl, st.px
        );
        println!(
            "  Stacks: PC {}/{}  LOOP {}/{}  CNTR {}/{}  STATUS {}/{}",
            st.pc_stack.depth(),
            status::PC_STACK_DEPTH,
            st.loop_stack.depth(),
            status::LOOP_STACK_DEPTH,
            st.cntr_stack.depth(),
            status::CNTR_STACK_DEPTH,
            st.stat_stack.depth(),
            status::STAT_STACK_DEPTH
        );
        println!(
            "  IRQ level: {:?}  latch: {:?}  FLAG_IN: {}  FLAG_OUT: {}",
            st.irq_state, st.irq_latch, st.flag_in, st.flag_out
        );
        println!("═══════════════════════════════════════════════════════════════════");
    }
}

impl std::fmt::Debug for Adsp21xx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adsp21xx")
            .field("variant", &self.variant)
            .field("pc", &format_args!("0x{:04x}", self.state.pc))
            .field("idle", &self.state.idle)
            .finish()
    }
}
