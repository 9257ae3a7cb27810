//! 4 阶 FIR 滤波：DM 存放样本，PM 存放系数，在 DO UNTIL CE 循环中
//! 用乘累加 + 双读完成卷积，结果写回 DM(0x0300)。
//!
//! 运行：`cargo run --example fir_filter`

use adsp21xx_sim::cpu::{Adsp21xx, ChipVariant, Reg, dreg};
use adsp21xx_sim::isa::encode::{self, encode};
use adsp21xx_sim::isa::{
    Accumulate, ComputeFunc, ComputeOp, Condition, DagRef, DspInstr, MacFunc, RegRef, Signedness,
};
use adsp21xx_sim::memory::FlatMemory;

const TAPS: usize = 4;
const SAMPLES: u16 = 0x0100;
const COEFFS: u16 = 0x0200;
const RESULT: u16 = 0x0300;

fn mac(acc: Accumulate, sign: Signedness) -> ComputeOp {
    ComputeOp {
        func: ComputeFunc::Mac(MacFunc::Multiply { acc, sign }),
        xop: 0,
        yop: 0,
        feedback: false,
    }
}

/// MX0 = DM(I0, M0), MY0 = PM(I4, M4)，同时执行 `op`
fn dual_read(op: ComputeOp) -> u32 {
    encode(&DspInstr::DualRead {
        op,
        dm_dst: 2,
        pm_dst: 2,
        dm: DagRef::dag1(0, 0),
        pm: DagRef::dag2(0, 0),
    })
}

fn program() -> Vec<u32> {
    let idle = ComputeOp { func: ComputeFunc::Mac(MacFunc::Nop), xop: 0, yop: 0, feedback: false };
    let loop_body = 0x000c;
    let until_ce = DspInstr::DoUntil { end: loop_body, term: Condition::NOT_CE };
    let store = DspInstr::DmDirect { reg: RegRef::data(dreg::MR1), addr: RESULT, write: true };
    vec![
        encode::load(RegRef::new(1, 0x0), SAMPLES),             // 4: I0
        encode::load(RegRef::new(1, 0x4), 1),                   // 5: M0
        encode::load(RegRef::new(2, 0x0), COEFFS),              // 6: I4
        encode::load(RegRef::new(2, 0x4), 1),                   // 7: M4
        encode::load(RegRef::new(3, 0x5), TAPS as u16 - 1),     // 8: CNTR
        encode::load(RegRef::data(dreg::MR1), 0),               // 9: MR = 0
        dual_read(idle),                                        // a
        encode(&until_ce),                                      // b
        dual_read(mac(Accumulate::Add, Signedness::Ss)),        // c: MR += MX0 * MY0 (SS)
        encode::compute(mac(Accumulate::Add, Signedness::Rnd)), // d: MR += MX0 * MY0 (RND)
        encode(&store),                                         // e: DM(RESULT) = MR1
        0x02_8000,                                              // f: IDLE
    ]
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut cpu = Adsp21xx::new(ChipVariant::Adsp2100)?;
    let mut mem = FlatMemory::new();

    // 1.15 定点：0.5, 0.25, 0.125, 0.0625
    let samples = [0x4000u16, 0x2000, 0x1000, 0x0800];
    let coeffs = [0x2000u16; TAPS]; // 0.25
    mem.load_data(SAMPLES, &samples)?;
    let pm_words: Vec<u32> = coeffs.iter().map(|&c| (c as u32) << 8).collect();
    mem.load_program(COEFFS, &pm_words)?;
    mem.load_program(cpu.pc(), &program())?;

    let used = cpu.execute(&mut mem, 100);
    let y = mem.data_word(RESULT)?;

    let expected: f64 = samples
        .iter()
        .zip(coeffs.iter())
        .map(|(&x, &h)| (x as i16 as f64 / 32768.0) * (h as i16 as f64 / 32768.0))
        .sum();

    println!("FIR ({TAPS} taps) finished in {used} cycles");
    println!("  y = 0x{y:04x} ({:.6}), expected {expected:.6}", y as i16 as f64 / 32768.0);
    println!(
        "  MR = 0x{:02x}_{:04x}_{:04x}",
        cpu.get_register(Reg::Mr2.id()),
        cpu.get_register(Reg::Mr1.id()),
        cpu.get_register(Reg::Mr0.id())
    );
    Ok(())
}
