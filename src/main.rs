//! adsp21xx_sim 命令行入口
//!
//! 用法：
//!
//! ```text
//! adsp21xx_sim_cli [IMAGE] [--config FILE] [--data FILE] [--chip NAME] [--cycles N] [--dump]
//! ```
//!
//! `IMAGE` 以 `.elf` 结尾时按 ELF 装载，否则按原始程序镜像（每字 3 字节）装载。
//! 不带参数时运行内置演示程序。

use std::env;

use anyhow::{Context, bail};
use log::info;

use adsp21xx_sim::cpu::{Adsp21xx, ChipVariant, Reg, dreg};
use adsp21xx_sim::isa::encode::{self, encode};
use adsp21xx_sim::isa::{
    AluFunc, ComputeFunc, ComputeOp, Condition, DagRef, DspInstr, MemSpace, RegRef,
};
use adsp21xx_sim::memory::FlatMemory;
use adsp21xx_sim::sim_env::{SimConfig, SimEnv};

const USAGE: &str = concat!(
    "usage: adsp21xx_sim_cli [IMAGE] [--config FILE] [--data FILE] ",
    "[--chip NAME] [--cycles N] [--dump]"
);

/// 解析后的命令行
#[derive(Debug)]
enum Command {
    Demo,
    Help,
    Run { config: SimConfig, dump: bool },
}

/// 先装载 `--config`，再让镜像路径和其余选项覆盖配置文件，与参数顺序无关
fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    if args.is_empty() {
        return Ok(Command::Demo);
    }

    let mut config_path = None;
    let mut image = None;
    let mut overrides = Vec::new();
    let mut dump = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config_path = Some(iter.next().context("--config needs a file")?),
            "--data" | "--chip" | "--cycles" => {
                let value = iter.next().with_context(|| format!("{arg} needs a value"))?;
                overrides.push((arg.as_str(), value.clone()));
            }
            "--dump" => dump = true,
            "-h" | "--help" => return Ok(Command::Help),
            flag if flag.starts_with('-') => bail!("unknown option {flag}"),
            path => image = Some(path.to_string()),
        }
    }

    let mut config = match config_path {
        Some(path) => SimConfig::from_toml_file(path)
            .with_context(|| format!("reading config {path}"))?,
        None => SimConfig::new(),
    };
    match image {
        Some(path) if path.ends_with(".elf") => config.elf_path = Some(path),
        Some(path) => config.program_bin = Some(path),
        None => {}
    }
    for (flag, value) in overrides {
        config = match flag {
            "--data" => config.with_data_bin(value),
            "--chip" => config.with_chip(value),
            _ => {
                let cycles = value.parse().with_context(|| format!("bad cycle count {value}"))?;
                config.with_max_cycles(cycles)
            }
        };
    }
    Ok(Command::Run { config, dump })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (config, dump) = match parse_args(&args)? {
        Command::Demo => return run_demo(),
        Command::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        Command::Run { config, dump } => (config, dump),
    };
    let verbose = config.verbose || dump;

    let mut env = SimEnv::from_config(config)?;
    let used = env.run_to_limit();
    info!("ran {used} cycles, PC 0x{:04x}", env.cpu().pc());

    if verbose {
        env.dump();
    }
    Ok(())
}

/// 内置演示：用 DO UNTIL CE 循环把 DM[0x100..0x10a) 累加到 AR
fn run_demo() -> anyhow::Result<()> {
    println!("=== adsp21xx_sim: ADSP-21xx 定点 DSP 仿真器 ===\n");

    let mut cpu = Adsp21xx::new(ChipVariant::Adsp2100)?;
    let mut mem = FlatMemory::new();

    let values: Vec<u16> = (1..=10).collect();
    mem.load_data(0x0100, &values)?;

    let add_ar =
        ComputeOp { func: ComputeFunc::Alu(AluFunc::Add), xop: 2, yop: 0, feedback: false };
    let program = [
        encode::load(RegRef::new(1, 0x0), 0x0100), // I0 = 0x100
        encode::load(RegRef::new(1, 0x4), 1),      // M0 = 1
        encode::load(RegRef::new(3, 0x5), 10),     // CNTR = 10
        encode::load(RegRef::data(dreg::AR), 0),   // AR = 0
        encode(&DspInstr::DoUntil { end: 0x000a, term: Condition::NOT_CE }),
        // AY0 = DM(I0, M0)
        encode(&DspInstr::ComputeMem {
            op: ComputeOp {
                func: ComputeFunc::Alu(AluFunc::PassY),
                xop: 2,
                yop: 3,
                feedback: true,
            },
            space: MemSpace::Data,
            dag: DagRef::dag1(0, 0),
            reg: dreg::AY0,
            write: false,
        }),
        encode::compute(add_ar), // AR = AR + AY0
        0x02_8000,               // IDLE
    ];
    mem.load_program(cpu.pc(), &program)?;

    println!("计算 DM[0x100..0x10a) 之和 (1 + 2 + ... + 10)\n");
    let used = cpu.execute(&mut mem, 200);
    println!("执行完毕，消耗 {used} 个周期\n");
    cpu.dump_regs();

    let sum = cpu.get_register(Reg::Ar.id());
    println!("\n计算结果: AR = {sum}");
    if sum != 55 {
        bail!("expected 55, got {sum}");
    }
    println!("✓ 验证通过!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run_config(list: &[&str]) -> SimConfig {
        match parse_args(&args(list)).unwrap() {
            Command::Run { config, .. } => config,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_image_before_config_is_kept() {
        let name = format!("adsp21xx_sim_cli_{}.toml", std::process::id());
        let path = std::env::temp_dir().join(name);
        let text = "program_bin = \"from_file.bin\"\nchip = \"ADSP-2105\"\nmax_cycles = 500\n";
        fs::write(&path, text).unwrap();
        let cfg = path.to_str().unwrap();

        // 镜像写在 --config 之前或之后，命令行都优先
        for list in [
            ["prog.bin", "--config", cfg, "--cycles", "64"],
            ["--config", cfg, "prog.bin", "--cycles", "64"],
        ] {
            let config = run_config(&list);
            assert_eq!(config.program_bin.as_deref(), Some("prog.bin"));
            assert_eq!(config.chip, "ADSP-2105");
            assert_eq!(config.max_cycles, 64);
        }

        let config = run_config(&["--config", cfg]);
        assert_eq!(config.program_bin.as_deref(), Some("from_file.bin"));
        assert_eq!(config.max_cycles, 500);
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_elf_image_and_flags() {
        let config = run_config(&["--chip", "ADSP-2105", "app.elf", "--data", "d.bin"]);
        assert_eq!(config.elf_path.as_deref(), Some("app.elf"));
        assert_eq!(config.program_bin, None);
        assert_eq!(config.data_bin.as_deref(), Some("d.bin"));
        assert_eq!(config.chip, "ADSP-2105");

        assert!(matches!(parse_args(&[]).unwrap(), Command::Demo));
        assert!(matches!(parse_args(&args(&["--help"])).unwrap(), Command::Help));
        assert!(parse_args(&args(&["--bogus"])).is_err());
        assert!(parse_args(&args(&["--cycles", "lots"])).is_err());
        assert!(parse_args(&args(&["--config"])).is_err());
    }
}
