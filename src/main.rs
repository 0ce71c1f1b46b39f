//! rv32sim 命令行入口
//!
//! 提供 `run`、`decode`、`demo` 三个子命令；参数说明即 `--help` 输出，保持英文。

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rv32sim::cpu::DispatchTable;
use rv32sim::isa::{self, encode::*};
use rv32sim::loader::ProgramFormat;
use rv32sim::memory::Memory;
use rv32sim::sim_env::{ResultProbe, SimConfig, SimEnv};

#[derive(Parser)]
#[command(name = "rv32sim", version, about = "RV32I instruction-set simulator")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv per-instruction trace).
    /// RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a program and run it until it reports a result, faults, or runs out of cycles
    Run(RunCmd),
    /// Decode 32-bit instruction words and print their fields
    Decode(DecodeCmd),
    /// Run the built-in sum and Fibonacci programs
    Demo,
}

#[derive(clap::Args)]
struct RunCmd {
    /// Program file; may instead be given as `program` in the config file
    program: Option<PathBuf>,

    /// Program format; guessed from the file extension when omitted
    #[arg(long)]
    format: Option<ProgramFormat>,

    /// TOML configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Memory base address
    #[arg(long, value_parser = parse_u32)]
    base: Option<u32>,

    /// Memory size in bytes
    #[arg(long, value_parser = parse_usize)]
    mem_size: Option<usize>,

    /// Load address for bin and hex programs (default: memory base)
    #[arg(long, value_parser = parse_u32)]
    load_addr: Option<u32>,

    /// Entry point override
    #[arg(long, value_parser = parse_u32)]
    entry: Option<u32>,

    /// Instruction budget; 0 means unlimited
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Pass when the word at ADDR equals VALUE
    #[arg(long, value_name = "ADDR=VALUE", value_parser = parse_sentinel, conflicts_with = "tohost")]
    sentinel: Option<ResultProbe>,

    /// HTIF tohost address (overrides the ELF symbol)
    #[arg(long, value_parser = parse_u32)]
    tohost: Option<u32>,

    /// Print the register file when the run ends
    #[arg(long)]
    dump: bool,
}

#[derive(clap::Args)]
struct DecodeCmd {
    /// Instruction words in hex, with or without a 0x prefix
    #[arg(required = true, value_parser = parse_hex_word)]
    words: Vec<u32>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(cmd) => cmd.run(),
        Command::Decode(cmd) => cmd.run(),
        Command::Demo => run_demo(),
    }
}

/// 安装 stderr 上的 fmt subscriber；设置了 RUST_LOG 时以其为准
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl RunCmd {
    fn run(&self) -> Result<ExitCode> {
        let config = self.build_config()?;
        let mut env = SimEnv::from_config(config).context("failed to set up simulation")?;

        let outcome = env.run_to_completion();
        println!("{outcome} after {} cycles", env.cycles());
        if self.dump {
            print!("{}", env.cpu().register_dump());
        }
        env.dump();

        Ok(if outcome.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }

    fn build_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = SimConfig::from_file(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                // 配置文件中的程序路径相对于配置文件所在目录
                if let (Some(program), Some(dir)) = (&config.program, path.parent()) {
                    config.program = Some(resolve(dir, program));
                }
                config
            }
            None => SimConfig::new(),
        };

        if let Some(program) = &self.program {
            config = config.with_program(program);
        }
        if config.program.is_none() {
            bail!("no program given: pass a path or set `program` in the config file");
        }
        if let Some(format) = self.format {
            config = config.with_format(format);
        }
        if let Some(base) = self.base {
            config = config.with_memory_base(base);
        }
        if let Some(size) = self.mem_size {
            config = config.with_memory_size(size);
        }
        if let Some(addr) = self.load_addr {
            config = config.with_load_addr(addr);
        }
        if let Some(entry) = self.entry {
            config = config.with_entry_pc(entry);
        }
        if let Some(max) = self.max_cycles {
            config = config.with_max_cycles(max);
        }
        if let Some(probe) = self.sentinel {
            config = config.with_probe(probe);
        }
        if let Some(addr) = self.tohost {
            config = config.with_probe(ResultProbe::ToHost { addr });
        }
        Ok(config)
    }
}

fn resolve(dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        dir.join(path)
    } else {
        path.to_path_buf()
    }
}

impl DecodeCmd {
    fn run(&self) -> Result<ExitCode> {
        let table = DispatchTable::rv32i();
        for &raw in &self.words {
            let decoded = isa::decode(raw);
            let asm = table
                .disassemble(&decoded)
                .unwrap_or_else(|| "<illegal>".to_string());
            println!("{decoded}");
            println!("    {asm}");
        }
        Ok(ExitCode::SUCCESS)
    }
}

const RESULT_ADDR: i32 = 0x1000;

/// 计算 1 + 2 + ... + 10，结果写到 RESULT_ADDR
fn sum_program() -> Vec<u32> {
    vec![
        addi(1, 0, 0),  // 0:  x1 = sum = 0
        addi(2, 0, 1),  // 4:  x2 = i = 1
        addi(3, 0, 11), // 8:  x3 = limit = 11
        add(1, 1, 2),   // 12: sum += i
        addi(2, 2, 1),  // 16: i++
        blt(2, 3, -8),  // 20: if i < limit goto 12
        lui(4, RESULT_ADDR),
        sw(4, 1, 0),
        jal(0, 0),
    ]
}

/// 计算 F(10)，结果写到 RESULT_ADDR
fn fibonacci_program() -> Vec<u32> {
    vec![
        addi(1, 0, 0),  // 0:  a = F(0)
        addi(2, 0, 1),  // 4:  b = F(1)
        addi(3, 0, 1),  // 8:  i = 1
        addi(4, 0, 10), // 12: n = 10
        bge(3, 4, 24),  // 16: if i >= n goto 40
        add(5, 1, 2),   // 20: t = a + b
        addi(1, 2, 0),  // 24: a = b
        addi(2, 5, 0),  // 28: b = t
        addi(3, 3, 1),  // 32: i++
        beq(0, 0, -20), // 36: goto 16
        lui(6, RESULT_ADDR),
        sw(6, 2, 0),
        jal(0, 0),
    ]
}

fn run_demo() -> Result<ExitCode> {
    let table = DispatchTable::rv32i();
    let mut all_passed = true;

    for (name, program) in [("sum 1..10", sum_program()), ("fibonacci F(10)", fibonacci_program())] {
        println!("=== {name} ===");
        for (i, &raw) in program.iter().enumerate() {
            let asm = table
                .disassemble(&isa::decode(raw))
                .unwrap_or_else(|| "<illegal>".to_string());
            println!("  {:04x}: {raw:08x}  {asm}", i * 4);
        }

        let config = SimConfig::new()
            .with_memory(0, 64 * 1024)
            .with_max_cycles(1000)
            .with_probe(ResultProbe::Sentinel {
                addr: RESULT_ADDR as u32,
                value: 55,
            });
        let mut env = SimEnv::from_words(config, &program)?;
        let outcome = env.run_to_completion();

        let result = env.memory().load32(RESULT_ADDR as u32).unwrap_or(0);
        println!("{outcome} after {} cycles, result = {result}", env.cycles());
        print!("{}", env.cpu().register_dump());
        println!();
        all_passed &= outcome.is_success();
    }

    Ok(if all_passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.trim().replace('_', "");
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid 32-bit value `{s}`: {e}"))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    parse_u32(s).map(|v| v as usize)
}

fn parse_hex_word(s: &str) -> Result<u32, String> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X").replace('_', "");
    u32::from_str_radix(&digits, 16).map_err(|e| format!("invalid instruction word `{s}`: {e}"))
}

fn parse_sentinel(s: &str) -> Result<ResultProbe, String> {
    let (addr, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, got `{s}`"))?;
    Ok(ResultProbe::Sentinel {
        addr: parse_u32(addr)?,
        value: parse_u32(value)?,
    })
}
