//! 仿真环境
//!
//! 将配置、程序加载、内存和 CPU 核心组合在一起，并判断运行何时结束：
//! 结果探针报告通过/失败，核心因 trap 停机，或周期预算耗尽。
//!
//! # 示例
//!
//! ```no_run
//! use rv32sim::sim_env::{SimConfig, SimEnv};
//!
//! let config = SimConfig::new()
//!     .with_program("rv32ui-p-add")
//!     .with_memory(0x8000_0000, 64 * 1024);
//!
//! let mut env = SimEnv::from_config(config).expect("failed to create sim env");
//! let outcome = env.run_to_completion();
//! println!("{outcome}");
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cpu::{CpuBuilder, CpuCore, CpuState, DispatchError, InstrDef, Trap};
use crate::loader::{self, LoadError, LoadedProgram, ProgramFormat};
use crate::memory::{FlatMemory, MemError, Memory};

/// 仿真环境错误
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("cannot read config {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
    #[error("invalid memory region: {0}")]
    Region(String),
    #[error("CPU configuration error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("{role} mailbox at 0x{addr:08x} is not a word in memory: {source}")]
    Mailbox {
        role: &'static str,
        addr: u32,
        #[source]
        source: MemError,
    },
}

/// 唯一的 RAM 区域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryRegion {
    pub base: u32,
    pub size: usize,
}

impl Default for MemoryRegion {
    fn default() -> Self {
        Self {
            base: 0,
            size: 64 * 1024,
        }
    }
}

impl MemoryRegion {
    fn validate(&self) -> Result<(), SimError> {
        if self.size == 0 {
            return Err(SimError::Region("size is zero".into()));
        }
        let size: u64 = self.size as u64;
        if u64::from(self.base) + size > 1 << 32 {
            return Err(SimError::Region(format!(
                "base=0x{:08x} size=0x{:x} extends past the 32-bit address space",
                self.base, self.size
            )));
        }
        Ok(())
    }
}

/// 程序报告运行结果的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResultProbe {
    /// HTIF 邮箱：1 表示通过，`(n << 1) | 1` 表示第 n 个测试失败
    ToHost { addr: u32 },
    /// `addr` 处的字等于 `value` 时视为通过
    Sentinel { addr: u32, value: u32 },
}

impl ResultProbe {
    /// 获取探针监视的地址
    pub fn addr(&self) -> u32 {
        match *self {
            ResultProbe::ToHost { addr } | ResultProbe::Sentinel { addr, .. } => addr,
        }
    }

    fn role(&self) -> &'static str {
        match self {
            ResultProbe::ToHost { .. } => "tohost",
            ResultProbe::Sentinel { .. } => "sentinel",
        }
    }
}

/// 邮箱必须是内存中对齐的字，否则程序永远无法写到它
fn check_mailbox(memory: &FlatMemory, role: &'static str, addr: u32) -> Result<(), SimError> {
    memory
        .load32(addr)
        .map(|_| ())
        .map_err(|source| SimError::Mailbox { role, addr, source })
}

/// 仿真配置
///
/// 每个字段都有默认值，TOML 文件只需写出要修改的键：
///
/// ```toml
/// program = "sum.hex"
/// format = "hex"
/// max_cycles = 1000
///
/// [memory]
/// base = 0x0
/// size = 0x2000
///
/// [result]
/// kind = "sentinel"
/// addr = 0x1000
/// value = 55
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub program: Option<PathBuf>,
    /// 缺省时根据扩展名猜测
    pub format: Option<ProgramFormat>,
    /// `bin` 和 `hex` 程序的加载地址，默认为内存基地址
    pub load_addr: Option<u32>,
    /// 覆盖加载器给出的入口地址
    pub entry_pc: Option<u32>,
    pub memory: MemoryRegion,
    /// 0 表示不限制
    pub max_cycles: u64,
    /// 缺省时根据 ELF 的 `tohost` 符号选择
    pub result: Option<ResultProbe>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            program: None,
            format: None,
            load_addr: None,
            entry_pc: None,
            memory: MemoryRegion::default(),
            max_cycles: 1_000_000,
            result: None,
        }
    }
}

impl SimConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文本解析配置
    pub fn from_toml_str(text: &str) -> Result<Self, SimError> {
        Ok(toml::from_str(text)?)
    }

    /// 从 TOML 文件读取配置
    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// 设置程序文件路径
    pub fn with_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.program = Some(path.into());
        self
    }

    /// 设置程序格式
    pub fn with_format(mut self, format: ProgramFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// 设置 bin/hex 程序的加载地址
    pub fn with_load_addr(mut self, addr: u32) -> Self {
        self.load_addr = Some(addr);
        self
    }

    /// 设置入口 PC
    pub fn with_entry_pc(mut self, pc: u32) -> Self {
        self.entry_pc = Some(pc);
        self
    }

    /// 设置内存基地址和大小
    pub fn with_memory(mut self, base: u32, size: usize) -> Self {
        self.memory = MemoryRegion { base, size };
        self
    }

    /// 设置内存基地址
    pub fn with_memory_base(mut self, base: u32) -> Self {
        self.memory.base = base;
        self
    }

    /// 设置内存大小（字节）
    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory.size = size;
        self
    }

    /// 设置最大周期数，0 表示不限制
    pub fn with_max_cycles(mut self, max: u64) -> Self {
        self.max_cycles = max;
        self
    }

    /// 设置结果探针
    pub fn with_probe(mut self, probe: ResultProbe) -> Self {
        self.result = Some(probe);
        self
    }

    fn load_addr(&self) -> u32 {
        self.load_addr.unwrap_or(self.memory.base)
    }
}

/// 运行结束的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 结果探针报告通过
    Passed,
    /// 程序通过 `tohost` 报告第 `n` 个测试失败
    Failed(u32),
    /// 探针触发前核心因 trap 停机
    Crashed(Trap),
    /// 周期预算耗尽
    CycleLimit,
}

impl RunOutcome {
    /// 解释写入 `tohost` 的值，0 表示尚未写入
    pub fn from_tohost(value: u32) -> Option<Self> {
        match value {
            0 => None,
            1 => Some(RunOutcome::Passed),
            v => Some(RunOutcome::Failed(v >> 1)),
        }
    }

    /// 是否为通过
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Passed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Passed => write!(f, "PASS"),
            RunOutcome::Failed(n) => write!(f, "FAIL (test {n})"),
            RunOutcome::Crashed(trap) => write!(f, "CRASH: {trap}"),
            RunOutcome::CycleLimit => write!(f, "cycle limit reached"),
        }
    }
}

/// 一次仿真的 CPU、内存与配置
pub struct SimEnv {
    pub cpu: CpuCore,
    pub memory: FlatMemory,
    pub config: SimConfig,
    cycles: u64,
    probe: Option<ResultProbe>,
    fromhost: Option<u32>,
}

impl SimEnv {
    /// 创建内存，加载 `config.program`（如果有），并构建 RV32I 核心
    pub fn from_config(config: SimConfig) -> Result<Self, SimError> {
        Self::from_config_with(config, &[])
    }

    /// 与 [`SimEnv::from_config`] 相同，但在 RV32I 之上注册额外指令
    pub fn from_config_with(config: SimConfig, extra: &[InstrDef]) -> Result<Self, SimError> {
        config.memory.validate()?;
        let mut memory = FlatMemory::new(config.memory.size, config.memory.base);

        let loaded = match &config.program {
            Some(path) => {
                let format = config.format.unwrap_or_else(|| ProgramFormat::from_path(path));
                Some(loader::load_program(&mut memory, path, format, config.load_addr())?)
            }
            None => None,
        };

        Self::assemble(config, memory, loaded, extra)
    }

    /// 以 `words` 作为程序创建环境，写入加载地址
    ///
    /// 忽略 `config.program`。
    pub fn from_words(config: SimConfig, words: &[u32]) -> Result<Self, SimError> {
        config.memory.validate()?;
        let mut memory = FlatMemory::new(config.memory.size, config.memory.base);
        let addr = config.load_addr();
        memory.write_words(addr, words).map_err(LoadError::from)?;

        let loaded = LoadedProgram {
            entry: addr,
            size: words.len() * 4,
            tohost: None,
            fromhost: None,
        };
        Self::assemble(config, memory, Some(loaded), &[])
    }

    fn assemble(
        config: SimConfig,
        memory: FlatMemory,
        loaded: Option<LoadedProgram>,
        extra: &[InstrDef],
    ) -> Result<Self, SimError> {
        let entry_pc = config
            .entry_pc
            .or(loaded.map(|l| l.entry))
            .unwrap_or(config.memory.base);
        let probe = config
            .result
            .or_else(|| loaded.and_then(|l| l.tohost).map(|addr| ResultProbe::ToHost { addr }));
        let fromhost = loaded.and_then(|l| l.fromhost);

        if let Some(probe) = probe {
            check_mailbox(&memory, probe.role(), probe.addr())?;
        }
        if let Some(addr) = fromhost {
            check_mailbox(&memory, "fromhost", addr)?;
        }

        let cpu = CpuBuilder::new(entry_pc).with_instrs(extra).build()?;

        debug!(
            entry = format_args!("0x{entry_pc:08x}"),
            memory_base = format_args!("0x{:08x}", config.memory.base),
            memory_size = config.memory.size,
            max_cycles = config.max_cycles,
            ?probe,
            "simulation environment ready"
        );

        let mut env = SimEnv {
            cpu,
            memory,
            config,
            cycles: 0,
            probe,
            fromhost,
        };
        env.clear_htif_mailboxes()?;
        Ok(env)
    }

    /// 获取已尝试执行的指令数
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// 获取生效的结果探针
    pub fn probe(&self) -> Option<ResultProbe> {
        self.probe
    }

    pub fn cpu(&self) -> &CpuCore {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuCore {
        &mut self.cpu
    }

    pub fn memory(&self) -> &FlatMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut FlatMemory {
        &mut self.memory
    }

    /// 执行一条指令；核心已停机时不计周期
    pub fn step(&mut self) -> CpuState {
        if !self.cpu.state().is_running() {
            return self.cpu.state();
        }
        self.cycles += 1;
        self.cpu.step(&mut self.memory)
    }

    /// 最多执行 `max_cycles` 条指令，不检查探针
    pub fn run(&mut self, max_cycles: u64) -> (u64, CpuState) {
        let (executed, state) = self.cpu.run(&mut self.memory, max_cycles);
        self.cycles += executed;
        (executed, state)
    }

    /// 运行直到探针触发、核心停机或 `config.max_cycles` 耗尽
    ///
    /// 每条指令之后都检查探针，因此出错指令之前写入的结果仍然有效。
    pub fn run_to_completion(&mut self) -> RunOutcome {
        let budget = match self.config.max_cycles {
            0 => u64::MAX,
            n => n,
        };
        let start = self.cycles;

        let mut outcome = RunOutcome::CycleLimit;
        for _ in 0..budget {
            let state = self.step();
            if let Some(result) = self.check_probe() {
                outcome = result;
                break;
            }
            if let CpuState::Halted(trap) = state {
                outcome = RunOutcome::Crashed(trap);
                break;
            }
        }

        let cycles = self.cycles - start;
        match outcome {
            RunOutcome::Passed | RunOutcome::Failed(_) => info!(%outcome, cycles, "run finished"),
            _ => warn!(%outcome, cycles, pc = format_args!("0x{:08x}", self.cpu.pc()), "run stopped"),
        }
        outcome
    }

    /// 读取探针位置；`tohost` 的写入会被确认
    pub fn check_probe(&mut self) -> Option<RunOutcome> {
        match self.probe? {
            ResultProbe::ToHost { addr } => {
                let value = self.memory.load32(addr).ok()?;
                let outcome = RunOutcome::from_tohost(value)?;
                self.acknowledge_tohost(addr, value);
                Some(outcome)
            }
            ResultProbe::Sentinel { addr, value } => {
                (self.memory.load32(addr).ok()? == value).then_some(RunOutcome::Passed)
            }
        }
    }

    fn clear_htif_mailboxes(&mut self) -> Result<(), SimError> {
        if let Some(ResultProbe::ToHost { addr }) = self.probe {
            self.memory
                .store32(addr, 0)
                .map_err(|source| SimError::Mailbox { role: "tohost", addr, source })?;
        }
        if let Some(addr) = self.fromhost {
            self.memory
                .store32(addr, 0)
                .map_err(|source| SimError::Mailbox { role: "fromhost", addr, source })?;
        }
        Ok(())
    }

    fn acknowledge_tohost(&mut self, addr: u32, value: u32) {
        if let Err(err) = self.memory.store32(addr, 0) {
            warn!(%err, "failed to clear tohost");
        }
        if let Some(fromhost) = self.fromhost {
            if let Err(err) = self.memory.store32(fromhost, value) {
                warn!(%err, "failed to write fromhost");
            }
        }
    }

    /// 记录周期数和寄存器文件
    pub fn dump(&self) {
        info!(target: "rv32sim::dump", cycles = self.cycles, "simulation state");
        self.cpu.dump_regs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::TrapCause;
    use crate::isa::encode::*;

    /// 将 x1 写到 0x1000，然后原地循环
    fn report(value: i32) -> Vec<u32> {
        vec![addi(1, 0, value), lui(2, 0x1000), sw(2, 1, 0), jal(0, 0)]
    }

    fn small() -> SimConfig {
        SimConfig::new().with_memory(0, 0x2000).with_max_cycles(100)
    }

    #[test]
    fn test_sim_config_builder() {
        let config = SimConfig::new()
            .with_program("prog.bin")
            .with_format(ProgramFormat::Bin)
            .with_load_addr(0x100)
            .with_entry_pc(0x104)
            .with_memory_base(0x8000_0000)
            .with_memory_size(4096)
            .with_max_cycles(10);

        assert_eq!(config.program, Some(PathBuf::from("prog.bin")));
        assert_eq!(config.format, Some(ProgramFormat::Bin));
        assert_eq!(config.load_addr(), 0x100);
        assert_eq!(config.entry_pc, Some(0x104));
        assert_eq!(config.memory, MemoryRegion { base: 0x8000_0000, size: 4096 });
        assert_eq!(config.max_cycles, 10);
        assert_eq!(SimConfig::new().load_addr(), 0);
    }

    #[test]
    fn test_config_from_toml() {
        let config = SimConfig::from_toml_str(
            r#"
            program = "sum.hex"
            format = "hex"
            max_cycles = 500

            [memory]
            base = 0x1000
            size = 0x4000

            [result]
            kind = "sentinel"
            addr = 0x2000
            value = 55
            "#,
        )
        .unwrap();

        assert_eq!(config.program, Some(PathBuf::from("sum.hex")));
        assert_eq!(config.format, Some(ProgramFormat::Hex));
        assert_eq!(config.max_cycles, 500);
        assert_eq!(config.memory, MemoryRegion { base: 0x1000, size: 0x4000 });
        assert_eq!(
            config.result,
            Some(ResultProbe::Sentinel { addr: 0x2000, value: 55 })
        );
        assert_eq!(config.entry_pc, None);
    }

    #[test]
    fn test_config_toml_defaults_and_errors() {
        let config = SimConfig::from_toml_str("[result]\nkind = \"tohost\"\naddr = 64\n").unwrap();
        assert_eq!(config.memory, MemoryRegion::default());
        assert_eq!(config.max_cycles, 1_000_000);
        assert_eq!(config.result, Some(ResultProbe::ToHost { addr: 64 }));

        assert!(matches!(
            SimConfig::from_toml_str("format = \"coff\""),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_from_tohost() {
        assert_eq!(RunOutcome::from_tohost(0), None);
        assert_eq!(RunOutcome::from_tohost(1), Some(RunOutcome::Passed));
        assert_eq!(RunOutcome::from_tohost((3 << 1) | 1), Some(RunOutcome::Failed(3)));
    }

    #[test]
    fn test_sentinel_probe() {
        let config = small().with_probe(ResultProbe::Sentinel { addr: 0x1000, value: 55 });
        let mut env = SimEnv::from_words(config, &report(55)).unwrap();

        assert_eq!(env.run_to_completion(), RunOutcome::Passed);
        assert_eq!(env.cycles(), 3);
    }

    #[test]
    fn test_sentinel_wrong_value_hits_cycle_limit() {
        let config = small().with_probe(ResultProbe::Sentinel { addr: 0x1000, value: 55 });
        let mut env = SimEnv::from_words(config, &report(54)).unwrap();

        assert_eq!(env.run_to_completion(), RunOutcome::CycleLimit);
        assert_eq!(env.cycles(), 100);
    }

    #[test]
    fn test_tohost_probe() {
        let config = small().with_probe(ResultProbe::ToHost { addr: 0x1000 });

        let mut env = SimEnv::from_words(config.clone(), &report(1)).unwrap();
        assert_eq!(env.run_to_completion(), RunOutcome::Passed);
        // 已确认
        assert_eq!(env.memory().load32(0x1000).unwrap(), 0);

        let mut env = SimEnv::from_words(config, &report((5 << 1) | 1)).unwrap();
        assert_eq!(env.run_to_completion(), RunOutcome::Failed(5));
    }

    #[test]
    fn test_crash_is_not_a_pass() {
        let config = small().with_probe(ResultProbe::Sentinel { addr: 0x1000, value: 1 });
        let mut env = SimEnv::from_words(config, &[addi(1, 0, 1), 0b101_0111]).unwrap();

        let outcome = env.run_to_completion();
        let RunOutcome::Crashed(trap) = outcome else {
            panic!("expected crash, got {outcome}");
        };
        assert_eq!(trap.cause, TrapCause::IllegalInstruction);
        assert_eq!(trap.pc, 4);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_entry_and_load_addr() {
        let config = small().with_load_addr(0x100).with_max_cycles(2);
        let env = SimEnv::from_words(config.clone(), &[addi(1, 0, 1)]).unwrap();
        assert_eq!(env.cpu().pc(), 0x100);

        let env = SimEnv::from_words(config.with_entry_pc(0x104), &[addi(1, 0, 1)]).unwrap();
        assert_eq!(env.cpu().pc(), 0x104);
    }

    #[test]
    fn test_invalid_region() {
        let config = SimConfig::new().with_memory(0xFFFF_F000, 0x2000);
        assert!(matches!(SimEnv::from_words(config, &[]), Err(SimError::Region(_))));

        let config = SimConfig::new().with_memory_size(0);
        assert!(matches!(SimEnv::from_config(config), Err(SimError::Region(_))));
    }

    #[test]
    fn test_program_outside_memory() {
        let config = SimConfig::new().with_memory(0, 16).with_load_addr(8);
        assert!(matches!(
            SimEnv::from_words(config, &[0; 4]),
            Err(SimError::Load(LoadError::Memory(_)))
        ));
    }

    #[test]
    fn test_sentinel_outside_memory_is_rejected() {
        let config = SimConfig::new()
            .with_memory(0, 0x100)
            .with_probe(ResultProbe::Sentinel { addr: 0x1000, value: 42 });
        let err = SimEnv::from_words(config, &report(42)).err().expect("config should be rejected");
        assert!(matches!(
            err,
            SimError::Mailbox {
                role: "sentinel",
                addr: 0x1000,
                source: MemError::OutOfRange { .. },
            }
        ));
    }

    #[test]
    fn test_misaligned_tohost_is_rejected() {
        let config = small().with_probe(ResultProbe::ToHost { addr: 0x81 });
        let err = SimEnv::from_words(config, &[addi(1, 0, 1), sb(0, 1, 0x81)])
            .err()
            .expect("config should be rejected");
        assert!(matches!(
            err,
            SimError::Mailbox {
                role: "tohost",
                addr: 0x81,
                source: MemError::Unaligned { .. },
            }
        ));
        assert!(err.to_string().contains("tohost mailbox at 0x00000081"));
    }

    #[test]
    fn test_halted_core_does_not_count_cycles() {
        let mut env = SimEnv::from_words(small(), &[0b101_0111]).unwrap();
        assert!(!env.step().is_running());
        assert_eq!(env.cycles(), 1);

        assert!(!env.step().is_running());
        assert_eq!(env.run(10).0, 0);
        assert_eq!(env.cycles(), 1);
    }

    #[test]
    fn test_run_counts_cycles() {
        let mut env = SimEnv::from_words(small(), &[jal(0, 0)]).unwrap();
        let (executed, state) = env.run(7);
        assert_eq!(executed, 7);
        assert!(state.is_running());
        env.step();
        assert_eq!(env.cycles(), 8);
    }
}
