//! CPU 核心与执行引擎
//!
//! 本模块定义了单 hart RV32I CPU 核心 `CpuCore`，
//! 包含寄存器文件、程序计数器以及执行指令所用的分发表。
//! 内存在每次 step 时传入，核心本身不持有全局状态。

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::isa;
use crate::memory::Memory;

mod builder;
pub mod dispatch;
pub mod exu;
mod status;
pub mod trap;

pub use builder::CpuBuilder;
pub use dispatch::{Discriminant, DispatchError, DispatchKey, DispatchTable, ExecFn, InstrDef};
pub use status::{ABI_NAMES, NUM_REGS, RegFile};
pub use trap::{Trap, TrapCause};

/// CPU 执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    /// 正常运行中
    Running,
    /// 因 trap 停机；再次 step 返回同一个 trap
    Halted(Trap),
}

impl CpuState {
    /// 是否仍在运行
    pub fn is_running(&self) -> bool {
        matches!(self, CpuState::Running)
    }

    /// 获取导致停机的 trap
    pub fn trap(&self) -> Option<Trap> {
        match self {
            CpuState::Running => None,
            CpuState::Halted(trap) => Some(*trap),
        }
    }
}

/// 单 hart RV32I CPU 核心
///
/// 设计约定：
/// - x0 永远为 0，写入时丢弃
/// - PC 为字节地址，所有指令 4 字节对齐
/// - 每条指令执行前 `next_pc` 预设为 `pc + 4`，分支/跳转 handler 覆盖它
/// - 发生 trap 时 PC 停在出错指令上
pub struct CpuCore {
    /// 通用寄存器文件
    regs: RegFile,
    /// 程序计数器
    pc: u32,
    /// 当前指令执行完后的 PC
    next_pc: u32,
    /// 当前 CPU 状态
    state: CpuState,
    /// 指令分发表，可在多个核心间共享
    table: Arc<DispatchTable>,
}

impl CpuCore {
    /// 创建使用 RV32I 分发表的 CPU 核心
    ///
    /// ```
    /// use rv32sim::cpu::CpuCore;
    ///
    /// let cpu = CpuCore::new(0x1000);
    /// assert_eq!(cpu.pc(), 0x1000);
    /// ```
    pub fn new(entry_pc: u32) -> Self {
        Self::with_table(entry_pc, Arc::new(DispatchTable::rv32i()))
    }

    /// 创建通过 `table` 执行指令的 CPU 核心
    pub fn with_table(entry_pc: u32, table: Arc<DispatchTable>) -> Self {
        CpuCore {
            regs: RegFile::new(),
            pc: entry_pc,
            next_pc: entry_pc.wrapping_add(4),
            state: CpuState::Running,
            table,
        }
    }

    /// 获取当前（或即将执行的）指令地址
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// 设置当前指令之后的跳转目标
    pub fn set_next_pc(&mut self, target: u32) {
        self.next_pc = target;
    }

    /// 获取当前 CPU 状态
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// 读取 x0 总是返回 0
    pub fn read_reg(&self, reg: u8) -> u32 {
        self.regs.read(reg)
    }

    /// 写入 x0 会被丢弃
    pub fn write_reg(&mut self, reg: u8, value: u32) {
        self.regs.write(reg, value)
    }

    /// 获取寄存器快照
    pub fn regs(&self) -> &[u32; NUM_REGS] {
        self.regs.snapshot()
    }

    /// 获取指令分发表
    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.table
    }

    /// 执行一条指令
    ///
    /// 1. 取指：读取 pc 处的指令字
    /// 2. 解码
    /// 3. 预设 next_pc = pc + 4
    /// 4. 分发到 handler，handler 可改写 next_pc
    /// 5. 更新 pc；发生 trap 时停机
    pub fn step(&mut self, mem: &mut dyn Memory) -> CpuState {
        if let CpuState::Halted(_) = self.state {
            return self.state;
        }

        let pc = self.pc;
        let raw = match mem.load32(pc) {
            Ok(raw) => raw,
            Err(err) => {
                self.halt(Trap::new(TrapCause::FetchFault(err), pc, 0));
                return self.state;
            }
        };

        let decoded = isa::decode(raw);
        trace!(pc = format_args!("0x{pc:08x}"), instr = %decoded, "exec");

        self.next_pc = pc.wrapping_add(4);
        match dispatch::dispatch(self, mem, &decoded) {
            Ok(()) => self.pc = self.next_pc,
            Err(cause) => self.halt(Trap::new(cause, pc, raw)),
        }

        self.state
    }

    /// 连续执行，直到停机或已尝试 `max_cycles` 条指令
    ///
    /// 返回实际执行的步数和最终状态；核心已停机时不执行任何指令。
    pub fn run(&mut self, mem: &mut dyn Memory, max_cycles: u64) -> (u64, CpuState) {
        if !self.state.is_running() {
            return (0, self.state);
        }
        let mut executed = 0;
        for _ in 0..max_cycles {
            let state = self.step(mem);
            executed += 1;
            if !state.is_running() {
                return (executed, state);
            }
        }
        (executed, self.state)
    }

    fn halt(&mut self, trap: Trap) {
        debug!(%trap, code = trap.cause.code(), "core halted");
        self.next_pc = trap.pc;
        self.state = CpuState::Halted(trap);
    }

    /// 以文本形式输出寄存器文件，每行四个
    pub fn register_dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "pc: 0x{:08x}  state: {:?}", self.pc, self.state);
        for (i, value) in self.regs().iter().enumerate() {
            let _ = write!(out, "x{i:02}/{:<4} 0x{value:08x}", ABI_NAMES[i]);
            out.push_str(if i % 4 == 3 { "\n" } else { "  " });
        }
        out
    }

    /// 以 info 级别记录寄存器文件
    pub fn dump_regs(&self) {
        for line in self.register_dump().lines() {
            info!(target: "rv32sim::dump", "{line}");
        }
    }
}

impl Default for CpuCore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for CpuCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuCore")
            .field("pc", &format_args!("0x{:08x}", self.pc))
            .field("state", &self.state)
            .field("regs", &self.regs)
            .finish()
    }
}
