//! CPU 构建器
//!
//! 在 RV32I 分发表之上注册额外指令，再构建 `CpuCore`。
//!
//! ```
//! use rv32sim::cpu::{CpuBuilder, CpuCore, Discriminant, InstrDef, TrapCause};
//! use rv32sim::isa::{DecodedInstr, OP_CUSTOM_0};
//! use rv32sim::memory::Memory;
//!
//! fn nop(_: &mut CpuCore, _: &mut dyn Memory, _: &DecodedInstr) -> Result<(), TrapCause> {
//!     Ok(())
//! }
//!
//! let cpu = CpuBuilder::new(0x8000_0000)
//!     .with_instr(InstrDef::new("xnop", OP_CUSTOM_0, Discriminant::Opcode, nop))
//!     .build()
//!     .expect("no overlap with RV32I");
//! assert_eq!(cpu.pc(), 0x8000_0000);
//! ```

use std::sync::Arc;

use tracing::debug;

use super::CpuCore;
use super::dispatch::{DispatchError, DispatchTable, InstrDef};

/// 以 RV32I 分发表加额外指令构建 CPU 核心
pub struct CpuBuilder {
    entry_pc: u32,
    extra: Vec<InstrDef>,
}

impl CpuBuilder {
    /// 创建构建器，`entry_pc` 为初始程序计数器
    pub fn new(entry_pc: u32) -> Self {
        Self {
            entry_pc,
            extra: Vec::new(),
        }
    }

    /// 在 RV32I 之上添加一条指令
    pub fn with_instr(mut self, def: InstrDef) -> Self {
        self.extra.push(def);
        self
    }

    /// 批量添加指令
    pub fn with_instrs(mut self, defs: &[InstrDef]) -> Self {
        self.extra.extend_from_slice(defs);
        self
    }

    /// 只构建分发表
    pub fn build_table(&self) -> Result<DispatchTable, DispatchError> {
        let mut table = DispatchTable::rv32i();
        for def in &self.extra {
            table.register(*def)?;
        }
        debug!(entries = table.len(), extra = self.extra.len(), "dispatch table built");
        Ok(table)
    }

    /// 构建 CPU 核心
    ///
    /// 额外指令与 RV32I 或彼此重叠时返回错误。
    pub fn build(self) -> Result<CpuCore, DispatchError> {
        let table = self.build_table()?;
        Ok(CpuCore::with_table(self.entry_pc, Arc::new(table)))
    }
}

impl Default for CpuBuilder {
    fn default() -> Self {
        Self::new(0)
    }
}
