//! 使 CPU 停机的异常条件
//!
//! handler 报告 [`TrapCause`]，由核心附上出错指令的 pc 和编码，组成 [`Trap`]。
//! 任何 trap 都会使核心停机。异常码沿用 `mcause` 的编号。

use thiserror::Error;

use crate::memory::MemError;

/// 指令无法完成的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrapCause {
    /// (opcode, funct3, funct7) 组合在分发表中没有对应项
    #[error("illegal instruction")]
    IllegalInstruction,
    /// 取指地址未对齐或未映射
    #[error("instruction fetch fault: {0}")]
    FetchFault(MemError),
    /// 读访存地址未对齐或未映射
    #[error("load fault: {0}")]
    LoadFault(MemError),
    /// 写访存地址未对齐或未映射
    #[error("store fault: {0}")]
    StoreFault(MemError),
}

impl TrapCause {
    /// 对应 `mcause` 中的异常码
    pub fn code(&self) -> u32 {
        match self {
            TrapCause::FetchFault(MemError::Unaligned { .. }) => 0,
            TrapCause::FetchFault(MemError::OutOfRange { .. }) => 1,
            TrapCause::IllegalInstruction => 2,
            TrapCause::LoadFault(MemError::Unaligned { .. }) => 4,
            TrapCause::LoadFault(MemError::OutOfRange { .. }) => 5,
            TrapCause::StoreFault(MemError::Unaligned { .. }) => 6,
            TrapCause::StoreFault(MemError::OutOfRange { .. }) => 7,
        }
    }

    /// 是否为取指/访存错误
    pub fn is_memory_fault(&self) -> bool {
        !matches!(self, TrapCause::IllegalInstruction)
    }
}

/// 绑定到出错指令的 trap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{cause} at pc=0x{pc:08x} (instr=0x{raw:08x})")]
pub struct Trap {
    pub cause: TrapCause,
    /// 出错指令的地址
    pub pc: u32,
    /// 出错指令的编码；取指失败时为 0
    pub raw: u32,
}

impl Trap {
    pub fn new(cause: TrapCause, pc: u32, raw: u32) -> Self {
        Self { cause, pc, raw }
    }

    pub fn is_illegal_instruction(&self) -> bool {
        self.cause == TrapCause::IllegalInstruction
    }

    pub fn is_memory_fault(&self) -> bool {
        self.cause.is_memory_fault()
    }
}
