//! 表驱动的 opcode 分发
//!
//! handler 按选中它的 (opcode, funct3, funct7) 字段注册。注册时拒绝任何可能与
//! 已有表项匹配同一指令字的表项，因此一次查找至多一个结果，至多三次哈希查询：
//! 精确键，然后 opcode+funct3，最后只用 opcode。

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::CpuCore;
use super::trap::TrapCause;
use crate::isa::{DecodedInstr, InstrFormat, OP_JALR, OP_LOAD, OP_MISC_MEM, Opcode};
use crate::memory::Memory;

/// 单条指令的语义动作
pub type ExecFn = fn(&mut CpuCore, &mut dyn Memory, &DecodedInstr) -> Result<(), TrapCause>;

/// 除 opcode 之外，用哪些次级字段选择表项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discriminant {
    /// 只用 opcode（LUI、AUIPC、JAL）
    Opcode,
    /// opcode + funct3（I/S/B-type）
    Funct3(u8),
    /// opcode + funct3 + funct7（R-type 及立即数移位）
    Funct7(u8, u8),
}

impl Discriminant {
    /// 存在某个编码能同时被两者选中时返回 true
    fn overlaps(self, other: Discriminant) -> bool {
        use Discriminant::*;
        match (self, other) {
            (Opcode, _) | (_, Opcode) => true,
            (Funct3(a), Funct3(b)) | (Funct3(a), Funct7(b, _)) | (Funct7(a, _), Funct3(b)) => {
                a == b
            }
            (Funct7(a3, a7), Funct7(b3, b7)) => a3 == b3 && a7 == b7,
        }
    }
}

/// 查找键，缺省字段不参与选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub opcode: u8,
    pub funct3: Option<u8>,
    pub funct7: Option<u8>,
}

impl DispatchKey {
    /// 由 opcode 和判别方式构造查找键
    pub fn new(opcode: u8, discriminant: Discriminant) -> Self {
        let (funct3, funct7) = match discriminant {
            Discriminant::Opcode => (None, None),
            Discriminant::Funct3(f3) => (Some(f3), None),
            Discriminant::Funct7(f3, f7) => (Some(f3), Some(f7)),
        };
        Self {
            opcode,
            funct3,
            funct7,
        }
    }
}

/// 一个分发表项
#[derive(Clone, Copy)]
pub struct InstrDef {
    /// 助记符，用于反汇编和冲突报告
    pub name: &'static str,
    pub opcode: u8,
    pub discriminant: Discriminant,
    pub exec: ExecFn,
}

impl InstrDef {
    pub const fn new(
        name: &'static str,
        opcode: u8,
        discriminant: Discriminant,
        exec: ExecFn,
    ) -> Self {
        Self {
            name,
            opcode,
            discriminant,
            exec,
        }
    }

    /// 获取该表项的查找键
    pub fn key(&self) -> DispatchKey {
        DispatchKey::new(self.opcode, self.discriminant)
    }
}

impl std::fmt::Debug for InstrDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrDef")
            .field("name", &self.name)
            .field("opcode", &format_args!("0x{:02x}", self.opcode))
            .field("discriminant", &self.discriminant)
            .finish()
    }
}

/// 分发表注册错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{new} overlaps {existing} on opcode 0x{opcode:02x}")]
    Conflict {
        new: &'static str,
        existing: &'static str,
        opcode: u8,
    },
    #[error("{name}: 0x{opcode:02x} is not a 32-bit major opcode")]
    InvalidOpcode { name: &'static str, opcode: u8 },
}

/// 已注册的指令集
#[derive(Default)]
pub struct DispatchTable {
    entries: FxHashMap<DispatchKey, InstrDef>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含 RV32I 基本整数指令集的分发表
    pub fn rv32i() -> Self {
        let mut table = Self::new();
        for def in super::exu::RV32I_INSTRS {
            let registered = table.register(*def);
            debug_assert!(registered.is_ok(), "{}: {registered:?}", def.name);
        }
        table
    }

    /// 注册一个表项
    ///
    /// 若该表项可能匹配已被其他表项占用的编码，返回错误且不修改分发表。
    pub fn register(&mut self, def: InstrDef) -> Result<(), DispatchError> {
        if def.opcode > 0x7F || Opcode::from_bits(def.opcode).is_none() {
            return Err(DispatchError::InvalidOpcode {
                name: def.name,
                opcode: def.opcode,
            });
        }

        if let Some(existing) = self
            .entries
            .values()
            .find(|e| e.opcode == def.opcode && e.discriminant.overlaps(def.discriminant))
        {
            return Err(DispatchError::Conflict {
                new: def.name,
                existing: existing.name,
                opcode: def.opcode,
            });
        }

        self.entries.insert(def.key(), def);
        Ok(())
    }

    /// 查找 `decoded` 对应的表项，先查最具体的键
    pub fn lookup(&self, decoded: &DecodedInstr) -> Option<&InstrDef> {
        let op = decoded.opcode;
        let f3 = decoded.funct3;
        let f7 = decoded.funct7;

        self.entries
            .get(&DispatchKey::new(op, Discriminant::Funct7(f3, f7)))
            .or_else(|| self.entries.get(&DispatchKey::new(op, Discriminant::Funct3(f3))))
            .or_else(|| self.entries.get(&DispatchKey::new(op, Discriminant::Opcode)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 已注册的助记符（排序后）
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|d| d.name).collect();
        names.sort_unstable();
        names
    }

    /// 将 `decoded` 渲染为汇编文本，例如 `addi x2, x1, 10`
    ///
    /// 没有匹配的表项时返回 `None`。
    pub fn disassemble(&self, decoded: &DecodedInstr) -> Option<String> {
        let def = self.lookup(decoded)?;
        let name = def.name;
        let d = decoded;

        let text = match d.format {
            InstrFormat::R => format!("{name} x{}, x{}, x{}", d.rd, d.rs1, d.rs2),
            InstrFormat::I if d.opcode == OP_MISC_MEM => name.to_string(),
            InstrFormat::I if d.opcode == OP_LOAD || d.opcode == OP_JALR => {
                format!("{name} x{}, {}(x{})", d.rd, d.i_imm, d.rs1)
            }
            InstrFormat::I if matches!(def.discriminant, Discriminant::Funct7(..)) => {
                format!("{name} x{}, x{}, {}", d.rd, d.rs1, d.shamt())
            }
            InstrFormat::I => format!("{name} x{}, x{}, {}", d.rd, d.rs1, d.i_imm),
            InstrFormat::S => format!("{name} x{}, {}(x{})", d.rs2, d.s_imm, d.rs1),
            InstrFormat::B => format!("{name} x{}, x{}, {}", d.rs1, d.rs2, d.b_imm),
            InstrFormat::U => format!("{name} x{}, 0x{:x}", d.rd, (d.u_imm as u32) >> 12),
            InstrFormat::J => format!("{name} x{}, {}", d.rd, d.j_imm),
        };
        Some(text)
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("entries", &self.names())
            .finish()
    }
}

/// 查找并执行 `decoded` 对应的 handler
pub fn dispatch(
    cpu: &mut CpuCore,
    mem: &mut dyn Memory,
    decoded: &DecodedInstr,
) -> Result<(), TrapCause> {
    let exec = cpu
        .dispatch_table()
        .lookup(decoded)
        .map(|def| def.exec)
        .ok_or(TrapCause::IllegalInstruction)?;
    exec(cpu, mem, decoded)
}
