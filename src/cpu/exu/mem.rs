//! Load、Store 与 FENCE
//!
//! 有效地址为 `x[rs1] + sext(imm)`，按 32 位回绕。访问宽度由 funct3 经分发表项确定，
//! 被拒绝的访问转为 load/store fault。

use crate::cpu::CpuCore;
use crate::cpu::trap::TrapCause;
use crate::isa::DecodedInstr;
use crate::memory::Memory;

type ExecResult = Result<(), TrapCause>;

#[inline]
fn load_addr(cpu: &CpuCore, d: &DecodedInstr) -> u32 {
    cpu.read_reg(d.rs1).wrapping_add(d.i_imm as u32)
}

#[inline]
fn store_addr(cpu: &CpuCore, d: &DecodedInstr) -> u32 {
    cpu.read_reg(d.rs1).wrapping_add(d.s_imm as u32)
}

// ========== LOAD ==========

pub fn lb(cpu: &mut CpuCore, mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let value = mem
        .load8(load_addr(cpu, d))
        .map_err(TrapCause::LoadFault)?;
    cpu.write_reg(d.rd, value as i8 as i32 as u32);
    Ok(())
}

pub fn lh(cpu: &mut CpuCore, mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let value = mem
        .load16(load_addr(cpu, d))
        .map_err(TrapCause::LoadFault)?;
    cpu.write_reg(d.rd, value as i16 as i32 as u32);
    Ok(())
}

pub fn lw(cpu: &mut CpuCore, mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let value = mem
        .load32(load_addr(cpu, d))
        .map_err(TrapCause::LoadFault)?;
    cpu.write_reg(d.rd, value);
    Ok(())
}

pub fn lbu(cpu: &mut CpuCore, mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let value = mem
        .load8(load_addr(cpu, d))
        .map_err(TrapCause::LoadFault)?;
    cpu.write_reg(d.rd, value as u32);
    Ok(())
}

pub fn lhu(cpu: &mut CpuCore, mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let value = mem
        .load16(load_addr(cpu, d))
        .map_err(TrapCause::LoadFault)?;
    cpu.write_reg(d.rd, value as u32);
    Ok(())
}

// ========== STORE ==========

pub fn sb(cpu: &mut CpuCore, mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    mem.store8(store_addr(cpu, d), cpu.read_reg(d.rs2) as u8)
        .map_err(TrapCause::StoreFault)
}

pub fn sh(cpu: &mut CpuCore, mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    mem.store16(store_addr(cpu, d), cpu.read_reg(d.rs2) as u16)
        .map_err(TrapCause::StoreFault)
}

pub fn sw(cpu: &mut CpuCore, mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    mem.store32(store_addr(cpu, d), cpu.read_reg(d.rs2))
        .map_err(TrapCause::StoreFault)
}

// ========== MISC-MEM ==========

/// 单 hart、顺序内存模型，无需排序
pub fn fence(_cpu: &mut CpuCore, _mem: &mut dyn Memory, _d: &DecodedInstr) -> ExecResult {
    Ok(())
}
