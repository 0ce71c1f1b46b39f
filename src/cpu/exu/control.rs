//! 分支与跳转
//!
//! 目标地址相对于本条指令的地址。这里不检查目标是否字对齐，由下一次取指报告。

use crate::cpu::CpuCore;
use crate::cpu::trap::TrapCause;
use crate::isa::DecodedInstr;
use crate::memory::Memory;

type ExecResult = Result<(), TrapCause>;

/// 条件成立时跳转到 pc + B-imm
#[inline]
fn branch_if(cpu: &mut CpuCore, d: &DecodedInstr, cond: impl FnOnce(u32, u32) -> bool) -> ExecResult {
    if cond(cpu.read_reg(d.rs1), cpu.read_reg(d.rs2)) {
        let target = cpu.pc().wrapping_add(d.b_imm as u32);
        cpu.set_next_pc(target);
    }
    Ok(())
}

pub fn beq(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    branch_if(cpu, d, |a, b| a == b)
}

pub fn bne(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    branch_if(cpu, d, |a, b| a != b)
}

pub fn blt(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    branch_if(cpu, d, |a, b| (a as i32) < (b as i32))
}

pub fn bge(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    branch_if(cpu, d, |a, b| (a as i32) >= (b as i32))
}

pub fn bltu(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    branch_if(cpu, d, |a, b| a < b)
}

pub fn bgeu(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    branch_if(cpu, d, |a, b| a >= b)
}

/// rd = pc + 4; pc += offset
pub fn jal(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let pc = cpu.pc();
    cpu.write_reg(d.rd, pc.wrapping_add(4));
    cpu.set_next_pc(pc.wrapping_add(d.j_imm as u32));
    Ok(())
}

/// rd = pc + 4; pc = (rs1 + offset) & !1
pub fn jalr(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    // rs1 可能与 rd 是同一个寄存器，必须先读
    let target = cpu.read_reg(d.rs1).wrapping_add(d.i_imm as u32) & !1;
    cpu.write_reg(d.rd, cpu.pc().wrapping_add(4));
    cpu.set_next_pc(target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::cpu::trap::TrapCause;
    use crate::cpu::{CpuCore, CpuState};
    use crate::isa::encode::*;
    use crate::memory::{FlatMemory, MemError};

    fn setup(program: &[u32]) -> (CpuCore, FlatMemory) {
        let mut mem = FlatMemory::new(1024, 0);
        mem.write_words(0, program).unwrap();
        (CpuCore::new(0), mem)
    }

    #[test]
    fn test_beq_taken() {
        let (mut cpu, mut mem) = setup(&[
            addi(1, 0, 5),
            addi(2, 0, 5),
            beq(1, 2, 8),
            addi(3, 0, 1), // 被跳过
        ]);
        cpu.run(&mut mem, 3);
        assert_eq!(cpu.pc(), 16);
        assert_eq!(cpu.read_reg(3), 0);
    }

    #[test]
    fn test_beq_not_taken() {
        let (mut cpu, mut mem) = setup(&[addi(1, 0, 5), addi(2, 0, 10), beq(1, 2, 8)]);
        cpu.run(&mut mem, 3);
        assert_eq!(cpu.pc(), 12);
    }

    #[test]
    fn test_branch_conditions() {
        // x1 = -1, x2 = 1：有符号 x1 < x2，无符号 x1 > x2
        let cases: [(fn(u8, u8, i32) -> u32, bool); 6] = [
            (beq, false),
            (bne, true),
            (blt, true),
            (bge, false),
            (bltu, false),
            (bgeu, true),
        ];
        for (i, (branch, taken)) in cases.into_iter().enumerate() {
            let (mut cpu, mut mem) = setup(&[addi(1, 0, -1), addi(2, 0, 1), branch(1, 2, 12)]);
            cpu.run(&mut mem, 3);
            let expected = if taken { 8 + 12 } else { 12 };
            assert_eq!(cpu.pc(), expected, "case {i}");
        }
    }

    #[test]
    fn test_backward_branch_loop() {
        // x1 从 0 数到 5
        let (mut cpu, mut mem) = setup(&[
            addi(2, 0, 5),
            addi(1, 1, 1),
            blt(1, 2, -4),
            addi(3, 0, 9),
        ]);
        let (executed, _) = cpu.run(&mut mem, 12);
        assert_eq!(executed, 12);
        assert_eq!(cpu.read_reg(1), 5);
        assert_eq!(cpu.read_reg(3), 9);
    }

    #[test]
    fn test_jal_links_and_jumps() {
        let (mut cpu, mut mem) = setup(&[addi(0, 0, 0), jal(1, 12)]);
        cpu.run(&mut mem, 2);
        assert_eq!(cpu.read_reg(1), 8);
        assert_eq!(cpu.pc(), 16);
    }

    #[test]
    fn test_jal_backward() {
        let (mut cpu, mut mem) = setup(&[addi(0, 0, 0), addi(0, 0, 0), jal(0, -8)]);
        cpu.run(&mut mem, 3);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.read_reg(0), 0);
    }

    #[test]
    fn test_jalr_clears_low_bit() {
        let (mut cpu, mut mem) = setup(&[addi(2, 0, 0x41), jalr(1, 2, 4)]);
        cpu.run(&mut mem, 2);
        assert_eq!(cpu.pc(), 0x44);
        assert_eq!(cpu.read_reg(1), 8);
    }

    #[test]
    fn test_jalr_same_source_and_dest() {
        let (mut cpu, mut mem) = setup(&[addi(1, 0, 0x100), jalr(1, 1, 0)]);
        cpu.run(&mut mem, 2);
        assert_eq!(cpu.pc(), 0x100);
        assert_eq!(cpu.read_reg(1), 8);
    }

    #[test]
    fn test_misaligned_target_faults_on_fetch() {
        let (mut cpu, mut mem) = setup(&[jal(0, 6)]);
        let (_, state) = cpu.run(&mut mem, 4);
        let CpuState::Halted(trap) = state else {
            panic!("expected halt, got {state:?}");
        };
        assert_eq!(
            trap.cause,
            TrapCause::FetchFault(MemError::Unaligned {
                addr: 6,
                access: crate::memory::AccessSize::Word
            })
        );
        assert_eq!(trap.pc, 6);
    }
}
