//! 整数运算：OP-IMM、OP、LUI、AUIPC

use crate::cpu::CpuCore;
use crate::cpu::trap::TrapCause;
use crate::isa::DecodedInstr;
use crate::memory::Memory;

type ExecResult = Result<(), TrapCause>;

/// rd = f(rs1, sext(imm))
#[inline]
fn op_imm(cpu: &mut CpuCore, d: &DecodedInstr, f: impl FnOnce(u32, u32) -> u32) -> ExecResult {
    let result = f(cpu.read_reg(d.rs1), d.i_imm as u32);
    cpu.write_reg(d.rd, result);
    Ok(())
}

/// rd = f(rs1, rs2)
#[inline]
fn op_reg(cpu: &mut CpuCore, d: &DecodedInstr, f: impl FnOnce(u32, u32) -> u32) -> ExecResult {
    let result = f(cpu.read_reg(d.rs1), cpu.read_reg(d.rs2));
    cpu.write_reg(d.rd, result);
    Ok(())
}

// ========== OP-IMM ==========

/// rd = rs1 + sext(imm)
pub fn addi(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_imm(cpu, d, u32::wrapping_add)
}

pub fn slti(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_imm(cpu, d, |a, imm| ((a as i32) < (imm as i32)) as u32)
}

/// 立即数先符号扩展，再按无符号比较
pub fn sltiu(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_imm(cpu, d, |a, imm| (a < imm) as u32)
}

pub fn xori(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_imm(cpu, d, |a, imm| a ^ imm)
}

pub fn ori(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_imm(cpu, d, |a, imm| a | imm)
}

pub fn andi(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_imm(cpu, d, |a, imm| a & imm)
}

pub fn slli(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let shamt = d.shamt();
    op_imm(cpu, d, |a, _| a << shamt)
}

pub fn srli(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let shamt = d.shamt();
    op_imm(cpu, d, |a, _| a >> shamt)
}

pub fn srai(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let shamt = d.shamt();
    op_imm(cpu, d, |a, _| ((a as i32) >> shamt) as u32)
}

// ========== OP ==========

pub fn add(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, u32::wrapping_add)
}

pub fn sub(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, u32::wrapping_sub)
}

// 寄存器移位只取 rs2 的低 5 位
pub fn sll(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, |a, b| a << (b & 0x1F))
}

pub fn slt(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, |a, b| ((a as i32) < (b as i32)) as u32)
}

pub fn sltu(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, |a, b| (a < b) as u32)
}

pub fn xor(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, |a, b| a ^ b)
}

pub fn srl(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, |a, b| a >> (b & 0x1F))
}

pub fn sra(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, |a, b| ((a as i32) >> (b & 0x1F)) as u32)
}

pub fn or(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, |a, b| a | b)
}

pub fn and(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    op_reg(cpu, d, |a, b| a & b)
}

// ========== U-type ==========

pub fn lui(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    cpu.write_reg(d.rd, d.u_imm as u32);
    Ok(())
}

/// rd = pc + imm，pc 为本条指令的地址
pub fn auipc(cpu: &mut CpuCore, _mem: &mut dyn Memory, d: &DecodedInstr) -> ExecResult {
    let result = cpu.pc().wrapping_add(d.u_imm as u32);
    cpu.write_reg(d.rd, result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::cpu::CpuCore;
    use crate::isa::encode::*;
    use crate::memory::FlatMemory;

    /// 将 `program` 加载到地址 0，每条指令执行一步
    fn run(program: &[u32]) -> CpuCore {
        let mut mem = FlatMemory::new(1024, 0);
        mem.write_words(0, program).unwrap();
        let mut cpu = CpuCore::new(0);
        let (executed, state) = cpu.run(&mut mem, program.len() as u64);
        assert_eq!(executed, program.len() as u64, "stopped early: {state:?}");
        cpu
    }

    #[test]
    fn test_addi_adds_register_and_immediate() {
        let cpu = run(&[addi(1, 0, 5), addi(2, 1, 10)]);
        assert_eq!(cpu.read_reg(2), 15);

        let cpu = run(&[addi(1, 0, 5), addi(2, 1, -7)]);
        assert_eq!(cpu.read_reg(2) as i32, -2);
    }

    #[test]
    fn test_addi_wraps() {
        let cpu = run(&[addi(1, 0, -1), addi(2, 1, 1)]);
        assert_eq!(cpu.read_reg(1), 0xFFFF_FFFF);
        assert_eq!(cpu.read_reg(2), 0);
    }

    #[test]
    fn test_write_to_x0_discarded() {
        let cpu = run(&[addi(0, 0, 123), add(0, 0, 0)]);
        assert_eq!(cpu.read_reg(0), 0);
    }

    #[test]
    fn test_set_less_than_immediate() {
        let cpu = run(&[
            addi(1, 0, -5),
            slti(2, 1, 3),   // -5 < 3
            sltiu(3, 1, 3),  // 0xFFFFFFFB < 3 不成立
            sltiu(4, 0, -1), // 0 < 0xFFFFFFFF
            sltiu(5, 1, 0),
        ]);
        assert_eq!(cpu.read_reg(2), 1);
        assert_eq!(cpu.read_reg(3), 0);
        assert_eq!(cpu.read_reg(4), 1);
        assert_eq!(cpu.read_reg(5), 0);
    }

    #[test]
    fn test_logical_immediate() {
        let cpu = run(&[
            addi(1, 0, 0x5A),
            xori(2, 1, -1),
            ori(3, 1, 0x0F),
            andi(4, 1, 0x0F),
        ]);
        assert_eq!(cpu.read_reg(2), !0x5A);
        assert_eq!(cpu.read_reg(3), 0x5F);
        assert_eq!(cpu.read_reg(4), 0x0A);
    }

    #[test]
    fn test_immediate_shifts() {
        let cpu = run(&[
            addi(1, 0, -16),
            slli(2, 1, 4),
            srli(3, 1, 28),
            srai(4, 1, 2),
        ]);
        assert_eq!(cpu.read_reg(2), 0xFFFF_FF00);
        assert_eq!(cpu.read_reg(3), 0xF);
        assert_eq!(cpu.read_reg(4) as i32, -4);
    }

    #[test]
    fn test_register_ops() {
        let cpu = run(&[
            addi(1, 0, 100),
            addi(2, 0, 30),
            add(3, 1, 2),
            sub(4, 2, 1),
            xor(5, 1, 2),
            or(6, 1, 2),
            and(7, 1, 2),
            slt(8, 4, 1),
            sltu(9, 4, 1),
        ]);
        assert_eq!(cpu.read_reg(3), 130);
        assert_eq!(cpu.read_reg(4) as i32, -70);
        assert_eq!(cpu.read_reg(5), 100 ^ 30);
        assert_eq!(cpu.read_reg(6), 100 | 30);
        assert_eq!(cpu.read_reg(7), 100 & 30);
        assert_eq!(cpu.read_reg(8), 1);
        assert_eq!(cpu.read_reg(9), 0);
    }

    #[test]
    fn test_register_shifts_use_low_five_bits() {
        let cpu = run(&[
            addi(1, 0, -8),
            addi(2, 0, 33), // 实际移 1 位
            sll(3, 1, 2),
            srl(4, 1, 2),
            sra(5, 1, 2),
        ]);
        assert_eq!(cpu.read_reg(3) as i32, -16);
        assert_eq!(cpu.read_reg(4), 0x7FFF_FFFC);
        assert_eq!(cpu.read_reg(5) as i32, -4);
    }

    #[test]
    fn test_lui_auipc() {
        let cpu = run(&[lui(1, 0x1234_5000), addi(0, 0, 0), auipc(2, 0x1000)]);
        assert_eq!(cpu.read_reg(1), 0x1234_5000);
        assert_eq!(cpu.read_reg(2), 0x1008);
    }
}
