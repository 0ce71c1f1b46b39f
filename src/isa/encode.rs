//! 指令编码器，[`super::fields`] 的逆操作
//!
//! 寄存器编号截断为 5 位，立即数截断到字段宽度，范围检查由调用方负责。
//! 文件末尾的助记符函数供测试和演示程序构造机器码。

use super::opcode::*;

#[inline]
pub fn encode_r(opcode: u8, rd: u8, funct3: u8, rs1: u8, rs2: u8, funct7: u8) -> u32 {
    ((funct7 as u32 & 0x7F) << 25)
        | ((rs2 as u32 & 0x1F) << 20)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((funct3 as u32 & 0x7) << 12)
        | ((rd as u32 & 0x1F) << 7)
        | (opcode as u32 & 0x7F)
}

#[inline]
pub fn encode_i(opcode: u8, rd: u8, funct3: u8, rs1: u8, imm: i32) -> u32 {
    ((imm as u32 & 0xFFF) << 20)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((funct3 as u32 & 0x7) << 12)
        | ((rd as u32 & 0x1F) << 7)
        | (opcode as u32 & 0x7F)
}

#[inline]
pub fn encode_s(opcode: u8, funct3: u8, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm = imm as u32 & 0xFFF;
    ((imm >> 5) << 25)
        | ((rs2 as u32 & 0x1F) << 20)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((funct3 as u32 & 0x7) << 12)
        | ((imm & 0x1F) << 7)
        | (opcode as u32 & 0x7F)
}

/// `offset` 以字节为单位，bit 0 被丢弃
#[inline]
pub fn encode_b(opcode: u8, funct3: u8, rs1: u8, rs2: u8, offset: i32) -> u32 {
    let imm = offset as u32;
    (((imm >> 12) & 0x1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | ((rs2 as u32 & 0x1F) << 20)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((funct3 as u32 & 0x7) << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 0x1) << 7)
        | (opcode as u32 & 0x7F)
}

/// `imm` 的高 20 位保持原位，与 `imm_u` 的返回值一致
#[inline]
pub fn encode_u(opcode: u8, rd: u8, imm: i32) -> u32 {
    (imm as u32 & 0xFFFF_F000) | ((rd as u32 & 0x1F) << 7) | (opcode as u32 & 0x7F)
}

/// `offset` 以字节为单位，bit 0 被丢弃
#[inline]
pub fn encode_j(opcode: u8, rd: u8, offset: i32) -> u32 {
    let imm = offset as u32;
    (((imm >> 20) & 0x1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 0x1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | ((rd as u32 & 0x1F) << 7)
        | (opcode as u32 & 0x7F)
}

// ========== 助记符辅助函数 ==========

pub fn lui(rd: u8, imm: i32) -> u32 {
    encode_u(OP_LUI, rd, imm)
}

pub fn auipc(rd: u8, imm: i32) -> u32 {
    encode_u(OP_AUIPC, rd, imm)
}

pub fn jal(rd: u8, offset: i32) -> u32 {
    encode_j(OP_JAL, rd, offset)
}

pub fn jalr(rd: u8, rs1: u8, offset: i32) -> u32 {
    encode_i(OP_JALR, rd, 0b000, rs1, offset)
}

pub fn beq(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_b(OP_BRANCH, 0b000, rs1, rs2, offset)
}

pub fn bne(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_b(OP_BRANCH, 0b001, rs1, rs2, offset)
}

pub fn blt(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_b(OP_BRANCH, 0b100, rs1, rs2, offset)
}

pub fn bge(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_b(OP_BRANCH, 0b101, rs1, rs2, offset)
}

pub fn bltu(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_b(OP_BRANCH, 0b110, rs1, rs2, offset)
}

pub fn bgeu(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_b(OP_BRANCH, 0b111, rs1, rs2, offset)
}

pub fn lb(rd: u8, rs1: u8, offset: i32) -> u32 {
    encode_i(OP_LOAD, rd, 0b000, rs1, offset)
}

pub fn lh(rd: u8, rs1: u8, offset: i32) -> u32 {
    encode_i(OP_LOAD, rd, 0b001, rs1, offset)
}

pub fn lw(rd: u8, rs1: u8, offset: i32) -> u32 {
    encode_i(OP_LOAD, rd, 0b010, rs1, offset)
}

pub fn lbu(rd: u8, rs1: u8, offset: i32) -> u32 {
    encode_i(OP_LOAD, rd, 0b100, rs1, offset)
}

pub fn lhu(rd: u8, rs1: u8, offset: i32) -> u32 {
    encode_i(OP_LOAD, rd, 0b101, rs1, offset)
}

pub fn sb(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_s(OP_STORE, 0b000, rs1, rs2, offset)
}

pub fn sh(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_s(OP_STORE, 0b001, rs1, rs2, offset)
}

pub fn sw(rs1: u8, rs2: u8, offset: i32) -> u32 {
    encode_s(OP_STORE, 0b010, rs1, rs2, offset)
}

pub fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    encode_i(OP_IMM, rd, 0b000, rs1, imm)
}

pub fn slti(rd: u8, rs1: u8, imm: i32) -> u32 {
    encode_i(OP_IMM, rd, 0b010, rs1, imm)
}

pub fn sltiu(rd: u8, rs1: u8, imm: i32) -> u32 {
    encode_i(OP_IMM, rd, 0b011, rs1, imm)
}

pub fn xori(rd: u8, rs1: u8, imm: i32) -> u32 {
    encode_i(OP_IMM, rd, 0b100, rs1, imm)
}

pub fn ori(rd: u8, rs1: u8, imm: i32) -> u32 {
    encode_i(OP_IMM, rd, 0b110, rs1, imm)
}

pub fn andi(rd: u8, rs1: u8, imm: i32) -> u32 {
    encode_i(OP_IMM, rd, 0b111, rs1, imm)
}

pub fn slli(rd: u8, rs1: u8, shamt: u8) -> u32 {
    encode_r(OP_IMM, rd, 0b001, rs1, shamt, 0b000_0000)
}

pub fn srli(rd: u8, rs1: u8, shamt: u8) -> u32 {
    encode_r(OP_IMM, rd, 0b101, rs1, shamt, 0b000_0000)
}

pub fn srai(rd: u8, rs1: u8, shamt: u8) -> u32 {
    encode_r(OP_IMM, rd, 0b101, rs1, shamt, 0b010_0000)
}

pub fn add(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b000, rs1, rs2, 0b000_0000)
}

pub fn sub(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b000, rs1, rs2, 0b010_0000)
}

pub fn sll(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b001, rs1, rs2, 0b000_0000)
}

pub fn slt(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b010, rs1, rs2, 0b000_0000)
}

pub fn sltu(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b011, rs1, rs2, 0b000_0000)
}

pub fn xor(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b100, rs1, rs2, 0b000_0000)
}

pub fn srl(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b101, rs1, rs2, 0b000_0000)
}

pub fn sra(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b101, rs1, rs2, 0b010_0000)
}

pub fn or(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b110, rs1, rs2, 0b000_0000)
}

pub fn and(rd: u8, rs1: u8, rs2: u8) -> u32 {
    encode_r(OP_REG, rd, 0b111, rs1, rs2, 0b000_0000)
}

pub fn fence() -> u32 {
    // fence iorw, iorw
    encode_i(OP_MISC_MEM, 0, 0b000, 0, 0x0FF)
}
