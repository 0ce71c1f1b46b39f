//! 执行单元，每类指令一个模块

pub mod arith;
pub mod control;
pub mod mem;

use super::dispatch::{Discriminant::*, InstrDef};
use crate::isa::{
    OP_AUIPC, OP_BRANCH, OP_IMM, OP_JAL, OP_JALR, OP_LOAD, OP_LUI, OP_MISC_MEM, OP_REG, OP_STORE,
};

const BASE: u8 = 0b000_0000;
const ALT: u8 = 0b010_0000;

/// RV32I 基本整数指令集
///
/// 不包含 SYSTEM（ECALL、EBREAK、CSR*），这些指令按非法指令处理。
pub const RV32I_INSTRS: &[InstrDef] = &[
    // U-type / J-type
    InstrDef::new("lui", OP_LUI, Opcode, arith::lui),
    InstrDef::new("auipc", OP_AUIPC, Opcode, arith::auipc),
    InstrDef::new("jal", OP_JAL, Opcode, control::jal),
    InstrDef::new("jalr", OP_JALR, Funct3(0b000), control::jalr),
    // BRANCH
    InstrDef::new("beq", OP_BRANCH, Funct3(0b000), control::beq),
    InstrDef::new("bne", OP_BRANCH, Funct3(0b001), control::bne),
    InstrDef::new("blt", OP_BRANCH, Funct3(0b100), control::blt),
    InstrDef::new("bge", OP_BRANCH, Funct3(0b101), control::bge),
    InstrDef::new("bltu", OP_BRANCH, Funct3(0b110), control::bltu),
    InstrDef::new("bgeu", OP_BRANCH, Funct3(0b111), control::bgeu),
    // LOAD
    InstrDef::new("lb", OP_LOAD, Funct3(0b000), mem::lb),
    InstrDef::new("lh", OP_LOAD, Funct3(0b001), mem::lh),
    InstrDef::new("lw", OP_LOAD, Funct3(0b010), mem::lw),
    InstrDef::new("lbu", OP_LOAD, Funct3(0b100), mem::lbu),
    InstrDef::new("lhu", OP_LOAD, Funct3(0b101), mem::lhu),
    // STORE
    InstrDef::new("sb", OP_STORE, Funct3(0b000), mem::sb),
    InstrDef::new("sh", OP_STORE, Funct3(0b001), mem::sh),
    InstrDef::new("sw", OP_STORE, Funct3(0b010), mem::sw),
    // OP-IMM
    InstrDef::new("addi", OP_IMM, Funct3(0b000), arith::addi),
    InstrDef::new("slti", OP_IMM, Funct3(0b010), arith::slti),
    InstrDef::new("sltiu", OP_IMM, Funct3(0b011), arith::sltiu),
    InstrDef::new("xori", OP_IMM, Funct3(0b100), arith::xori),
    InstrDef::new("ori", OP_IMM, Funct3(0b110), arith::ori),
    InstrDef::new("andi", OP_IMM, Funct3(0b111), arith::andi),
    InstrDef::new("slli", OP_IMM, Funct7(0b001, BASE), arith::slli),
    InstrDef::new("srli", OP_IMM, Funct7(0b101, BASE), arith::srli),
    InstrDef::new("srai", OP_IMM, Funct7(0b101, ALT), arith::srai),
    // OP
    InstrDef::new("add", OP_REG, Funct7(0b000, BASE), arith::add),
    InstrDef::new("sub", OP_REG, Funct7(0b000, ALT), arith::sub),
    InstrDef::new("sll", OP_REG, Funct7(0b001, BASE), arith::sll),
    InstrDef::new("slt", OP_REG, Funct7(0b010, BASE), arith::slt),
    InstrDef::new("sltu", OP_REG, Funct7(0b011, BASE), arith::sltu),
    InstrDef::new("xor", OP_REG, Funct7(0b100, BASE), arith::xor),
    InstrDef::new("srl", OP_REG, Funct7(0b101, BASE), arith::srl),
    InstrDef::new("sra", OP_REG, Funct7(0b101, ALT), arith::sra),
    InstrDef::new("or", OP_REG, Funct7(0b110, BASE), arith::or),
    InstrDef::new("and", OP_REG, Funct7(0b111, BASE), arith::and),
    // MISC-MEM
    InstrDef::new("fence", OP_MISC_MEM, Funct3(0b000), mem::fence),
];
