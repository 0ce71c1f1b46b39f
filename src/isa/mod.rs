//! RV32I 指令编码：字段提取、opcode 分类与解码
//!
//! - `fields`：各字段与立即数的掩码/移位提取
//! - `opcode`：32 个主 opcode 及其对应的指令格式
//! - `instr`：`DecodedInstr`，交给分发器的解码结果
//! - `encode`：反方向的编码，用于构造程序

pub mod encode;
mod fields;
mod instr;
mod opcode;

pub use fields::*;
pub use instr::{DecodedInstr, decode};
pub use opcode::*;
