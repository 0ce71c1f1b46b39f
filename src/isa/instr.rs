//! 解码后的指令记录

use std::fmt;

use super::fields;
use super::opcode::{InstrFormat, Opcode};

/// 拆分为各命名字段的 32 位指令字
///
/// 所有字段和所有格式的立即数都会无条件提取；`format` 记录该 opcode
/// 在架构上有效的是哪一个立即数，由 [`DecodedInstr::imm`] 返回。
/// 自定义 opcode 的 handler 可以按自己的编码读取任意立即数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstr {
    /// 原始编码
    pub raw: u32,
    /// [6:0]
    pub opcode: u8,
    /// [11:7]
    pub rd: u8,
    /// [14:12]
    pub funct3: u8,
    /// [19:15]
    pub rs1: u8,
    /// [24:20]
    pub rs2: u8,
    /// [31:25]
    pub funct7: u8,
    /// 由 opcode 决定的指令格式
    pub format: InstrFormat,
    pub i_imm: i32,
    pub s_imm: i32,
    pub b_imm: i32,
    pub u_imm: i32,
    pub j_imm: i32,
}

/// 解码原始指令字
///
/// 解码永不失败：无意义的 opcode 同样得到完整的记录，由分发器在之后拒绝。
pub fn decode(raw: u32) -> DecodedInstr {
    let opcode = fields::opcode(raw);
    let format = Opcode::from_bits(opcode)
        .map(Opcode::format)
        .unwrap_or(InstrFormat::R);

    DecodedInstr {
        raw,
        opcode,
        rd: fields::rd(raw),
        funct3: fields::funct3(raw),
        rs1: fields::rs1(raw),
        rs2: fields::rs2(raw),
        funct7: fields::funct7(raw),
        format,
        i_imm: fields::imm_i(raw),
        s_imm: fields::imm_s(raw),
        b_imm: fields::imm_b(raw),
        u_imm: fields::imm_u(raw),
        j_imm: fields::imm_j(raw),
    }
}

impl DecodedInstr {
    /// 主 opcode；不在 32 位编码空间（压缩指令空间）时返回 `None`
    pub fn major(&self) -> Option<Opcode> {
        Opcode::from_bits(self.opcode)
    }

    /// 按指令格式选出的立即数，R-type 返回 `None`
    pub fn imm(&self) -> Option<i32> {
        match self.format {
            InstrFormat::R => None,
            InstrFormat::I => Some(self.i_imm),
            InstrFormat::S => Some(self.s_imm),
            InstrFormat::B => Some(self.b_imm),
            InstrFormat::U => Some(self.u_imm),
            InstrFormat::J => Some(self.j_imm),
        }
    }

    /// 立即数移位指令的移位量
    pub fn shamt(&self) -> u32 {
        self.rs2 as u32
    }
}

impl From<u32> for DecodedInstr {
    fn from(raw: u32) -> Self {
        decode(raw)
    }
}

/// 字段转储，例如 `0x00a08113 OP_IMM(I) rd=x2 rs1=x1 funct3=0 imm=10`
impl fmt::Display for DecodedInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x} ", self.raw)?;
        match self.major() {
            Some(op) => write!(f, "{}({})", op, self.format)?,
            None => write!(f, "opcode=0b{:07b}", self.opcode)?,
        }
        match self.format {
            InstrFormat::R => write!(
                f,
                " rd=x{} rs1=x{} rs2=x{} funct3={} funct7=0x{:02x}",
                self.rd, self.rs1, self.rs2, self.funct3, self.funct7
            ),
            InstrFormat::I => write!(
                f,
                " rd=x{} rs1=x{} funct3={} imm={}",
                self.rd, self.rs1, self.funct3, self.i_imm
            ),
            InstrFormat::S => write!(
                f,
                " rs1=x{} rs2=x{} funct3={} imm={}",
                self.rs1, self.rs2, self.funct3, self.s_imm
            ),
            InstrFormat::B => write!(
                f,
                " rs1=x{} rs2=x{} funct3={} imm={}",
                self.rs1, self.rs2, self.funct3, self.b_imm
            ),
            InstrFormat::U => write!(f, " rd=x{} imm=0x{:08x}", self.rd, self.u_imm as u32),
            InstrFormat::J => write!(f, " rd=x{} imm={}", self.rd, self.j_imm),
        }
    }
}
