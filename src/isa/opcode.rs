//! 32 位编码空间的主 opcode 分类
//!
//! 只有低两位为 `0b11` 的指令字才是 32 位指令，因此共有 32 个主 opcode 槽位。
//! 每个槽位对应唯一的指令格式，格式决定解码器给出哪一个立即数。

use std::fmt;

// ========== Opcode 常量 ==========
pub const OP_LOAD: u8 = 0b000_0011;
pub const OP_LOAD_FP: u8 = 0b000_0111;
pub const OP_CUSTOM_0: u8 = 0b000_1011;
pub const OP_MISC_MEM: u8 = 0b000_1111;
pub const OP_IMM: u8 = 0b001_0011;
pub const OP_AUIPC: u8 = 0b001_0111;
pub const OP_IMM_32: u8 = 0b001_1011;
pub const OP_STORE: u8 = 0b010_0011;
pub const OP_STORE_FP: u8 = 0b010_0111;
pub const OP_CUSTOM_1: u8 = 0b010_1011;
pub const OP_AMO: u8 = 0b010_1111;
pub const OP_REG: u8 = 0b011_0011;
pub const OP_LUI: u8 = 0b011_0111;
pub const OP_32: u8 = 0b011_1011;
pub const OP_MADD: u8 = 0b100_0011;
pub const OP_MSUB: u8 = 0b100_0111;
pub const OP_NMSUB: u8 = 0b100_1011;
pub const OP_NMADD: u8 = 0b100_1111;
pub const OP_FP: u8 = 0b101_0011;
pub const OP_CUSTOM_2: u8 = 0b101_1011;
pub const OP_BRANCH: u8 = 0b110_0011;
pub const OP_JALR: u8 = 0b110_0111;
pub const OP_JAL: u8 = 0b110_1111;
pub const OP_SYSTEM: u8 = 0b111_0011;
pub const OP_CUSTOM_3: u8 = 0b111_1011;

/// 基本指令格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrFormat {
    /// 寄存器-寄存器，无立即数
    R,
    /// 12 位立即数位于 [31:20]
    I,
    /// 12 位立即数拆分在 [31:25] 和 [11:7]
    S,
    /// 13 位分支偏移，bit 0 隐含为 0
    B,
    /// 高 20 位位于 [31:12]
    U,
    /// 21 位跳转偏移，bit 0 隐含为 0
    J,
}

impl fmt::Display for InstrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrFormat::R => "R",
            InstrFormat::I => "I",
            InstrFormat::S => "S",
            InstrFormat::B => "B",
            InstrFormat::U => "U",
            InstrFormat::J => "J",
        };
        f.write_str(s)
    }
}

/// 32 个主 opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Load = OP_LOAD,
    LoadFp = OP_LOAD_FP,
    Custom0 = OP_CUSTOM_0,
    MiscMem = OP_MISC_MEM,
    OpImm = OP_IMM,
    Auipc = OP_AUIPC,
    OpImm32 = OP_IMM_32,
    /// 48 位编码前缀
    Long48Lo = 0b001_1111,
    Store = OP_STORE,
    StoreFp = OP_STORE_FP,
    Custom1 = OP_CUSTOM_1,
    Amo = OP_AMO,
    Op = OP_REG,
    Lui = OP_LUI,
    Op32 = OP_32,
    /// 64 位编码前缀
    Long64 = 0b011_1111,
    Madd = OP_MADD,
    Msub = OP_MSUB,
    Nmsub = OP_NMSUB,
    Nmadd = OP_NMADD,
    OpFp = OP_FP,
    Reserved57 = 0b101_0111,
    Custom2 = OP_CUSTOM_2,
    /// 48 位编码前缀
    Long48Hi = 0b101_1111,
    Branch = OP_BRANCH,
    Jalr = OP_JALR,
    Reserved6b = 0b110_1011,
    Jal = OP_JAL,
    System = OP_SYSTEM,
    Reserved77 = 0b111_0111,
    Custom3 = OP_CUSTOM_3,
    /// 80 位及更长编码前缀
    Long80 = 0b111_1111,
}

/// 以 opcode bits [6:2] 为下标的槽位表
const SLOTS: [Opcode; 32] = [
    Opcode::Load,
    Opcode::LoadFp,
    Opcode::Custom0,
    Opcode::MiscMem,
    Opcode::OpImm,
    Opcode::Auipc,
    Opcode::OpImm32,
    Opcode::Long48Lo,
    Opcode::Store,
    Opcode::StoreFp,
    Opcode::Custom1,
    Opcode::Amo,
    Opcode::Op,
    Opcode::Lui,
    Opcode::Op32,
    Opcode::Long64,
    Opcode::Madd,
    Opcode::Msub,
    Opcode::Nmsub,
    Opcode::Nmadd,
    Opcode::OpFp,
    Opcode::Reserved57,
    Opcode::Custom2,
    Opcode::Long48Hi,
    Opcode::Branch,
    Opcode::Jalr,
    Opcode::Reserved6b,
    Opcode::Jal,
    Opcode::System,
    Opcode::Reserved77,
    Opcode::Custom3,
    Opcode::Long80,
];

impl Opcode {
    /// 按编码顺序排列的全部主 opcode
    pub const ALL: [Opcode; 32] = SLOTS;

    /// 对 7 位 opcode 字段分类
    ///
    /// 压缩指令空间（低两位不是 `0b11`）返回 `None`。
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & 0b11 != 0b11 {
            return None;
        }
        Some(SLOTS[((bits >> 2) & 0x1F) as usize])
    }

    /// 获取 7 位 opcode 编码
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// 获取该 opcode 对应的指令格式
    pub fn format(self) -> InstrFormat {
        match self {
            Opcode::Load
            | Opcode::LoadFp
            | Opcode::MiscMem
            | Opcode::OpImm
            | Opcode::OpImm32
            | Opcode::Jalr
            | Opcode::System => InstrFormat::I,
            Opcode::Store | Opcode::StoreFp => InstrFormat::S,
            Opcode::Branch => InstrFormat::B,
            Opcode::Lui | Opcode::Auipc => InstrFormat::U,
            Opcode::Jal => InstrFormat::J,
            Opcode::Op
            | Opcode::Op32
            | Opcode::Amo
            | Opcode::OpFp
            | Opcode::Madd
            | Opcode::Msub
            | Opcode::Nmsub
            | Opcode::Nmadd => InstrFormat::R,
            // 没有架构定义的立即数布局
            Opcode::Custom0
            | Opcode::Custom1
            | Opcode::Custom2
            | Opcode::Custom3
            | Opcode::Reserved57
            | Opcode::Reserved6b
            | Opcode::Reserved77
            | Opcode::Long48Lo
            | Opcode::Long48Hi
            | Opcode::Long64
            | Opcode::Long80 => InstrFormat::R,
        }
    }

    /// 是否为留给厂商扩展的 custom 槽位
    pub fn is_custom(self) -> bool {
        matches!(
            self,
            Opcode::Custom0 | Opcode::Custom1 | Opcode::Custom2 | Opcode::Custom3
        )
    }

    /// 是否为完全未分配的保留槽位
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            Opcode::Reserved57 | Opcode::Reserved6b | Opcode::Reserved77
        )
    }

    /// 获取规范的大写名称，如 `OP_IMM`
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Load => "LOAD",
            Opcode::LoadFp => "LOAD_FP",
            Opcode::Custom0 => "CUSTOM_0",
            Opcode::MiscMem => "MISC_MEM",
            Opcode::OpImm => "OP_IMM",
            Opcode::Auipc => "AUIPC",
            Opcode::OpImm32 => "OP_IMM_32",
            Opcode::Long48Lo | Opcode::Long48Hi => "LONG_48",
            Opcode::Store => "STORE",
            Opcode::StoreFp => "STORE_FP",
            Opcode::Custom1 => "CUSTOM_1",
            Opcode::Amo => "AMO",
            Opcode::Op => "OP",
            Opcode::Lui => "LUI",
            Opcode::Op32 => "OP_32",
            Opcode::Long64 => "LONG_64",
            Opcode::Madd => "MADD",
            Opcode::Msub => "MSUB",
            Opcode::Nmsub => "NMSUB",
            Opcode::Nmadd => "NMADD",
            Opcode::OpFp => "OP_FP",
            Opcode::Reserved57 | Opcode::Reserved6b | Opcode::Reserved77 => "RESERVED",
            Opcode::Custom2 => "CUSTOM_2",
            Opcode::Branch => "BRANCH",
            Opcode::Jalr => "JALR",
            Opcode::Jal => "JAL",
            Opcode::System => "SYSTEM",
            Opcode::Custom3 => "CUSTOM_3",
            Opcode::Long80 => "LONG_80",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_bit_exact() {
        assert_eq!(OP_IMM, 0x13);
        assert_eq!(OP_STORE, 0x23);
        assert_eq!(OP_LOAD, 0x03);
        assert_eq!(OP_REG, 0x33);
        assert_eq!(OP_LUI, 0x37);
        assert_eq!(OP_AUIPC, 0x17);
        assert_eq!(OP_BRANCH, 0x63);
        assert_eq!(OP_JALR, 0x67);
        assert_eq!(OP_JAL, 0x6F);
        assert_eq!(OP_SYSTEM, 0x73);
    }

    #[test]
    fn test_slots_round_trip() {
        for (slot, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.bits() & 0b11, 0b11);
            assert_eq!((op.bits() >> 2) as usize, slot);
            assert_eq!(Opcode::from_bits(op.bits()), Some(*op));
        }
    }

    #[test]
    fn test_compressed_space_has_no_opcode() {
        for bits in 0u8..128 {
            let known = Opcode::from_bits(bits).is_some();
            assert_eq!(known, bits & 0b11 == 0b11, "bits=0b{:07b}", bits);
        }
    }

    #[test]
    fn test_formats() {
        assert_eq!(Opcode::OpImm.format(), InstrFormat::I);
        assert_eq!(Opcode::Load.format(), InstrFormat::I);
        assert_eq!(Opcode::Jalr.format(), InstrFormat::I);
        assert_eq!(Opcode::Store.format(), InstrFormat::S);
        assert_eq!(Opcode::Branch.format(), InstrFormat::B);
        assert_eq!(Opcode::Lui.format(), InstrFormat::U);
        assert_eq!(Opcode::Auipc.format(), InstrFormat::U);
        assert_eq!(Opcode::Jal.format(), InstrFormat::J);
        assert_eq!(Opcode::Op.format(), InstrFormat::R);
    }

    #[test]
    fn test_reserved_slot() {
        let op = Opcode::from_bits(0b101_0111).unwrap();
        assert!(op.is_reserved());
        assert!(!op.is_custom());
        assert_eq!(op.name(), "RESERVED");
    }
}
