//! RV32I 指令字的位字段提取
//!
//! 各字段在所有格式中位置固定，因此无需先确定格式即可提取：
//!
//! ```text
//!  31        25 24    20 19    15 14  12 11     7 6      0
//! |   funct7   |  rs2   |  rs1   |funct3|   rd   | opcode |
//! ```

/// opcode [6:0]
#[inline]
pub fn opcode(raw: u32) -> u8 {
    (raw & 0x7F) as u8
}

/// rd [11:7]
#[inline]
pub fn rd(raw: u32) -> u8 {
    ((raw >> 7) & 0x1F) as u8
}

/// funct3 [14:12]
#[inline]
pub fn funct3(raw: u32) -> u8 {
    ((raw >> 12) & 0x7) as u8
}

/// rs1 [19:15]
#[inline]
pub fn rs1(raw: u32) -> u8 {
    ((raw >> 15) & 0x1F) as u8
}

/// rs2 [24:20]
#[inline]
pub fn rs2(raw: u32) -> u8 {
    ((raw >> 20) & 0x1F) as u8
}

/// funct7 [31:25]
#[inline]
pub fn funct7(raw: u32) -> u8 {
    ((raw >> 25) & 0x7F) as u8
}

/// SLLI/SRLI/SRAI 的移位量 [24:20]
#[inline]
pub fn shamt(raw: u32) -> u8 {
    rs2(raw)
}

/// 对 `value` 的低 `bits` 位做符号扩展
#[inline]
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// I-type 立即数（符号扩展）
/// imm[11:0] = raw[31:20]
#[inline]
pub fn imm_i(raw: u32) -> i32 {
    (raw as i32) >> 20
}

/// S-type 立即数（符号扩展）
/// imm[11:5] = raw[31:25], imm[4:0] = raw[11:7]
#[inline]
pub fn imm_s(raw: u32) -> i32 {
    let imm_11_5 = (raw >> 25) & 0x7F;
    let imm_4_0 = (raw >> 7) & 0x1F;
    sign_extend((imm_11_5 << 5) | imm_4_0, 12)
}

/// B-type 立即数（符号扩展），bit 0 恒为 0
/// imm[12] = raw[31], imm[10:5] = raw[30:25], imm[4:1] = raw[11:8], imm[11] = raw[7]
#[inline]
pub fn imm_b(raw: u32) -> i32 {
    let imm_12 = (raw >> 31) & 0x1;
    let imm_10_5 = (raw >> 25) & 0x3F;
    let imm_4_1 = (raw >> 8) & 0xF;
    let imm_11 = (raw >> 7) & 0x1;
    let imm = (imm_12 << 12) | (imm_11 << 11) | (imm_10_5 << 5) | (imm_4_1 << 1);
    sign_extend(imm, 13)
}

/// U-type 立即数：raw[31:12] 保持原位，低 12 位为 0
#[inline]
pub fn imm_u(raw: u32) -> i32 {
    (raw & 0xFFFF_F000) as i32
}

/// J-type 立即数（符号扩展），bit 0 恒为 0
/// imm[20] = raw[31], imm[10:1] = raw[30:21], imm[11] = raw[20], imm[19:12] = raw[19:12]
#[inline]
pub fn imm_j(raw: u32) -> i32 {
    let imm_20 = (raw >> 31) & 0x1;
    let imm_10_1 = (raw >> 21) & 0x3FF;
    let imm_11 = (raw >> 20) & 0x1;
    let imm_19_12 = (raw >> 12) & 0xFF;
    let imm = (imm_20 << 20) | (imm_19_12 << 12) | (imm_11 << 11) | (imm_10_1 << 1);
    sign_extend(imm, 21)
}
