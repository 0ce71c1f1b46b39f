//! 整数寄存器文件

/// 通用寄存器数量
pub const NUM_REGS: usize = 32;

/// ABI 名称，按寄存器编号索引
pub const ABI_NAMES: [&str; NUM_REGS] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// 寄存器 x0..x31
///
/// x0 硬连线为 0：读取恒为 0，写入被丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegFile {
    regs: [u32; NUM_REGS],
}

impl RegFile {
    /// 创建全零的寄存器文件
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGS],
        }
    }

    /// 读取寄存器，只使用 `reg` 的低 5 位
    #[inline]
    pub fn read(&self, reg: u8) -> u32 {
        self.regs[(reg & 0x1F) as usize]
    }

    #[inline]
    /// 写入寄存器，写 x0 时丢弃
    pub fn write(&mut self, reg: u8, value: u32) {
        let reg = (reg & 0x1F) as usize;
        if reg != 0 {
            self.regs[reg] = value;
        }
    }

    /// 获取全部寄存器的快照
    pub fn snapshot(&self) -> &[u32; NUM_REGS] {
        &self.regs
    }
}

impl Default for RegFile {
    fn default() -> Self {
        Self::new()
    }
}
