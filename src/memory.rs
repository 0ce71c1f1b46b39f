//! 内存抽象层
//!
//! 取指和访存都只经过 `Memory` trait。
//! `FlatMemory` 是映射到某个基地址、带越界检查的线性字节数组。

use thiserror::Error;

/// 访存粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSize {
    Byte,
    Half,
    Word,
}

impl AccessSize {
    pub fn bytes(self) -> usize {
        match self {
            AccessSize::Byte => 1,
            AccessSize::Half => 2,
            AccessSize::Word => 4,
        }
    }
}

/// 内存访问错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemError {
    /// 地址未按访问粒度对齐
    #[error("unaligned {access:?} access at 0x{addr:08x}")]
    Unaligned { addr: u32, access: AccessSize },
    /// 地址越界（不在当前内存区域内）
    #[error("out-of-range {access:?} access at 0x{addr:08x} (region base=0x{base:08x} size=0x{size:x})")]
    OutOfRange {
        addr: u32,
        access: AccessSize,
        base: u32,
        size: usize,
    },
}

pub type MemResult<T> = Result<T, MemError>;

/// 内存访问的统一接口，全部小端序
pub trait Memory {
    fn load8(&self, addr: u32) -> MemResult<u8>;

    fn load16(&self, addr: u32) -> MemResult<u16>;

    fn load32(&self, addr: u32) -> MemResult<u32>;

    fn store8(&mut self, addr: u32, value: u8) -> MemResult<()>;

    fn store16(&mut self, addr: u32, value: u16) -> MemResult<()>;

    fn store32(&mut self, addr: u32, value: u32) -> MemResult<()>;
}

/// 平坦内存，由 `Vec<u8>` 承载，映射到 `base_addr`
///
/// 半字和字访问必须自然对齐。
pub struct FlatMemory {
    data: Vec<u8>,
    base_addr: u32,
}

impl FlatMemory {
    /// 创建从 `base_addr` 开始、大小为 `size` 字节的清零内存
    ///
    /// ```
    /// use rv32sim::memory::FlatMemory;
    ///
    /// let mem = FlatMemory::new(64 * 1024, 0);
    /// assert_eq!(mem.size(), 64 * 1024);
    /// ```
    pub fn new(size: usize, base_addr: u32) -> Self {
        FlatMemory {
            data: vec![0; size],
            base_addr,
        }
    }

    /// 获取内存基地址
    pub fn base_addr(&self) -> u32 {
        self.base_addr
    }

    /// 获取内存大小（字节）
    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn ensure_aligned(addr: u32, access: AccessSize) -> MemResult<()> {
        match access {
            AccessSize::Byte => Ok(()),
            AccessSize::Half if addr & 1 == 0 => Ok(()),
            AccessSize::Word if addr & 3 == 0 => Ok(()),
            _ => Err(MemError::Unaligned { addr, access }),
        }
    }

    /// 检查 `[addr, addr + len)` 是否落在本区域内，返回相对偏移
    fn bounds_check(&self, addr: u32, len: usize, access: AccessSize) -> MemResult<usize> {
        let out_of_range = MemError::OutOfRange {
            addr,
            access,
            base: self.base_addr,
            size: self.data.len(),
        };

        let relative = addr.checked_sub(self.base_addr).ok_or(out_of_range)? as usize;
        let end = relative.checked_add(len).ok_or(out_of_range)?;
        if end > self.data.len() {
            return Err(out_of_range);
        }
        Ok(relative)
    }

    fn checked_index(&self, addr: u32, access: AccessSize) -> MemResult<usize> {
        Self::ensure_aligned(addr, access)?;
        self.bounds_check(addr, access.bytes(), access)
    }

    /// 从 `addr` 开始批量写入字节
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> MemResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let start = self.bounds_check(addr, data.len(), AccessSize::Byte)?;
        self.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// 从 `addr` 开始读取 `len` 个字节
    pub fn read_bytes(&self, addr: u32, len: usize) -> MemResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let start = self.bounds_check(addr, len, AccessSize::Byte)?;
        Ok(self.data[start..start + len].to_vec())
    }

    /// 用 `value` 填充 `[addr, addr + len)`，用于 bss 清零等场景
    pub fn fill(&mut self, addr: u32, len: usize, value: u8) -> MemResult<()> {
        if len == 0 {
            return Ok(());
        }
        let start = self.bounds_check(addr, len, AccessSize::Byte)?;
        self.data[start..start + len].fill(value);
        Ok(())
    }

    /// 从 `addr` 开始按小端序写入一串 32 位字
    pub fn write_words(&mut self, addr: u32, words: &[u32]) -> MemResult<()> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.write_bytes(addr, &bytes)
    }
}

impl Memory for FlatMemory {
    fn load8(&self, addr: u32) -> MemResult<u8> {
        let idx = self.checked_index(addr, AccessSize::Byte)?;
        Ok(self.data[idx])
    }

    fn load16(&self, addr: u32) -> MemResult<u16> {
        let idx = self.checked_index(addr, AccessSize::Half)?;
        Ok(u16::from_le_bytes([self.data[idx], self.data[idx + 1]]))
    }

    fn load32(&self, addr: u32) -> MemResult<u32> {
        let idx = self.checked_index(addr, AccessSize::Word)?;
        Ok(u32::from_le_bytes([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]))
    }

    fn store8(&mut self, addr: u32, value: u8) -> MemResult<()> {
        let idx = self.checked_index(addr, AccessSize::Byte)?;
        self.data[idx] = value;
        Ok(())
    }

    fn store16(&mut self, addr: u32, value: u16) -> MemResult<()> {
        let idx = self.checked_index(addr, AccessSize::Half)?;
        self.data[idx..idx + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn store32(&mut self, addr: u32, value: u32) -> MemResult<()> {
        let idx = self.checked_index(addr, AccessSize::Word)?;
        self.data[idx..idx + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}
