//! 程序加载
//!
//! 支持三种输入格式：
//! - `elf`：32 位小端 RISC-V ELF，按 PT_LOAD 段加载
//! - `bin`：原始字节，拷贝到加载地址
//! - `hex`：每行一个十六进制 32 位字，允许 `#` 或 `//` 注释

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use elf::ElfBytes;
use elf::abi::{EM_RISCV, PF_W, PF_X, PT_LOAD};
use elf::endian::AnyEndian;
use elf::file::Class;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::memory::{FlatMemory, MemError};

/// 程序加载错误
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ELF parse error: {0}")]
    Elf(#[from] elf::ParseError),
    #[error("not a 32-bit RISC-V ELF: {0}")]
    NotRiscv32(String),
    #[error("hex line {line}: cannot parse {text:?} as a 32-bit word")]
    Hex { line: usize, text: String },
    #[error("program does not fit in memory: {0}")]
    Memory(#[from] MemError),
}

/// 磁盘上的程序格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramFormat {
    #[default]
    Elf,
    Bin,
    Hex,
}

impl ProgramFormat {
    /// 根据扩展名猜测格式，无法识别时按 ELF 处理
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => ProgramFormat::Bin,
            Some("hex") | Some("txt") => ProgramFormat::Hex,
            _ => ProgramFormat::Elf,
        }
    }
}

impl FromStr for ProgramFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elf" => Ok(ProgramFormat::Elf),
            "bin" | "binary" => Ok(ProgramFormat::Bin),
            "hex" => Ok(ProgramFormat::Hex),
            other => Err(format!("unknown program format `{other}` (expected elf, bin or hex)")),
        }
    }
}

/// 一个 PT_LOAD 段
#[derive(Debug, Clone)]
pub struct ElfSegment {
    pub vaddr: u32,
    pub file_size: usize,
    pub mem_size: usize,
    pub data: Vec<u8>,
    pub executable: bool,
    pub writable: bool,
}

#[derive(Debug, Clone)]
pub struct ElfSymbol {
    pub name: String,
    pub addr: u32,
}

/// ELF 文件中仿真器关心的部分
#[derive(Debug, Clone)]
pub struct ElfInfo {
    pub entry: u32,
    pub segments: Vec<ElfSegment>,
    /// 只保留 `tohost` 和 `fromhost`
    pub symbols: Vec<ElfSymbol>,
}

impl ElfInfo {
    /// 从文件解析 ELF
    pub fn parse(path: &Path) -> Result<Self, LoadError> {
        let data = read_file(path)?;
        Self::parse_bytes(&data)
    }

    /// 从内存中的字节解析 ELF，只接受 32 位 RISC-V
    pub fn parse_bytes(data: &[u8]) -> Result<Self, LoadError> {
        let file = ElfBytes::<AnyEndian>::minimal_parse(data)?;
        let header = &file.ehdr;

        if header.e_machine != EM_RISCV {
            return Err(LoadError::NotRiscv32(format!(
                "machine type 0x{:x}, expected 0x{:x}",
                header.e_machine, EM_RISCV
            )));
        }
        if header.class != Class::ELF32 {
            return Err(LoadError::NotRiscv32("64-bit ELF class".into()));
        }
        if header.endianness != AnyEndian::Little {
            return Err(LoadError::NotRiscv32("big-endian image".into()));
        }

        let mut segments = Vec::new();
        if let Some(phdrs) = file.segments() {
            for phdr in phdrs.iter().filter(|p| p.p_type == PT_LOAD) {
                let data = file.segment_data(&phdr)?.to_vec();
                segments.push(ElfSegment {
                    vaddr: phdr.p_vaddr as u32,
                    file_size: phdr.p_filesz as usize,
                    mem_size: phdr.p_memsz as usize,
                    data,
                    executable: phdr.p_flags & PF_X != 0,
                    writable: phdr.p_flags & PF_W != 0,
                });
            }
        }

        let mut symbols = Vec::new();
        if let Ok(Some((symtab, strtab))) = file.symbol_table() {
            for sym in symtab.iter().filter(|s| s.st_value != 0) {
                let Ok(name) = strtab.get(sym.st_name as usize) else {
                    continue;
                };
                if name == "tohost" || name == "fromhost" {
                    symbols.push(ElfSymbol {
                        name: name.to_string(),
                        addr: sym.st_value as u32,
                    });
                }
            }
        }

        Ok(ElfInfo {
            entry: header.e_entry as u32,
            segments,
            symbols,
        })
    }

    /// 按名称查找符号地址
    pub fn find_symbol(&self, name: &str) -> Option<u32> {
        self.symbols.iter().find(|s| s.name == name).map(|s| s.addr)
    }

    /// 所有段覆盖的最低地址与最高地址（不含）
    pub fn address_range(&self) -> Option<(u32, u32)> {
        let min = self.segments.iter().map(|s| s.vaddr).min()?;
        let max = self
            .segments
            .iter()
            .map(|s| s.vaddr.wrapping_add(s.mem_size as u32))
            .max()?;
        Some((min, max))
    }
}

/// 加载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedProgram {
    pub entry: u32,
    /// 写入的字节数，包括清零的 bss
    pub size: usize,
    pub tohost: Option<u32>,
    pub fromhost: Option<u32>,
}

/// 将所有段拷贝到内存，并将 bss 部分清零
pub fn load_elf(memory: &mut FlatMemory, elf: &ElfInfo) -> Result<LoadedProgram, LoadError> {
    let mut size = 0;
    for (i, seg) in elf.segments.iter().enumerate() {
        debug!(
            segment = i,
            vaddr = format_args!("0x{:08x}", seg.vaddr),
            mem_size = seg.mem_size,
            flags = format_args!(
                "{}{}",
                if seg.executable { "X" } else { "-" },
                if seg.writable { "W" } else { "R" }
            ),
            "loading segment"
        );
        memory.write_bytes(seg.vaddr, &seg.data)?;
        if seg.mem_size > seg.file_size {
            let bss_start = seg.vaddr.wrapping_add(seg.file_size as u32);
            memory.fill(bss_start, seg.mem_size - seg.file_size, 0)?;
        }
        size += seg.mem_size;
    }

    Ok(LoadedProgram {
        entry: elf.entry,
        size,
        tohost: elf.find_symbol("tohost"),
        fromhost: elf.find_symbol("fromhost"),
    })
}

/// 将原始字节拷贝到 `addr`，该地址同时作为入口
pub fn load_bin(memory: &mut FlatMemory, data: &[u8], addr: u32) -> Result<LoadedProgram, LoadError> {
    memory.write_bytes(addr, data)?;
    Ok(LoadedProgram {
        entry: addr,
        size: data.len(),
        tohost: None,
        fromhost: None,
    })
}

/// 解析十六进制字列表
///
/// ```
/// use rv32sim::loader::parse_hex;
///
/// let words = parse_hex("# program\n0x00a08113  // addi x2, x1, 10\n\n00000013,\n").unwrap();
/// assert_eq!(words, vec![0x00a0_8113, 0x0000_0013]);
/// ```
pub fn parse_hex(text: &str) -> Result<Vec<u32>, LoadError> {
    let mut words = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let code = line
            .split("//")
            .next()
            .and_then(|s| s.split('#').next())
            .unwrap_or("")
            .trim()
            .trim_end_matches(',')
            .trim();
        if code.is_empty() {
            continue;
        }

        let digits = code
            .strip_prefix("0x")
            .or_else(|| code.strip_prefix("0X"))
            .unwrap_or(code)
            .replace('_', "");
        let word = u32::from_str_radix(&digits, 16).map_err(|_| LoadError::Hex {
            line: idx + 1,
            text: code.to_string(),
        })?;
        words.push(word);
    }
    Ok(words)
}

/// 将十六进制字列表写入 `addr`，该地址同时作为入口
pub fn load_hex(memory: &mut FlatMemory, text: &str, addr: u32) -> Result<LoadedProgram, LoadError> {
    let words = parse_hex(text)?;
    memory.write_words(addr, &words)?;
    Ok(LoadedProgram {
        entry: addr,
        size: words.len() * 4,
        tohost: None,
        fromhost: None,
    })
}

/// 读取 `path` 并按指定格式加载
///
/// `load_addr` 只用于 `bin` 和 `hex` 格式，ELF 自带地址。
pub fn load_program(
    memory: &mut FlatMemory,
    path: &Path,
    format: ProgramFormat,
    load_addr: u32,
) -> Result<LoadedProgram, LoadError> {
    let loaded = match format {
        ProgramFormat::Elf => load_elf(memory, &ElfInfo::parse(path)?)?,
        ProgramFormat::Bin => load_bin(memory, &read_file(path)?, load_addr)?,
        ProgramFormat::Hex => {
            let text = String::from_utf8_lossy(&read_file(path)?).into_owned();
            load_hex(memory, &text, load_addr)?
        }
    };
    info!(
        path = %path.display(),
        ?format,
        entry = format_args!("0x{:08x}", loaded.entry),
        size = loaded.size,
        "program loaded"
    );
    Ok(loaded)
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
