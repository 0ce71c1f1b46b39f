//! rv32sim：单 hart 的 RV32I 指令集模拟器
//!
//! # 模块
//!
//! - `isa`：字段提取、opcode 分类、解码与编码
//! - `cpu`：CPU 核心、分发表、执行单元与 trap
//! - `memory`：内存接口与平坦内存实现
//! - `loader`：ELF / 裸二进制 / hex 程序加载
//! - `sim_env`：仿真配置、结果探针、运行至结束
//!
//! 每条指令执行时都会以 `trace` 级别记录日志，
//! 安装 `tracing` subscriber 即可看到。

pub mod cpu;
pub mod isa;
pub mod loader;
pub mod memory;
pub mod sim_env;
