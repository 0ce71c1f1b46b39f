//! 通过公开 API 运行完整程序的集成测试

use std::sync::Arc;

use rv32sim::cpu::{CpuCore, CpuState, DispatchTable, TrapCause};
use rv32sim::isa::{self, InstrFormat, OP_IMM, OP_STORE, encode::*};
use rv32sim::memory::{FlatMemory, MemError, Memory};
use rv32sim::sim_env::{ResultProbe, RunOutcome, SimConfig, SimEnv};

fn single_step(cpu: &mut CpuCore, mem: &mut FlatMemory, raw: u32) -> CpuState {
    mem.store32(cpu.pc(), raw).unwrap();
    cpu.step(mem)
}

#[test]
fn addi_with_preloaded_register() {
    let mut mem = FlatMemory::new(0x100, 0);
    let mut cpu = CpuCore::new(0);
    cpu.write_reg(1, 5);

    let state = single_step(&mut cpu, &mut mem, encode_i(OP_IMM, 2, 0, 1, 10));
    assert_eq!(state, CpuState::Running);
    assert_eq!(cpu.read_reg(2), 15);
}

#[test]
fn every_rd_zero_instruction_leaves_x0_zero() {
    let mut mem = FlatMemory::new(0x100, 0);
    let mut cpu = CpuCore::new(0);
    cpu.write_reg(1, 0x1234);

    for raw in [
        addi(0, 1, 1),
        add(0, 1, 1),
        lui(0, 0x7000),
        auipc(0, 0x1000),
        lw(0, 0, 0x40),
        jal(0, 4),
    ] {
        assert_eq!(single_step(&mut cpu, &mut mem, raw), CpuState::Running);
        assert_eq!(cpu.read_reg(0), 0, "{}", isa::decode(raw));
    }
}

#[test]
fn store_word_with_preloaded_registers() {
    let mut mem = FlatMemory::new(0x2000, 0);
    let mut cpu = CpuCore::new(0);
    cpu.write_reg(1, 0x1000);
    cpu.write_reg(2, 0xDEAD_BEEF);

    let raw = encode_s(OP_STORE, 0b010, 1, 2, 4);
    assert_eq!(single_step(&mut cpu, &mut mem, raw), CpuState::Running);
    assert_eq!(mem.load32(0x1004).unwrap(), 0xDEAD_BEEF);
}

#[test]
fn reserved_opcode_is_illegal() {
    let mut mem = FlatMemory::new(0x100, 0);
    let mut cpu = CpuCore::new(0);

    let state = single_step(&mut cpu, &mut mem, 0b101_0111);
    let trap = state.trap().expect("core should halt");
    assert_eq!(trap.cause, TrapCause::IllegalInstruction);
    assert_eq!(trap.cause.code(), 2);
}

#[test]
fn store_outside_memory_is_a_fault() {
    let mut mem = FlatMemory::new(0x100, 0);
    let mut cpu = CpuCore::new(0);
    cpu.write_reg(1, 0x4000);

    let state = single_step(&mut cpu, &mut mem, sw(1, 0, 0));
    let trap = state.trap().expect("core should halt");
    assert!(matches!(
        trap.cause,
        TrapCause::StoreFault(MemError::OutOfRange { addr: 0x4000, .. })
    ));
}

#[test]
fn decode_round_trips_and_sign_extends() {
    let d = isa::decode(encode_i(OP_IMM, 7, 0, 3, 0xFFF_u32 as i32 - 0x1000));
    assert_eq!(d.format, InstrFormat::I);
    assert_eq!(d.i_imm, -1);

    let d = isa::decode(encode_s(OP_STORE, 0b010, 9, 10, -20));
    assert_eq!((d.rs1, d.rs2, d.funct3, d.s_imm), (9, 10, 0b010, -20));
}

/// addi x1, x0, 42 / sw x1, 0x100(x0) / 循环直到读回写入的值
#[test]
fn three_instruction_program_runs_to_completion() {
    let program = [
        addi(1, 0, 42),
        sw(0, 1, 0x100),
        lw(2, 0, 0x100),
        bne(1, 2, -4),
        jal(0, 0),
    ];
    let config = SimConfig::new()
        .with_memory(0, 0x400)
        .with_max_cycles(16)
        .with_probe(ResultProbe::Sentinel {
            addr: 0x100,
            value: 42,
        });
    let mut env = SimEnv::from_words(config, &program).unwrap();

    assert_eq!(env.run_to_completion(), RunOutcome::Passed);
    assert_eq!(env.cycles(), 2);

    // 让检查循环跑完，再比较快照
    let (_, state) = env.run(3);
    assert_eq!(state, CpuState::Running);

    let mut expected = [0u32; 32];
    expected[1] = 42;
    expected[2] = 42;
    assert_eq!(env.cpu().regs(), &expected);
    assert_eq!(env.cpu().pc(), 16);
    assert_eq!(env.memory().load32(0x100).unwrap(), 42);
    assert_eq!(env.memory().read_bytes(0x104, 4).unwrap(), vec![0; 4]);
}

#[test]
fn program_without_probe_hits_cycle_limit() {
    let config = SimConfig::new().with_memory(0, 0x100).with_max_cycles(25);
    let mut env = SimEnv::from_words(config, &[addi(1, 1, 1), jal(0, -4)]).unwrap();

    assert_eq!(env.run_to_completion(), RunOutcome::CycleLimit);
    assert_eq!(env.cycles(), 25);
    assert_eq!(env.cpu().read_reg(1), 13);
}

#[test]
fn hex_program_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let program = dir.path().join("sum.hex");
    let words = [
        addi(1, 0, 0),
        addi(2, 0, 1),
        addi(3, 0, 11),
        add(1, 1, 2),
        addi(2, 2, 1),
        blt(2, 3, -8),
        sw(0, 1, 0x200),
        jal(0, 0),
    ];
    let text: String = words.iter().map(|w| format!("{w:08x}\n")).collect();
    std::fs::write(&program, format!("# sum 1..10\n{text}")).unwrap();

    let config_path = dir.path().join("sim.toml");
    std::fs::write(
        &config_path,
        format!(
            "program = {:?}\nmax_cycles = 200\n\n[memory]\nsize = 0x1000\n\n\
             [result]\nkind = \"sentinel\"\naddr = 0x200\nvalue = 55\n",
            program.display().to_string()
        ),
    )
    .unwrap();

    let config = SimConfig::from_file(&config_path).unwrap();
    let mut env = SimEnv::from_config(config).unwrap();
    assert_eq!(env.run_to_completion(), RunOutcome::Passed);
    assert_eq!(env.cpu().read_reg(1), 55);
}

#[test]
fn raw_binary_with_tohost_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fail.bin");
    let words = [addi(1, 0, (2 << 1) | 1), sw(0, 1, 0x80), jal(0, 0)];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(&path, bytes).unwrap();

    let config = SimConfig::new()
        .with_program(&path)
        .with_memory(0, 0x100)
        .with_probe(ResultProbe::ToHost { addr: 0x80 });
    let mut env = SimEnv::from_config(config).unwrap();

    let outcome = env.run_to_completion();
    assert_eq!(outcome, RunOutcome::Failed(2));
    assert!(!outcome.is_success());
}

#[test]
fn fault_is_distinguished_from_pass() {
    let config = SimConfig::new()
        .with_memory(0, 0x100)
        .with_probe(ResultProbe::Sentinel { addr: 0x80, value: 1 });
    // 从内存末尾之外读取
    let mut env = SimEnv::from_words(config, &[lui(1, 0x1000), lw(2, 1, 0)]).unwrap();

    match env.run_to_completion() {
        RunOutcome::Crashed(trap) => {
            assert!(trap.is_memory_fault());
            assert_eq!(trap.pc, 4);
            assert_eq!(trap.raw, lw(2, 1, 0));
        }
        other => panic!("expected a crash, got {other}"),
    }
}

#[test]
fn shared_dispatch_table_across_cores() {
    let table = Arc::new(DispatchTable::rv32i());
    let mut mem = FlatMemory::new(0x100, 0);
    mem.write_words(0, &[addi(1, 0, 7)]).unwrap();

    let mut a = CpuCore::with_table(0, Arc::clone(&table));
    let mut b = CpuCore::with_table(0, table);
    a.step(&mut mem);
    b.step(&mut mem);
    assert_eq!(a.read_reg(1), 7);
    assert_eq!(b.read_reg(1), 7);
}
