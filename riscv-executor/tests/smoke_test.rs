use std::ops::ControlFlow;

use fibreg_core::{FibonacciState, IterationLimit, PinnedRegisters, SmokeTest};
use fibreg_riscv_executor::{
    execute, DelayCountOutOfRange, ExecutionError, ExecutionOptions, Machine, Program, Register,
    RegisterFile, RegisterWrite,
};
use test_log::test;

fn run(delay_count: u32, samples: usize) -> fibreg_riscv_executor::Execution {
    execute(
        &Program::smoke_test(delay_count).unwrap(),
        ExecutionOptions {
            samples,
            max_cycles: Some(10_000_000),
        },
    )
    .unwrap()
}

#[test]
fn first_terms() {
    let execution = run(3, 7);
    let currents: Vec<_> = execution
        .samples
        .iter()
        .map(|s| s.state.current)
        .collect();
    assert_eq!(currents, [1, 1, 2, 3, 5, 8, 13]);
    assert_eq!(execution.samples[0].state, FibonacciState::INITIAL);
    fibreg_riscv_executor::verify(&execution.samples).unwrap();
}

#[test]
fn pacing() {
    // Seed: lui, addi (sp), li s11, li s9.
    let execution = run(3, 5);
    assert_eq!(execution.samples[0].cycle, 4);
    // mv, jal, li t0, 3 per delay iteration, final bge, ret, add, sub, j.
    assert_eq!(execution.cycles_per_iteration(), Some(3 * 3 + 8));

    let execution = run(0, 5);
    assert_eq!(execution.cycles_per_iteration(), Some(8));

    let execution = run(1000, 3);
    assert_eq!(execution.cycles_per_iteration(), Some(3 * 1000 + 8));
}

#[test]
fn wraps_like_the_host_model() {
    // F(47) no longer fits in an i32.
    let execution = run(0, 60);
    fibreg_riscv_executor::verify(&execution.samples).unwrap();
    assert!(execution.samples.iter().any(|s| s.state.current < 0));

    let regs = PinnedRegisters::new();
    let mut smoke = SmokeTest::new(&regs, 0);
    smoke.run_until(&mut IterationLimit(59));
    assert_eq!(execution.samples.last().unwrap().state, regs.load());
    assert_eq!(
        execution.final_registers[Register::CURRENT] as i32,
        regs.current.get()
    );
}

#[test]
fn delay_never_touches_the_pinned_registers() {
    let program = Program::smoke_test(25).unwrap();
    let (delay_start, delay_end) = program.delay_routine().unwrap();
    let mut machine = Machine::new(&program);
    let mut steps = 0;
    let mut inspector = |write: &RegisterWrite, regs: &RegisterFile| {
        if (delay_start..delay_end).contains(&write.pc) {
            assert!(
                ![Register::CURRENT, Register::PREVIOUS, Register::DELAY].contains(&write.reg),
                "delay routine wrote {} at {:#x}",
                write.reg,
                write.pc
            );
        }
        if write.reg == Register::PREVIOUS {
            steps += 1;
        }
        if write.cycle > 4 {
            assert_eq!(regs[Register::DELAY], 25);
        }
        if steps == 20 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    machine.run(&mut inspector, Some(1_000_000)).unwrap();
}

#[test]
fn cycle_limit_is_an_error() {
    let result = execute(
        &Program::smoke_test(10_000).unwrap(),
        ExecutionOptions {
            samples: 3,
            max_cycles: Some(1_000),
        },
    );
    assert_eq!(result, Err(ExecutionError::CycleLimit { limit: 1_000 }));
}

#[test]
fn default_delay_count_is_baked_in() {
    let program = Program::smoke_test(fibreg_core::DELAY_COUNT).unwrap();
    let mut machine = Machine::new(&program);
    // Run through the prologue only.
    for _ in 0..6 {
        machine.step().unwrap();
    }
    assert_eq!(machine.registers()[Register::DELAY], 10_000_000);
    assert_eq!(machine.registers()[Register::CURRENT], 1);
    assert_eq!(machine.registers()[Register::PREVIOUS], 0);
    assert_eq!(
        machine.registers()[Register::SP],
        fibreg_riscv_executor::STACK_TOP
    );
    assert_eq!(machine.pc(), program.symbol("fibreg_main_loop").unwrap());
}

#[test]
fn delay_count_must_fit_the_signed_compare() {
    let program = Program::smoke_test(i32::MAX as u32).unwrap();
    let mut machine = Machine::new(&program);
    for _ in 0..6 {
        machine.step().unwrap();
    }
    assert_eq!(machine.registers()[Register::DELAY], 0x7fff_ffff);
    // First trip through the delay loop: the signed compare does not exit.
    for _ in 0..6 {
        machine.step().unwrap();
    }
    assert_eq!(machine.registers()[Register::T0], 1);

    assert_eq!(
        Program::smoke_test(i32::MAX as u32 + 1).unwrap_err(),
        DelayCountOutOfRange(0x8000_0000)
    );
    assert!(Program::smoke_test(u32::MAX).is_err());
}
