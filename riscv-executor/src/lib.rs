//! A small RV32I executor for running the Fibonacci smoke test and
//! watching its pinned registers from the outside.
//!
//! The executor plays the part of the simulator the smoke test was written
//! for: it runs the guest image instruction by instruction and lets an
//! [`Inspector`] sample the register file between instructions, without the
//! guest noticing.

pub mod asm;
mod error;
mod machine;
mod memory;
mod probe;
mod program;
mod register;

use itertools::Itertools;

pub use error::{DelayCountOutOfRange, ElfError, ExecutionError, Mismatch, Trap};
pub use machine::{Inspector, Machine, RegisterWrite};
pub use memory::Memory;
pub use probe::{verify, FibonacciProbe, Sample};
pub use program::{Program, Segment, RAM_SIZE, STACK_BOTTOM, STACK_TOP, TEXT_BASE};
pub use register::{Register, RegisterFile, RegisterParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Number of `(current, previous)` samples to collect, including the
    /// seed.
    pub samples: usize,
    /// Abort once this many instructions have retired.
    pub max_cycles: Option<u64>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            samples: 10,
            max_cycles: None,
        }
    }
}

/// Result of a bounded run of the smoke test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub samples: Vec<Sample>,
    pub cycles: u64,
    pub final_registers: RegisterFile,
}

impl Execution {
    /// Cycles between consecutive samples; constant for a fixed delay count.
    pub fn cycles_per_iteration(&self) -> Option<u64> {
        self.samples
            .iter()
            .skip(1)
            .tuple_windows()
            .map(|(a, b)| b.cycle - a.cycle)
            .dedup()
            .exactly_one()
            .ok()
    }
}

/// Runs `program` until the probe has collected `options.samples` samples.
pub fn execute(program: &Program, options: ExecutionOptions) -> Result<Execution, ExecutionError> {
    log::info!(
        "Executing from {:#010x}, collecting {} samples",
        program.entry,
        options.samples
    );
    let mut machine = Machine::new(program);
    let mut probe = FibonacciProbe::new(options.samples);
    let cycles = if probe.is_done() {
        0
    } else {
        machine.run(&mut probe, options.max_cycles)?
    };
    log::info!("Execution stopped after {cycles} cycles");

    Ok(Execution {
        samples: probe.into_samples(),
        cycles,
        final_registers: machine.registers().clone(),
    })
}

/// One decoded line per word of `program`.
pub fn disassemble(program: &Program) -> Vec<(u32, Result<String, ExecutionError>)> {
    let mut memory = Memory::new();
    for segment in &program.segments {
        memory.write_bytes(segment.address, &segment.data);
    }
    program
        .words()
        .map(|(addr, _)| {
            let line = machine::fetch(&memory, addr).map(|insn| {
                let operands = [insn.rd, insn.rs1, insn.rs2]
                    .into_iter()
                    .flatten()
                    .map(|r| Register::new(r as u8).to_string())
                    .chain(insn.imm.map(|imm| imm.to_string()))
                    .join(", ");
                format!("{:?} {operands}", insn.opc).to_lowercase()
            });
            (addr, line)
        })
        .collect()
}
