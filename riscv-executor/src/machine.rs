use std::ops::ControlFlow;

use raki::{
    decode::Decode,
    instruction::{Instruction as Ins, OpcodeKind as Op},
    Isa,
};

use crate::error::{ExecutionError, Trap};
use crate::memory::Memory;
use crate::program::{Program, STACK_TOP};
use crate::register::{Register, RegisterFile};

/// The canonical `unimp` encoding (`csrrw x0, cycle, x0`).
const UNIMP: u32 = 0xc000_1073;

/// A register write performed by the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    /// Instructions retired so far, including the one that wrote.
    pub cycle: u64,
    /// Address of the writing instruction.
    pub pc: u32,
    pub reg: Register,
    pub value: u32,
}

/// Observes the register file from outside the guest, between instructions.
pub trait Inspector {
    /// Called after every instruction that writes a register other than
    /// `x0`. Returning `Break` stops the machine.
    fn register_written(&mut self, write: &RegisterWrite, regs: &RegisterFile)
        -> ControlFlow<()>;
}

impl<F: FnMut(&RegisterWrite, &RegisterFile) -> ControlFlow<()>> Inspector for F {
    fn register_written(
        &mut self,
        write: &RegisterWrite,
        regs: &RegisterFile,
    ) -> ControlFlow<()> {
        self(write, regs)
    }
}

/// A single-hart RV32I machine.
pub struct Machine {
    regs: RegisterFile,
    pc: u32,
    memory: Memory,
    cycles: u64,
}

impl Machine {
    /// Loads `program` and points `pc` at its entry. `sp` starts at
    /// [`STACK_TOP`] in case the program does not set it up itself.
    pub fn new(program: &Program) -> Self {
        let mut memory = Memory::new();
        for segment in &program.segments {
            memory.write_bytes(segment.address, &segment.data);
        }
        let mut regs = RegisterFile::new();
        regs.set(Register::SP, STACK_TOP);
        Machine {
            regs,
            pc: program.entry,
            memory,
            cycles: 0,
        }
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Executes instructions until the inspector breaks or `cycle_limit`
    /// instructions have retired in total. Returns the cycle count.
    pub fn run(
        &mut self,
        inspector: &mut impl Inspector,
        cycle_limit: Option<u64>,
    ) -> Result<u64, ExecutionError> {
        loop {
            if let Some(limit) = cycle_limit {
                if self.cycles >= limit {
                    return Err(ExecutionError::CycleLimit { limit });
                }
            }
            if let Some(write) = self.step()? {
                if inspector.register_written(&write, &self.regs).is_break() {
                    log::debug!("inspector stopped the machine at cycle {}", self.cycles);
                    return Ok(self.cycles);
                }
            }
        }
    }

    /// Executes one instruction. Returns the register write it made, if any.
    pub fn step(&mut self) -> Result<Option<RegisterWrite>, ExecutionError> {
        let pc = self.pc;
        let insn = fetch(&self.memory, pc)?;
        let (rd, value, next_pc) = self.execute(pc, &insn)?;

        self.pc = next_pc;
        self.cycles += 1;

        Ok(match rd {
            Some(reg) if !reg.is_zero() => {
                self.regs.set(reg, value);
                log::trace!("{pc:#010x}: {reg} <- {value:#010x}");
                Some(RegisterWrite {
                    cycle: self.cycles,
                    pc,
                    reg,
                    value,
                })
            }
            _ => None,
        })
    }

    /// Returns the destination register with its new value, and the next pc.
    fn execute(
        &mut self,
        pc: u32,
        insn: &Ins,
    ) -> Result<(Option<Register>, u32, u32), ExecutionError> {
        let rd = insn.rd.map(|r| Register::new(r as u8));
        let rs1 = self.operand(insn.rs1);
        let rs2 = self.operand(insn.rs2);
        let imm = insn.imm.unwrap_or(0);
        let uimm = imm as u32;
        let next = pc.wrapping_add(4);
        let branch = |taken: bool| if taken { pc.wrapping_add(uimm) } else { next };

        let (value, next_pc) = match insn.opc {
            Op::LUI => (uimm, next),
            Op::AUIPC => (pc.wrapping_add(uimm), next),
            Op::JAL => (next, pc.wrapping_add(uimm)),
            Op::JALR => (next, rs1.wrapping_add(uimm) & !1),

            Op::BEQ => return Ok((None, 0, branch(rs1 == rs2))),
            Op::BNE => return Ok((None, 0, branch(rs1 != rs2))),
            Op::BLT => return Ok((None, 0, branch((rs1 as i32) < (rs2 as i32)))),
            Op::BGE => return Ok((None, 0, branch((rs1 as i32) >= (rs2 as i32)))),
            Op::BLTU => return Ok((None, 0, branch(rs1 < rs2))),
            Op::BGEU => return Ok((None, 0, branch(rs1 >= rs2))),

            Op::LB => (self.memory.load_byte(rs1.wrapping_add(uimm)) as i8 as u32, next),
            Op::LH => (
                self.memory.load_half(rs1.wrapping_add(uimm))? as i16 as u32,
                next,
            ),
            Op::LW => (self.memory.load_word(rs1.wrapping_add(uimm))?, next),
            Op::LBU => (self.memory.load_byte(rs1.wrapping_add(uimm)) as u32, next),
            Op::LHU => (self.memory.load_half(rs1.wrapping_add(uimm))? as u32, next),

            Op::SB => {
                self.memory.store_byte(rs1.wrapping_add(uimm), rs2 as u8);
                return Ok((None, 0, next));
            }
            Op::SH => {
                self.memory
                    .store_half(rs1.wrapping_add(uimm), rs2 as u16)?;
                return Ok((None, 0, next));
            }
            Op::SW => {
                self.memory.store_word(rs1.wrapping_add(uimm), rs2)?;
                return Ok((None, 0, next));
            }

            Op::ADDI => (rs1.wrapping_add(uimm), next),
            Op::SLTI => (((rs1 as i32) < imm) as u32, next),
            Op::SLTIU => ((rs1 < uimm) as u32, next),
            Op::XORI => (rs1 ^ uimm, next),
            Op::ORI => (rs1 | uimm, next),
            Op::ANDI => (rs1 & uimm, next),
            Op::SLLI => (rs1 << (uimm & 0x1f), next),
            Op::SRLI => (rs1 >> (uimm & 0x1f), next),
            Op::SRAI => (((rs1 as i32) >> (uimm & 0x1f)) as u32, next),

            Op::ADD => (rs1.wrapping_add(rs2), next),
            Op::SUB => (rs1.wrapping_sub(rs2), next),
            Op::SLL => (rs1 << (rs2 & 0x1f), next),
            Op::SLT => (((rs1 as i32) < (rs2 as i32)) as u32, next),
            Op::SLTU => ((rs1 < rs2) as u32, next),
            Op::XOR => (rs1 ^ rs2, next),
            Op::SRL => (rs1 >> (rs2 & 0x1f), next),
            Op::SRA => (((rs1 as i32) >> (rs2 & 0x1f)) as u32, next),
            Op::OR => (rs1 | rs2, next),
            Op::AND => (rs1 & rs2, next),

            // Single hart, no caches: nothing to order.
            Op::FENCE => return Ok((None, 0, next)),
            Op::ECALL => {
                return Err(ExecutionError::Trap {
                    pc,
                    trap: Trap::Ecall,
                })
            }
            Op::EBREAK => {
                return Err(ExecutionError::Trap {
                    pc,
                    trap: Trap::Ebreak,
                })
            }
            ref other => {
                return Err(ExecutionError::UnsupportedInstruction {
                    pc,
                    mnemonic: format!("{other:?}").to_lowercase(),
                })
            }
        };

        if next_pc % 4 != 0 {
            return Err(ExecutionError::MisalignedFetch { pc: next_pc });
        }
        Ok((rd, value, next_pc))
    }

    fn operand(&self, reg: Option<usize>) -> u32 {
        reg.map(|r| self.regs.get(Register::new(r as u8)))
            .unwrap_or(0)
    }
}

pub(crate) fn fetch(memory: &Memory, pc: u32) -> Result<Ins, ExecutionError> {
    if pc % 4 != 0 {
        return Err(ExecutionError::MisalignedFetch { pc });
    }
    let word = memory.load_word(pc)?;
    if word == UNIMP || word & 0xffff == 0 {
        return Err(ExecutionError::Trap {
            pc,
            trap: Trap::Unimp,
        });
    }
    if word & 0b11 != 0b11 {
        return Err(ExecutionError::CompressedInstruction {
            pc,
            half: word as u16,
        });
    }
    word.decode(Isa::Rv32)
        .map_err(|_| ExecutionError::IllegalInstruction { pc, word })
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::asm::{addi, bge, j, lui};
    use crate::program::{Segment, TEXT_BASE};

    fn program(code: &[u32]) -> Program {
        Program {
            entry: TEXT_BASE,
            segments: vec![Segment {
                address: TEXT_BASE,
                data: code.iter().flat_map(|w| w.to_le_bytes()).collect(),
            }],
            symbols: Default::default(),
        }
    }

    fn run_to_trap(machine: &mut Machine) -> ExecutionError {
        let mut ignore = |_: &RegisterWrite, _: &RegisterFile| ControlFlow::Continue(());
        machine.run(&mut ignore, Some(1000)).unwrap_err()
    }

    #[test]
    fn arithmetic() {
        let a0 = Register::A0;
        let t0 = Register::T0;
        let mut machine = Machine::new(&program(&[
            addi(a0, Register::ZERO, -5),
            lui(t0, 0x80000),
            crate::asm::add(t0, t0, t0),
            0x0000_0073, // ecall
        ]));
        assert_eq!(
            run_to_trap(&mut machine),
            ExecutionError::Trap {
                pc: TEXT_BASE + 12,
                trap: Trap::Ecall
            }
        );
        assert_eq!(machine.registers()[a0], (-5i32) as u32);
        // 0x80000000 + 0x80000000 wraps to zero.
        assert_eq!(machine.registers()[t0], 0);
        assert_eq!(machine.cycles(), 3);
    }

    #[test]
    fn signed_branch() {
        let t0 = Register::T0;
        let a0 = Register::A0;
        // t0 = 0; a0 = -1; bge t0, a0 taken -> skips the addi.
        let mut machine = Machine::new(&program(&[
            addi(a0, Register::ZERO, -1),
            bge(t0, a0, 8),
            addi(t0, t0, 1),
            0x0010_0073, // ebreak
        ]));
        assert_eq!(
            run_to_trap(&mut machine),
            ExecutionError::Trap {
                pc: TEXT_BASE + 12,
                trap: Trap::Ebreak
            }
        );
        assert_eq!(machine.registers()[t0], 0);
    }

    #[test]
    fn writes_to_zero_are_invisible() {
        let mut machine = Machine::new(&program(&[addi(Register::ZERO, Register::ZERO, 7)]));
        assert_eq!(machine.step(), Ok(None));
        assert_eq!(machine.registers()[Register::ZERO], 0);
        assert_eq!(machine.pc(), TEXT_BASE + 4);
    }

    #[test]
    fn loads_and_stores() {
        let t0 = Register::T0;
        let a0 = Register::A0;
        // sw t0, 0(a0); lbu a1, 1(a0); lb a2, 1(a0)
        let sw = 0x0055_2023;
        let lbu = 0x0015_4583;
        let lb = 0x0015_0603;
        let mut machine = Machine::new(&program(&[
            lui(a0, 0x2),
            addi(t0, Register::ZERO, -256), // 0xffffff00
            sw,
            lbu,
            lb,
            0x0000_0073,
        ]));
        run_to_trap(&mut machine);
        assert_eq!(machine.memory().load_word(0x2000), Ok(0xffff_ff00));
        assert_eq!(machine.registers()[Register::new(11)], 0xff);
        assert_eq!(machine.registers()[Register::new(12)], 0xffff_ffff);
    }

    #[test]
    fn unimp_and_empty_memory_trap() {
        let mut machine = Machine::new(&program(&[UNIMP]));
        assert_eq!(
            machine.step(),
            Err(ExecutionError::Trap {
                pc: TEXT_BASE,
                trap: Trap::Unimp
            })
        );
        // Running off the end of the image lands on zero-filled memory.
        let mut machine = Machine::new(&program(&[j(4)]));
        machine.step().unwrap();
        assert!(matches!(
            machine.step(),
            Err(ExecutionError::Trap {
                trap: Trap::Unimp,
                ..
            })
        ));
    }

    #[test]
    fn cycle_limit() {
        let mut machine = Machine::new(&program(&[j(0)]));
        let mut ignore = |_: &RegisterWrite, _: &RegisterFile| ControlFlow::Continue(());
        assert_eq!(
            machine.run(&mut ignore, Some(50)),
            Err(ExecutionError::CycleLimit { limit: 50 })
        );
        assert_eq!(machine.cycles(), 50);
    }

    #[test]
    fn inspector_sees_writes_and_can_stop() {
        let a0 = Register::A0;
        let mut machine = Machine::new(&program(&[
            addi(a0, a0, 1),
            j(-4),
        ]));
        let mut seen = vec![];
        let mut inspector = |write: &RegisterWrite, regs: &RegisterFile| {
            assert_eq!(regs[write.reg], write.value);
            seen.push(write.value);
            if write.value == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        // `j` writes x0 only, so the inspector is called for the addi alone.
        assert_eq!(machine.run(&mut inspector, None), Ok(5));
        assert_eq!(seen, [1, 2, 3]);
    }
}
