use std::fmt;

use fibreg_core::{FibonacciState, MAX_DELAY_COUNT};

/// Why the machine stopped executing the guest.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("illegal instruction {word:#010x} at {pc:#010x}")]
    IllegalInstruction { pc: u32, word: u32 },
    #[error("unsupported instruction {mnemonic} at {pc:#010x}")]
    UnsupportedInstruction { pc: u32, mnemonic: String },
    #[error("compressed instruction {half:#06x} at {pc:#010x}: the C extension is not supported")]
    CompressedInstruction { pc: u32, half: u16 },
    #[error("misaligned instruction fetch at {pc:#010x}")]
    MisalignedFetch { pc: u32 },
    #[error("misaligned {size}-byte memory access at {addr:#010x}")]
    MisalignedAccess { addr: u32, size: u32 },
    #[error("guest trapped with {trap} at {pc:#010x}")]
    Trap { pc: u32, trap: Trap },
    #[error("cycle limit of {limit} reached")]
    CycleLimit { limit: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    Ecall,
    Ebreak,
    Unimp,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trap::Ecall => write!(f, "ecall"),
            Trap::Ebreak => write!(f, "ebreak"),
            Trap::Unimp => write!(f, "unimp"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ElfError {
    #[error("failed to parse ELF: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("only 32-bit ELF files are supported")]
    NotElf32,
    #[error("only little-endian ELF files are supported")]
    BigEndian,
    #[error("not a RISC-V ELF file (e_machine = {0})")]
    WrongMachine(u16),
    #[error("segment at {vaddr:#010x} lies outside the file")]
    SegmentOutOfBounds { vaddr: u64 },
    #[error("segment at {vaddr:#010x} has memsz {memsz:#x} below filesz {filesz:#x}")]
    MemSizeBelowFileSize { vaddr: u64, filesz: u64, memsz: u64 },
    #[error("segment at {vaddr:#010x} of {memsz:#x} bytes lies outside guest RAM")]
    SegmentOutsideRam { vaddr: u64, memsz: u64 },
}

/// The built-in image compares its delay counter with a signed `bge`, so
/// larger counts would skip the delay entirely.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("delay count {0} exceeds the maximum of {MAX_DELAY_COUNT}")]
pub struct DelayCountOutOfRange(pub u32);

/// A probe sample that does not match the host model.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("sample {index} (cycle {cycle}): expected {expected}, found {actual}")]
pub struct Mismatch {
    pub index: usize,
    pub cycle: u64,
    pub expected: FibonacciState,
    pub actual: FibonacciState,
}
