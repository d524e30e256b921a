use std::collections::BTreeMap;

use goblin::elf::{header::EM_RISCV, program_header::PT_LOAD, Elf};
use itertools::Itertools;

use crate::asm::{self, ImageLayout};
use crate::error::{DelayCountOutOfRange, ElfError};

/// Load address of the guest image; matches `link.x` of the guest crate.
pub const TEXT_BASE: u32 = 0x0000_1000;
/// Size of guest RAM starting at [`TEXT_BASE`].
pub const RAM_SIZE: u32 = 64 * 1024;
/// Initial stack pointer: the end of RAM.
pub const STACK_TOP: u32 = TEXT_BASE + RAM_SIZE;
/// Lowest stack address; code and data must end below it.
pub const STACK_BOTTOM: u32 = STACK_TOP - fibreg_core::STACK_SIZE;

/// Bytes to place in memory before execution starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub address: u32,
    pub data: Vec<u8>,
}

/// A loadable guest program.
#[derive(Debug, Clone)]
pub struct Program {
    pub entry: u32,
    pub segments: Vec<Segment>,
    /// Symbol name to address.
    pub symbols: BTreeMap<String, u32>,
}

impl Program {
    /// The built-in smoke test image, identical to what the guest crate
    /// assembles, with the delay count baked into `s10`.
    pub fn smoke_test(delay_count: u32) -> Result<Self, DelayCountOutOfRange> {
        if delay_count > fibreg_core::MAX_DELAY_COUNT {
            return Err(DelayCountOutOfRange(delay_count));
        }
        let (code, layout) = asm::smoke_test_image(delay_count, STACK_TOP);
        let ImageLayout {
            main_loop,
            delay,
            delay_end,
        } = layout;
        let data = code.iter().flat_map(|word| word.to_le_bytes()).collect();
        let symbols = [
            ("_start", 0),
            ("fibreg_main_loop", main_loop),
            ("fibreg_delay", delay),
            ("fibreg_delay_end", delay_end),
        ]
        .into_iter()
        .map(|(name, offset)| (name.to_string(), TEXT_BASE + offset))
        .collect();

        Ok(Program {
            entry: TEXT_BASE,
            segments: vec![Segment {
                address: TEXT_BASE,
                data,
            }],
            symbols,
        })
    }

    /// Loads a statically linked 32-bit little-endian RISC-V executable.
    pub fn from_elf(file_buffer: &[u8]) -> Result<Self, ElfError> {
        let elf = Elf::parse(file_buffer)?;

        if elf.is_64 {
            return Err(ElfError::NotElf32);
        }
        if !elf.little_endian {
            return Err(ElfError::BigEndian);
        }
        if elf.header.e_machine != EM_RISCV {
            return Err(ElfError::WrongMachine(elf.header.e_machine));
        }

        let segments = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == PT_LOAD && ph.p_memsz > 0)
            .map(|ph| {
                let vaddr = ph.p_vaddr;
                if ph.p_memsz < ph.p_filesz {
                    return Err(ElfError::MemSizeBelowFileSize {
                        vaddr,
                        filesz: ph.p_filesz,
                        memsz: ph.p_memsz,
                    });
                }
                // Also bounds the allocation below.
                if vaddr < TEXT_BASE as u64 || vaddr.saturating_add(ph.p_memsz) > STACK_TOP as u64
                {
                    return Err(ElfError::SegmentOutsideRam {
                        vaddr,
                        memsz: ph.p_memsz,
                    });
                }
                let data = usize::try_from(ph.p_offset)
                    .ok()
                    .zip(usize::try_from(ph.p_filesz).ok())
                    .and_then(|(start, len)| file_buffer.get(start..start.checked_add(len)?))
                    .ok_or(ElfError::SegmentOutOfBounds { vaddr })?;
                let mut data = data.to_vec();
                // .bss and friends
                data.resize(ph.p_memsz as usize, 0);
                Ok(Segment {
                    address: vaddr as u32,
                    data,
                })
            })
            .collect::<Result<Vec<_>, ElfError>>()?;

        let symbols = elf
            .syms
            .iter()
            .filter_map(|sym| {
                let name = elf.strtab.get_at(sym.st_name)?;
                (!name.is_empty()).then(|| (name.to_string(), sym.st_value as u32))
            })
            .collect();

        log::debug!(
            "loaded ELF: entry {:#010x}, segments [{}]",
            elf.entry,
            segments
                .iter()
                .map(|s| format!("{:#010x}+{}", s.address, s.data.len()))
                .join(", ")
        );

        Ok(Program {
            entry: elf.entry as u32,
            segments,
            symbols,
        })
    }

    pub fn symbol(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }

    /// The `[start, end)` address range of the delay routine, if the program
    /// exports it.
    pub fn delay_routine(&self) -> Option<(u32, u32)> {
        Some((
            self.symbol("fibreg_delay")?,
            self.symbol("fibreg_delay_end")?,
        ))
    }

    /// The 32-bit words of every segment, with their addresses.
    pub fn words(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.segments.iter().flat_map(|segment| {
            segment
                .data
                .chunks(4)
                .enumerate()
                .map(move |(i, chunk)| {
                    let mut bytes = [0; 4];
                    bytes[..chunk.len()].copy_from_slice(chunk);
                    let addr = segment.address.wrapping_add(4 * i as u32);
                    (addr, u32::from_le_bytes(bytes))
                })
        })
    }
}
