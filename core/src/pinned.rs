//! Storage for the two persistent values.
//!
//! On the target they live in `s11` and `s9`. The host model keeps them in
//! 32-bit atomic cells instead: every access is a real load or store of the
//! cell, so an inspector reading it (for example through the
//! [`FIB_REGISTERS`] symbol in a debugger, or from another thread) sees the
//! value the program last stored.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::state::FibonacciState;
use crate::Word;

/// A single `Word` at a fixed location. Same size and alignment as `Word`.
///
/// Accesses are `Relaxed`: the cell only needs to be observable, it orders
/// nothing else.
#[repr(transparent)]
pub struct PinnedCell {
    value: AtomicI32,
}

impl PinnedCell {
    pub const fn new(value: Word) -> Self {
        Self {
            value: AtomicI32::new(value),
        }
    }

    #[inline(always)]
    pub fn get(&self) -> Word {
        self.value.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn set(&self, value: Word) {
        self.value.store(value, Ordering::Relaxed)
    }

    /// Address of the cell, for handing to an external inspector.
    pub fn as_ptr(&self) -> *const Word {
        self.value.as_ptr().cast_const()
    }
}

impl core::fmt::Debug for PinnedCell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("PinnedCell").field(&self.get()).finish()
    }
}

/// The register pair. `current` sits at offset 0 and `previous` at offset 4.
///
/// Any number of readers may sample the pair while it is stepped, but it
/// has a single writer: two threads stepping the same pair interleave their
/// updates and leave it off the sequence.
#[derive(Debug)]
#[repr(C)]
pub struct PinnedRegisters {
    pub current: PinnedCell,
    pub previous: PinnedCell,
}

impl PinnedRegisters {
    pub const fn new() -> Self {
        Self {
            current: PinnedCell::new(FibonacciState::INITIAL.current),
            previous: PinnedCell::new(FibonacciState::INITIAL.previous),
        }
    }

    /// Samples both cells.
    pub fn load(&self) -> FibonacciState {
        FibonacciState {
            current: self.current.get(),
            previous: self.previous.get(),
        }
    }

    pub fn store(&self, state: FibonacciState) {
        self.current.set(state.current);
        self.previous.set(state.previous);
    }

    /// One Fibonacci step performed directly on the cells.
    pub fn step(&self) {
        let previous = self.previous.get();
        self.current.set(self.current.get().wrapping_add(previous));
        self.previous.set(self.current.get().wrapping_sub(previous));
    }
}

impl Default for PinnedRegisters {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide register pair used by the host rendition of the smoke
/// test. Exported unmangled so tooling can find it by name.
#[no_mangle]
pub static FIB_REGISTERS: PinnedRegisters = PinnedRegisters::new();
