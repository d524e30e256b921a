#![cfg_attr(not(test), no_std)]

//! The Fibonacci smoke test: a wrapping Fibonacci stepper paced by a
//! busy-wait delay, with its two persistent values kept in storage that an
//! external inspector can sample without synchronization.
//!
//! The same loop runs on bare metal (see `fibreg-riscv-guest`, where the
//! values live in `s11` and `s9`) and on the host through [`SmokeTest`].

pub mod delay;
pub mod pinned;
pub mod program;
pub mod state;

pub use delay::{delay, delay_with};
pub use pinned::{PinnedCell, PinnedRegisters, FIB_REGISTERS};
pub use program::{Control, IterationLimit, Phase, SmokeTest};
pub use state::{FibonacciState, Sequence};

/// Width of the persistent values: a 32-bit two's-complement integer.
pub type Word = i32;

/// Number of busy-wait iterations between two Fibonacci steps.
///
/// Not derived from any clock rate.
pub const DELAY_COUNT: u32 = 10_000_000;

/// Largest delay count the target loop honours: its counter is compared
/// as a signed `Word`.
pub const MAX_DELAY_COUNT: u32 = Word::MAX as u32;

/// Size in bytes of the guest stack placed below the end of RAM.
pub const STACK_SIZE: u32 = 1024;
