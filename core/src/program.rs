use core::fmt::{self, Display, Formatter};

use crate::delay::delay;
use crate::pinned::PinnedRegisters;
use crate::state::FibonacciState;
use crate::MAX_DELAY_COUNT;

/// The two states of the loop. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Delaying,
    Computing,
}

impl Phase {
    pub fn next(self) -> Self {
        match self {
            Phase::Delaying => Phase::Computing,
            Phase::Computing => Phase::Delaying,
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Delaying => write!(f, "DELAYING"),
            Phase::Computing => write!(f, "COMPUTING"),
        }
    }
}

/// Decides, before every iteration, whether a bounded run stops.
///
/// Only [`SmokeTest::run_until`] consults a control; the production path,
/// [`SmokeTest::run_forever`], never stops.
pub trait Control {
    /// `completed` is the number of finished iterations and `state` the
    /// register contents at the start of the next one.
    fn should_halt(&mut self, completed: u64, state: FibonacciState) -> bool;
}

impl<F: FnMut(u64, FibonacciState) -> bool> Control for F {
    fn should_halt(&mut self, completed: u64, state: FibonacciState) -> bool {
        self(completed, state)
    }
}

/// Stops after a fixed number of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationLimit(pub u64);

impl Control for IterationLimit {
    fn should_halt(&mut self, completed: u64, _state: FibonacciState) -> bool {
        completed >= self.0
    }
}

/// The smoke test loop: delay, step, repeat.
///
/// One iteration is a `Delaying` tick followed by a `Computing` tick.
pub struct SmokeTest<'a> {
    registers: &'a PinnedRegisters,
    delay_count: u32,
    phase: Phase,
    iterations: u64,
}

impl<'a> SmokeTest<'a> {
    /// Seeds `registers` and positions the loop at its first delay.
    ///
    /// Panics if `delay_count` exceeds [`MAX_DELAY_COUNT`].
    pub fn new(registers: &'a PinnedRegisters, delay_count: u32) -> Self {
        assert!(
            delay_count <= MAX_DELAY_COUNT,
            "delay count {delay_count} exceeds {MAX_DELAY_COUNT}"
        );
        registers.store(FibonacciState::INITIAL);
        Self {
            registers,
            delay_count,
            phase: Phase::Delaying,
            iterations: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Completed iterations.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn delay_count(&self) -> u32 {
        self.delay_count
    }

    pub fn state(&self) -> FibonacciState {
        self.registers.load()
    }

    /// Runs the current phase to completion and moves to the next one.
    /// Returns the phase that was run.
    pub fn tick(&mut self) -> Phase {
        let phase = self.phase;
        match phase {
            Phase::Delaying => delay(self.delay_count),
            Phase::Computing => {
                self.registers.step();
                self.iterations += 1;
                log::debug!("iteration {}: {}", self.iterations, self.registers.load());
            }
        }
        self.phase = phase.next();
        log::trace!("{phase} -> {}", self.phase);
        phase
    }

    /// Runs whole iterations until `control` asks to halt. Returns the
    /// number of iterations completed during this call.
    pub fn run_until(&mut self, control: &mut impl Control) -> u64 {
        let start = self.iterations;
        while !control.should_halt(self.iterations, self.registers.load()) {
            self.tick();
            self.tick();
        }
        self.iterations - start
    }

    pub fn run_forever(&mut self) -> ! {
        loop {
            self.tick();
        }
    }
}
