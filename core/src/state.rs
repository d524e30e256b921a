use core::fmt::{self, Display, Formatter};

use crate::Word;

/// Two consecutive terms of the Fibonacci sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FibonacciState {
    pub current: Word,
    pub previous: Word,
}

impl FibonacciState {
    /// The seed: `previous = 0`, `current = 1`.
    pub const INITIAL: Self = Self {
        current: 1,
        previous: 0,
    };

    pub const fn new(current: Word, previous: Word) -> Self {
        Self { current, previous }
    }

    /// Advances by one term. Overflow wraps.
    ///
    /// The update is done in place the way the target program does it:
    /// `current += previous` followed by `previous = current - previous`,
    /// which leaves the old `current` in `previous`.
    pub fn step(&mut self) {
        self.current = self.current.wrapping_add(self.previous);
        self.previous = self.current.wrapping_sub(self.previous);
    }

    #[must_use]
    pub fn stepped(mut self) -> Self {
        self.step();
        self
    }

    /// The state after `n` steps from [`FibonacciState::INITIAL`].
    pub fn nth(n: u64) -> Self {
        let mut state = Self::INITIAL;
        for _ in 0..n {
            state.step();
        }
        state
    }

    /// Whether `next` is the state that follows `self`.
    pub fn is_followed_by(&self, next: &Self) -> bool {
        self.stepped() == *next
    }
}

impl Default for FibonacciState {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl Display for FibonacciState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "current={} previous={}", self.current, self.previous)
    }
}

/// Infinite iterator over the states, starting at the seed.
#[derive(Debug, Clone)]
pub struct Sequence {
    next: FibonacciState,
}

impl Sequence {
    pub fn new() -> Self {
        Self::starting_at(FibonacciState::INITIAL)
    }

    pub fn starting_at(state: FibonacciState) -> Self {
        Self { next: state }
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Sequence {
    type Item = FibonacciState;

    fn next(&mut self) -> Option<Self::Item> {
        let state = self.next;
        self.next.step();
        Some(state)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
