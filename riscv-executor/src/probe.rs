use std::ops::ControlFlow;

use fibreg_core::{FibonacciState, Sequence};

use crate::error::Mismatch;
use crate::machine::{Inspector, RegisterWrite};
use crate::register::{Register, RegisterFile};

/// The pinned registers as seen at the end of a compute phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub cycle: u64,
    pub state: FibonacciState,
}

/// Samples `s11`/`s9` whenever the guest finishes writing `previous`, which
/// is the last write of each compute phase. The first sample is the seed.
pub struct FibonacciProbe {
    wanted: usize,
    samples: Vec<Sample>,
}

impl FibonacciProbe {
    /// Stops the machine once `wanted` samples have been taken.
    pub fn new(wanted: usize) -> Self {
        Self {
            wanted,
            samples: Vec::with_capacity(wanted),
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    pub fn is_done(&self) -> bool {
        self.samples.len() >= self.wanted
    }

    /// Compares every sample against the host model.
    pub fn verify(&self) -> Result<(), Mismatch> {
        verify(&self.samples)
    }
}

impl Inspector for FibonacciProbe {
    fn register_written(
        &mut self,
        write: &RegisterWrite,
        regs: &RegisterFile,
    ) -> ControlFlow<()> {
        if write.reg == Register::PREVIOUS {
            let state = FibonacciState::new(
                regs[Register::CURRENT] as i32,
                regs[Register::PREVIOUS] as i32,
            );
            log::debug!("cycle {}: {state}", write.cycle);
            self.samples.push(Sample {
                cycle: write.cycle,
                state,
            });
        }
        if self.is_done() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Checks that `samples` are the seed followed by consecutive steps.
pub fn verify(samples: &[Sample]) -> Result<(), Mismatch> {
    samples
        .iter()
        .zip(Sequence::new())
        .enumerate()
        .find(|(_, (sample, expected))| sample.state != *expected)
        .map_or(Ok(()), |(index, (sample, expected))| {
            Err(Mismatch {
                index,
                cycle: sample.cycle,
                expected,
                actual: sample.state,
            })
        })
}
