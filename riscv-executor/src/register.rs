use std::{fmt, ops::Index, str::FromStr};

const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// One of the 32 RV32I integer registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register {
    value: u8,
}

impl Register {
    pub const ZERO: Self = Self::new(0);
    pub const RA: Self = Self::new(1);
    pub const SP: Self = Self::new(2);
    pub const T0: Self = Self::new(5);
    pub const A0: Self = Self::new(10);

    /// `s9`: the previous Fibonacci term.
    pub const PREVIOUS: Self = Self::new(25);
    /// `s10`: the delay count.
    pub const DELAY: Self = Self::new(26);
    /// `s11`: the current Fibonacci term.
    pub const CURRENT: Self = Self::new(27);

    /// Panics if `value` is not a register index.
    pub const fn new(value: u8) -> Self {
        assert!(value < 32, "register index out of range");
        Self { value }
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn addr(&self) -> u8 {
        self.value
    }

    pub fn abi_name(&self) -> &'static str {
        ABI_NAMES[self.value as usize]
    }

    pub fn all() -> impl Iterator<Item = Register> {
        (0..32).map(Register::new)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abi_name())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown register \"{0}\"")]
pub struct RegisterParseError(String);

impl FromStr for Register {
    type Err = RegisterParseError;

    /// Accepts `x0`..`x31`, the ABI names and `fp` (an alias of `s0`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = s.strip_prefix('x') {
            // `x07` is not a register name.
            if let Ok(index) = digits.parse::<u8>() {
                if index < 32 && digits == index.to_string() {
                    return Ok(Register::new(index));
                }
            }
        }
        if s == "fp" {
            return Ok(Register::new(8));
        }
        ABI_NAMES
            .iter()
            .position(|name| *name == s)
            .map(|index| Register::new(index as u8))
            .ok_or_else(|| RegisterParseError(s.to_string()))
    }
}

/// The register bank. `x0` always reads zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u32; 32],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self { regs: [0; 32] }
    }

    pub fn get(&self, reg: Register) -> u32 {
        self.regs[reg.value as usize]
    }

    /// Writes to `x0` are discarded.
    pub fn set(&mut self, reg: Register, value: u32) {
        if !reg.is_zero() {
            self.regs[reg.value as usize] = value;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Register, u32)> + '_ {
        Register::all().map(|reg| (reg, self.get(reg)))
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Register> for RegisterFile {
    type Output = u32;

    fn index(&self, reg: Register) -> &u32 {
        &self.regs[reg.value as usize]
    }
}
