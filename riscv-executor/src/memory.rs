use std::collections::HashMap;

use crate::error::ExecutionError;

/// Sparse little-endian memory, stored as aligned 32-bit words.
/// Memory that was never written reads as zero.
#[derive(Debug, Default, Clone)]
pub struct Memory {
    words: HashMap<u32, u32>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of words that hold a value.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Copies `data` to `addr` byte by byte. No alignment requirement.
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            self.set_byte(addr.wrapping_add(offset as u32), *byte);
        }
    }

    pub fn load_word(&self, addr: u32) -> Result<u32, ExecutionError> {
        check_alignment(addr, 4)?;
        Ok(self.word(addr))
    }

    pub fn load_half(&self, addr: u32) -> Result<u16, ExecutionError> {
        check_alignment(addr, 2)?;
        Ok((self.word(addr) >> shift(addr)) as u16)
    }

    pub fn load_byte(&self, addr: u32) -> u8 {
        (self.word(addr) >> shift(addr)) as u8
    }

    pub fn store_word(&mut self, addr: u32, value: u32) -> Result<(), ExecutionError> {
        check_alignment(addr, 4)?;
        self.words.insert(addr, value);
        Ok(())
    }

    pub fn store_half(&mut self, addr: u32, value: u16) -> Result<(), ExecutionError> {
        check_alignment(addr, 2)?;
        self.merge(addr, value as u32, 0xffff);
        Ok(())
    }

    pub fn store_byte(&mut self, addr: u32, value: u8) {
        self.set_byte(addr, value);
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        self.merge(addr, value as u32, 0xff);
    }

    /// Replaces the bits selected by `mask` (shifted to `addr`'s position in
    /// its word) with `value`.
    fn merge(&mut self, addr: u32, value: u32, mask: u32) {
        let shift = shift(addr);
        let word = self.words.entry(addr & !3).or_insert(0);
        *word = (*word & !(mask << shift)) | ((value & mask) << shift);
    }

    fn word(&self, addr: u32) -> u32 {
        self.words.get(&(addr & !3)).copied().unwrap_or(0)
    }
}

fn shift(addr: u32) -> u32 {
    (addr & 3) * 8
}

fn check_alignment(addr: u32, size: u32) -> Result<(), ExecutionError> {
    if addr % size == 0 {
        Ok(())
    } else {
        Err(ExecutionError::MisalignedAccess { addr, size })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unwritten_reads_zero() {
        let mem = Memory::new();
        assert_eq!(mem.load_word(0x1000).unwrap(), 0);
        assert_eq!(mem.load_byte(0x1003), 0);
        assert!(mem.is_empty());
    }

    #[test]
    fn little_endian_layout() {
        let mut mem = Memory::new();
        mem.store_word(0x100, 0x1122_3344).unwrap();
        assert_eq!(mem.load_byte(0x100), 0x44);
        assert_eq!(mem.load_byte(0x103), 0x11);
        assert_eq!(mem.load_half(0x102).unwrap(), 0x1122);

        mem.store_byte(0x101, 0xaa);
        assert_eq!(mem.load_word(0x100).unwrap(), 0x1122_aa44);
        mem.store_half(0x102, 0xbeef).unwrap();
        assert_eq!(mem.load_word(0x100).unwrap(), 0xbeef_aa44);
    }

    #[test]
    fn unaligned_bytes() {
        let mut mem = Memory::new();
        mem.write_bytes(0x3, &[1, 2, 3, 4, 5]);
        assert_eq!(mem.load_word(0x0).unwrap(), 0x0100_0000);
        assert_eq!(mem.load_word(0x4).unwrap(), 0x0504_0302);
        assert_eq!(mem.len(), 2);
    }

    #[test]
    fn misaligned_access() {
        let mut mem = Memory::new();
        assert_eq!(
            mem.load_word(0x102),
            Err(ExecutionError::MisalignedAccess {
                addr: 0x102,
                size: 4
            })
        );
        assert!(mem.store_half(0x101, 0).is_err());
        assert!(mem.store_word(0x104, 0).is_ok());
    }
}
