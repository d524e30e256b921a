//! Just enough of an RV32I assembler to produce the smoke test image without
//! a cross toolchain.

use crate::register::Register;

const OP: u32 = 0b011_0011;
const OP_IMM: u32 = 0b001_0011;
const LUI: u32 = 0b011_0111;
const JAL: u32 = 0b110_1111;
const JALR: u32 = 0b110_0111;
const BRANCH: u32 = 0b110_0011;

fn r_type(funct7: u32, rs2: Register, rs1: Register, funct3: u32, rd: Register) -> u32 {
    (funct7 << 25)
        | ((rs2.addr() as u32) << 20)
        | ((rs1.addr() as u32) << 15)
        | (funct3 << 12)
        | ((rd.addr() as u32) << 7)
        | OP
}

fn i_type(imm: i32, rs1: Register, funct3: u32, rd: Register, opcode: u32) -> u32 {
    assert!((-2048..2048).contains(&imm), "I-immediate out of range: {imm}");
    (((imm as u32) & 0xfff) << 20)
        | ((rs1.addr() as u32) << 15)
        | (funct3 << 12)
        | ((rd.addr() as u32) << 7)
        | opcode
}

pub fn add(rd: Register, rs1: Register, rs2: Register) -> u32 {
    r_type(0, rs2, rs1, 0b000, rd)
}

pub fn sub(rd: Register, rs1: Register, rs2: Register) -> u32 {
    r_type(0b010_0000, rs2, rs1, 0b000, rd)
}

pub fn addi(rd: Register, rs1: Register, imm: i32) -> u32 {
    i_type(imm, rs1, 0b000, rd, OP_IMM)
}

pub fn mv(rd: Register, rs: Register) -> u32 {
    addi(rd, rs, 0)
}

/// `imm` is the value of the upper 20 bits, already shifted down.
pub fn lui(rd: Register, imm: u32) -> u32 {
    assert!(imm < (1 << 20), "U-immediate out of range: {imm:#x}");
    (imm << 12) | ((rd.addr() as u32) << 7) | LUI
}

pub fn jalr(rd: Register, rs1: Register, imm: i32) -> u32 {
    i_type(imm, rs1, 0b000, rd, JALR)
}

pub fn ret() -> u32 {
    jalr(Register::ZERO, Register::RA, 0)
}

/// `offset` is relative to the address of the `jal` itself.
pub fn jal(rd: Register, offset: i32) -> u32 {
    assert!(offset % 2 == 0, "jump offset must be even: {offset}");
    assert!(
        (-(1 << 20)..(1 << 20)).contains(&offset),
        "jump offset out of range: {offset}"
    );
    let imm = offset as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xff) << 12)
        | ((rd.addr() as u32) << 7)
        | JAL
}

pub fn j(offset: i32) -> u32 {
    jal(Register::ZERO, offset)
}

/// Signed `rs1 >= rs2`; `offset` is relative to the branch.
pub fn bge(rs1: Register, rs2: Register, offset: i32) -> u32 {
    assert!(offset % 2 == 0, "branch offset must be even: {offset}");
    assert!(
        (-(1 << 12)..(1 << 12)).contains(&offset),
        "branch offset out of range: {offset}"
    );
    let imm = offset as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | ((rs2.addr() as u32) << 20)
        | ((rs1.addr() as u32) << 15)
        | (0b101 << 12)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 1) << 7)
        | BRANCH
}

/// Loads a 32-bit constant the way the GNU assembler expands `li`:
/// a single `addi` when it fits in 12 bits, otherwise `lui` followed by an
/// `addi` of the sign-adjusted low part (omitted when that part is zero).
pub fn li(rd: Register, value: u32) -> Vec<u32> {
    let signed = value as i32;
    if (-2048..2048).contains(&signed) {
        return vec![addi(rd, Register::ZERO, signed)];
    }
    let hi = value.wrapping_add(0x800) >> 12;
    let lo = value.wrapping_sub(hi << 12) as i32;
    let mut insns = vec![lui(rd, hi)];
    if lo != 0 {
        insns.push(addi(rd, rd, lo));
    }
    insns
}

/// Offsets of the labels in [`smoke_test_image`], in bytes from its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub main_loop: u32,
    pub delay: u32,
    /// One past the `ret` of the delay routine; also the image size.
    pub delay_end: u32,
}

/// The instruction sequence of the guest program (`fibreg-riscv-guest`).
/// `delay_count` is not range checked here; see [`crate::Program::smoke_test`].
///
/// ```text
/// _start:       lui sp, %hi(stack_top); addi sp, sp, %lo(stack_top)
///               li s11, 1; li s9, 0; li s10, delay_count
/// main_loop:    mv a0, s10; jal ra, fibreg_delay
///               add s11, s11, s9; sub s9, s11, s9; j main_loop
/// fibreg_delay: li t0, 0
///         1:    bge t0, a0, 2f; addi t0, t0, 1; j 1b
///         2:    ret
/// ```
pub fn smoke_test_image(delay_count: u32, stack_top: u32) -> (Vec<u32>, ImageLayout) {
    let s11 = Register::CURRENT;
    let s10 = Register::DELAY;
    let s9 = Register::PREVIOUS;
    let (sp, a0, t0) = (Register::SP, Register::A0, Register::T0);

    let mut code = vec![];
    let stack_hi = stack_top.wrapping_add(0x800) >> 12;
    code.push(lui(sp, stack_hi));
    code.push(addi(sp, sp, stack_top.wrapping_sub(stack_hi << 12) as i32));
    code.extend(li(s11, 1));
    code.extend(li(s9, 0));
    code.extend(li(s10, delay_count));

    let main_loop = offset(&code);
    let delay = main_loop + 5 * 4;
    code.push(mv(a0, s10));
    code.push(jal(Register::RA, (delay - offset(&code)) as i32));
    code.push(add(s11, s11, s9));
    code.push(sub(s9, s11, s9));
    code.push(j(main_loop as i32 - offset(&code) as i32));

    assert_eq!(offset(&code), delay);
    code.push(addi(t0, Register::ZERO, 0));
    let check = offset(&code);
    let done = check + 3 * 4;
    code.push(bge(t0, a0, (done - check) as i32));
    code.push(addi(t0, t0, 1));
    code.push(j(check as i32 - offset(&code) as i32));
    assert_eq!(offset(&code), done);
    code.push(ret());

    let layout = ImageLayout {
        main_loop,
        delay,
        delay_end: offset(&code),
    };
    (code, layout)
}

fn offset(code: &[u32]) -> u32 {
    code.len() as u32 * 4
}

#[cfg(test)]
mod test {
    use super::*;

    // Reference encodings from the GNU assembler.
    #[test]
    fn encodings() {
        assert_eq!(addi(Register::CURRENT, Register::ZERO, 1), 0x0010_0d93);
        assert_eq!(addi(Register::PREVIOUS, Register::ZERO, 0), 0x0000_0c93);
        assert_eq!(mv(Register::A0, Register::DELAY), 0x000d_0513);
        assert_eq!(
            add(Register::CURRENT, Register::CURRENT, Register::PREVIOUS),
            0x019d_8db3
        );
        assert_eq!(
            sub(Register::PREVIOUS, Register::CURRENT, Register::PREVIOUS),
            0x419d_8cb3
        );
        assert_eq!(ret(), 0x0000_8067);
        assert_eq!(lui(Register::SP, 0x11), 0x0001_1137);
        assert_eq!(j(-8), 0xff9f_f06f);
        assert_eq!(jal(Register::RA, 16), 0x0100_00ef);
        assert_eq!(bge(Register::T0, Register::A0, 12), 0x00a2_d663);
    }

    #[test]
    fn li_expansion() {
        assert_eq!(li(Register::A0, 5).len(), 1);
        assert_eq!(li(Register::A0, (-1i32) as u32).len(), 1);
        assert_eq!(li(Register::A0, 0x1000), vec![lui(Register::A0, 1)]);
        assert_eq!(
            li(Register::DELAY, 10_000_000),
            vec![
                lui(Register::DELAY, 0x989),
                addi(Register::DELAY, Register::DELAY, 0x680)
            ]
        );
        // Negative low part: 0x1800 = (2 << 12) - 0x800.
        assert_eq!(
            li(Register::A0, 0x1800),
            vec![lui(Register::A0, 2), addi(Register::A0, Register::A0, -2048)]
        );
    }

    #[test]
    fn image_layout() {
        let (code, layout) = smoke_test_image(10_000_000, 0x11000);
        // lui, addi, li s11, li s9, lui + addi for s10
        assert_eq!(layout.main_loop, 6 * 4);
        assert_eq!(layout.delay, layout.main_loop + 20);
        assert_eq!(layout.delay_end, layout.delay + 20);
        assert_eq!(code.len() as u32 * 4, layout.delay_end);

        let (short, layout) = smoke_test_image(3, 0x11000);
        assert_eq!(layout.main_loop, 5 * 4);
        assert_eq!(short.len(), code.len() - 1);
    }
}
