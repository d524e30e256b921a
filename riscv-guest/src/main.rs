//! The Fibonacci smoke test as a bare-metal RV32IM program.
//!
//! The whole loop is written in assembly so the persistent values never
//! leave their registers:
//!
//! * `s11` holds `current`,
//! * `s9` holds `previous`,
//! * `s10` holds the delay count.
//!
//! A simulator or debugger samples them from its register view. The program
//! never returns. Built for any other architecture, the binary runs the host
//! model from `fibreg-core` on its `FIB_REGISTERS` symbol instead.
#![cfg_attr(target_arch = "riscv32", no_std)]
#![cfg_attr(target_arch = "riscv32", no_main)]

#[cfg(target_arch = "riscv32")]
mod entry {
    use core::arch::{asm, global_asm};
    use core::panic::PanicInfo;

    use fibreg_core::DELAY_COUNT;

    // Entry point _start:
    // 1. Sets the stack pointer to __stack_top (set by link.x).
    // 2. Seeds s11 = 1 and s9 = 0, loads the delay count into s10.
    // 3. Loops forever: delay, then current += previous and
    //    previous = current - previous.
    //
    // fibreg_delay is `for (t0 = 0; t0 < a0; t0++);` with a signed compare.
    // It only touches a0, t0 and the pc, so s9 and s11 never change while
    // delaying.
    //
    // The instruction sequence is mirrored by
    // fibreg_riscv_executor::asm::smoke_test_image; the executor's
    // guest_image test compares the two when FIBREG_GUEST_ELF is set.
    global_asm!(
        r#"
.section .text._start, "ax", @progbits
.global _start
.type _start, @function
_start:
    .option push
    .option norelax
    lui sp, %hi(__stack_top)
    addi sp, sp, %lo(__stack_top)
    .option pop
    li s11, 1
    li s9, 0
    li s10, {delay}
.global fibreg_main_loop
fibreg_main_loop:
    mv a0, s10
    jal ra, fibreg_delay
    add s11, s11, s9
    sub s9, s11, s9
    j fibreg_main_loop

.text
.global fibreg_delay
.type fibreg_delay, @function
fibreg_delay:
    li t0, 0
2:
    bge t0, a0, 3f
    addi t0, t0, 1
    j 2b
3:
    ret
.global fibreg_delay_end
fibreg_delay_end:
"#,
        delay = const DELAY_COUNT,
    );

    #[panic_handler]
    fn panic(_panic: &PanicInfo<'_>) -> ! {
        loop {
            unsafe {
                asm!("unimp");
            }
        }
    }
}

#[cfg(not(target_arch = "riscv32"))]
fn main() {
    use fibreg_core::{SmokeTest, DELAY_COUNT, FIB_REGISTERS};

    SmokeTest::new(&FIB_REGISTERS, DELAY_COUNT).run_forever()
}
