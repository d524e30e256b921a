use core::hint::black_box;

/// Busy-waits for `count` iterations of an empty loop body.
#[inline(never)]
pub fn delay(count: u32) {
    delay_with(count, |i| {
        black_box(i);
    });
}

/// The delay loop, calling `tick` once per iteration with the loop index.
pub fn delay_with(count: u32, mut tick: impl FnMut(u32)) {
    let mut i = 0;
    while i < black_box(count) {
        tick(i);
        i += 1;
    }
}
