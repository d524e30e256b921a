use criterion::{criterion_group, criterion_main, Criterion};

use fibreg_riscv_executor::{execute, ExecutionOptions, Program};

fn executor_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("executor-benchmark");
    group.sample_size(10);

    // 100 iterations of a short delay: mostly the compute phase and the call.
    let program = Program::smoke_test(10).unwrap();
    let options = ExecutionOptions {
        samples: 100,
        max_cycles: None,
    };
    group.bench_function("smoke_test_short_delay", |b| {
        b.iter(|| execute(&program, options).unwrap())
    });

    // A few iterations of a long delay: dominated by the busy-wait loop.
    let program = Program::smoke_test(100_000).unwrap();
    let options = ExecutionOptions {
        samples: 4,
        max_cycles: None,
    };
    group.bench_function("smoke_test_long_delay", |b| {
        b.iter(|| execute(&program, options).unwrap())
    });
    group.finish();
}

criterion_group!(benches_executor, executor_benchmark);
criterion_main!(benches_executor);
