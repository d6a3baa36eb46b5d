//! Local kernels vs the distributed path on in-process participants.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rowscatter::matrix::{generate_with, multiply_with};
use rowscatter::{DistributedMultiplier, Group, Kernel, LocalGroup};

fn bench_local(c: &mut Criterion) {
    let mut group = c.benchmark_group("local");
    let mut rng = StdRng::seed_from_u64(1);

    for size in [64, 128, 256] {
        let a = generate_with(&mut rng, size, size).unwrap();
        let b = generate_with(&mut rng, size, size).unwrap();

        for kernel in [Kernel::Ijk, Kernel::Ikj] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", kernel), size),
                &size,
                |bench, _| bench.iter(|| multiply_with(kernel, &a, &b).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_distributed(c: &mut Criterion) {
    let mut group = c.benchmark_group("distributed");
    group.sample_size(20);
    let mut rng = StdRng::seed_from_u64(2);

    for size in [64, 256] {
        let a = generate_with(&mut rng, size, size).unwrap();
        let b = generate_with(&mut rng, size, size).unwrap();

        for parts in [2, 4] {
            // Thread start-up is part of each sample; compare across
            // participant counts, not against the local numbers.
            group.bench_with_input(BenchmarkId::new(format!("{}p", parts), size), &size, |bench, _| {
                bench.iter(|| {
                    LocalGroup::run(parts, |g| {
                        let mult = DistributedMultiplier::new(g);
                        let operands = mult.group().is_coordinator().then_some((&a, &b));
                        mult.multiply(operands).unwrap()
                    })
                    .unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_local, bench_distributed);
criterion_main!(benches);
