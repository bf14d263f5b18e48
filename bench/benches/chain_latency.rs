use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vow::Promise;
use vow_bench::settled_chain;
use vow_test::Gate;

fn bench_settled_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("settled_chain");
    for depth in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| black_box(settled_chain(depth).value()));
        });
    }
    group.finish();
}

fn bench_pending_chain(c: &mut Criterion) {
    c.bench_function("pending_chain_then_resolve_16", |b| {
        b.iter(|| {
            let gate: Gate<u64> = Gate::new();
            let mut node = gate.promise();
            for _ in 0..16 {
                node = node.map(|x| x + 1);
            }
            gate.resolve(black_box(1));
            black_box(node.value())
        });
    });
}

fn bench_flat_map(c: &mut Criterion) {
    c.bench_function("flat_map_settled", |b| {
        b.iter(|| {
            let root = Promise::resolved(black_box(3u64));
            black_box(root.flat_map(|x| Promise::resolved(x * 2)).value())
        });
    });
}

criterion_group!(benches, bench_settled_chain, bench_pending_chain, bench_flat_map);
criterion_main!(benches);
