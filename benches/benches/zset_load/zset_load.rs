use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rdbport::{
    engine::rdb::{
        load_zset,
        primitives::{write_binary_double, write_string},
        RdbReader,
    },
    RdbConfig,
};

/// Тело ZSET_2 без заголовка длины: пары член/оценка.
fn make_body(
    n: usize,
    seed: u64,
    descending: bool,
) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut pairs: Vec<(String, f64)> = (0..n)
        .map(|i| (format!("member:{i}"), rng.f64() * 1.0e6))
        .collect();
    if descending {
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    }
    let mut buf = Vec::with_capacity(n * 24);
    for (m, s) in &pairs {
        write_string(&mut buf, m.as_bytes(), false).unwrap();
        write_binary_double(&mut buf, *s).unwrap();
    }
    buf
}

fn bench_load_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("zset_load");
    for &n in &[1_000usize, 10_000, 100_000] {
        group.throughput(Throughput::Elements(n as u64));
        let shuffled = make_body(n, 42, false);
        let sorted = make_body(n, 42, true);

        let bulk = RdbConfig::default();
        // Порог выше n: каждый член вставляется сразу.
        let direct = RdbConfig {
            zset_bulk_threshold: usize::MAX,
            ..RdbConfig::default()
        };

        for (name, body, cfg) in [
            ("bulk_shuffled", &shuffled, &bulk),
            ("bulk_presorted", &sorted, &bulk),
            ("direct_shuffled", &shuffled, &direct),
        ] {
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, &n| {
                b.iter(|| {
                    let mut r = RdbReader::new(body.as_slice());
                    black_box(load_zset(&mut r, n, true, cfg).unwrap())
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_load_paths);
criterion_main!(benches);
