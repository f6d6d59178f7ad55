use std::hint::black_box;

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rdbport::{
    create_dump_payload, decode_dump_payload,
    database::{Element, QuickList},
    engine::rdb::convert::hash_from_pairs,
    verify_dump_payload, RdbConfig, Value,
};

fn make_values(cfg: &RdbConfig) -> Vec<(&'static str, Value)> {
    let mut rng = fastrand::Rng::with_seed(7);

    let text: Vec<u8> = (0..64 * 1024).map(|_| rng.alphanumeric() as u8).collect();
    let mut ql = QuickList::new(cfg.list_max_ziplist_size);
    for i in 0..50_000i64 {
        ql.push_back(Element::Int(i * 7));
    }
    let pairs = (0..5_000)
        .map(|i| {
            (
                Bytes::from(format!("field:{i}")),
                Bytes::from(format!("value:{}", rng.u64(..))),
            )
        })
        .collect();

    vec![
        ("string_64k", Value::string(text)),
        ("list_50k", Value::List(ql)),
        (
            "hash_5k",
            Value::Hash(hash_from_pairs(pairs, cfg).unwrap()),
        ),
    ]
}

fn bench_payload(c: &mut Criterion) {
    let cfg = RdbConfig::default();
    let mut group = c.benchmark_group("dump_payload");

    for (name, value) in make_values(&cfg) {
        let payload = create_dump_payload(&value, &cfg).unwrap();
        group.throughput(Throughput::Bytes(payload.len() as u64));

        group.bench_with_input(BenchmarkId::new("create", name), &value, |b, v| {
            b.iter(|| black_box(create_dump_payload(v, &cfg).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("verify", name), &payload, |b, p| {
            b.iter(|| black_box(verify_dump_payload(p).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", name), &payload, |b, p| {
            b.iter(|| black_box(decode_dump_payload(p, &cfg).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_payload);
criterion_main!(benches);
