use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use cuckoo_hashmap::{BytesPolicy, CuckooMap};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn fresh_map() -> CuckooMap<BytesPolicy, StdRng> {
    CuckooMap::with_policy_and_rng(8, 8, 8, BytesPolicy, StdRng::seed_from_u64(0xBE)).unwrap()
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("cuckoo_insert_10k", |b| {
        b.iter_batched(
            fresh_map,
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(&x.to_ne_bytes(), &(i as u64).to_ne_bytes())
                        .unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_lookup_hit(c: &mut Criterion) {
    c.bench_function("cuckoo_lookup_hit", |b| {
        let mut m = fresh_map();
        let keys: Vec<u64> = lcg(7).take(20_000).collect();
        for (i, x) in keys.iter().enumerate() {
            m.insert(&x.to_ne_bytes(), &(i as u64).to_ne_bytes())
                .unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let key = it.next().unwrap();
            black_box(m.lookup(&key.to_ne_bytes()));
        })
    });
}

fn bench_lookup_miss(c: &mut Criterion) {
    c.bench_function("cuckoo_lookup_miss", |b| {
        let mut m = fresh_map();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            m.insert(&x.to_ne_bytes(), &(i as u64).to_ne_bytes())
                .unwrap();
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // keys from a disjoint stream, unlikely to be present
            let key = miss.next().unwrap();
            black_box(m.lookup(&key.to_ne_bytes()));
        })
    });
}

fn bench_remove_reinsert(c: &mut Criterion) {
    c.bench_function("cuckoo_remove_reinsert", |b| {
        let mut m = fresh_map();
        let keys: Vec<u64> = lcg(17).take(10_000).collect();
        for (i, x) in keys.iter().enumerate() {
            m.insert(&x.to_ne_bytes(), &(i as u64).to_ne_bytes())
                .unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let key = it.next().unwrap().to_ne_bytes();
            assert!(m.remove(&key));
            m.insert(&key, &1u64.to_ne_bytes()).unwrap();
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_lookup_hit, bench_lookup_miss, bench_remove_reinsert
}
criterion_main!(benches);
