use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use recursive_hashmap::RecursiveHashMap;
use std::collections::HashMap;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled(seed: u64, n: usize) -> (RecursiveHashMap<String, u64>, Vec<String>) {
    let mut m = RecursiveHashMap::new();
    let keys: Vec<_> = lcg(seed).take(n).map(key).collect();
    for (i, k) in keys.iter().enumerate() {
        m.insert(k.clone(), i as u64);
    }
    (m, keys)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("recursive_hashmap_insert_10k", |b| {
        b.iter_batched(
            RecursiveHashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    // Baseline for the same workload.
    c.bench_function("std_hashmap_insert_10k", |b| {
        b.iter_batched(
            HashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.entry(key(x)).or_insert(i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("recursive_hashmap_get_hit", |b| {
        let (m, keys) = filled(7, 20_000);
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k).unwrap());
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("recursive_hashmap_get_miss", |b| {
        let (m, _) = filled(11, 10_000);
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(m.get(&k));
        })
    });
}

fn bench_remove_all(c: &mut Criterion) {
    c.bench_function("recursive_hashmap_remove_10k", |b| {
        b.iter_batched(
            || filled(3, 10_000),
            |(mut m, keys)| {
                // Drains through every shrink step back to a flat root.
                for k in &keys {
                    black_box(m.remove(k));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iterate(c: &mut Criterion) {
    c.bench_function("recursive_hashmap_iter_20k", |b| {
        let (m, _) = filled(5, 20_000);
        b.iter(|| black_box(m.values().sum::<u64>()))
    });
    c.bench_function("recursive_hashmap_cursor_walk_20k", |b| {
        let (m, _) = filled(5, 20_000);
        b.iter(|| {
            let mut n = 0usize;
            let mut cur = m.begin();
            while !cur.is_end() {
                n += 1;
                cur = cur.advance(&m);
            }
            black_box(n)
        })
    });
}

fn bench_clone(c: &mut Criterion) {
    c.bench_function("recursive_hashmap_clone_10k", |b| {
        let (m, _) = filled(9, 10_000);
        b.iter(|| black_box(m.clone()))
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
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_remove_all, bench_iterate, bench_clone
}
criterion_main!(benches);
