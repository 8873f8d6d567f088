use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use span_hashmap::{SeededState, SpanHashMap};
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

fn bench_insert(c: &mut Criterion) {
    let mut g = c.benchmark_group("insert_10k");
    g.bench_function("span_hashmap", |b| {
        b.iter_batched(
            SpanHashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    // Same hasher on both sides so only the table layout differs.
    g.bench_function("hashbrown", |b| {
        b.iter_batched(
            || hashbrown::HashMap::<String, u64, SeededState>::with_hasher(SeededState::default()),
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

fn bench_get_hit(c: &mut Criterion) {
    let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
    let mut g = c.benchmark_group("get_hit");
    g.bench_function("span_hashmap", |b| {
        let m: SpanHashMap<String, u64> = keys.iter().cloned().zip(0..).collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()));
        })
    });
    g.bench_function("hashbrown", |b| {
        let m: hashbrown::HashMap<String, u64, SeededState> = keys.iter().cloned().zip(0..).collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()));
        })
    });
    g.finish();
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("span_hashmap_get_miss", |b| {
        let m: SpanHashMap<String, u64> = lcg(11).take(10_000).map(key).zip(0..).collect();
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            let k = key(miss.next().unwrap());
            black_box(m.get(k.as_str()));
        })
    });
}

// Erase-heavy churn: every removal runs the back-shift repair.
fn bench_churn(c: &mut Criterion) {
    c.bench_function("span_hashmap_remove_insert_churn", |b| {
        let keys: Vec<u64> = lcg(3).take(50_000).collect();
        let mut m: SpanHashMap<u64, u64> = keys.iter().map(|&k| (k, k)).collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = *it.next().unwrap();
            let v = m.remove(&k);
            m.insert(k, black_box(v.unwrap_or(0)));
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
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_churn
}
criterion_main!(benches);
