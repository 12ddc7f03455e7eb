use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera::{Leid, LocalStore, Lvid};

const NUM_VERTICES: u32 = 10_000;
const NUM_EDGES: usize = 100_000;

fn build_store() -> (LocalStore<u64, u64>, Vec<(Lvid, Lvid)>) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut pairs: BTreeSet<(u32, u32)> = BTreeSet::new();
    while pairs.len() < NUM_EDGES {
        let src = rng.gen_range(0..NUM_VERTICES);
        let dst = rng.gen_range(0..NUM_VERTICES);
        if src != dst {
            pairs.insert((src, dst));
        }
    }
    let mut store: LocalStore<u64, u64> = LocalStore::new(NUM_VERTICES as usize, pairs.len());
    let mut lookups = Vec::with_capacity(pairs.len());
    for (i, (src, dst)) in pairs.iter().enumerate() {
        store
            .add_edge(Leid(i as u32), Lvid(*src), Lvid(*dst))
            .expect("edge in range");
        lookups.push((Lvid(*src), Lvid(*dst)));
    }
    store.finalize();
    (store, lookups)
}

fn bench_find(c: &mut Criterion) {
    let (store, lookups) = build_store();
    let mut cursor = 0usize;

    c.bench_function("find_existing_edge", |b| {
        b.iter(|| {
            let (src, dst) = lookups[cursor % lookups.len()];
            cursor += 1;
            black_box(store.find(src, dst).unwrap())
        })
    });

    c.bench_function("find_absent_edge", |b| {
        // Self edges are rejected at construction, so this never hits.
        b.iter(|| black_box(store.find(Lvid(7), Lvid(7)).unwrap()))
    });
}

criterion_group!(benches, bench_find);
criterion_main!(benches);
