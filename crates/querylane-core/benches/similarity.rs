//! Benchmarks for the similarity scan the router runs per submission.
//!
//! Routing cost is O(max_bins * dim) cosine evaluations under a read lock;
//! this measures that scan at the default cap (100 bins, 384 dims).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

use querylane_core::similarity::{cosine_similarity, normalize};

fn random_vector(dim: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let mut v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    normalize(&mut v);
    v
}

fn bench_cosine(c: &mut Criterion) {
    let a = random_vector(384);
    let b = random_vector(384);

    c.bench_function("cosine_similarity_384", |bencher| {
        bencher.iter(|| cosine_similarity(black_box(&a), black_box(&b)))
    });
}

fn bench_scan(c: &mut Criterion) {
    let query = random_vector(384);
    let bins: Vec<Vec<f32>> = (0..100).map(|_| random_vector(384)).collect();

    c.bench_function("bin_scan_100x384", |bencher| {
        bencher.iter(|| {
            let mut best_idx = 0;
            let mut best_sim = -1.0f32;
            for (idx, vector) in bins.iter().enumerate() {
                let sim = cosine_similarity(black_box(&query), vector);
                if sim > best_sim {
                    best_sim = sim;
                    best_idx = idx;
                }
            }
            black_box((best_idx, best_sim))
        })
    });
}

criterion_group!(benches, bench_cosine, bench_scan);
criterion_main!(benches);
