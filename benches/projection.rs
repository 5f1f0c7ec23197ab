use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use exomap::clustering::{cluster_with_fallback, ClusterMethod};
use exomap::projection::{Pca, Projector, Tsne, Umap};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Three gaussian-ish blobs in 8 dimensions
fn create_feature_rows(n_rows: usize, n_features: usize) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    (0..n_rows)
        .map(|i| {
            let center = (i % 3) as f64 * 5.0;
            (0..n_features)
                .map(|_| center + rng.gen::<f64>() - 0.5)
                .collect()
        })
        .collect()
}

fn bench_projectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    group.sample_size(10);

    for n_rows in [500, 2000].iter() {
        let rows = create_feature_rows(*n_rows, 8);

        group.bench_with_input(BenchmarkId::new("pca", n_rows), &rows, |b, rows| {
            b.iter(|| Pca::with_seed(42).project(black_box(rows)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("umap", n_rows), &rows, |b, rows| {
            b.iter(|| Umap::with_seed(42).project(black_box(rows)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("tsne", n_rows), &rows, |b, rows| {
            b.iter(|| Tsne::for_size(rows.len(), 42).project(black_box(rows)).unwrap())
        });
    }

    group.finish();
}

fn bench_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let coords: Vec<[f64; 3]> = create_feature_rows(*n_rows, 3)
            .into_iter()
            .map(|r| [r[0], r[1], r[2]])
            .collect();

        group.bench_with_input(BenchmarkId::new("hdbscan", n_rows), &coords, |b, coords| {
            b.iter(|| cluster_with_fallback(ClusterMethod::Hdbscan, black_box(coords), 42, 10).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("kmeans", n_rows), &coords, |b, coords| {
            b.iter(|| cluster_with_fallback(ClusterMethod::KMeans, black_box(coords), 42, 10).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_projectors, bench_clustering);
criterion_main!(benches);
