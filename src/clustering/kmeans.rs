//! K-Means clustering with k-means++ initialization and restarts

use crate::error::{ExomapError, Result};
use ndarray::{Array2, ArrayView1};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// K-Means clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    /// Independent k-means++ starts; the lowest inertia wins
    pub n_init: usize,
    pub random_state: u64,
    /// Cluster labels assigned during fit
    labels: Option<Vec<usize>>,
    /// Sum of squared distances to nearest centroid (inertia)
    pub inertia: Option<f64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(3)
    }
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            n_init: 10,
            random_state: 42,
            labels: None,
            inertia: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = (rng.next_u64() as usize) % n_samples;
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            // Distance to the nearest centroid chosen so far
            let dists: Vec<f64> = (0..n_samples)
                .map(|i| {
                    (0..c)
                        .map(|j| euclidean_sq(x.row(i), centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            // Weighted random selection proportional to D²
            let total: f64 = dists.iter().sum();
            if total <= 0.0 {
                let idx = (rng.next_u64() as usize) % n_samples;
                centroids.row_mut(c).assign(&x.row(idx));
                continue;
            }

            let r = (rng.next_u64() as f64 / u64::MAX as f64) * total;
            let mut cumulative = 0.0;
            let mut chosen = n_samples - 1;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r {
                    chosen = i;
                    break;
                }
            }
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    fn assign(x: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
        (0..x.nrows())
            .into_par_iter()
            .map(|i| nearest_centroid(x.row(i), centroids).0)
            .collect()
    }

    /// One Lloyd run from a fresh k-means++ start
    fn run_once(&self, x: &Array2<f64>, rng: &mut ChaCha8Rng) -> (Vec<usize>, f64) {
        let n_samples = x.nrows();
        let mut centroids = Self::kmeans_pp_init(x, self.n_clusters, rng);
        let mut labels = vec![usize::MAX; n_samples];

        for _ in 0..self.max_iter {
            let new_labels = Self::assign(x, &centroids);
            let changed = new_labels.iter().zip(&labels).filter(|(a, b)| a != b).count();
            labels = new_labels;

            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }

            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // Empty cluster, reseed from a random sample
                    let idx = (rng.next_u64() as usize) % n_samples;
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            centroids = new_centroids;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        let labels = Self::assign(x, &centroids);
        let inertia = (0..n_samples)
            .map(|i| euclidean_sq(x.row(i), centroids.row(labels[i])))
            .sum();
        (labels, inertia)
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if self.n_clusters == 0 {
            return Err(ExomapError::invalid_parameter("n_clusters", 0, "must be >= 1"));
        }
        if n_samples < self.n_clusters {
            return Err(ExomapError::ClusteringError(format!(
                "n_samples ({}) < n_clusters ({})",
                n_samples, self.n_clusters
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ExomapError::ClusteringError(
                "coordinates contain non-finite values".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut best: Option<(Vec<usize>, f64)> = None;

        for run in 0..self.n_init.max(1) {
            let candidate = self.run_once(x, &mut rng);
            debug!(run, inertia = candidate.1, "k-means restart");
            if best.as_ref().map_or(true, |b| candidate.1 < b.1) {
                best = Some(candidate);
            }
        }

        if let Some((labels, inertia)) = best {
            self.labels = Some(labels);
            self.inertia = Some(inertia);
        }
        Ok(self)
    }

    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }
}

fn euclidean_sq(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest_centroid(row: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::MAX);
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = euclidean_sq(row, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}
