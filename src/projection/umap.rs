//! UMAP: Uniform Manifold Approximation and Projection
//!
//! Implements the UMAP algorithm (McInnes et al., 2018) in 3D with:
//! - Parallel KNN graph construction via rayon
//! - Fuzzy simplicial set with binary-search sigma
//! - SGD layout optimization with negative sampling

use super::neighbors::{nearest_among, KnnGraph};
use super::Projector;
use crate::error::{ExomapError, Result};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// UMAP configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UmapConfig {
    /// Number of nearest neighbors (controls local vs global structure)
    pub n_neighbors: usize,
    /// Minimum distance between points in the embedding
    pub min_dist: f64,
    /// Number of optimization epochs
    pub n_epochs: usize,
    /// SGD learning rate
    pub learning_rate: f64,
    /// Number of negative samples per positive edge
    pub negative_sample_rate: usize,
    /// Spread of the embedding
    pub spread: f64,
    /// Random seed for reproducibility
    pub random_state: u64,
    /// Maximum samples (subsample if dataset is larger)
    pub max_samples: usize,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            n_epochs: 200,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            spread: 1.0,
            random_state: 42,
            max_samples: 10_000,
        }
    }
}

/// An edge in the fuzzy simplicial set
struct Edge {
    i: usize,
    j: usize,
    weight: f64,
}

/// UMAP dimensionality reduction
pub struct Umap {
    config: UmapConfig,
}

impl Umap {
    pub fn new(config: UmapConfig) -> Self {
        Self { config }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(UmapConfig {
            random_state: seed,
            ..Default::default()
        })
    }

    /// Run UMAP on dense data. Returns an n_samples x 3 embedding.
    pub fn fit_transform(&self, data: &[Vec<f64>]) -> Result<Vec<[f64; 3]>> {
        let n = data.len();
        if n < 3 {
            return Err(ExomapError::InsufficientData { required: 3, actual: n });
        }
        if self.config.n_neighbors < 2 {
            return Err(ExomapError::invalid_parameter(
                "n_neighbors",
                self.config.n_neighbors,
                "must be >= 2",
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);

        // Subsample if dataset is too large
        let sample_indices = if n > self.config.max_samples {
            let mut indices: Vec<usize> = (0..n).collect();
            // Fisher-Yates partial shuffle
            for i in 0..self.config.max_samples {
                let j = rng.gen_range(i..n);
                indices.swap(i, j);
            }
            indices.truncate(self.config.max_samples);
            indices.sort_unstable();
            Some(indices)
        } else {
            None
        };

        let work_data: Vec<Vec<f64>> = match &sample_indices {
            Some(indices) => indices.iter().map(|&i| data[i].clone()).collect(),
            None => data.to_vec(),
        };

        let k = self.config.n_neighbors.min(work_data.len() - 1);
        let graph = KnnGraph::build(&work_data, k);
        let edges = self.compute_fuzzy_set(&graph);
        debug!(points = work_data.len(), k, edges = edges.len(), "UMAP graph built");

        let embedding = self.optimize_layout(work_data.len(), &edges, &mut rng);

        let Some(indices) = sample_indices else {
            return Ok(embedding);
        };

        // Unsampled points sit next to their nearest sampled neighbour
        let mut full = vec![[0.0f64; 3]; n];
        let mut sampled = vec![false; n];
        for (sub_idx, &orig_idx) in indices.iter().enumerate() {
            full[orig_idx] = embedding[sub_idx];
            sampled[orig_idx] = true;
        }
        let placed: Vec<(usize, [f64; 3])> = (0..n)
            .into_par_iter()
            .filter(|&i| !sampled[i])
            .filter_map(|i| {
                let nearest = nearest_among(data, &data[i], &indices)?;
                let base = full[nearest];
                let t = i as f64 * 0.001;
                Some((i, [base[0] + t.sin() * 0.1, base[1] + t.cos() * 0.1, base[2] + (t * 1.7).sin() * 0.1]))
            })
            .collect();
        for (i, point) in placed {
            full[i] = point;
        }
        Ok(full)
    }

    /// Fuzzy simplicial set: per-point rho and sigma, then probabilistic
    /// t-conorm symmetrization.
    fn compute_fuzzy_set(&self, graph: &KnnGraph) -> Vec<Edge> {
        let n = graph.len();
        let k = graph.k().max(1);
        let target = (k as f64).log2();

        let params: Vec<(f64, f64)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let dists = &graph.distances[i];
                let rho = dists.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);

                let mut lo = 0.0_f64;
                let mut hi = f64::INFINITY;
                let mut sigma = 1.0;

                for _ in 0..64 {
                    let sum: f64 = dists
                        .iter()
                        .map(|&d| (-(d - rho).max(0.0) / sigma).exp())
                        .sum();

                    if (sum - target).abs() < 1e-5 {
                        break;
                    }
                    if sum > target {
                        hi = sigma;
                        sigma = (lo + hi) / 2.0;
                    } else {
                        lo = sigma;
                        sigma = if hi.is_infinite() { sigma * 2.0 } else { (lo + hi) / 2.0 };
                    }
                }
                (rho, sigma.max(1e-3 * rho.max(1e-12)))
            })
            .collect();

        let mut directed: HashMap<(usize, usize), f64> = HashMap::with_capacity(n * k);
        for i in 0..n {
            let (rho, sigma) = params[i];
            for (&j, &d) in graph.indices[i].iter().zip(&graph.distances[i]) {
                let w = if d <= rho {
                    1.0
                } else {
                    (-(d - rho) / sigma).exp()
                };
                directed.insert((i, j), w);
            }
        }

        // w_sym(i,j) = w(i,j) + w(j,i) - w(i,j) * w(j,i)
        let mut symmetric: HashMap<(usize, usize), f64> = HashMap::with_capacity(directed.len());
        for (&(i, j), &w_ij) in &directed {
            let key = if i < j { (i, j) } else { (j, i) };
            let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
            symmetric.insert(key, w_ij + w_ji - w_ij * w_ji);
        }

        let mut edges: Vec<Edge> = symmetric
            .into_iter()
            .filter(|(_, w)| *w > 1e-8)
            .map(|((i, j), weight)| Edge { i, j, weight })
            .collect();
        // HashMap order is random; the SGD schedule must not be
        edges.sort_unstable_by_key(|e| (e.i, e.j));
        edges
    }

    /// SGD layout optimization with negative sampling
    fn optimize_layout(
        &self,
        n_samples: usize,
        edges: &[Edge],
        rng: &mut ChaCha8Rng,
    ) -> Vec<[f64; 3]> {
        let (a, b) = find_ab_params(self.config.spread, self.config.min_dist);

        let mut embedding: Vec<[f64; 3]> = (0..n_samples)
            .map(|_| {
                [
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                ]
            })
            .collect();

        let n_epochs = self.config.n_epochs;
        let max_weight = edges.iter().map(|e| e.weight).fold(0.0_f64, f64::max);
        let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_weight / e.weight).collect();
        let mut next_sample = epochs_per_sample.clone();

        for epoch in 0..n_epochs {
            let alpha = self.config.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);

            for (e, edge) in edges.iter().enumerate() {
                if next_sample[e] > epoch as f64 + 1.0 {
                    continue;
                }
                next_sample[e] += epochs_per_sample[e];

                let (i, j) = (edge.i, edge.j);

                // Attractive force
                let dy = sub(embedding[i], embedding[j]);
                let dist_sq = dot(dy, dy);
                if dist_sq > 0.0 {
                    let coeff = -2.0 * a * b * dist_sq.powf(b - 1.0) / (1.0 + a * dist_sq.powf(b));
                    for c in 0..3 {
                        let g = clip(coeff * dy[c]) * alpha;
                        embedding[i][c] += g;
                        embedding[j][c] -= g;
                    }
                }

                // Negative sampling (repulsive forces)
                for _ in 0..self.config.negative_sample_rate {
                    let other = rng.gen_range(0..n_samples);
                    if other == i {
                        continue;
                    }
                    let dy = sub(embedding[i], embedding[other]);
                    let dist_sq = dot(dy, dy);
                    if dist_sq <= 0.0 {
                        continue;
                    }
                    let coeff = 2.0 * b / ((0.001 + dist_sq) * (1.0 + a * dist_sq.powf(b)));
                    for c in 0..3 {
                        embedding[i][c] += clip(coeff * dy[c]) * alpha;
                    }
                }
            }
        }

        embedding
    }
}

impl Projector for Umap {
    fn name(&self) -> &'static str {
        "UMAP"
    }

    fn project(&self, data: &[Vec<f64>]) -> Result<Vec<[f64; 3]>> {
        self.fit_transform(data)
    }
}

fn sub(p: [f64; 3], q: [f64; 3]) -> [f64; 3] {
    [p[0] - q[0], p[1] - q[1], p[2] - q[2]]
}

fn dot(p: [f64; 3], q: [f64; 3]) -> f64 {
    p[0] * q[0] + p[1] * q[1] + p[2] * q[2]
}

fn clip(g: f64) -> f64 {
    g.clamp(-4.0, 4.0)
}

/// Fit `1 / (1 + a * d^(2b))` to the target membership curve
///
/// The target is 1 below `min_dist` and `exp(-(d - min_dist) / spread)`
/// above it, sampled over `[0, 3 * spread]`. Least squares by a shrinking
/// grid search over (log a, b).
pub(crate) fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (1..=300).map(|i| 3.0 * spread * i as f64 / 300.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() })
        .collect();

    let loss = |log_a: f64, b: f64| -> f64 {
        let a = log_a.exp();
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let f = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (f - y) * (f - y)
            })
            .sum()
    };

    let (mut log_a, mut b) = (0.0_f64, 1.0_f64);
    let (mut span_a, mut span_b) = (5.0_f64, 0.9_f64);
    for _ in 0..6 {
        let mut best = (loss(log_a, b), log_a, b);
        for ia in -20..=20 {
            for ib in -20..=20 {
                let la = log_a + span_a * ia as f64 / 20.0;
                let bb = (b + span_b * ib as f64 / 20.0).max(0.05);
                let l = loss(la, bb);
                if l < best.0 {
                    best = (l, la, bb);
                }
            }
        }
        log_a = best.1;
        b = best.2;
        span_a /= 4.0;
        span_b /= 4.0;
    }
    (log_a.exp(), b)
}
