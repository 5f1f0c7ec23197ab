//! Barnes-Hut t-SNE in three dimensions
//!
//! Sparse input affinities over the `3 * perplexity` nearest neighbours,
//! an octree over the embedding for the repulsive term, and gradient
//! descent with momentum and per-coordinate gains.

use super::neighbors::KnnGraph;
use super::pca::{Pca, PcaConfig};
use super::Projector;
use crate::error::{ExomapError, Result};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MACHINE_EPSILON: f64 = f64::EPSILON;
const MAX_TREE_DEPTH: usize = 32;

/// t-SNE configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsneConfig {
    /// Effective number of neighbours
    pub perplexity: f64,
    /// Total gradient descent iterations
    pub n_iter: usize,
    /// Iterations run with exaggerated affinities
    pub exaggeration_iter: usize,
    pub early_exaggeration: f64,
    /// `None` selects `max(n / early_exaggeration / 4, 50)`
    pub learning_rate: Option<f64>,
    /// Barnes-Hut opening angle
    pub theta: f64,
    pub min_gain: f64,
    pub min_grad_norm: f64,
    /// Degrees of freedom of the Student-t kernel, `max(n_components - 1, 1)`
    pub dof: f64,
    pub random_state: u64,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            n_iter: 1000,
            exaggeration_iter: 250,
            early_exaggeration: 12.0,
            learning_rate: None,
            theta: 0.5,
            min_gain: 0.01,
            min_grad_norm: 1e-7,
            dof: 2.0,
            random_state: 42,
        }
    }
}

/// Perplexity used for a dataset of `n` rows: `min(30, max(5, n / 50))`
pub fn perplexity_for(n: usize) -> f64 {
    (n / 50).clamp(5, 30) as f64
}

/// Sparse symmetric joint probabilities, one row per point
struct Affinities {
    rows: Vec<Vec<(usize, f64)>>,
}

/// Barnes-Hut t-SNE
pub struct Tsne {
    config: TsneConfig,
}

impl Tsne {
    pub fn new(config: TsneConfig) -> Self {
        Self { config }
    }

    /// t-SNE with the size-derived perplexity for `n` rows
    pub fn for_size(n: usize, seed: u64) -> Self {
        Self::new(TsneConfig {
            perplexity: perplexity_for(n),
            random_state: seed,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &TsneConfig {
        &self.config
    }

    pub fn fit_transform(&self, data: &[Vec<f64>]) -> Result<Vec<[f64; 3]>> {
        let n = data.len();
        let perplexity = self.config.perplexity;
        if perplexity.is_nan() || perplexity <= 0.0 {
            return Err(ExomapError::invalid_parameter("perplexity", perplexity, "must be positive"));
        }
        if perplexity >= n as f64 {
            return Err(ExomapError::invalid_parameter(
                "perplexity",
                perplexity,
                format!("must be less than the number of samples ({n})"),
            ));
        }
        let dof = self.config.dof;
        if dof.is_nan() || dof <= 0.0 {
            return Err(ExomapError::invalid_parameter("dof", dof, "must be positive"));
        }
        if data.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ExomapError::ProjectionError("t-SNE input contains non-finite values".into()));
        }

        let k = ((3.0 * perplexity + 1.0) as usize).min(n - 1);
        let graph = KnnGraph::build(data, k);
        let affinities = joint_probabilities(&graph, perplexity);

        let mut embedding = self.initial_embedding(data);
        let learning_rate = self
            .config
            .learning_rate
            .unwrap_or_else(|| (n as f64 / self.config.early_exaggeration / 4.0).max(50.0));

        debug!(n, k, perplexity, learning_rate, "t-SNE affinities computed");

        let mut state = Descent {
            update: vec![[0.0; 3]; n],
            gains: vec![[1.0; 3]; n],
            learning_rate,
        };

        let stage_one = self.config.exaggeration_iter.min(self.config.n_iter);
        self.descend(&affinities, &mut embedding, &mut state, 0, stage_one, 0.5, self.config.early_exaggeration);
        self.descend(&affinities, &mut embedding, &mut state, stage_one, self.config.n_iter, 0.8, 1.0);

        Ok(embedding)
    }

    /// PCA initialisation rescaled so the first axis has std 1e-4
    fn initial_embedding(&self, data: &[Vec<f64>]) -> Vec<[f64; 3]> {
        let pca = Pca::new(PcaConfig {
            random_state: self.config.random_state,
            ..Default::default()
        });

        match pca.fit_transform(data) {
            Ok(result) => {
                let first: Vec<f64> = result.embedding.iter().map(|p| p[0]).collect();
                let mean = first.iter().sum::<f64>() / first.len() as f64;
                let std = (first.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / first.len() as f64).sqrt();
                let scale = if std > 0.0 { 1e-4 / std } else { 1e-4 };
                result
                    .embedding
                    .into_iter()
                    .map(|p| [p[0] * scale, p[1] * scale, p[2] * scale])
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "PCA initialisation failed, using random start");
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
                (0..data.len())
                    .map(|_| {
                        [
                            rng.gen_range(-1e-4..1e-4),
                            rng.gen_range(-1e-4..1e-4),
                            rng.gen_range(-1e-4..1e-4),
                        ]
                    })
                    .collect()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn descend(
        &self,
        affinities: &Affinities,
        embedding: &mut [[f64; 3]],
        state: &mut Descent,
        start: usize,
        end: usize,
        momentum: f64,
        exaggeration: f64,
    ) {
        for it in start..end {
            let (grad, kl) = gradient(
                affinities,
                embedding,
                self.config.theta,
                exaggeration,
                self.config.dof,
            );

            let mut grad_norm = 0.0;
            for i in 0..embedding.len() {
                for c in 0..3 {
                    let g = grad[i][c];
                    grad_norm += g * g;

                    let gain = &mut state.gains[i][c];
                    if state.update[i][c] * g < 0.0 {
                        *gain += 0.2;
                    } else {
                        *gain *= 0.8;
                    }
                    *gain = gain.max(self.config.min_gain);

                    let step = momentum * state.update[i][c] - state.learning_rate * *gain * g;
                    state.update[i][c] = step;
                    embedding[i][c] += step;
                }
            }
            let grad_norm = grad_norm.sqrt();

            if (it + 1) % 50 == 0 {
                debug!(iteration = it + 1, kl_divergence = kl, grad_norm, "t-SNE progress");
            }
            if grad_norm < self.config.min_grad_norm {
                debug!(iteration = it + 1, grad_norm, "t-SNE converged");
                break;
            }
        }
    }
}

struct Descent {
    update: Vec<[f64; 3]>,
    gains: Vec<[f64; 3]>,
    learning_rate: f64,
}

impl Projector for Tsne {
    fn name(&self) -> &'static str {
        "t-SNE"
    }

    fn project(&self, data: &[Vec<f64>]) -> Result<Vec<[f64; 3]>> {
        self.fit_transform(data)
    }
}

/// Conditional probabilities by per-point binary search on the precision,
/// then `P = (P + P^T) / sum`.
fn joint_probabilities(graph: &KnnGraph, perplexity: f64) -> Affinities {
    let n = graph.len();
    let desired_entropy = perplexity.ln();

    let conditional: Vec<Vec<f64>> = graph
        .distances
        .par_iter()
        .map(|dists| {
            let sq: Vec<f64> = dists.iter().map(|d| d * d).collect();
            calibrate_row(&sq, desired_entropy)
        })
        .collect();

    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(2 * n * graph.k());
    for i in 0..n {
        for (&j, &p) in graph.indices[i].iter().zip(&conditional[i]) {
            triplets.push((i, j, p));
            triplets.push((j, i, p));
        }
    }
    triplets.sort_unstable_by_key(|&(i, j, _)| (i, j));

    let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut total = 0.0;
    for (i, j, p) in triplets {
        total += p;
        match rows[i].last_mut() {
            Some((last, acc)) if *last == j => *acc += p,
            _ => rows[i].push((j, p)),
        }
    }

    let total = total.max(MACHINE_EPSILON);
    for row in &mut rows {
        for (_, p) in row.iter_mut() {
            *p /= total;
        }
    }
    Affinities { rows }
}

/// Row of conditional probabilities whose entropy matches `ln(perplexity)`
fn calibrate_row(sq_dists: &[f64], desired_entropy: f64) -> Vec<f64> {
    let mut beta = 1.0;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut p = vec![0.0; sq_dists.len()];

    for _ in 0..100 {
        let mut sum_p = 0.0;
        for (pj, &d) in p.iter_mut().zip(sq_dists) {
            *pj = (-d * beta).exp();
            sum_p += *pj;
        }
        if sum_p == 0.0 {
            sum_p = 1e-8;
        }

        let mut sum_dist_p = 0.0;
        for (pj, &d) in p.iter_mut().zip(sq_dists) {
            *pj /= sum_p;
            sum_dist_p += d * *pj;
        }

        let entropy_diff = sum_p.ln() + beta * sum_dist_p - desired_entropy;
        if entropy_diff.abs() <= 1e-5 {
            break;
        }
        if entropy_diff > 0.0 {
            beta_min = beta;
            beta = if beta_max == f64::INFINITY { beta * 2.0 } else { (beta + beta_max) / 2.0 };
        } else {
            beta_max = beta;
            beta = if beta_min == f64::NEG_INFINITY { beta / 2.0 } else { (beta + beta_min) / 2.0 };
        }
    }
    p
}

/// Octree cell; leaves hold their point indices
struct Cell {
    half: f64,
    count: usize,
    mass_center: [f64; 3],
    children: Vec<usize>,
    points: Vec<usize>,
}

struct Octree {
    cells: Vec<Cell>,
}

impl Octree {
    fn build(points: &[[f64; 3]]) -> Self {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for p in points {
            for c in 0..3 {
                lo[c] = lo[c].min(p[c]);
                hi[c] = hi[c].max(p[c]);
            }
        }
        let center = [(lo[0] + hi[0]) / 2.0, (lo[1] + hi[1]) / 2.0, (lo[2] + hi[2]) / 2.0];
        let extent = (0..3).map(|c| hi[c] - lo[c]).fold(0.0_f64, f64::max);
        let half = extent / 2.0 * (1.0 + 1e-3) + 1e-12;

        let mut tree = Self { cells: Vec::new() };
        tree.insert_cell(points, (0..points.len()).collect(), center, half, 0);
        tree
    }

    fn insert_cell(
        &mut self,
        points: &[[f64; 3]],
        members: Vec<usize>,
        center: [f64; 3],
        half: f64,
        depth: usize,
    ) -> usize {
        let count = members.len();
        let mut mass_center = [0.0; 3];
        for &m in &members {
            for c in 0..3 {
                mass_center[c] += points[m][c] / count as f64;
            }
        }

        let id = self.cells.len();
        self.cells.push(Cell {
            half,
            count,
            mass_center,
            children: Vec::new(),
            points: Vec::new(),
        });

        if count <= 1 || depth >= MAX_TREE_DEPTH {
            self.cells[id].points = members;
            return id;
        }

        let mut octants: [Vec<usize>; 8] = Default::default();
        for m in members {
            let p = points[m];
            let o = (p[0] >= center[0]) as usize
                | ((p[1] >= center[1]) as usize) << 1
                | ((p[2] >= center[2]) as usize) << 2;
            octants[o].push(m);
        }

        let child_half = half / 2.0;
        let mut children = Vec::with_capacity(8);
        for (o, group) in octants.into_iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let offset = |bit: usize| if o & bit != 0 { child_half } else { -child_half };
            let child_center = [
                center[0] + offset(1),
                center[1] + offset(2),
                center[2] + offset(4),
            ];
            children.push(self.insert_cell(points, group, child_center, child_half, depth + 1));
        }
        self.cells[id].children = children;
        id
    }

    /// Unnormalised repulsive force on point `i` and its share of the normaliser Z
    fn repulsion(&self, points: &[[f64; 3]], i: usize, theta_sq: f64, dof: f64) -> ([f64; 3], f64) {
        let y = points[i];
        let mut force = [0.0; 3];
        let mut sum_q = 0.0;
        let mut stack = vec![0usize];

        while let Some(id) = stack.pop() {
            let cell = &self.cells[id];
            if cell.children.is_empty() {
                for &j in &cell.points {
                    if j == i {
                        continue;
                    }
                    let diff = sub(y, points[j]);
                    let (w, inv) = kernel(dot(diff, diff), dof);
                    sum_q += w;
                    for c in 0..3 {
                        force[c] += w * inv * diff[c];
                    }
                }
                continue;
            }

            let diff = sub(y, cell.mass_center);
            let dist_sq = dot(diff, diff);
            let width = 2.0 * cell.half;
            if dist_sq > 0.0 && width * width / dist_sq < theta_sq {
                let (w, inv) = kernel(dist_sq, dof);
                let n_cell = cell.count as f64;
                sum_q += n_cell * w;
                for c in 0..3 {
                    force[c] += n_cell * w * inv * diff[c];
                }
            } else {
                stack.extend_from_slice(&cell.children);
            }
        }
        (force, sum_q)
    }
}

/// Student-t similarity `(1 + d²/dof)^(-(dof + 1) / 2)` and the factor
/// `(1 + d²/dof)^-1` its gradient picks up
fn kernel(dist_sq: f64, dof: f64) -> (f64, f64) {
    let inv = dof / (dof + dist_sq);
    let w = if dof == 1.0 { inv } else { inv.powf((dof + 1.0) / 2.0) };
    (w, inv)
}

/// Barnes-Hut KL gradient and the approximate KL divergence
fn gradient(
    affinities: &Affinities,
    embedding: &[[f64; 3]],
    theta: f64,
    exaggeration: f64,
    dof: f64,
) -> (Vec<[f64; 3]>, f64) {
    let tree = Octree::build(embedding);
    let theta_sq = theta * theta;

    let negative: Vec<([f64; 3], f64)> = (0..embedding.len())
        .into_par_iter()
        .map(|i| tree.repulsion(embedding, i, theta_sq, dof))
        .collect();
    let z: f64 = negative.iter().map(|(_, q)| q).sum::<f64>().max(MACHINE_EPSILON);

    let positive: Vec<([f64; 3], f64)> = affinities
        .rows
        .par_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut force = [0.0; 3];
            let mut kl = 0.0;
            for &(j, p) in row {
                let p = p * exaggeration;
                let diff = sub(embedding[i], embedding[j]);
                let (w, inv) = kernel(dot(diff, diff), dof);
                for c in 0..3 {
                    force[c] += p * inv * diff[c];
                }
                let q_norm = (w / z).max(MACHINE_EPSILON);
                kl += p * (p.max(MACHINE_EPSILON) / q_norm).ln();
            }
            (force, kl)
        })
        .collect();

    let scale = 2.0 * (dof + 1.0) / dof;
    let mut kl = 0.0;
    let grad = positive
        .iter()
        .zip(&negative)
        .map(|((pos, row_kl), (neg, _))| {
            kl += row_kl;
            [
                scale * (pos[0] - neg[0] / z),
                scale * (pos[1] - neg[1] / z),
                scale * (pos[2] - neg[2] / z),
            ]
        })
        .collect();
    (grad, kl)
}

fn sub(p: [f64; 3], q: [f64; 3]) -> [f64; 3] {
    [p[0] - q[0], p[1] - q[1], p[2] - q[2]]
}

fn dot(p: [f64; 3], q: [f64; 3]) -> f64 {
    p[0] * q[0] + p[1] * q[1] + p[2] * q[2]
}
