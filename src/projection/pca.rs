//! PCA: Principal Component Analysis
//!
//! Linear reduction to 3D. Computes the top three eigenvectors of the
//! covariance matrix using power iteration with deflation.

use super::Projector;
use crate::error::{ExomapError, Result};
use crate::utils::SimdOps;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const N_COMPONENTS: usize = 3;

/// PCA configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Whether to center the data (subtract mean per feature)
    pub center: bool,
    /// Whether to scale to unit variance
    pub scale: bool,
    /// Random seed for power iteration initialization
    pub random_state: u64,
    /// Power iterations per component
    pub max_iter: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            center: true,
            scale: false,
            random_state: 42,
            max_iter: 300,
        }
    }
}

/// PCA result including the embedding and explained variance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaResult {
    /// Projected data: n_samples x 3
    pub embedding: Vec<[f64; 3]>,
    /// Explained variance ratio for each component (sums to <= 1.0)
    pub explained_variance_ratio: Vec<f64>,
    /// Eigenvalues (raw variance per component)
    pub eigenvalues: Vec<f64>,
    /// Unit-length principal axes, one per component
    pub components: Vec<Vec<f64>>,
}

/// PCA dimensionality reduction
pub struct Pca {
    config: PcaConfig,
}

impl Pca {
    pub fn new(config: PcaConfig) -> Self {
        Self { config }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(PcaConfig {
            random_state: seed,
            ..Default::default()
        })
    }

    /// Run PCA on dense data
    pub fn fit_transform(&self, data: &[Vec<f64>]) -> Result<PcaResult> {
        let n = data.len();
        if n < N_COMPONENTS {
            return Err(ExomapError::InsufficientData {
                required: N_COMPONENTS,
                actual: n,
            });
        }

        let d = data[0].len();
        if d < N_COMPONENTS {
            return Err(ExomapError::ProjectionError(format!(
                "PCA to 3D requires at least 3 features, got {d}"
            )));
        }

        let centered = self.center_and_scale(data, d);
        let cov = compute_covariance(&centered, d);
        let (eigenvalues, components) = self.power_iteration(&cov, d);

        // Total variance is the trace of the covariance
        let full_variance: f64 = (0..d).map(|i| cov[i * d + i]).sum::<f64>().max(1e-12);
        let explained_variance_ratio = eigenvalues
            .iter()
            .map(|&ev| (ev / full_variance).max(0.0))
            .collect();

        let embedding = centered
            .par_iter()
            .map(|sample| {
                let mut point = [0.0f64; N_COMPONENTS];
                for (c, axis) in components.iter().enumerate() {
                    point[c] = SimdOps::dot_f64(sample, axis);
                }
                point
            })
            .collect();

        Ok(PcaResult {
            embedding,
            explained_variance_ratio,
            eigenvalues,
            components,
        })
    }

    fn center_and_scale(&self, data: &[Vec<f64>], d: usize) -> Vec<Vec<f64>> {
        let columns: Vec<Vec<f64>> = (0..d).map(|j| SimdOps::column(data, j)).collect();

        let means: Vec<f64> = if self.config.center {
            columns.iter().map(|c| SimdOps::mean_f64(c)).collect()
        } else {
            vec![0.0; d]
        };
        let stds: Vec<f64> = if self.config.scale {
            columns
                .iter()
                .map(|c| SimdOps::variance_f64(c).sqrt().max(1e-12))
                .collect()
        } else {
            vec![1.0; d]
        };

        data.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, &val)| (val - means[j]) / stds[j])
                    .collect()
            })
            .collect()
    }

    /// Power iteration with deflation; each axis is sign-fixed so its
    /// largest-magnitude loading is positive.
    fn power_iteration(&self, cov: &[f64], d: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
        let tol = 1e-10;
        let mut eigenvalues = Vec::with_capacity(N_COMPONENTS);
        let mut eigenvectors: Vec<Vec<f64>> = Vec::with_capacity(N_COMPONENTS);

        let mut work = cov.to_vec();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);

        for _ in 0..N_COMPONENTS {
            let mut v: Vec<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
            SimdOps::normalize(&mut v);
            let mut eigenvalue = 0.0f64;

            for _ in 0..self.config.max_iter {
                let mut w: Vec<f64> = (0..d)
                    .map(|i| SimdOps::dot_f64(&work[i * d..(i + 1) * d], &v))
                    .collect();
                let new_eigenvalue = SimdOps::dot_f64(&v, &w);
                SimdOps::normalize(&mut w);

                let diff = SimdOps::euclidean_distance(&v, &w);
                v = w;
                eigenvalue = new_eigenvalue;
                if diff < tol {
                    break;
                }
            }

            let pivot = v
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if pivot < 0.0 {
                v.iter_mut().for_each(|x| *x = -*x);
            }

            eigenvalue = eigenvalue.max(0.0);

            // Deflate: A = A - eigenvalue * v * v^T
            for i in 0..d {
                for j in 0..d {
                    work[i * d + j] -= eigenvalue * v[i] * v[j];
                }
            }
            eigenvalues.push(eigenvalue);
            eigenvectors.push(v);
        }

        (eigenvalues, eigenvectors)
    }
}

/// Sample covariance (d x d) stored as a flat row-major Vec
fn compute_covariance(data: &[Vec<f64>], d: usize) -> Vec<f64> {
    let n = data.len() as f64;
    let columns: Vec<Vec<f64>> = (0..d).map(|j| SimdOps::column(data, j)).collect();
    let mut cov = vec![0.0f64; d * d];

    for i in 0..d {
        for j in i..d {
            let val = SimdOps::dot_f64(&columns[i], &columns[j]) / (n - 1.0).max(1.0);
            cov[i * d + j] = val;
            cov[j * d + i] = val;
        }
    }
    cov
}

impl Projector for Pca {
    fn name(&self) -> &'static str {
        "PCA"
    }

    fn project(&self, data: &[Vec<f64>]) -> Result<Vec<[f64; 3]>> {
        self.fit_transform(data).map(|r| r.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0, 0.0, 0.3],
            vec![0.1, 0.1, 0.0, 0.1],
            vec![0.0, 0.1, 0.1, 0.2],
            vec![10.0, 10.0, 10.0, 0.1],
            vec![10.1, 10.0, 10.0, 0.3],
            vec![10.0, 10.1, 10.0, 0.2],
        ]
    }

    #[test]
    fn test_pca_separates_clusters() {
        let result = Pca::new(PcaConfig::default()).fit_transform(&two_clusters()).unwrap();
        assert_eq!(result.embedding.len(), 6);
        assert_eq!(result.explained_variance_ratio.len(), 3);
        assert!(result.explained_variance_ratio[0] > 0.95);

        let mean_a = result.embedding[..3].iter().map(|p| p[0]).sum::<f64>() / 3.0;
        let mean_b = result.embedding[3..].iter().map(|p| p[0]).sum::<f64>() / 3.0;
        assert!((mean_a - mean_b).abs() > 10.0);
    }

    #[test]
    fn test_pca_sign_is_deterministic() {
        let data = two_clusters();
        let a = Pca::with_seed(1).fit_transform(&data).unwrap();
        let b = Pca::with_seed(99).fit_transform(&data).unwrap();
        for (pa, pb) in a.embedding.iter().zip(&b.embedding) {
            assert!((pa[0] - pb[0]).abs() < 1e-6);
        }
        // First axis points along +x, +y, +z
        assert!(a.components[0].iter().take(3).all(|&w| w > 0.0));
    }

    #[test]
    fn test_pca_explained_variance_bounded() {
        let data = vec![
            vec![1.0, 0.0, 0.5],
            vec![0.0, 1.0, 0.3],
            vec![1.0, 1.0, 0.8],
            vec![0.5, 0.5, 0.4],
            vec![0.2, 0.8, 0.6],
            vec![0.9, 0.1, 0.2],
        ];
        let result = Pca::new(PcaConfig::default()).fit_transform(&data).unwrap();
        let total: f64 = result.explained_variance_ratio.iter().sum();
        assert!(total > 0.0 && total <= 1.001, "sum={total}");
    }

    #[test]
    fn test_pca_requires_three_samples_and_features() {
        let pca = Pca::new(PcaConfig::default());
        assert!(matches!(
            pca.fit_transform(&[vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0]]),
            Err(ExomapError::InsufficientData { required: 3, actual: 2 })
        ));
        assert!(pca
            .fit_transform(&[vec![1.0, 2.0], vec![2.0, 3.0], vec![3.0, 5.0]])
            .is_err());
    }
}
