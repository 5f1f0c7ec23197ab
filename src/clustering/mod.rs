//! Clustering of projected points: HDBSCAN with a k-means fallback

pub mod hdbscan;
pub mod kmeans;

pub use hdbscan::{Hdbscan, HdbscanParams, HdbscanResult};
pub use kmeans::KMeans;

use crate::error::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Default cap on the fallback cluster count
pub const DEFAULT_K_MAX: usize = 10;

/// Clustering method selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMethod {
    #[default]
    Hdbscan,
    KMeans,
}

impl fmt::Display for ClusterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterMethod::Hdbscan => f.write_str("hdbscan"),
            ClusterMethod::KMeans => f.write_str("kmeans"),
        }
    }
}

impl FromStr for ClusterMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hdbscan" => Ok(ClusterMethod::Hdbscan),
            "kmeans" | "k-means" => Ok(ClusterMethod::KMeans),
            other => Err(format!("unknown clusterer '{other}' (expected hdbscan or kmeans)")),
        }
    }
}

/// `max(10, n / 50)`
pub fn min_cluster_size_for(n: usize) -> usize {
    (n / 50).max(10)
}

/// `min(k_max, max(2, round(sqrt(n) / 4)))`, ties rounded to even
pub fn kmeans_k_for(n: usize, k_max: usize) -> usize {
    let k = ((n as f64).sqrt() / 4.0).round_ties_even() as usize;
    k.max(2).min(k_max)
}

/// Per-point labels plus the method that produced them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clustering {
    /// Cluster per point, -1 for noise
    pub labels: Vec<i32>,
    /// `HDBSCAN(min_cluster_size=N)` or `KMeans(k=K)`
    pub used: String,
    pub fallback: bool,
}

/// Cluster and noise counts of a labelling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub n_clusters: usize,
    pub n_noise: usize,
}

pub fn cluster_summary(labels: &[i32]) -> ClusterSummary {
    let clusters: BTreeSet<i32> = labels.iter().copied().filter(|&l| l >= 0).collect();
    ClusterSummary {
        n_clusters: clusters.len(),
        n_noise: labels.iter().filter(|&&l| l < 0).count(),
    }
}

fn to_array(coords: &[[f64; 3]]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = coords.iter().flat_map(|p| p.iter().copied()).collect();
    Ok(Array2::from_shape_vec((coords.len(), 3), flat)?)
}

fn run_kmeans(x: &Array2<f64>, seed: u64, k_max: usize) -> Result<Clustering> {
    let k = kmeans_k_for(x.nrows(), k_max);
    let mut model = KMeans::new(k).with_random_state(seed);
    model.fit(x)?;
    let labels = model
        .labels()
        .map(|l| l.iter().map(|&c| c as i32).collect())
        .unwrap_or_default();

    Ok(Clustering {
        labels,
        used: format!("KMeans(k={k})"),
        fallback: false,
    })
}

/// Cluster with `method`; an HDBSCAN failure falls back to k-means.
///
/// A k-means failure is returned as is.
pub fn cluster_with_fallback(
    method: ClusterMethod,
    coords: &[[f64; 3]],
    seed: u64,
    k_max: usize,
) -> Result<Clustering> {
    let x = to_array(coords)?;

    let clustering = match method {
        ClusterMethod::KMeans => run_kmeans(&x, seed, k_max)?,
        ClusterMethod::Hdbscan => {
            let min_cluster_size = min_cluster_size_for(coords.len());
            match Hdbscan::new(HdbscanParams::new(min_cluster_size)).fit(&x) {
                Ok(result) => Clustering {
                    labels: result.labels,
                    used: format!("HDBSCAN(min_cluster_size={min_cluster_size})"),
                    fallback: false,
                },
                Err(e) => {
                    warn!(error = %e, "HDBSCAN failed, falling back to k-means");
                    Clustering {
                        fallback: true,
                        ..run_kmeans(&x, seed, k_max)?
                    }
                }
            }
        }
    };

    let summary = cluster_summary(&clustering.labels);
    info!(
        method = %clustering.used,
        clusters = summary.n_clusters,
        noise = summary.n_noise,
        "Clustering complete"
    );
    Ok(clustering)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs(per: usize) -> Vec<[f64; 3]> {
        let mut points = Vec::new();
        for c in 0..2 {
            for i in 0..per {
                let t = i as f64;
                let o = c as f64 * 50.0;
                points.push([o + t.sin(), o + t.cos(), o + (t * 0.5).sin()]);
            }
        }
        points
    }

    #[test]
    fn test_heuristics() {
        assert_eq!(min_cluster_size_for(100), 10);
        assert_eq!(min_cluster_size_for(2000), 40);
        assert_eq!(kmeans_k_for(16, 10), 2);
        assert_eq!(kmeans_k_for(100, 10), 2); // 2.5 rounds to even
        assert_eq!(kmeans_k_for(196, 10), 4); // 3.5 rounds to even
        assert_eq!(kmeans_k_for(10_000, 10), 10);
        assert_eq!(kmeans_k_for(10_000, 8), 8);
    }

    #[test]
    fn test_cluster_summary() {
        let summary = cluster_summary(&[0, 0, 1, -1, 2, -1]);
        assert_eq!(summary, ClusterSummary { n_clusters: 3, n_noise: 2 });
        assert_eq!(cluster_summary(&[]), ClusterSummary::default());
    }

    #[test]
    fn test_hdbscan_used_string() {
        let clustering = cluster_with_fallback(ClusterMethod::Hdbscan, &blobs(30), 42, 10).unwrap();
        assert_eq!(clustering.used, "HDBSCAN(min_cluster_size=10)");
        assert!(!clustering.fallback);
        assert_eq!(clustering.labels.len(), 60);
    }

    #[test]
    fn test_hdbscan_falls_back_to_kmeans() {
        // fewer points than min_cluster_size
        let points = blobs(3);
        let clustering = cluster_with_fallback(ClusterMethod::Hdbscan, &points, 42, 10).unwrap();
        assert_eq!(clustering.used, "KMeans(k=2)");
        assert!(clustering.fallback);
        assert!(clustering.labels.iter().all(|&l| l == 0 || l == 1));
    }

    #[test]
    fn test_kmeans_failure_is_error() {
        assert!(cluster_with_fallback(ClusterMethod::KMeans, &[[0.0, 0.0, 0.0]], 42, 10).is_err());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("KMeans".parse::<ClusterMethod>().unwrap(), ClusterMethod::KMeans);
        assert!("dbscan".parse::<ClusterMethod>().is_err());
    }
}
