//! Run manifest written next to the points file

use crate::catalog::{DatasetMode, LabelCounts};
use crate::clustering::{ClusterSummary, Clustering};
use crate::error::Result;
use crate::projection::Projection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Description of one build, stored as `<points stem>_meta.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub mode: DatasetMode,
    pub projector: String,
    pub projector_fallback: bool,
    pub clustering: String,
    pub clustering_fallback: bool,
    pub features: Vec<String>,
    pub total: usize,
    pub confirmed: usize,
    pub candidate: usize,
    pub dropped_rows: usize,
    pub unlabeled_rows: usize,
    pub n_clusters: usize,
    pub n_noise: usize,
    pub seed: u64,
    pub points_file: String,
    pub generator: String,
    pub generated_at: DateTime<Utc>,
}

/// Inputs for [`RunManifest::new`] that are not projection/clustering results
#[derive(Debug, Clone)]
pub struct ManifestContext<'a> {
    pub mode: DatasetMode,
    pub features: &'a [String],
    pub counts: LabelCounts,
    pub dropped_rows: usize,
    pub unlabeled_rows: usize,
    pub seed: u64,
    pub points_file: &'a str,
}

impl RunManifest {
    pub fn new(
        ctx: ManifestContext<'_>,
        projection: &Projection,
        clustering: &Clustering,
        summary: ClusterSummary,
    ) -> Self {
        Self {
            mode: ctx.mode,
            projector: projection.used.clone(),
            projector_fallback: projection.fallback,
            clustering: clustering.used.clone(),
            clustering_fallback: clustering.fallback,
            features: ctx.features.to_vec(),
            total: ctx.counts.total,
            confirmed: ctx.counts.confirmed,
            candidate: ctx.counts.candidate,
            dropped_rows: ctx.dropped_rows,
            unlabeled_rows: ctx.unlabeled_rows,
            n_clusters: summary.n_clusters,
            n_noise: summary.n_noise,
            seed: ctx.seed,
            points_file: ctx.points_file.to_string(),
            generator: format!("exomap {}", env!("CARGO_PKG_VERSION")),
            generated_at: Utc::now(),
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path.as_ref())?)?)
    }
}

/// `points_3d.json` -> `points_3d_meta.json`
pub fn manifest_file_name(points_file: &str) -> String {
    let stem = Path::new(points_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(points_file);
    format!("{stem}_meta.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> RunManifest {
        let features = vec!["period_days".to_string(), "prad_re".to_string()];
        let ctx = ManifestContext {
            mode: DatasetMode::Both,
            features: &features,
            counts: LabelCounts { total: 5, confirmed: 2, candidate: 3 },
            dropped_rows: 1,
            unlabeled_rows: 4,
            seed: 42,
            points_file: "points_3d.json",
        };
        let projection = Projection {
            coords: vec![[0.0; 3]; 5],
            used: "PCA (fallback)".to_string(),
            fallback: true,
        };
        let clustering = Clustering {
            labels: vec![0, 0, 1, 1, -1],
            used: "HDBSCAN(min_cluster_size=10)".to_string(),
            fallback: false,
        };
        let summary = crate::clustering::cluster_summary(&clustering.labels);
        RunManifest::new(ctx, &projection, &clustering, summary)
    }

    #[test]
    fn test_manifest_file_name() {
        assert_eq!(manifest_file_name("points_3d.json"), "points_3d_meta.json");
        assert_eq!(manifest_file_name("out"), "out_meta.json");
    }

    #[test]
    fn test_manifest_contents() {
        let m = manifest();
        assert_eq!(m.projector, "PCA (fallback)");
        assert!(m.projector_fallback);
        assert_eq!(m.n_clusters, 2);
        assert_eq!(m.n_noise, 1);
        assert_eq!(m.confirmed + m.candidate, m.total);
    }

    #[test]
    fn test_manifest_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points_3d_meta.json");
        let m = manifest();
        m.write(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"mode\": \"both\""));
        assert_eq!(RunManifest::read(&path).unwrap(), m);
    }
}
