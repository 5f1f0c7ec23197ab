//! Projection module: dimensionality reduction to 3D for the viewer.

pub mod neighbors;
pub mod pca;
pub mod tsne;
pub mod umap;

pub use neighbors::KnnGraph;
pub use pca::{Pca, PcaConfig, PcaResult};
pub use tsne::{perplexity_for, Tsne, TsneConfig};
pub use umap::{Umap, UmapConfig};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Maps scaled feature rows to 3D coordinates
pub trait Projector {
    fn name(&self) -> &'static str;

    fn project(&self, data: &[Vec<f64>]) -> Result<Vec<[f64; 3]>>;
}

/// Projection algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectorKind {
    #[default]
    Tsne,
    Umap,
    Pca,
}

impl ProjectorKind {
    /// Projector for `n` rows, stochastic parts seeded with `seed`
    pub fn build(self, n: usize, seed: u64) -> Box<dyn Projector + Send + Sync> {
        match self {
            ProjectorKind::Tsne => Box::new(Tsne::for_size(n, seed)),
            ProjectorKind::Umap => Box::new(Umap::with_seed(seed)),
            ProjectorKind::Pca => Box::new(Pca::with_seed(seed)),
        }
    }
}

impl fmt::Display for ProjectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProjectorKind::Tsne => "tsne",
            ProjectorKind::Umap => "umap",
            ProjectorKind::Pca => "pca",
        };
        f.write_str(name)
    }
}

impl FromStr for ProjectorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tsne" | "t-sne" => Ok(ProjectorKind::Tsne),
            "umap" => Ok(ProjectorKind::Umap),
            "pca" => Ok(ProjectorKind::Pca),
            other => Err(format!("unknown projector '{other}' (expected tsne, umap or pca)")),
        }
    }
}

/// 3D coordinates plus the method that produced them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    pub coords: Vec<[f64; 3]>,
    /// `t-SNE`, `UMAP`, `PCA` or `PCA (fallback)`
    pub used: String,
    pub fallback: bool,
}

/// Project with `kind`, falling back to PCA if t-SNE or UMAP fails.
///
/// A PCA failure is returned as is.
pub fn project_with_fallback(kind: ProjectorKind, data: &[Vec<f64>], seed: u64) -> Result<Projection> {
    let projector = kind.build(data.len(), seed);

    match projector.project(data) {
        Ok(coords) => {
            info!(projector = projector.name(), points = coords.len(), "Projection complete");
            Ok(Projection {
                coords,
                used: projector.name().to_string(),
                fallback: false,
            })
        }
        Err(e) if kind != ProjectorKind::Pca => {
            warn!(projector = projector.name(), error = %e, "Projection failed, falling back to PCA");
            let coords = Pca::with_seed(seed).project(data)?;
            Ok(Projection {
                coords,
                used: "PCA (fallback)".to_string(),
                fallback: true,
            })
        }
        Err(e) => Err(e),
    }
}
