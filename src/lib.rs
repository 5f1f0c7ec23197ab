//! exomap - 3D explorer for candidate-exoplanet catalogs
//!
//! Harmonizes the Kepler KOI and TESS TOI tables onto one numeric feature
//! schema, projects the rows to three dimensions, clusters the projected
//! points and writes a static three.js viewer over the result.
//!
//! # Modules
//!
//! ## Data
//! - [`catalog`] - Dispositions, column schemas, loading and harmonization
//! - [`preprocessing`] - Feature scaling
//!
//! ## Algorithms
//! - [`projection`] - t-SNE, UMAP and PCA with a PCA fallback
//! - [`clustering`] - HDBSCAN with a k-means fallback
//!
//! ## Output
//! - [`export`] - Points JSON, run manifest and viewer page
//! - [`pipeline`] - The end-to-end build
//!
//! ## Services
//! - [`server`] - Local static file server for the viewer
//! - [`cli`] - Command-line interface

// Core error handling and configuration
pub mod error;
pub mod config;

// Data
pub mod catalog;
pub mod preprocessing;

// Algorithms
pub mod projection;
pub mod clustering;

// Output
pub mod export;
pub mod pipeline;

// Utilities
pub mod utils;

// Services
pub mod server;
pub mod cli;

pub use error::{ExomapError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ExomapError, Result};

    // Configuration
    pub use crate::config::{PipelineConfig, ServeConfig};

    // Catalogs
    pub use crate::catalog::{
        CatalogLoader, Candidate, DatasetMode, Disposition, HarmonizedTable, Harmonizer, Source,
    };

    // Algorithms
    pub use crate::preprocessing::{Scaler, ScalerType};
    pub use crate::projection::{project_with_fallback, Projection, Projector, ProjectorKind};
    pub use crate::clustering::{cluster_with_fallback, ClusterMethod, Clustering};

    // Output
    pub use crate::export::{PointRecord, RunManifest, ViewerPage};
    pub use crate::pipeline::{Pipeline, RunReport};
}
