//! End-to-end build: load, harmonize, scale, project, cluster, export

use crate::catalog::{CatalogLoader, HarmonizedTable, Harmonizer, LabelCounts};
use crate::clustering::{cluster_summary, cluster_with_fallback, ClusterSummary, Clustering};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::export::{
    build_records, export_run, manifest_file_name, ExportPaths, ManifestContext, RunManifest,
    ViewerPage,
};
use crate::preprocessing::Scaler;
use crate::projection::{project_with_fallback, Projection};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of a build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub paths: ExportPaths,
    pub manifest: RunManifest,
    pub elapsed_secs: f64,
}

/// Single-run batch job over one [`PipelineConfig`]
pub struct Pipeline {
    config: PipelineConfig,
    loader: CatalogLoader,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            loader: CatalogLoader::new(),
        }
    }

    pub fn with_loader(mut self, loader: CatalogLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the catalogs the dataset mode needs
    pub fn load(&self) -> Result<(Option<DataFrame>, Option<DataFrame>)> {
        let mode = self.config.mode;
        let koi = if mode.uses_koi() {
            Some(self.loader.load(&self.config.koi_path)?)
        } else {
            None
        };
        let tess = if mode.uses_tess() {
            Some(self.loader.load(&self.config.tess_path)?)
        } else {
            None
        };
        Ok((koi, tess))
    }

    pub fn harmonize(&self, koi: Option<&DataFrame>, tess: Option<&DataFrame>) -> Result<HarmonizedTable> {
        let table = Harmonizer::harmonize(self.config.mode, koi, tess)?;
        let counts = table.label_counts()?;
        info!(
            mode = %self.config.mode,
            rows = counts.total,
            confirmed = counts.confirmed,
            candidate = counts.candidate,
            features = table.feature_names().len(),
            dropped = table.dropped_rows,
            unlabeled = table.unlabeled_rows,
            "Harmonized catalogs"
        );
        Ok(table)
    }

    /// Scaled row-major feature matrix
    pub fn scale(&self, table: &HarmonizedTable) -> Result<Vec<Vec<f64>>> {
        let features = table.feature_matrix()?;
        let mut scaler = Scaler::new(self.config.scaler);
        let scaled = scaler.fit_transform(&features)?;
        debug!(scaler = %self.config.scaler, rows = scaled.len(), "Scaled features");
        Ok(scaled)
    }

    pub fn project(&self, scaled: &[Vec<f64>]) -> Result<Projection> {
        let started = Instant::now();
        let projection = project_with_fallback(self.config.projector, scaled, self.config.seed)?;
        info!(
            requested = %self.config.projector,
            used = %projection.used,
            fallback = projection.fallback,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Projected to 3D"
        );
        Ok(projection)
    }

    pub fn cluster(&self, projection: &Projection) -> Result<(Clustering, ClusterSummary)> {
        let clustering = cluster_with_fallback(
            self.config.clusterer,
            &projection.coords,
            self.config.seed,
            self.config.k_max,
        )?;
        let summary = cluster_summary(&clustering.labels);
        Ok((clustering, summary))
    }

    /// Run every step and write the output files
    pub fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        info!(
            mode = %self.config.mode,
            projector = %self.config.projector,
            clusterer = %self.config.clusterer,
            out_dir = %self.config.out_dir.display(),
            seed = self.config.seed,
            "Starting build"
        );

        let (koi, tess) = self.load()?;
        let table = self.harmonize(koi.as_ref(), tess.as_ref())?;
        let scaled = self.scale(&table)?;
        let projection = self.project(&scaled)?;
        let (clustering, summary) = self.cluster(&projection)?;

        let candidates = table.candidates()?;
        let records = build_records(&candidates, &projection.coords, &clustering.labels)?;
        let counts: LabelCounts = table.label_counts()?;

        let manifest = RunManifest::new(
            ManifestContext {
                mode: table.mode(),
                features: table.feature_names(),
                counts,
                dropped_rows: table.dropped_rows,
                unlabeled_rows: table.unlabeled_rows,
                seed: self.config.seed,
                points_file: &self.config.points_file,
            },
            &projection,
            &clustering,
            summary,
        );

        let mut viewer = ViewerPage::new(
            self.config.points_file.clone(),
            manifest_file_name(&self.config.points_file),
        );
        if let Some(title) = &self.config.title {
            viewer = viewer.with_title(title.clone());
        }

        let paths = export_run(
            &self.config.out_dir,
            &self.config.viewer_file,
            &records,
            &manifest,
            &viewer,
        )?;

        let elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            points = records.len(),
            clusters = summary.n_clusters,
            noise = summary.n_noise,
            elapsed_secs,
            "Build complete"
        );

        Ok(RunReport {
            paths,
            manifest,
            elapsed_secs,
        })
    }
}
