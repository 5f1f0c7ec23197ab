//! Output files of a build
//!
//! - [`points`]: the flat JSON array of per-point records
//! - [`manifest`]: the `_meta.json` run description
//! - [`viewer`]: the static HTML page that renders both

pub mod manifest;
pub mod points;
pub mod viewer;

pub use manifest::{manifest_file_name, ManifestContext, RunManifest};
pub use points::{build_records, read_points, write_points, PointRecord};
pub use viewer::ViewerPage;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths written by [`export_run`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPaths {
    pub points: PathBuf,
    pub manifest: PathBuf,
    pub viewer: PathBuf,
}

/// Write points, manifest and viewer into `out_dir`, creating it if needed
pub fn export_run(
    out_dir: &Path,
    viewer_file: &str,
    records: &[PointRecord],
    manifest: &RunManifest,
    viewer: &ViewerPage,
) -> Result<ExportPaths> {
    fs::create_dir_all(out_dir)?;

    let paths = ExportPaths {
        points: out_dir.join(&manifest.points_file),
        manifest: out_dir.join(manifest_file_name(&manifest.points_file)),
        viewer: out_dir.join(viewer_file),
    };

    write_points(&paths.points, records)?;
    info!(path = %paths.points.display(), points = records.len(), "Wrote points");

    manifest.write(&paths.manifest)?;
    info!(path = %paths.manifest.display(), "Wrote manifest");

    viewer.write(&paths.viewer)?;
    info!(path = %paths.viewer.display(), "Wrote viewer");

    Ok(paths)
}
