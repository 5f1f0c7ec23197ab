//! Integration test: full build (load → harmonize → scale → project → cluster → export)

mod common;

use common::write_catalogs;
use exomap::catalog::DatasetMode;
use exomap::clustering::ClusterMethod;
use exomap::config::PipelineConfig;
use exomap::export::{read_points, RunManifest};
use exomap::pipeline::Pipeline;
use exomap::projection::ProjectorKind;
use std::path::Path;

fn config(data: &Path, out: &Path) -> PipelineConfig {
    let (koi, tess) = write_catalogs(data);
    PipelineConfig::new()
        .with_koi_path(koi)
        .with_tess_path(tess)
        .with_out_dir(out)
}

#[test]
fn test_pca_build_writes_all_files() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().join("nested/output");

    let report = Pipeline::new(
        config(data.path(), &out_dir)
            .with_projector(ProjectorKind::Pca)
            .with_clusterer(ClusterMethod::KMeans),
    )
    .run()
    .unwrap();

    assert!(report.paths.points.ends_with("points_3d.json"));
    assert!(report.paths.manifest.ends_with("points_3d_meta.json"));
    assert!(report.paths.viewer.ends_with("viewer.html"));

    let points = read_points(&report.paths.points).unwrap();
    assert_eq!(points.len(), 65);
    assert!(points.iter().all(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite()));
    assert!(points.iter().all(|p| p.cluster >= 0));
    assert_eq!(points.iter().filter(|p| p.actual_label == 1).count(), 22);

    let manifest = RunManifest::read(&report.paths.manifest).unwrap();
    assert_eq!(manifest, report.manifest);
    assert_eq!(manifest.projector, "PCA");
    // round(sqrt(65) / 4) = 2
    assert_eq!(manifest.clustering, "KMeans(k=2)");
    assert_eq!(manifest.n_noise, 0);
    assert_eq!(manifest.dropped_rows, 1);

    let html = std::fs::read_to_string(&report.paths.viewer).unwrap();
    assert!(html.contains("\"points_3d.json\""));
    assert!(html.contains("\"points_3d_meta.json\""));
}

#[test]
fn test_records_carry_identifiers_and_nulls() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let report = Pipeline::new(config(data.path(), out.path()).with_projector(ProjectorKind::Pca))
        .run()
        .unwrap();

    let raw = std::fs::read_to_string(&report.paths.points).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let rows = value.as_array().unwrap();

    let first = &rows[0];
    assert_eq!(first["source"], "KOI");
    assert_eq!(first["kepid"], "10000000");
    assert_eq!(first["toi"], "");
    assert_eq!(first["actual_label_name"], "CONFIRMED");
    assert!(first["prad_re"].is_number());

    let last = rows.last().unwrap();
    assert_eq!(last["source"], "TESS");
    assert_eq!(last["kepid"], "");
    assert_eq!(last["toi"], "1039.01");
}

#[test]
fn test_hdbscan_labels_are_valid() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let report = Pipeline::new(config(data.path(), out.path()).with_projector(ProjectorKind::Pca))
        .run()
        .unwrap();

    let manifest = &report.manifest;
    assert!(manifest.clustering.starts_with("HDBSCAN(min_cluster_size=10)") || manifest.clustering_fallback);

    let points = read_points(&report.paths.points).unwrap();
    assert!(points.iter().all(|p| p.cluster >= -1));
    let noise = points.iter().filter(|p| p.cluster == -1).count();
    assert_eq!(noise, manifest.n_noise);
}

#[test]
fn test_tsne_build_is_seeded() {
    let data = tempfile::tempdir().unwrap();
    let out_a = tempfile::tempdir().unwrap();
    let out_b = tempfile::tempdir().unwrap();

    let base = config(data.path(), out_a.path())
        .with_mode(DatasetMode::Koi)
        .with_seed(11);
    let a = Pipeline::new(base.clone()).run().unwrap();
    let b = Pipeline::new(base.with_out_dir(out_b.path())).run().unwrap();

    assert_eq!(a.manifest.projector, "t-SNE");
    assert_eq!(read_points(&a.paths.points).unwrap(), read_points(&b.paths.points).unwrap());
    assert_eq!(a.manifest.features.len(), 14);
}

#[test]
fn test_missing_catalog_is_error() {
    let out = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new()
        .with_koi_path(out.path().join("missing.csv"))
        .with_mode(DatasetMode::Koi)
        .with_out_dir(out.path());

    assert!(Pipeline::new(config).run().is_err());
    assert!(!out.path().join("points_3d.json").exists());
}
