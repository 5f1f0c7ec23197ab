//! Build and serve configuration

use crate::catalog::DatasetMode;
use crate::clustering::{ClusterMethod, DEFAULT_K_MAX};
use crate::preprocessing::ScalerType;
use crate::projection::ProjectorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_KOI_PATH: &str = "data/Kepler Object of Interest.csv";
pub const DEFAULT_TESS_PATH: &str = "data/TESS Project Candidates.csv";
pub const DEFAULT_POINTS_FILE: &str = "points_3d.json";
pub const DEFAULT_VIEWER_FILE: &str = "viewer.html";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8008;
pub const DEFAULT_SEED: u64 = 42;

/// Configuration of one build run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Kepler KOI table
    pub koi_path: PathBuf,

    /// TESS TOI table
    pub tess_path: PathBuf,

    pub mode: DatasetMode,
    pub projector: ProjectorKind,
    pub clusterer: ClusterMethod,
    pub scaler: ScalerType,

    /// Directory receiving the points, manifest and viewer files
    pub out_dir: PathBuf,

    /// Seed for every stochastic step
    pub seed: u64,

    /// Upper bound on k when k-means runs
    pub k_max: usize,

    pub points_file: String,
    pub viewer_file: String,
    pub title: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            koi_path: PathBuf::from(DEFAULT_KOI_PATH),
            tess_path: PathBuf::from(DEFAULT_TESS_PATH),
            mode: DatasetMode::default(),
            projector: ProjectorKind::default(),
            clusterer: ClusterMethod::default(),
            scaler: ScalerType::default(),
            out_dir: PathBuf::from("."),
            seed: DEFAULT_SEED,
            k_max: DEFAULT_K_MAX,
            points_file: DEFAULT_POINTS_FILE.to_string(),
            viewer_file: DEFAULT_VIEWER_FILE.to_string(),
            title: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_koi_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.koi_path = path.into();
        self
    }

    pub fn with_tess_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tess_path = path.into();
        self
    }

    pub fn with_mode(mut self, mode: DatasetMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_projector(mut self, projector: ProjectorKind) -> Self {
        self.projector = projector;
        self
    }

    pub fn with_clusterer(mut self, clusterer: ClusterMethod) -> Self {
        self.clusterer = clusterer;
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_k_max(mut self, k_max: usize) -> Self {
        self.k_max = k_max;
        self
    }

    pub fn with_points_file(mut self, name: impl Into<String>) -> Self {
        self.points_file = name.into();
        self
    }

    pub fn with_viewer_file(mut self, name: impl Into<String>) -> Self {
        self.viewer_file = name.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Configuration of the local viewer server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub open_browser: bool,
    /// Directory served as static files
    pub dir: PathBuf,
    /// Page `/` redirects to
    pub index_file: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl ServeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with `EXOMAP_HOST`, `EXOMAP_PORT` and `EXOMAP_NO_BROWSER`
    /// taken from `lookup`. An unparseable port keeps the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("EXOMAP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: lookup("EXOMAP_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            open_browser: lookup("EXOMAP_NO_BROWSER").map_or(true, |v| !truthy(&v)),
            dir: PathBuf::from("."),
            index_file: DEFAULT_VIEWER_FILE.to_string(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_index_file(mut self, name: impl Into<String>) -> Self {
        self.index_file = name.into();
        self
    }

    /// `http://host:port/index_file`
    pub fn viewer_url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.index_file)
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.koi_path, PathBuf::from("data/Kepler Object of Interest.csv"));
        assert_eq!(config.tess_path, PathBuf::from("data/TESS Project Candidates.csv"));
        assert_eq!(config.mode, DatasetMode::Both);
        assert_eq!(config.projector, ProjectorKind::Tsne);
        assert_eq!(config.clusterer, ClusterMethod::Hdbscan);
        assert_eq!(config.scaler, ScalerType::Standard);
        assert_eq!(config.seed, 42);
        assert_eq!(config.k_max, 10);
    }

    #[test]
    fn test_pipeline_builders() {
        let config = PipelineConfig::new()
            .with_mode(DatasetMode::Koi)
            .with_projector(ProjectorKind::Pca)
            .with_seed(7)
            .with_out_dir("out");
        assert_eq!(config.mode, DatasetMode::Koi);
        assert_eq!(config.projector, ProjectorKind::Pca);
        assert_eq!(config.seed, 7);
        assert_eq!(config.out_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_viewer_url() {
        let config = ServeConfig::new()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_index_file("viewer.html");
        assert_eq!(config.viewer_url(), "http://127.0.0.1:9000/viewer.html");
    }

    #[test]
    fn test_serve_defaults_without_env() {
        let config = ServeConfig::from_lookup(|_| None);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8008);
        assert!(config.open_browser);
        assert_eq!(config.index_file, "viewer.html");
        assert_eq!(config.viewer_url(), "http://127.0.0.1:8008/viewer.html");
    }

    #[test]
    fn test_serve_env_overrides() {
        let env = |key: &str| match key {
            "EXOMAP_HOST" => Some("0.0.0.0".to_string()),
            "EXOMAP_PORT" => Some("9100".to_string()),
            "EXOMAP_NO_BROWSER" => Some("1".to_string()),
            _ => None,
        };
        let config = ServeConfig::from_lookup(env);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9100);
        assert!(!config.open_browser);
    }

    #[test]
    fn test_serve_bad_port_keeps_default() {
        let env = |key: &str| match key {
            "EXOMAP_PORT" => Some("eighty".to_string()),
            "EXOMAP_NO_BROWSER" => Some("0".to_string()),
            _ => None,
        };
        let config = ServeConfig::from_lookup(env);
        assert_eq!(config.port, 8008);
        assert!(config.open_browser);

        let config = ServeConfig::from_lookup(|k| (k == "EXOMAP_PORT").then(|| "70000".to_string()));
        assert_eq!(config.port, 8008);
    }

    #[test]
    fn test_truthy() {
        assert!(truthy("1"));
        assert!(truthy(" TRUE "));
        assert!(!truthy("0"));
        assert!(!truthy(""));
    }
}
