//! exomap command line
//!
//! `build` (the default) runs the pipeline and serves the result, `serve`
//! re-serves an existing output directory, `info` describes a catalog file.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::catalog::{CatalogLoader, CatalogSchema, DatasetMode, Source};
use crate::clustering::{ClusterMethod, DEFAULT_K_MAX};
use crate::config::{
    PipelineConfig, ServeConfig, DEFAULT_KOI_PATH, DEFAULT_SEED, DEFAULT_TESS_PATH,
};
use crate::pipeline::{Pipeline, RunReport};
use crate::preprocessing::ScalerType;
use crate::projection::ProjectorKind;
use crate::server::run_server;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(240, 190, 80) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", warn("!"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "exomap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Project Kepler KOI and TESS TOI candidates to 3D and explore them in a browser")]
#[command(long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Build options used when no subcommand is given
    #[command(flatten)]
    pub build: BuildArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harmonize, project and cluster the catalogs, then write and serve the viewer
    Build(BuildArgs),

    /// Serve an existing output directory
    Serve(ServeArgs),

    /// Show rows, columns and null counts of a catalog file
    Info {
        /// Catalog file (CSV, TSV or Parquet)
        #[arg(short, long)]
        data: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Kepler KOI table
    #[arg(long, default_value = DEFAULT_KOI_PATH)]
    pub koi: PathBuf,

    /// TESS TOI table
    #[arg(long, default_value = DEFAULT_TESS_PATH)]
    pub tess: PathBuf,

    /// Catalogs to use (koi, tess, both)
    #[arg(long, default_value = "both")]
    pub dataset: DatasetMode,

    /// Projection (tsne, umap, pca)
    #[arg(long, default_value = "tsne")]
    pub projector: ProjectorKind,

    /// Clustering (hdbscan, kmeans)
    #[arg(long, default_value = "hdbscan")]
    pub clusterer: ClusterMethod,

    /// Feature scaling (standard, minmax, robust, none)
    #[arg(long, default_value = "standard")]
    pub scaler: ScalerType,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Random seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Largest k used by k-means
    #[arg(long, default_value_t = DEFAULT_K_MAX)]
    pub k_max: usize,

    /// Viewer page title
    #[arg(long)]
    pub title: Option<String>,

    /// Write the files and exit
    #[arg(long)]
    pub no_serve: bool,

    #[command(flatten)]
    pub serve: ServeFlags,
}

/// Flags shared by `build` and `serve`
#[derive(Args, Debug, Clone, Default)]
pub struct ServeFlags {
    /// Do not open a browser
    #[arg(long)]
    pub no_open: bool,

    /// Bind address [env: EXOMAP_HOST, default 127.0.0.1]
    #[arg(long)]
    pub host: Option<String>,

    /// Port [env: EXOMAP_PORT, default 8008]
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Output directory of a previous build
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Page `/` redirects to
    #[arg(long, default_value = crate::config::DEFAULT_VIEWER_FILE)]
    pub index: String,

    #[command(flatten)]
    pub serve: ServeFlags,
}

impl BuildArgs {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new()
            .with_koi_path(&self.koi)
            .with_tess_path(&self.tess)
            .with_mode(self.dataset)
            .with_projector(self.projector)
            .with_clusterer(self.clusterer)
            .with_scaler(self.scaler)
            .with_out_dir(&self.out_dir)
            .with_seed(self.seed)
            .with_k_max(self.k_max);
        if let Some(title) = &self.title {
            config = config.with_title(title.clone());
        }
        config
    }
}

impl ServeArgs {
    pub fn serve_config(&self) -> ServeConfig {
        self.serve
            .apply(ServeConfig::default())
            .with_dir(&self.dir)
            .with_index_file(self.index.clone())
    }
}

impl ServeFlags {
    /// Environment defaults overridden by whatever flags were given
    pub fn apply(&self, mut config: ServeConfig) -> ServeConfig {
        if let Some(host) = &self.host {
            config = config.with_host(host.clone());
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if self.no_open {
            config = config.with_open_browser(false);
        }
        config
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_build(args: &BuildArgs) -> anyhow::Result<()> {
    let config = args.pipeline_config();

    section("Build");
    println!("  {:<12} {}", muted("Dataset"), config.mode);
    if config.mode.uses_koi() {
        println!("  {:<12} {}", muted("KOI"), config.koi_path.display());
    }
    if config.mode.uses_tess() {
        println!("  {:<12} {}", muted("TESS"), config.tess_path.display());
    }
    println!("  {:<12} {}", muted("Projector"), config.projector);
    println!("  {:<12} {}", muted("Clusterer"), config.clusterer);
    println!("  {:<12} {}", muted("Scaler"), config.scaler);
    println!("  {:<12} {}", muted("Seed"), config.seed);
    println!();

    let viewer_file = config.viewer_file.clone();
    let out_dir = config.out_dir.clone();
    let pipeline = Pipeline::new(config);
    let report = tokio::task::spawn_blocking(move || pipeline.run()).await??;

    print_report(&report);

    if args.no_serve {
        return Ok(());
    }

    let serve = args
        .serve
        .apply(ServeConfig::default())
        .with_dir(out_dir)
        .with_index_file(viewer_file);
    cmd_serve(serve).await
}

fn print_report(report: &RunReport) {
    let m = &report.manifest;

    section("Result");
    step_ok(&format!(
        "{} points ({} confirmed, {} candidate)",
        m.total, m.confirmed, m.candidate
    ));
    if m.dropped_rows > 0 {
        step_warn(&format!("{} rows dropped for missing features", m.dropped_rows));
    }
    if m.projector_fallback {
        step_warn(&format!("projection fell back to {}", m.projector));
    } else {
        step_ok(&format!("projected with {}", m.projector));
    }
    if m.clustering_fallback {
        step_warn(&format!("clustering fell back to {}", m.clustering));
    } else {
        step_ok(&format!("clustered with {}", m.clustering));
    }
    step_ok(&format!("{} clusters, {} noise points", m.n_clusters, m.n_noise));

    println!();
    println!("  {:<12} {}", muted("Points"), report.paths.points.display());
    println!("  {:<12} {}", muted("Manifest"), report.paths.manifest.display());
    println!("  {:<12} {}", muted("Viewer"), report.paths.viewer.display());
    println!("  {:<12} {}", muted("Time"), format!("{:.2}s", report.elapsed_secs).white());
    println!();
}

pub async fn cmd_serve(config: ServeConfig) -> anyhow::Result<()> {
    let base = format!("http://{}:{}", config.host, config.port);

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "exomap viewer".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Viewer ", &config.viewer_url()));
    line_box(&kv("Health ", &format!("{base}/api/health")));
    line_box(&kv("Dir    ", &config.dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

pub fn cmd_info(data_path: &PathBuf) -> anyhow::Result<()> {
    section("Catalog Info");

    step_run("Loading");
    let start = Instant::now();
    let df = CatalogLoader::new().load(data_path)?;
    step_done(&format!("{:?}", start.elapsed()));

    let summary = CatalogLoader::summarize(&df);
    println!();
    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Columns"), summary.n_cols);
    println!("  {:<12} {}", muted("Catalog"), detect_catalog(&df));
    println!();

    println!("  {:<24} {:<10} {:>8}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(44)));
    for col in &summary.columns {
        println!(
            "  {:<24} {:<10} {:>8}",
            col.name,
            col.dtype.as_str().truecolor(140, 140, 140),
            col.null_count
        );
    }
    println!();
    Ok(())
}

/// Which schema's required columns the frame carries
fn detect_catalog(df: &polars::prelude::DataFrame) -> String {
    let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    let matches = |source: Source| {
        CatalogSchema::for_source(source)
            .required_columns()
            .iter()
            .all(|c| names.iter().any(|n| n == c))
    };

    match (matches(Source::Koi), matches(Source::Tess)) {
        (true, _) => "KOI".to_string(),
        (_, true) => "TESS".to_string(),
        _ => "unknown (required KOI/TESS columns missing)".to_string(),
    }
}
