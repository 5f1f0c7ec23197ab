//! Local viewer server
//!
//! Serves a build's output directory over HTTP so the viewer can fetch its
//! JSON files, and optionally opens the viewer in the default browser.

use crate::config::ServeConfig;
use axum::{response::Redirect, routing::get, Router};
use std::net::SocketAddr;
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

/// Static files from `dir`; `/` redirects to `index_file`
pub fn create_router(dir: impl AsRef<Path>, index_file: &str) -> Router {
    let target = format!("/{}", index_file.trim_start_matches('/'));

    Router::new()
        .route(
            "/",
            get(move || {
                let target = target.clone();
                async move { Redirect::temporary(&target) }
            }),
        )
        .route("/api/health", get(|| async { "ok" }))
        .fallback_service(ServeDir::new(dir.as_ref()))
        .layer(TraceLayer::new_for_http())
}

/// Serve until Ctrl+C
pub async fn run_server(config: ServeConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    if !config.dir.is_dir() {
        anyhow::bail!("output directory {} does not exist", config.dir.display());
    }
    if !config.dir.join(&config.index_file).is_file() {
        warn!(
            dir = %config.dir.display(),
            index = %config.index_file,
            "Viewer page not found, run a build first"
        );
    }

    let app = create_router(&config.dir, &config.index_file);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let url = config.viewer_url();
    info!(
        address = %addr,
        dir = %config.dir.display(),
        started_at = %start_time.to_rfc3339(),
        "Serving output directory"
    );
    info!(url = %url, "Viewer available");

    if config.open_browser {
        open_browser(&url);
    }

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Launch the platform URL opener. Failure only logs a warning.
pub fn open_browser(url: &str) {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        std::process::Command::new("xdg-open")
    };

    match command.arg(url).spawn() {
        Ok(_) => info!(url, "Opened browser"),
        Err(e) => warn!(url, error = %e, "Could not open a browser, open the URL manually"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_redirects_to_viewer() {
        let dir = tempfile::tempdir().unwrap();
        let response = create_router(dir.path(), "viewer.html")
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/viewer.html");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = create_router(dir.path(), "viewer.html")
            .oneshot(Request::builder().uri("/nope.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
