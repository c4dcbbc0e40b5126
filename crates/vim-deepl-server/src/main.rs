//! vim-deepl server
//!
//! Local HTTP façade between the editor and the vocabulary engine. Listens on
//! loopback, persists everything into one SQLite database under the data
//! directory, and logs to `<data>/vim-deepl.log`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vim_deepl_core::{Config, Services};
use vim_deepl_server::{AppState, build_router};

/// Local dictionary/translation server for the vim-deepl plugin
#[derive(Parser)]
#[command(name = "vim-deepl-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Translation cache, SM-2 trainer and MW audio over local HTTP")]
struct Args {
    /// Listen host (overrides VIM_DEEPL_HTTP_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides VIM_DEEPL_HTTP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Data directory (overrides VIM_DEEPL_DATA_DIR and derived paths)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn init_logging(cfg: &Config) {
    let filter = EnvFilter::try_new(cfg.log_level.to_lowercase())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.log_path)
    {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_target(false)
                .with_ansi(false)
                .init();
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .init();
            tracing::warn!(path = %cfg.log_path.display(), "could not open log file: {e}");
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(dir) = args.data_dir {
        cfg.db_path = dir.join("vocab.db");
        cfg.log_path = dir.join("vim-deepl.log");
        cfg.data_dir = dir;
        if let Err(e) = std::fs::create_dir_all(&cfg.data_dir) {
            eprintln!("configuration error: cannot create {}: {e}", cfg.data_dir.display());
            std::process::exit(1);
        }
    }
    if let Some(host) = args.host {
        cfg.http_host = host;
    }
    if let Some(port) = args.port {
        cfg.http_port = port;
    }

    init_logging(&cfg);
    info!("vim-deepl-server v{} starting", env!("CARGO_PKG_VERSION"));
    info!(db = %cfg.db_path.display(), data = %cfg.data_dir.display(), "storage paths resolved");

    let services = match Services::new(&cfg) {
        Ok(services) => Arc::new(services),
        Err(e) => {
            error!("failed to initialize services: {e}");
            eprintln!("failed to initialize services: {e}");
            std::process::exit(1);
        }
    };

    let app = build_router(AppState { services });

    let addr = format!("{}:{}", cfg.http_host, cfg.http_port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            eprintln!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("listening on http://{addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {e}");
        std::process::exit(1);
    }

    info!("vim-deepl-server shutting down");
}

/// Graceful shutdown on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
