//! phishpair-survey - Main entry point
//!
//! Serves the pairwise email survey over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use phishpair_common::config::{
    database_path, load_toml_config, resolve_root_folder, StorageBackend, ROOT_FOLDER_ENV,
};
use phishpair_common::db::init_database;
use phishpair_survey::content::FsContentResolver;
use phishpair_survey::store::{
    MemoryResponseStore, MemorySessionStore, ResponseStore, SessionStore, SqliteResponseStore,
    SqliteSessionStore,
};
use phishpair_survey::survey::{SurveyService, SurveySettings};
use phishpair_survey::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for phishpair-survey
#[derive(Parser, Debug)]
#[command(name = "phishpair-survey")]
#[command(about = "Pairwise email suspicion survey server")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "PHISHPAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PHISHPAIR_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "PHISHPAIR_HOST")]
    host: Option<String>,

    /// Directory containing the stimulus emails
    #[arg(short, long, env = "PHISHPAIR_EMAILS_DIR")]
    emails_dir: Option<PathBuf>,

    /// Pairs shown to each participant
    #[arg(short, long, env = "PHISHPAIR_NUM_PAIRS")]
    num_pairs: Option<usize>,

    /// Storage backend (sqlite or memory)
    #[arg(long, env = "PHISHPAIR_STORAGE")]
    storage: Option<StorageBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_toml_config(args.config.as_deref()).context("Failed to load config")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("phishpair_survey={0},phishpair_common={0},tower_http=info", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting phishpair-survey v{}",
        env!("CARGO_PKG_VERSION")
    );

    let settings = SurveySettings {
        emails_dir: args
            .emails_dir
            .unwrap_or_else(|| config.survey.emails_dir.clone()),
        num_pairs: args.num_pairs.unwrap_or(config.survey.num_pairs),
    };
    if settings.num_pairs == 0 {
        anyhow::bail!("num_pairs must be at least 1");
    }
    info!("Emails directory: {}", settings.emails_dir.display());
    info!("Pairs per participant: {}", settings.num_pairs);

    if !settings.emails_dir.is_dir() {
        warn!(
            "Emails directory {} does not exist yet; trials will fail until it does",
            settings.emails_dir.display()
        );
    }

    let backend = args.storage.unwrap_or(config.storage.backend);
    let (sessions, responses): (Arc<dyn SessionStore>, Arc<dyn ResponseStore>) = match backend {
        StorageBackend::Sqlite => {
            let root_folder =
                resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
            let db_path = database_path(&root_folder);
            info!("Root folder: {}", root_folder.display());

            let pool = init_database(&db_path)
                .await
                .with_context(|| format!("Failed to open database {}", db_path.display()))?;
            let responses = SqliteResponseStore::open(pool.clone())
                .await
                .context("Failed to prepare response store")?;
            (Arc::new(SqliteSessionStore::new(pool)), Arc::new(responses))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage: responses are lost on exit");
            (
                Arc::new(MemorySessionStore::new()),
                Arc::new(MemoryResponseStore::new()),
            )
        }
    };

    let content = Arc::new(FsContentResolver::new(settings.emails_dir.clone()));
    let survey = Arc::new(SurveyService::new(settings, sessions, responses, content));
    let app = build_router(AppState::new(survey));

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
