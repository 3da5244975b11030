//! sitesync-hub - Main entry point
//!
//! Real-time hub for collaborative site material tracking: serves the WebSocket room
//! surface and the small HTTP site directory, and issues session tokens for operators.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitesync_common::auth::issue_token;
use sitesync_common::config::{ConfigOverrides, HubConfig, TomlConfig};
use sitesync_common::db;
use sitesync_common::{Identity, Role};
use sitesync_hub::gateway::PersistenceGateway;
use sitesync_hub::{build_router, AppState};
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sitesync-hub
#[derive(Parser, Debug)]
#[command(name = "sitesync-hub")]
#[command(about = "Real-time site inventory hub")]
#[command(version)]
struct Args {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(short, long, env = "SITESYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding sitesync.db
    #[arg(short, long, env = "SITESYNC_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "SITESYNC_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SITESYNC_PORT")]
    port: Option<u16>,

    /// Session signing secret (0 disables signature checks)
    #[arg(long, env = "SITESYNC_SHARED_SECRET")]
    shared_secret: Option<i64>,

    /// Deadline for each persistence call, in milliseconds
    #[arg(long, env = "SITESYNC_PERSISTENCE_TIMEOUT_MS")]
    persistence_timeout_ms: Option<u64>,

    /// Outbound event queue size per connection
    #[arg(long, env = "SITESYNC_OUTBOUND_CAPACITY")]
    outbound_capacity: Option<usize>,

    /// Keep all data in memory; nothing survives a restart
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hub (default)
    Serve,
    /// Print a session token for an already-authenticated user
    IssueToken {
        username: String,
        #[arg(long, default_value = "user")]
        role: Role,
        /// Token lifetime in seconds
        #[arg(long, default_value_t = 12 * 60 * 60)]
        ttl_secs: i64,
    },
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root_folder: self.root_folder.clone(),
            bind_addr: self.bind_addr.clone(),
            port: self.port,
            shared_secret: self.shared_secret,
            persistence_timeout_ms: self.persistence_timeout_ms,
            outbound_capacity: self.outbound_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitesync_hub=debug,sitesync_common=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    info!(
        "Starting SiteSync hub v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let file = TomlConfig::load(args.config.as_deref()).context("Failed to load config file")?;
    let config = HubConfig::resolve(&args.overrides(), &file).context("Invalid configuration")?;

    let pool = open_store(&config, args.ephemeral).await?;
    let shared_secret = match config.shared_secret {
        Some(secret) => secret,
        None => db::settings::load_shared_secret(&pool)
            .await
            .context("Failed to load session shared secret")?,
    };
    if shared_secret == 0 {
        warn!("Session signature checking disabled (shared_secret = 0)");
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pool, shared_secret).await,
        Command::IssueToken {
            username,
            role,
            ttl_secs,
        } => {
            if args.ephemeral {
                warn!("Ephemeral store: a generated secret dies with this process");
            }
            let identity = Identity::new(username, role);
            println!("{}", issue_token(&identity, ttl_secs, shared_secret));
            Ok(())
        }
    }
}

async fn open_store(config: &HubConfig, ephemeral: bool) -> Result<SqlitePool> {
    if ephemeral {
        info!("Using in-memory store");
        return db::init_memory_pool()
            .await
            .context("Failed to create in-memory store");
    }

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());
    db::init_database_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}

async fn serve(config: HubConfig, pool: SqlitePool, shared_secret: i64) -> Result<()> {
    let gateway = PersistenceGateway::new(pool, config.persistence_timeout);
    let state = AppState::new(gateway, shared_secret, config.outbound_capacity);
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("sitesync-hub listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

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
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
