//! Warden API server binary.
//!
//! Reads configuration from the environment (and `.env`), runs migrations,
//! builds the permission rules and serves the API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, error, info, warn};
use warden_api::config::ApiConfig;
use warden_api::{AppState, Collaborators};
use warden_core::auth::live::InMemoryLiveTokenStore;
use warden_core::auth::queries::PgDirectory;
use warden_core::csrf::queries::{PgCsrfTokenStore, delete_expired_csrf_tokens};
use warden_core::permissions::queries::PgPermissionStore;
use warden_core::permissions::rules::RuleRegistry;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "warden_api_server", about = "Warden request-authorization API server")]
struct Args {
    /// Port to listen on. Overrides the port of `BIND_ADDR` when given.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Seconds between purges of expired CSRF tokens (0 disables).
    #[arg(long, default_value_t = 900)]
    csrf_purge_interval_secs: u64,
}

fn apply_overrides(config: &mut ApiConfig, args: &Args) {
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "127.0.0.1".into());
        config.bind_addr = format!("{host}:{port}");
    }
    if let Some(url) = &args.database_url {
        config.database_url = url.clone();
    }
}

fn spawn_csrf_purge(pool: PgPool, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match delete_expired_csrf_tokens(&pool).await {
                Ok(0) => debug!("no expired CSRF tokens"),
                Ok(removed) => info!(removed, "purged expired CSRF tokens"),
                Err(e) => warn!(error = %e, "CSRF purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,warden_api=debug,warden_core=debug")),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    apply_overrides(&mut config, &args);
    info!(bind_addr = %config.bind_addr, "starting warden_api_server");
    debug!(?config, "resolved configuration");

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    info!("running database migrations");
    warden_api::migrate(&pool).await?;

    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let permissions = Arc::new(PgPermissionStore::new(pool.clone()));

    // A rule set that cannot be built leaves the service without
    // authorization; refuse to start.
    let rules = RuleRegistry::load(permissions.as_ref())
        .await
        .inspect_err(|e| error!(error = %e, "could not build permission rules"))?;

    let collaborators = Collaborators {
        credentials: directory.clone(),
        profiles: directory,
        permissions,
        csrf_tokens: Arc::new(PgCsrfTokenStore::new(pool.clone())),
        live_tokens: Arc::new(InMemoryLiveTokenStore::new()),
    };

    if args.csrf_purge_interval_secs > 0 {
        spawn_csrf_purge(pool.clone(), Duration::from_secs(args.csrf_purge_interval_secs));
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, collaborators, rules)?;
    let app = warden_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    Ok(())
}
