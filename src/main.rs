//! Learn Space server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use learnspace::{
    auth::password,
    config::{Args, LogFormat},
    server, AppState, Store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("learnspace={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Learn Space");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Database: {}", args.database_path.display());
    info!("Session lifetime: {}s", args.session_max_age_secs);
    info!("======================================");

    if args.dev_mode && args.jwt_secret.is_none() {
        warn!("No JWT_SECRET set, sessions are signed with the development secret");
    }

    let store = if args.is_memory_database() {
        warn!("Using an in-memory database, all data is lost on exit");
        Store::open_in_memory()?
    } else {
        Store::open(&args.database_path)?
    };
    let store = Arc::new(store);

    match store.stats() {
        Ok(stats) => info!(
            users = stats.users,
            courses = stats.courses,
            presentations = stats.presentations,
            "Store opened"
        ),
        Err(e) => warn!("Could not read store stats: {}", e),
    }

    let state = Arc::new(AppState::new(args, Arc::clone(&store))?);
    password::warm_up()?;

    // Returns once open connections have drained
    let result = server::run(state).await;

    store.close()?;
    info!("Store closed, goodbye");

    result.map_err(Into::into)
}
