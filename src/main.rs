use anyhow::{Context, Result};
use log::{error, info, warn};
use patrol_watch::api::{AppState, RestApi};
use patrol_watch::config::{self, CONFIG_PATH_ENV};
use patrol_watch::db::DatabaseService;
use patrol_watch::messaging::{self, EventType, MessageBrokerTrait, PatrolEvents};
use patrol_watch::notification;
use patrol_watch::security::SecurityService;
use patrol_watch::services::PatrolServices;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn run_app() -> Result<()> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from));
    let config = config::load_config(config_path.as_deref())?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.api.log_level.as_str()),
    )
    .init();
    info!("Starting patrol-watch {}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("Using default configuration"),
    }

    let database = Arc::new(
        DatabaseService::new(&config.database)
            .await
            .context("Failed to initialize database")?,
    );

    let message_broker = messaging::create_message_broker(config.message_broker.clone())
        .await
        .context("Failed to initialize message broker")?;
    info!("Message broker initialized");

    let channel = notification::channel_from_config(&config.notification)?;
    let services = Arc::new(PatrolServices::new(
        database.stores(),
        &config.patrol,
        PatrolEvents::new(message_broker.clone()),
        channel,
    ));

    let shutdown = CancellationToken::new();
    services.start(shutdown.clone()).await?;
    info!("Patrol monitors started");

    if let Err(e) = message_broker
        .publish(
            EventType::SystemStartup,
            None,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }),
        )
        .await
    {
        warn!("Failed to publish system startup event: {}", e);
    }

    let api = RestApi::new(
        &config.api,
        AppState {
            database,
            services,
            security: Arc::new(SecurityService::new(config.security.clone())),
        },
    );
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move { api.run(server_shutdown).await });

    // Wait for termination signals
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    shutdown.cancel();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("API server error: {}", e),
        Err(e) => error!("API server task failed: {}", e),
    }

    if let Err(e) = message_broker
        .publish(
            EventType::SystemShutdown,
            None,
            serde_json::json!({"reason": "Normal shutdown"}),
        )
        .await
    {
        error!("Failed to publish shutdown event: {}", e);
    }
    message_broker.unsubscribe_all().await;

    info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("patrol-watch failed: {:#}", e);
        std::process::exit(1);
    }
}
