use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use room_core::{Collaborators, PresenceHub, parse_word_schedule, reconcile_active_rooms};
use room_persistence::{DailyWordRepository, RoomRepository, connect_and_migrate};
use room_server::{
    config::Config, create_routes, similarity::HttpSimilarityGateway,
    websocket::ConnectionManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Semantle room server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    let policy = config.policy();

    let db = connect_and_migrate(&config.database_url)
        .await
        .with_context(|| format!("Failed to prepare database {}", config.database_url))?;
    let room_repository = Arc::new(RoomRepository::new(db.clone()));
    let word_repository = Arc::new(DailyWordRepository::new(db));

    if let Some(path) = &config.daily_words_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read daily words file {}", path))?;
        let schedule = parse_word_schedule(&text)
            .with_context(|| format!("Invalid daily words file {}", path))?;
        word_repository.seed(&schedule).await?;
    }

    let gateway = HttpSimilarityGateway::new(
        &config.similarity_api_url,
        config.similarity_api_key.clone(),
    )
    .context("Failed to build similarity client")?;
    info!("Scoring guesses with {}", config.similarity_api_url);

    let presence = PresenceHub::new();
    let collaborators = Collaborators::new(
        room_repository.clone(),
        Arc::new(gateway),
        word_repository,
        Arc::new(presence.clone()),
    );
    let connection_manager = Arc::new(ConnectionManager::new());

    let routes = create_routes(
        connection_manager,
        collaborators,
        policy.clone(),
        room_repository.clone(),
    );

    // Keep durable player/room flags in line with presence
    let reconcile_interval = config.reconcile_interval();
    let presence_grace = policy.presence_grace;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reconcile_interval);
        loop {
            interval.tick().await;
            match reconcile_active_rooms(room_repository.as_ref(), &presence, presence_grace).await
            {
                Ok(report) if report.players_deactivated > 0 || report.rooms_closed > 0 => {
                    info!(
                        "Reconciled {} rooms: {} players marked inactive, {} rooms closed",
                        report.rooms_checked, report.players_deactivated, report.rooms_closed
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Reconciliation pass failed: {}", e),
            }
        }
    });

    let host: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST {}", config.host))?;
    info!("Server starting on {}:{}", config.host, config.port);

    let (addr, server) =
        warp::serve(routes).try_bind_with_graceful_shutdown((host, config.port), async {
            shutdown_signal().await;
        })?;

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
    Ok(())
}

// Wait for SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let (mut sigint, mut sigterm) = match (
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
            signal::unix::signal(signal::unix::SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down gracefully...");
    }
}
