//! # Matchmaker Server
//!
//! Discovery, matching and real-time chat for a dating app.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool and migrations
//! - Redis event bus and presence (or their in-process versions)
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use matchmaker_server::config::Settings;
use matchmaker_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    matchmaker_server::telemetry::init_tracing();

    info!("Starting Matchmaker Server...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        transport = ?settings.realtime.transport,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
