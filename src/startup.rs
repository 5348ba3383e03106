//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::application::ports::{EventBus, PresenceStore};
use crate::application::services::{
    ChatLimits, ChatService, ChatServiceImpl, DiscoveryService, DiscoveryServiceImpl,
    EventPublisher, MatchService, MatchServiceImpl, PresenceService, PresenceServiceImpl,
    Repositories,
};
use crate::config::{RealtimeTransport, Settings};
use crate::domain::services::CandidateFilter;
use crate::infrastructure::cache::{self, RedisEventBus, RedisPresenceStore};
use crate::infrastructure::database;
use crate::infrastructure::realtime::{
    ConnectionRegistry, EventRouter, InMemoryEventBus, InMemoryPresenceStore,
};
use crate::infrastructure::repositories::{
    InMemoryStore, PgBlockRepository, PgLikeRepository, PgMatchRepository, PgMessageRepository,
    PgUserRepository,
};
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::shared::retry::RetryPolicy;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<dyn DiscoveryService>,
    pub matches: Arc<dyn MatchService>,
    pub chat: Arc<dyn ChatService>,
    pub presence: Arc<dyn PresenceService>,
    pub registry: Arc<ConnectionRegistry>,
    pub settings: Arc<Settings>,
    /// Set when the store is PostgreSQL; checked by the readiness probe
    pub db: Option<PgPool>,
    /// Set when the realtime fabric is Redis; checked by the readiness probe
    pub redis: Option<ConnectionManager>,
}

/// Storage and realtime backends the services run on.
pub struct Backends {
    pub repositories: Repositories,
    pub bus: Arc<dyn EventBus>,
    pub presence: Arc<dyn PresenceStore>,
    pub db: Option<PgPool>,
    pub redis: Option<ConnectionManager>,
}

impl AppState {
    /// Wire every service over `backends` and start routing bus events to
    /// this process's connections. The returned handle is the router task.
    pub fn build(settings: Settings, backends: Backends) -> (Self, JoinHandle<()>) {
        let retry = RetryPolicy::from_settings(&settings.resilience);
        let ids = Arc::new(SnowflakeGenerator::with_epoch(
            settings.snowflake.machine_id as u64,
            0u64, // Default node_id
            settings.snowflake.epoch,
        ));
        let registry = Arc::new(ConnectionRegistry::new());
        let events = EventPublisher::new(backends.bus.clone(), retry);
        let repos = backends.repositories;

        let discovery = Arc::new(DiscoveryServiceImpl::new(
            repos.users.clone(),
            repos.likes.clone(),
            repos.blocks.clone(),
            CandidateFilter::new(settings.discovery.page_size),
            retry,
        ));
        let matches = Arc::new(MatchServiceImpl::new(
            repos.clone(),
            events.clone(),
            ids.clone(),
            retry,
        ));
        let chat = Arc::new(ChatServiceImpl::new(
            repos.clone(),
            events.clone(),
            ids,
            retry,
            ChatLimits::from(&settings.chat),
        ));
        let presence = Arc::new(PresenceServiceImpl::new(
            repos,
            registry.clone(),
            backends.presence,
            events,
            retry,
        ));

        let router = EventRouter::new(registry.clone()).spawn(backends.bus.as_ref());

        let state = Self {
            discovery,
            matches,
            chat,
            presence,
            registry,
            settings: Arc::new(settings),
            db: backends.db,
            redis: backends.redis,
        };
        (state, router)
    }

    /// Everything in process memory: one store, a broadcast bus and local
    /// presence. Suitable for a single node and for tests.
    pub fn in_memory(settings: Settings, store: Arc<InMemoryStore>) -> (Self, JoinHandle<()>) {
        let bus = Arc::new(InMemoryEventBus::new(settings.realtime.buffer_capacity));
        let backends = Backends {
            repositories: Repositories::from_store(store),
            bus,
            presence: Arc::new(InMemoryPresenceStore::new()),
            db: None,
            redis: None,
        };
        Self::build(settings, backends)
    }
}

/// Build the HTTP router with all middleware
pub fn create_app(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    background: Vec<JoinHandle<()>>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let db = database::create_pool(&settings.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        tracing::info!("Database connection pool created");

        database::run_migrations(&db)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Database migrations applied");

        let repositories = Repositories {
            users: Arc::new(PgUserRepository::new(db.clone())),
            likes: Arc::new(PgLikeRepository::new(db.clone())),
            blocks: Arc::new(PgBlockRepository::new(db.clone())),
            matches: Arc::new(PgMatchRepository::new(db.clone())),
            messages: Arc::new(PgMessageRepository::new(db.clone())),
        };

        let mut background = Vec::new();
        let backends = match settings.realtime.transport {
            RealtimeTransport::Redis => {
                let conn = cache::create_redis_client(&settings.redis)
                    .await
                    .context("Failed to connect to Redis")?;
                let client = redis::Client::open(settings.redis.url.as_str())?;
                let (bus, listener) = RedisEventBus::start(
                    client,
                    conn.clone(),
                    settings.realtime.channel.clone(),
                    settings.realtime.buffer_capacity,
                );
                background.push(listener);
                tracing::info!(channel = %settings.realtime.channel, "Using Redis event bus");

                Backends {
                    repositories,
                    bus: Arc::new(bus),
                    presence: Arc::new(RedisPresenceStore::new(
                        conn.clone(),
                        settings.realtime.presence_ttl_secs,
                    )),
                    db: Some(db),
                    redis: Some(conn),
                }
            }
            RealtimeTransport::Memory => {
                tracing::info!("Using in-process event bus; events stay on this node");
                Backends {
                    repositories,
                    bus: Arc::new(InMemoryEventBus::new(settings.realtime.buffer_capacity)),
                    presence: Arc::new(InMemoryPresenceStore::new()),
                    db: Some(db),
                    redis: None,
                }
            }
        };

        let addr: SocketAddr = settings
            .server_addr()
            .parse()
            .with_context(|| format!("Invalid server address {}", settings.server_addr()))?;

        let (state, event_router) = AppState::build(settings, backends);
        background.push(event_router);

        let router = create_app(state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            background,
        })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        for task in self.background {
            task.abort();
        }
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}


#[cfg(test)]
mod tests {
    use super::test_support::app_state;

    #[tokio::test]
    async fn test_in_memory_state_starts_empty() {
        let (state, _store) = app_state(&[1]);
        assert_eq!(state.registry.connection_count(), 0);
        assert!(state.db.is_none());
        assert!(state.redis.is_none());
    }
}
