//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// JWT validation settings
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Discovery page size
    pub discovery: DiscoverySettings,

    /// Message limits and history paging
    pub chat: ChatSettings,

    /// Event bus and presence backends
    pub realtime: RealtimeSettings,

    /// Retry and timeout policy for store and publish calls
    pub resilience: ResilienceSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// JWT validation configuration. Tokens are issued by the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared secret used to verify token signatures
    pub secret: String,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-31)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Heartbeat interval in milliseconds (default: 45000)
    pub heartbeat_interval_ms: u64,

    /// Connection timeout for identify in seconds (default: 30)
    pub identify_timeout_secs: u64,
}

/// Discovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    /// Candidates returned per query (default: 20)
    pub page_size: usize,
}

/// Chat configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    /// Maximum characters per message (default: 4000)
    pub max_content_length: usize,

    /// Default history page size (default: 50)
    pub history_page_size: i64,

    /// Upper bound for a requested history page (default: 100)
    pub history_max_page_size: i64,
}

/// Which fabric carries routed events and presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeTransport {
    /// Single process; everything stays in memory
    Memory,
    /// Redis pub/sub and Redis presence sets, for several processes
    Redis,
}

/// Real-time fabric configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSettings {
    pub transport: RealtimeTransport,

    /// Redis pub/sub channel shared by every process
    pub channel: String,

    /// Capacity of the local broadcast buffer
    pub buffer_capacity: usize,

    /// Expiry of a user's presence set in Redis, refreshed on every connect
    /// and heartbeat. Keep it a few heartbeat intervals long.
    pub presence_ttl_secs: u64,
}

/// Retry and timeout policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceSettings {
    /// Attempts per call, including the first (default: 3)
    pub max_attempts: u32,

    /// First backoff delay in milliseconds (default: 50)
    pub base_backoff_ms: u64,

    /// Backoff ceiling in milliseconds (default: 1000)
    pub max_backoff_ms: u64,

    /// Timeout per attempt in milliseconds (default: 5000)
    pub call_timeout_ms: u64,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", 1420070400000_u64)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 65536_i64)?
            .set_default("websocket.max_frame_size", 16384_i64)?
            .set_default("websocket.heartbeat_interval_ms", 45000_i64)?
            .set_default("websocket.identify_timeout_secs", 30_i64)?
            .set_default("discovery.page_size", 20)?
            .set_default("chat.max_content_length", 4000)?
            .set_default("chat.history_page_size", 50)?
            .set_default("chat.history_max_page_size", 100)?
            .set_default("realtime.transport", "redis")?
            .set_default("realtime.channel", "matchmaker:events")?
            .set_default("realtime.buffer_capacity", 10000)?
            .set_default("realtime.presence_ttl_secs", 300)?
            .set_default("resilience.max_attempts", 3)?
            .set_default("resilience.base_backoff_ms", 50)?
            .set_default("resilience.max_backoff_ms", 1000)?
            .set_default("resilience.call_timeout_ms", 5000)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    /// Reject configurations that would start a broken server.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.resilience.max_attempts == 0 {
            return Err(ConfigError::Message(
                "resilience.max_attempts must be at least 1".into(),
            ));
        }
        if self.chat.history_page_size > self.chat.history_max_page_size {
            return Err(ConfigError::Message(
                "chat.history_page_size cannot exceed chat.history_max_page_size".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ResilienceSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
