//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;

use matchmaker_server::application::services::Repositories;
use matchmaker_server::config::*;
use matchmaker_server::domain::{GeoPoint, Preferences, User};
use matchmaker_server::infrastructure::realtime::{InMemoryEventBus, InMemoryPresenceStore};
use matchmaker_server::infrastructure::repositories::InMemoryStore;
use matchmaker_server::presentation::middleware::Claims;
use matchmaker_server::startup::{create_app, AppState, Backends};

pub const JWT_SECRET: &str = "integration-secret-at-least-32-characters";

/// Test application running on the in-memory backends
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let (state, _event_router) = AppState::in_memory(test_settings(), store.clone());
        Self {
            router: create_app(state.clone()),
            state,
            store,
        }
    }

    /// Two nodes sharing one store, event bus and presence store. Each has
    /// its own connection registry and event router, like two processes
    /// behind a load balancer.
    pub async fn cluster() -> (Self, Self) {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(InMemoryEventBus::new(256));
        let presence = Arc::new(InMemoryPresenceStore::new());

        let node = |machine_id: u16| {
            let mut settings = test_settings();
            settings.snowflake.machine_id = machine_id;
            let (state, _event_router) = AppState::build(
                settings,
                Backends {
                    repositories: Repositories::from_store(store.clone()),
                    bus: bus.clone(),
                    presence: presence.clone(),
                    db: None,
                    redis: None,
                },
            );
            Self {
                router: create_app(state.clone()),
                state,
                store: store.clone(),
            }
        };
        (node(2), node(3))
    }

    /// Store a profile and return it
    pub fn add_user(&self, user: User) -> User {
        self.store.upsert_user(user.clone());
        user
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Unauthenticated GET
    pub async fn get(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// GET with an explicit bearer token
    pub async fn get_with_token(&self, uri: &str, token: &str) -> Response {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// GET as `user_id`
    pub async fn get_as(&self, user_id: i64, uri: &str) -> Response {
        self.get_with_token(uri, &token(user_id)).await
    }

    /// POST a JSON body as `user_id`
    pub async fn post_json_as(&self, user_id: i64, uri: &str, body: Value) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token(user_id)))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST without a body as `user_id`
    pub async fn post_as(&self, user_id: i64, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token(user_id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// DELETE as `user_id`
    pub async fn delete_as(&self, user_id: i64, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token(user_id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Like each other and return the match id
    pub async fn create_match(&self, a: i64, b: i64) -> String {
        let response = self
            .post_json_as(a, &format!("/api/v1/likes/{}", b), serde_json::json!({}))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = self
            .post_json_as(b, &format!("/api/v1/likes/{}", a), serde_json::json!({}))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["is_match"], true);
        body["match_id"].as_str().unwrap().to_string()
    }
}

/// Sign a token the way the auth service does
pub fn token(user_id: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Profile with no gender, birthdate or preference bounds
pub fn user(id: i64) -> User {
    User {
        id,
        username: format!("user{}", id),
        display_name: Some(format!("User {}", id)),
        avatar_url: None,
        gender: None,
        birthdate: None,
        location: None,
        preferences: Preferences::default(),
        is_online: false,
        last_seen: None,
    }
}

/// Profile placed at the given coordinates
pub fn user_at(id: i64, latitude: f64, longitude: f64) -> User {
    User {
        location: Some(GeoPoint::new(latitude, longitude)),
        ..user(id)
    }
}

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://localhost/unused".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
        },
        redis: RedisSettings {
            url: "redis://127.0.0.1:6379".into(),
        },
        jwt: JwtSettings {
            secret: JWT_SECRET.into(),
        },
        snowflake: SnowflakeSettings {
            machine_id: 2,
            epoch: 1420070400000,
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
            heartbeat_interval_ms: 45000,
            identify_timeout_secs: 30,
        },
        discovery: DiscoverySettings { page_size: 20 },
        chat: ChatSettings {
            max_content_length: 4000,
            history_page_size: 50,
            history_max_page_size: 100,
        },
        realtime: RealtimeSettings {
            transport: RealtimeTransport::Memory,
            channel: "integration:events".into(),
            buffer_capacity: 256,
            presence_ttl_secs: 60,
        },
        resilience: ResilienceSettings {
            max_attempts: 2,
            base_backoff_ms: 1,
            max_backoff_ms: 5,
            call_timeout_ms: 1000,
        },
        environment: "test".into(),
    }
}
