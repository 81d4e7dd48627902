//! Shared fixture: router + services wired against an in-memory SQLite
//! database with migrations applied.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use quickbite_api::config::AppConfig;
use quickbite_api::events::EventSender;
use quickbite_api::handlers::AppServices;
use quickbite_api::migrator::Migrator;
use quickbite_api::{api_v1_routes, AppState};

pub struct TestApp {
    pub router: Router,
    pub db: Arc<DatabaseConnection>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        redis_url: "redis://127.0.0.1:6379".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "development".into(),
        log_level: "info".into(),
        log_json: false,
        auto_migrate: false,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        db_acquire_timeout_secs: 5,
        event_channel_capacity: 64,
        payment_provider_url: "http://127.0.0.1:9/charges".into(),
        payment_provider_token: "test-token".into(),
        payment_provider_timeout_secs: 1,
        payment_notification_url: "http://localhost:8080/api/v1/payments/webhook".into(),
        payment_webhook_secret: None,
        payment_webhook_tolerance_secs: None,
    }
}

pub async fn connect_test_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("sqlite connection");
    Migrator::up(&db, None).await.expect("migrations");
    Arc::new(db)
}

impl TestApp {
    pub async fn new() -> Self {
        let db = connect_test_db().await;

        let (event_tx, event_rx) = mpsc::channel(64);
        tokio::spawn(quickbite_api::events::process_events(event_rx));
        let event_sender = EventSender::new(event_tx);

        let config = test_config();
        let services = AppServices::new(db.clone(), Arc::new(event_sender.clone()), &config)
            .expect("services");

        let state = AppState {
            db: db.clone(),
            config,
            event_sender,
            services,
            redis: Arc::new(redis::Client::open("redis://127.0.0.1:6379").expect("redis client")),
        };

        let router = Router::new()
            .nest("/api/v1", api_v1_routes())
            .with_state(state);

        Self { router, db }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
