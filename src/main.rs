//! The binary entry point for the application.

use std::sync::Arc;
use std::time::Duration;

use app_core::config::Config;
use app_core::middleware::error_envelope;
use app_core::oauth::{HandshakeClient, OAuthManager};
use app_core::uid::{Generator, Snowflake};
use axum::http::StatusCode;
use axum::{Json, Router, middleware};
use base64::Engine as _;
use base64::engine::general_purpose;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use sea_orm::{ConnectOptions, Database};
use tokio::signal;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_cookies::{CookieManagerLayer, Key};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(fmt::format::FmtSpan::CLOSE),
        )
        .init();

    if let Err(err) = run().await {
        panic!("❌ Application failed to start: {err}");
    }
}

/// Initializes all dependencies and starts the web server.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize configuration with automatic reloading on file changes.
    let config = Arc::new(
        Config::builder("config/config.yaml")
            .watch_interval(Duration::from_secs(5))
            .watch()
            .build()?,
    );

    // Initialize the SeaORM database connection pool.
    let mut db_opt = ConnectOptions::new(config.get::<String>("database.url")?);
    db_opt
        .min_connections(config.get("database.min_connections")?)
        .max_connections(config.get("database.max_connections")?)
        .connect_timeout(Duration::from_secs(config.get("database.connect_timeout_secs")?))
        .acquire_timeout(Duration::from_secs(config.get("database.acquire_timeout_secs")?))
        .idle_timeout(Duration::from_secs(config.get("database.idle_timeout_secs")?))
        .max_lifetime(Duration::from_secs(config.get("database.max_lifetime_secs")?))
        .sqlx_logging(config.get("database.sqlx_logging")?)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db_pool = Arc::new(Database::connect(db_opt).await?);

    // Initialize the redis connection pool backing sessions.
    let rds_manager = RedisConnectionManager::new(config.get::<String>("redis.url")?)?;
    let rds_pool = Pool::builder()
        .max_size(config.get::<u32>("database.max_connections")?)
        .build(rds_manager)
        .await?;

    // Initialize the Snowflake ID generator.
    let snowflake: Arc<dyn Generator> = Arc::new(
        Snowflake::builder(config.get("snowflake.worker_id")?)
            .with_epoch(config.get("snowflake.epoch")?)
            .build()?,
    );

    // Initialize the cookie encryption key.
    let cookie_key = Key::from(&general_purpose::STANDARD.decode(config.get::<String>("session.secret")?)?);

    // Initialize the OAuth manager with every configured provider.
    let mut oauth_manager = OAuthManager::new();
    if let Ok(client_id) = config.get::<String>("oauth.google.client_id") {
        let client = HandshakeClient::google(
            client_id,
            config.get("oauth.google.client_secret")?,
            config.get("oauth.google.redirect_uri")?,
        )?;
        oauth_manager.add_provider("google", Arc::new(client));
    }
    if let Ok(client_id) = config.get::<String>("oauth.github.client_id") {
        let client = HandshakeClient::github(
            client_id,
            config.get("oauth.github.client_secret")?,
            config.get("oauth.github.redirect_uri")?,
        )?;
        oauth_manager.add_provider("github", Arc::new(client));
    }

    // Initialize the identity module.
    let identity_state = identity::new(identity::Dependency {
        db: db_pool,
        rds: rds_pool,
        config: config.clone(),
        uid: snowflake,
        oauth: oauth_manager,
        cookie_key,
    });

    // Create the router and middlewares.
    let timeout_secs = Duration::from_secs(config.get::<u64>("server.timeout_secs")?);
    let app = Router::new()
        .merge(identity::create_router(identity_state))
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"message": "Endpoint not found"})),
            )
        })
        .method_not_allowed_fallback(|| async {
            (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(serde_json::json!({"message": "Method not allowed"})),
            )
        })
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(error_envelope))
                .layer(CookieManagerLayer::new())
                .layer(TraceLayer::new_for_http()) // Logs requests and responses
                .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(timeout_secs)),
        );

    let server_address = config.get::<String>("server.address")?;
    let listener = tokio::net::TcpListener::bind(&server_address).await?;

    tracing::info!("🚀 listening on {}", listener.local_addr()?);

    // Broadcast channel signalling shutdown to all application components.
    let (shutdown_tx, _) = broadcast::channel(1);
    spawn_shutdown_listener(shutdown_tx.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_tx.subscribe().recv().await.ok();
            tracing::info!("🛑 Server is shutting down gracefully...");
        })
        .await?;

    Ok(())
}

/// Spawns a background task to listen for system shutdown signals.
fn spawn_shutdown_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("🔻 Received SIGINT (Ctrl+C)")},
            _ = terminate => { tracing::info!("🔻 Received SIGTERM")},
        }

        if shutdown_tx.send(()).is_err() {
            tracing::error!("Failed to send shutdown signal");
        }
    });
}
