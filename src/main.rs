mod config;
mod dto;
mod error;
mod handlers;
mod middleware;
mod models;
mod repositories;
mod services;
mod utils;
mod workers;

use axum::{
    http::{header, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppState, Config};
use crate::handlers::{
    admin::{
        delete_client_handler, get_client_handler, list_clients_handler, register_client_handler,
        update_client_handler,
    },
    oauth::{authorize_handler, consent_handler, token_handler},
    tokens::{introspect_handler, revoke_handler},
    users::me_handler,
};
use crate::middleware::{bearer_auth_middleware, require_scopes};
use crate::repositories::UserRepository;
use crate::utils::password::hash_password;
use crate::workers::spawn_maintenance_worker;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - verifies database connection
async fn ready_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<HealthResponse>, axum::http::StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|_| axum::http::StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "ready",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Create the application router with all routes configured
///
/// ## Public routes (exempt from bearer validation)
/// - GET  /health, GET /ready - liveness and readiness probes
/// - GET  /api/oauth/authorize - authorization endpoint
/// - POST /api/oauth/consent - consent decision endpoint
/// - POST /api/oauth/token - token endpoint (client-authenticated)
///
/// ## Admin routes (HTTP Basic, superuser only)
/// - POST /api/admin/clients/register - register a client
/// - GET  /api/admin/clients - list clients
/// - GET/PUT/DELETE /api/admin/clients/{client_id} - manage one client
///
/// ## Bearer-protected routes
/// - POST /api/tokens/revoke - revoke a token (defaults to the presenter)
/// - POST /api/tokens/introspect - introspect a token
/// - GET  /api/users/me - profile view, requires the profile:read scope
pub fn create_router(state: AppState) -> Router {
    let oauth_routes = Router::new()
        .route("/authorize", get(authorize_handler))
        .route("/consent", post(consent_handler))
        .route("/token", post(token_handler));

    let token_routes = Router::new()
        .route("/revoke", post(revoke_handler))
        .route("/introspect", post(introspect_handler));

    let admin_routes = Router::new()
        .route("/clients/register", post(register_client_handler))
        .route("/clients", get(list_clients_handler))
        .route(
            "/clients/:client_id",
            get(get_client_handler)
                .put(update_client_handler)
                .delete(delete_client_handler),
        );

    let user_routes = Router::new()
        .route("/me", get(me_handler))
        .layer(axum_middleware::from_fn(require_scopes(&["profile:read"])));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .nest("/api/oauth", oauth_routes)
        .nest("/api/tokens", token_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/users", user_routes)
        // Bearer validation for everything outside the public allow-list
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_middleware,
        ))
        // Middleware layers
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                ])
                .max_age(Duration::from_secs(3600)),
        )
        .with_state(state)
}

/// Ensure the administrator account from configuration exists.
async fn ensure_admin_user(pool: &sqlx::MySqlPool, config: &Config) -> anyhow::Result<()> {
    let user_repo = UserRepository::new(pool.clone());

    if user_repo
        .find_by_username(&config.admin_username)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .is_some()
    {
        return Ok(());
    }

    let hashed = hash_password(&config.admin_password).map_err(|e| anyhow::anyhow!("{}", e))?;
    user_repo
        .create(&config.admin_email, &config.admin_username, &hashed, true)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(username = %config.admin_username, "created administrator account");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memoria_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Create database pool with production settings
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Bootstrap the administrator account
    ensure_admin_user(&pool, &config).await?;

    // Background sweep of expired codes, blacklist rows and tokens
    spawn_maintenance_worker(pool.clone(), config.maintenance_interval_secs);

    // Get socket address before moving config
    let addr = config.socket_addr();

    // Create app state
    let state = AppState::new(pool, config);

    // Build router
    let app = create_router(state);

    // Start server with graceful shutdown
    tracing::info!(
        "Authorization server v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
