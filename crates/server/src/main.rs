use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use realtime::{Broadcaster, LocalHub, PusherClient};
use server_api::{auth::ensure_bootstrap_account, ApiContext, AuthConfig, Relay};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::ApiStatus,
};
use storage::Storage;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod extract;
mod ws;

use api::{reject, HttpError};
use app_state::AppState;
use config::{load_settings, prepare_database_url, Settings, DEV_JWT_SECRET};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    if settings.jwt_secret == DEV_JWT_SECRET {
        warn!("JWT secret is the development default; set JWT_SECRET before deploying");
    }
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let hub = settings
        .local_hub_enabled
        .then(|| LocalHub::new(settings.local_hub_capacity));
    let mut sinks: Vec<Arc<dyn Broadcaster>> = Vec::new();
    if let Some(hub) = &hub {
        sinks.push(Arc::new(hub.clone()));
    }
    if let Some(pusher) = settings.pusher() {
        sinks.push(Arc::new(PusherClient::new(pusher)?));
    }
    let relay = Relay::new(sinks);
    if relay.is_enabled() {
        info!(sinks = ?relay.sink_names(), "realtime relay ready");
    } else {
        warn!("no realtime transport configured; presentation events will be dropped");
    }

    let api = ApiContext {
        storage,
        auth: AuthConfig {
            jwt_secret: settings.jwt_secret.clone(),
            token_ttl_seconds: settings.token_ttl_seconds,
            bcrypt_cost: settings.bcrypt_cost,
        },
        relay,
    };
    if let Some((email, password)) = settings.bootstrap_admin() {
        match ensure_bootstrap_account(&api, email, password).await {
            Ok(Some(user)) => info!(user_id = user.user_id.0, "bootstrap lab instructor created"),
            Ok(None) => {}
            Err(err) => warn!(message = %err.message, "bootstrap lab instructor not created"),
        }
    }

    let state = AppState { api, hub };
    let app = build_router(Arc::new(state), &settings);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, settings: &Settings) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api", get(api_status))
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api::routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .layer(cors_layer(&settings.cors_allowed_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|err| {
        error!(error = %err, "health check failed");
        reject(ApiError::new(ErrorCode::Unavailable, "Database unavailable"))
    })?;
    Ok("ok")
}

async fn api_status() -> Json<ApiStatus> {
    Json(ApiStatus {
        status: "success".into(),
        message: "API is running".into(),
        timestamp: Utc::now(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
