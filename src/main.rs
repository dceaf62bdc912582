//! Example app: a small HTTP server wired over the framework core.
//!
//! Demonstrates the composition root pattern: configuration is loaded once,
//! router/cache/mutex are built explicitly and handed to the handler via
//! shared state. Every request is resolved by the router and answered with
//! the resolution (a stand-in for a real dispatch layer), with a per-target
//! hit counter kept in the cache.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use junction::cache::{build_cache, Cache};
use junction::config::{load_config, AppConfig};
use junction::http::{Request, Response};
use junction::lifecycle::Shutdown;
use junction::mutex::{build_mutex, Mutex};
use junction::routing::{AnyRouter, RouteError, RouteInput};

/// Lock name guarding the shared hit-counter update.
const HIT_COUNTER_LOCK: &str = "hit-counter";

/// Everything the handler needs, built once at startup.
struct AppState {
    router: AnyRouter,
    cache: Arc<dyn Cache>,
    mutex: Arc<Mutex>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "junction=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("junction example app starting");

    // Load configuration: first CLI argument, else junction.toml, else defaults.
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None if Path::new("junction.toml").exists() => {
            load_config(Path::new("junction.toml"))?
        }
        None => AppConfig::default(),
    };

    tracing::info!(
        bind_address = %config.server.bind_address,
        strategy = ?config.router.strategy,
        cache_backend = ?config.cache.backend,
        mutex_backend = ?config.mutex.backend,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            junction::observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Composition root: construction failures here are fatal.
    let router = config.router.build()?;
    let cache = build_cache(&config.cache).await?;
    let mutex = Arc::new(build_mutex(&config.mutex, Some(cache.clone()))?);

    let state = Arc::new(AppState {
        router,
        cache,
        mutex: mutex.clone(),
    });

    let app = axum::Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    // Best-effort auto-release of any locks still held by this process.
    mutex.release_all().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve every request through the router and answer with the resolution.
async fn handle(
    State(state): State<Arc<AppState>>,
    req: axum::extract::Request,
) -> axum::response::Response {
    let (parts, _body) = req.into_parts();
    let request = Request::new(parts.method, &parts.uri).with_headers(parts.headers);

    match state.router.resolve(&RouteInput::Http(&request)) {
        Ok(resolved) => {
            // The counter update runs under a named lock: on the file cache
            // backend increments are not atomic across processes.
            let counter_key = format!("hits:{}", resolved.target);
            let hits = match state.mutex.lock(HIT_COUNTER_LOCK, Duration::from_secs(1)).await {
                Ok(()) => {
                    let result = state.cache.increment(&counter_key, 1).await;
                    if let Err(e) = state.mutex.unlock(HIT_COUNTER_LOCK).await {
                        tracing::warn!(request_id = %request.id(), error = %e, "hit counter unlock failed");
                    }
                    match result {
                        Ok(hits) => hits,
                        Err(e) => {
                            tracing::warn!(request_id = %request.id(), error = %e, "hit counter update failed");
                            0
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(request_id = %request.id(), error = %e, "hit counter lock contended");
                    0
                }
            };

            tracing::info!(
                request_id = %request.id(),
                target = %resolved.target,
                hits,
                "request resolved"
            );

            Response::json(&serde_json::json!({
                "target": resolved.target,
                "params": resolved.params,
                "hits": hits,
                "held_locks": state.mutex.held(),
            }))
            .into()
        }
        Err(e @ RouteError::MethodNotAllowed { .. }) => error_response(StatusCode::METHOD_NOT_ALLOWED, &e),
        Err(e @ RouteError::NotFound { .. }) => error_response(StatusCode::NOT_FOUND, &e),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

fn error_response(status: StatusCode, error: &RouteError) -> axum::response::Response {
    Response::json(&serde_json::json!({ "error": error.to_string() }))
        .with_status(status)
        .into()
}
