//! Demo HTTP service exercised by the pipeline
//!
//! A small axum application: health and info endpoints, a calculator and
//! JSON errors for unknown routes and handler panics.

pub mod calculator;
pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::any::Any;
use std::time::Instant;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info};

pub use calculator::{calculate, CalcError, Operation};

pub const DEFAULT_PORT: u16 = 3000;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    started: Instant,
    environment: String,
}

impl AppState {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            started: Instant::now(),
            environment: environment.into(),
        }
    }

    /// `APP_ENV`, then `NODE_ENV`, then `development`
    pub fn from_env() -> Self {
        let environment = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("NODE_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        Self::new(environment)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/info", get(handlers::info))
        .route("/api/calculate", post(handlers::calculate_handler))
        .fallback(handlers::not_found)
        .with_state(state);

    with_middleware(routes)
}

fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}

/// Port from the argument, then `PORT`, then 3000
pub fn resolve_port(port: Option<u16>) -> Result<u16> {
    if let Some(port) = port {
        return Ok(port);
    }
    match std::env::var("PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("PORT is not a valid port number: {}", value)),
        Err(_) => Ok(DEFAULT_PORT),
    }
}

/// Bind and serve until Ctrl+C
pub async fn serve(port: Option<u16>) -> Result<()> {
    let port = resolve_port(port)?;
    let state = AppState::from_env();
    let environment = state.environment().to_string();

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    info!("Demo service listening on port {} ({})", port, environment);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down demo service");
        })
        .await
        .context("Demo service error")?;

    Ok(())
}
