//! Route handlers of the demo service

use super::calculator::{calculate, Operation};
use super::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{StatusCode, Uri},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

const MISSING_FIELDS: &str = "Missing required fields: operation, a, b";
const INVALID_OPERANDS: &str = "Invalid operands: a and b must be numbers";

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() })))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
            "uptime": state.uptime_secs(),
        })),
    )
}

pub async fn info(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.environment(),
            "description": "Demo service built and shipped by the stagegate pipeline",
        })),
    )
}

pub async fn calculate_handler(
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Rejected calculate body: {}", rejection);
            return bad_request(MISSING_FIELDS);
        }
    };

    let (Some(operation), Some(a), Some(b)) = (
        body.get("operation").filter(|v| !v.is_null()),
        body.get("a").filter(|v| !v.is_null()),
        body.get("b").filter(|v| !v.is_null()),
    ) else {
        return bad_request(MISSING_FIELDS);
    };

    let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
        return bad_request(INVALID_OPERANDS);
    };

    let operation = match operation.as_str().unwrap_or_default().parse::<Operation>() {
        Ok(op) => op,
        Err(e) => return bad_request(e.to_string()),
    };

    match calculate(operation, a, b) {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({
                "operation": operation.name(),
                "a": a,
                "b": b,
                "result": result,
            })),
        ),
        Err(e) => bad_request(e.to_string()),
    }
}

pub async fn index() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "message": "stagegate demo service",
            "endpoints": {
                "health": "GET /health",
                "info": "GET /api/info",
                "calculate": "POST /api/calculate",
            },
        })),
    )
}

pub async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    warn!("No route for {}", uri.path());
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not Found", "path": uri.path() })),
    )
}
