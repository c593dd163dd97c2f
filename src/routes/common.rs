//! Service probes: liveness, database readiness and build version, answered in the envelope.

use crate::response::{set_response, success_ok, Envelope};
use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Serialize)]
pub struct Probe {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
}

async fn health() -> Envelope<Probe> {
    success_ok(Probe {
        status: "ok",
        database: None,
    })
}

/// 200 when the pool answers `SELECT 1`, 503 otherwise.
async fn ready(State(pool): State<PgPool>) -> Envelope<Probe> {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => success_ok(Probe {
            status: "ok",
            database: Some("ok"),
        }),
        Err(e) => {
            tracing::warn!(error = %e, "database not ready");
            set_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "database unavailable",
                Some(Probe {
                    status: "degraded",
                    database: Some("unavailable"),
                }),
            )
        }
    }
}

async fn version() -> Envelope<BuildInfo> {
    success_ok(BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /health` and `GET /version`; no database needed.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}

/// `common_routes` plus `GET /ready` against `pool`.
pub fn common_routes_with_ready(pool: PgPool) -> Router {
    common_routes().merge(Router::new().route("/ready", get(ready)).with_state(pool))
}
