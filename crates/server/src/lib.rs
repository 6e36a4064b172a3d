pub mod bootstrap;
pub mod envelope;
pub mod health;
pub mod messages;
pub mod pdf;
pub mod quotes;
pub mod schedule;
pub mod tenant;

use axum::{routing::get, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use fieldops_core::config::AppConfig;
use fieldops_db::DbPool;

/// Assemble the full API surface. Every resource module owns its router
/// and state; this only composes them.
pub fn app_router(config: &AppConfig, db_pool: DbPool) -> Router {
    Router::new()
        .route("/", get(service_banner))
        .merge(health::router(db_pool.clone()))
        .merge(quotes::router(db_pool.clone(), config))
        .merge(messages::router(db_pool.clone(), config))
        .merge(schedule::router(db_pool))
        .layer(TraceLayer::new_for_http())
}

async fn service_banner() -> Json<serde_json::Value> {
    Json(json!({
        "data": {
            "name": "fieldops-api",
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}
