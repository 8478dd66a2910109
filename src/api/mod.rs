//! REST API module using Axum
//!
//! The five control-plane endpoints:
//! - POST  /api/v1/shipments/                   - accept a shipment
//! - GET   /api/v1/robots/:robot_id/            - robot state and destination
//! - PATCH /api/v1/robots/:robot_id/nexts/      - advance to the next leg
//! - PATCH /api/v1/robots/:robot_id/emergencies/ - emergency stop
//! - POST  /api/v1/robots/notifications/        - robot telemetry batches

pub mod handlers;
mod routes;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::control::RobotOrchestrator;

/// Create the application router.
///
/// CORS is attached only when origins are configured; `*` allows any
/// origin, anything else is parsed as an explicit origin list.
pub fn create_app(orchestrator: Arc<RobotOrchestrator>) -> Router {
    let cors = orchestrator.config().cors_origins.clone().map(|origins| {
        if origins.trim() == "*" {
            CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
        } else {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("ignoring unparsable CORS origin: {origin}");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parsed))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    });

    let router = Router::new()
        .nest("/api/v1", routes::api_routes(orchestrator))
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}
