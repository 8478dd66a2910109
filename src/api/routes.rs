//! API route definitions

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use super::handlers;
use crate::control::RobotOrchestrator;

/// All /api/v1 routes. Trailing slashes are part of the contract.
pub fn api_routes(orchestrator: Arc<RobotOrchestrator>) -> Router {
    Router::new()
        .route("/shipments/", post(handlers::post_shipment))
        .route("/robots/notifications/", post(handlers::post_notifications))
        .route("/robots/:robot_id/", get(handlers::get_robot_state))
        .route("/robots/:robot_id/nexts/", patch(handlers::patch_move_next))
        .route(
            "/robots/:robot_id/emergencies/",
            patch(handlers::patch_emergency),
        )
        .with_state(orchestrator)
}
