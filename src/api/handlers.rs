//! API route handlers
//!
//! Thin adapters: each handler validates its body, delegates to the
//! orchestrator, and maps the outcome onto the wire contract. All error
//! classification lives in [`ControlError`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use crate::control::{RobotOrchestrator, ShipmentOutcome};
use crate::error::ControlError;
use crate::types::{self, ShipmentRequest};

type AppState = State<Arc<RobotOrchestrator>>;

/// POST /api/v1/shipments/ - dispatch a shipment to an available robot.
pub async fn post_shipment(
    State(orchestrator): AppState,
    body: Bytes,
) -> Result<Response, ControlError> {
    debug!("post_shipment");
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let shipment = ShipmentRequest::parse(&body)?;

    match orchestrator.handle_shipment(&shipment).await? {
        ShipmentOutcome::Accepted {
            robot_id,
            order,
            caller,
        } => Ok((
            StatusCode::CREATED,
            Json(json!({
                "result": "success",
                "delivery_robot": {"id": robot_id},
                "order": order,
                "caller": caller.as_str(),
            })),
        )
            .into_response()),
        ShipmentOutcome::NoLegs => Ok((
            StatusCode::OK,
            Json(json!({
                "result": "ignore",
                "message": "no available waypoints_list",
            })),
        )
            .into_response()),
    }
}

/// GET /api/v1/robots/:robot_id/ - current state and destination.
pub async fn get_robot_state(
    State(orchestrator): AppState,
    Path(robot_id): Path<String>,
) -> Result<Response, ControlError> {
    debug!("get_robot_state, robot_id={robot_id}");
    let status = orchestrator.robot_status(&robot_id).await?;
    Ok((StatusCode::OK, Json(status)).into_response())
}

/// PATCH /api/v1/robots/:robot_id/nexts/ - advance to the next leg.
pub async fn patch_move_next(
    State(orchestrator): AppState,
    Path(robot_id): Path<String>,
) -> Result<Response, ControlError> {
    debug!("patch_move_next, robot_id={robot_id}");
    orchestrator.move_next(&robot_id).await?;
    Ok((StatusCode::OK, Json(json!({"result": "success"}))).into_response())
}

/// PATCH /api/v1/robots/:robot_id/emergencies/ - emergency stop.
pub async fn patch_emergency(
    State(orchestrator): AppState,
    Path(robot_id): Path<String>,
) -> Result<Response, ControlError> {
    debug!("patch_emergency, robot_id={robot_id}");
    orchestrator.emergency_stop(&robot_id).await?;
    Ok((StatusCode::OK, Json(json!({"result": "success"}))).into_response())
}

/// POST /api/v1/robots/notifications/ - robot telemetry batch.
pub async fn post_notifications(
    State(orchestrator): AppState,
    body: Bytes,
) -> Result<Response, ControlError> {
    debug!("post_notifications");
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let items = types::parse_notification_batch(&body)?;

    let outcome = orchestrator.process_notifications(items).await;
    Ok((
        StatusCode::OK,
        Json(json!({
            "result": "success",
            "processed_data": outcome.processed,
            "ignored_data": outcome.ignored,
        })),
    )
        .into_response())
}
