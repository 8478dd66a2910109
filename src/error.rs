//! Control-plane error taxonomy and its single HTTP mapping point.
//!
//! Inner components return structured [`ControlError`] values; the axum
//! layer converts them to `{ "message": ..., ...context }` bodies exactly
//! once. 5xx responses are logged at error level, 4xx at warn level.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Malformed request body or unresolvable request content.
    #[error("{message}")]
    Validation { message: String },

    /// Every robot in the fleet is busy.
    #[error("no available robot")]
    NoAvailableRobot,

    /// A move-next was requested with nothing left to do.
    #[error("no remaining waypoints for robot({robot_id})")]
    NoRemainingWaypoints { robot_id: String },

    /// The robot is navigating and cannot take the request.
    #[error("robot({robot_id}) is navigating now")]
    RobotBusy { robot_id: String },

    /// The world model does not know the entity.
    #[error("{message}")]
    NotFound { message: String, root_cause: String },

    /// The world model failed: transport error, non-2xx, unparsable body.
    #[error("{message}")]
    Upstream { message: String, root_cause: String },

    /// Command protocol failure or other internal invariant violation.
    #[error("{message}")]
    Internal { message: String },
}

impl ControlError {
    pub fn validation(message: impl Into<String>) -> Self {
        ControlError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, root_cause: impl Into<String>) -> Self {
        ControlError::NotFound {
            message: message.into(),
            root_cause: root_cause.into(),
        }
    }

    pub fn upstream(message: impl Into<String>, root_cause: impl Into<String>) -> Self {
        ControlError::Upstream {
            message: message.into(),
            root_cause: root_cause.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ControlError::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ControlError::Validation { .. } => StatusCode::BAD_REQUEST,
            ControlError::NoAvailableRobot => StatusCode::UNPROCESSABLE_ENTITY,
            ControlError::NoRemainingWaypoints { .. } => StatusCode::PRECONDITION_FAILED,
            ControlError::RobotBusy { .. } => StatusCode::LOCKED,
            ControlError::NotFound { .. } => StatusCode::NOT_FOUND,
            ControlError::Upstream { .. } | ControlError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body: the message plus whatever context the variant carries.
    pub fn body(&self) -> Value {
        match self {
            ControlError::NoRemainingWaypoints { robot_id }
            | ControlError::RobotBusy { robot_id } => {
                json!({"message": self.to_string(), "id": robot_id})
            }
            ControlError::NotFound { root_cause, .. }
            | ControlError::Upstream { root_cause, .. } => {
                json!({"message": self.to_string(), "root_cause": root_cause})
            }
            _ => json!({"message": self.to_string()}),
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} -> {}", self, status);
        } else {
            warn!("{} -> {}", self, status);
        }
        (status, axum::Json(self.body())).into_response()
    }
}
