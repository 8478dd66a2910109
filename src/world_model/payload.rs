//! Attribute payload builders.
//!
//! The store expects attribute values wrapped as `{type, value, metadata}`
//! with a `TimeInstant` metadata stamp on every attribute the control
//! plane changes, and command attributes (`send_cmd`, `send_emg`,
//! `send_state`, `send_token_info`) as bare `{value}` envelopes carrying
//! their own `time` field. Stamps use the configured time zone, ISO-8601
//! with millisecond precision.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};

use crate::control::TokenSnapshot;
use crate::types::{Caller, Leg, Order, RobotMode, RobotState, TokenMode, WaypointPoint};

const ISO_MS: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// One attribute in store shape: typed value plus a TimeInstant stamp.
fn attr(attr_type: &str, value: Value, stamp: &str) -> Value {
    json!({
        "type": attr_type,
        "value": value,
        "metadata": {
            "TimeInstant": {
                "type": "datetime",
                "value": stamp,
            }
        }
    })
}

#[derive(Clone)]
pub struct PayloadBuilder {
    tz: Tz,
}

impl PayloadBuilder {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    fn stamp(&self) -> String {
        Utc::now().with_timezone(&self.tz).format(ISO_MS).to_string()
    }

    /// The navigation command patched onto a robot, together with the
    /// control plane's view of its route. Optional context attributes are
    /// omitted when absent; `navigating_waypoints` is always written.
    pub fn delivery_robot_command(
        &self,
        cmd: &str,
        cmd_waypoints: &[WaypointPoint],
        navigating_waypoints: &Leg,
        remaining_waypoints_list: Option<&[Leg]>,
        current_routes: Option<&Value>,
        order: Option<&Order>,
        caller: Option<Caller>,
    ) -> Value {
        let stamp = self.stamp();
        let mut payload = json!({
            "send_cmd": {
                "value": {
                    "time": stamp,
                    "cmd": cmd,
                    "waypoints": cmd_waypoints,
                }
            },
            "navigating_waypoints": attr(
                "object",
                serde_json::to_value(navigating_waypoints).unwrap_or(Value::Null),
                &stamp,
            ),
        });

        let Some(extra) = payload.as_object_mut() else {
            return payload;
        };
        if let Some(remaining) = remaining_waypoints_list {
            extra.insert(
                "remaining_waypoints_list".to_string(),
                attr(
                    "array",
                    serde_json::to_value(remaining).unwrap_or(Value::Null),
                    &stamp,
                ),
            );
        }
        if let Some(routes) = current_routes {
            extra.insert(
                "current_routes".to_string(),
                attr("array", routes.clone(), &stamp),
            );
        }
        if let Some(order) = order {
            extra.insert(
                "order".to_string(),
                attr(
                    "object",
                    serde_json::to_value(order).unwrap_or(Value::Null),
                    &stamp,
                ),
            );
        }
        if let Some(caller) = caller {
            extra.insert(
                "caller".to_string(),
                attr("string", json!(caller.as_str()), &stamp),
            );
        }
        payload
    }

    pub fn emergency_command(&self, cmd: &str) -> Value {
        json!({
            "send_emg": {
                "value": {
                    "time": self.stamp(),
                    "emergency_cmd": cmd,
                }
            }
        })
    }

    pub fn update_mode(&self, next_mode: &RobotMode) -> Value {
        let stamp = self.stamp();
        json!({"current_mode": attr("string", json!(next_mode.as_str()), &stamp)})
    }

    pub fn update_state(&self, next_state: RobotState) -> Value {
        let stamp = self.stamp();
        json!({"current_state": attr("string", json!(next_state.as_str()), &stamp)})
    }

    /// The notification watermark. The value keeps the notification's own
    /// offset; only the metadata stamp uses the configured zone.
    pub fn update_last_processed_time(&self, time: &DateTime<FixedOffset>) -> Value {
        let stamp = self.stamp();
        json!({
            "last_processed_time": attr(
                "ISO8601",
                json!(time.format(ISO_MS).to_string()),
                &stamp,
            )
        })
    }

    pub fn robot_ui_send_state(&self, next_state: RobotState, destination: &str) -> Value {
        json!({
            "send_state": {
                "value": {
                    "time": self.stamp(),
                    "state": next_state.as_str(),
                    "destination": destination,
                }
            }
        })
    }

    pub fn robot_ui_send_token_info(&self, token: &TokenSnapshot, mode: TokenMode) -> Value {
        json!({
            "send_token_info": {
                "value": {
                    "time": self.stamp(),
                    "token": token.token_id,
                    "mode": mode.as_str(),
                    "lock_owner_id": token.lock_owner_id,
                    "prev_owner_id": token.prev_owner_id,
                }
            }
        })
    }

    /// Full token state. Every token transition writes all three
    /// attributes; there are no partial token updates.
    pub fn token_info(&self, is_locked: bool, lock_owner_id: &str, waitings: &[String]) -> Value {
        let stamp = self.stamp();
        json!({
            "is_locked": attr("boolean", json!(is_locked), &stamp),
            "lock_owner_id": attr("string", json!(lock_owner_id), &stamp),
            "waitings": attr("array", json!(waitings), &stamp),
        })
    }
}
