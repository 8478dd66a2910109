//! Inbound request bodies: shipment submissions and robot telemetry.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ControlError;

/// A shipment submitted by the warehouse or ordering system. Place names
/// are resolved to ids by the route resolver.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentRequest {
    pub destination: ShipmentDestination,
    #[serde(default)]
    pub updated: Vec<UpdatedPlace>,
    #[serde(default)]
    pub caller: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentDestination {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatedPlace {
    pub place: String,
}

impl ShipmentRequest {
    /// Parse and validate a shipment body. Anything that is not an object
    /// with a string destination name and string place names is rejected.
    pub fn parse(body: &Value) -> Result<Self, ControlError> {
        if !body.is_object() {
            return Err(ControlError::validation(format!(
                "invalid shipment_list, {body}"
            )));
        }
        serde_json::from_value(body.clone())
            .map_err(|_| ControlError::validation(format!("invalid shipment_list, {body}")))
    }

    /// The caller tag, when present and a string.
    pub fn caller_tag(&self) -> Option<&str> {
        self.caller.as_ref().and_then(Value::as_str)
    }
}

/// One element of a robot telemetry batch.
#[derive(Debug, Clone)]
pub struct NotificationItem {
    pub robot_id: String,
    pub next_mode: String,
    pub time: DateTime<FixedOffset>,
    /// The raw element, echoed back in `processed_data` / `ignored_data`.
    pub raw: Value,
}

impl NotificationItem {
    /// Parse one batch element: `{ id, mode: {value}, time: {value} }`.
    pub fn parse(raw: &Value) -> Result<Self, ControlError> {
        let invalid = || ControlError::validation(format!("invalid notification data, {raw}"));

        let robot_id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(invalid)?
            .to_string();
        let next_mode = raw
            .pointer("/mode/value")
            .and_then(Value::as_str)
            .ok_or_else(invalid)?
            .to_string();
        let time_value = raw
            .pointer("/time/value")
            .and_then(Value::as_str)
            .ok_or_else(invalid)?;
        let time = DateTime::parse_from_rfc3339(time_value).map_err(|_| invalid())?;

        Ok(Self {
            robot_id,
            next_mode,
            time,
            raw: raw.clone(),
        })
    }
}

/// Parse the full notification batch body.
pub fn parse_notification_batch(body: &Value) -> Result<Vec<NotificationItem>, ControlError> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ControlError::validation(format!("invalid notified data, {body}")))?;
    data.iter().map(NotificationItem::parse).collect()
}
