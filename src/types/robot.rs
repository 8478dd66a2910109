//! Robot entity record and its lenient attribute-map parser.

use serde_json::Value;

use super::route::{Leg, Order};

/// Live mode reported by a robot. The init mode is the literal single
/// space the fleet firmware reports before its first command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotMode {
    Init,
    Navi,
    Standby,
    Error,
    Other(String),
}

impl RobotMode {
    pub fn parse(value: &str) -> Self {
        match value {
            " " => RobotMode::Init,
            "navi" => RobotMode::Navi,
            "standby" => RobotMode::Standby,
            "error" => RobotMode::Error,
            other => RobotMode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RobotMode::Init => " ",
            RobotMode::Navi => "navi",
            RobotMode::Standby => "standby",
            RobotMode::Error => "error",
            RobotMode::Other(s) => s,
        }
    }
}

impl std::fmt::Display for RobotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handshake status of the most recent command sent to a robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    Pending,
    Other(String),
}

impl CommandStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "OK" => CommandStatus::Ok,
            "pending" => CommandStatus::Pending,
            other => CommandStatus::Other(other.to_string()),
        }
    }
}

/// Typed view of a delivery-robot entity.
///
/// Parsing is deliberately lenient: a malformed or absent attribute becomes
/// `None` (or a default), never a parse error. The availability check and
/// state derivation both depend on telling "absent/malformed" apart from
/// "present but empty".
#[derive(Debug, Clone)]
pub struct RobotEntity {
    pub id: String,
    pub mode: RobotMode,
    pub current_mode: RobotMode,
    pub current_state: String,
    pub navigating_waypoints: Option<Leg>,
    pub remaining_waypoints_list: Option<Vec<Leg>>,
    pub order: Option<Order>,
    pub caller: Option<String>,
    pub send_cmd_status: CommandStatus,
    pub send_cmd_info: Option<Value>,
    pub last_processed_time: Option<String>,
}

fn attr_value<'a>(attrs: &'a Value, name: &str) -> Option<&'a Value> {
    attrs.get(name)?.get("value")
}

fn attr_str(attrs: &Value, name: &str) -> Option<String> {
    attr_value(attrs, name)?.as_str().map(str::to_string)
}

impl RobotEntity {
    /// Build a typed robot from a raw entity attribute map.
    pub fn from_attrs(id: &str, attrs: &Value) -> Self {
        let navigating_waypoints = attr_value(attrs, "navigating_waypoints")
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
            .and_then(|v| serde_json::from_value::<Leg>(v.clone()).ok());

        // all-or-nothing: one malformed leg invalidates the whole queue,
        // otherwise a busy robot could look available
        let remaining_waypoints_list = attr_value(attrs, "remaining_waypoints_list")
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| serde_json::from_value::<Leg>(v.clone()).ok())
                    .collect::<Option<Vec<_>>>()
            });

        let order = attr_value(attrs, "order")
            .and_then(|v| serde_json::from_value::<Order>(v.clone()).ok());

        Self {
            id: id.to_string(),
            mode: RobotMode::parse(&attr_str(attrs, "mode").unwrap_or_default()),
            current_mode: RobotMode::parse(&attr_str(attrs, "current_mode").unwrap_or_default()),
            current_state: attr_str(attrs, "current_state").unwrap_or_default(),
            navigating_waypoints,
            remaining_waypoints_list,
            order,
            caller: attr_str(attrs, "caller"),
            send_cmd_status: CommandStatus::parse(
                &attr_str(attrs, "send_cmd_status").unwrap_or_default(),
            ),
            send_cmd_info: attr_value(attrs, "send_cmd_info").cloned(),
            last_processed_time: attr_str(attrs, "last_processed_time"),
        }
    }

    /// A robot can take a new shipment when it is not navigating and its
    /// remaining-legs queue exists and is drained.
    pub fn is_available(&self) -> bool {
        self.mode != RobotMode::Navi
            && self
                .remaining_waypoints_list
                .as_ref()
                .is_some_and(Vec::is_empty)
    }
}
