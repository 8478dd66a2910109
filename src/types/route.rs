//! Route legs, plans, places and the structures echoed to robots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One waypoint handed to a robot: a pose point plus an optional approach
/// angle. Intermediate vias travel with `angle: null`; only the terminal
/// waypoint of a leg carries a concrete angle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaypointPoint {
    pub point: Value,
    #[serde(default)]
    pub angle: Value,
}

/// One step of a planned route. `action` is carried opaquely from the route
/// plan; the notification pipeline parses it on arrival (see [`LegAction`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub to: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub action: Value,
    #[serde(default)]
    pub waypoints: Vec<WaypointPoint>,
}

/// Shipment context attached to a robot: where it came from, which places
/// it must visit, and where it is headed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub source: String,
    pub via: Vec<String>,
    pub destination: String,
}

/// Subroute a robot retreats onto while waiting for a contended token.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingRoute {
    pub via: Vec<String>,
    pub to: String,
}

impl WaitingRoute {
    /// Parse a waiting route from an opaque action value. Null, empty or
    /// target-less objects mean "no refuge configured".
    pub fn parse(value: Option<&Value>) -> Option<Self> {
        let obj = value?.as_object()?;
        let to = obj.get("to")?.as_str()?.to_string();
        if to.is_empty() {
            return None;
        }
        let via = obj
            .get("via")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Some(Self { via, to })
    }
}

/// Token directive attached to a leg, parsed from the opaque `action`
/// value when the robot arrives at the leg's terminal.
#[derive(Debug, Clone)]
pub struct LegAction {
    pub func: String,
    pub token: String,
    pub waiting_route: Option<WaitingRoute>,
}

impl LegAction {
    pub fn parse(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let func = obj.get("func")?.as_str()?.to_string();
        let token = obj
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self {
            func,
            token,
            waiting_route: WaitingRoute::parse(obj.get("waiting_route")),
        })
    }

    /// The empty action stamped onto synthetic refuge legs.
    pub fn empty_value() -> Value {
        serde_json::json!({"func": "", "token": "", "waiting_route": {}})
    }
}

/// One route of a stored route plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanRoute {
    pub from: String,
    #[serde(default)]
    pub via: Vec<String>,
    pub to: String,
    pub destination: String,
    #[serde(default)]
    pub action: Value,
}

/// A pose in the facility: an opaque point plus an opaque angle, passed
/// through to robots untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    pub point: Value,
    #[serde(default)]
    pub angle: Value,
}

/// A named place in the facility.
#[derive(Debug, Clone)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub pose: Pose,
}
