//! Derived robot states, shipment callers, and token UI modes.

use serde::{Deserialize, Serialize};

/// Control-plane view of what a robot is currently doing.
///
/// Derived from the live mode, the current leg and the order context,
/// never reported by the robot itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RobotState {
    Moving,
    Standby,
    Picking,
    Delivering,
}

impl RobotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Moving => "moving",
            RobotState::Standby => "standby",
            RobotState::Picking => "picking",
            RobotState::Delivering => "delivering",
        }
    }
}

impl std::fmt::Display for RobotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who issued a shipment. Disambiguates `picking` vs `delivering` when a
/// robot reaches the order destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Ordering,
    Warehouse,
}

impl Caller {
    /// Classify a shipment's caller tag against the configured ordering list.
    /// Anything absent, non-string or unlisted is a warehouse shipment.
    pub fn from_tag(tag: Option<&str>, ordering_list: &[String]) -> Self {
        match tag {
            Some(t) if ordering_list.iter().any(|o| o == t) => Caller::Ordering,
            _ => Caller::Warehouse,
        }
    }

    /// Parse a stored caller value. Unknown values are an error so the
    /// state derivation can degrade explicitly.
    pub fn value_of(value: &str) -> Result<Self, String> {
        match value {
            "ordering" => Ok(Caller::Ordering),
            "warehouse" => Ok(Caller::Warehouse),
            other => Err(format!("{other} is not a caller")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Caller::Ordering => "ordering",
            Caller::Warehouse => "warehouse",
        }
    }
}

impl std::fmt::Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token lifecycle events published to a robot's UI entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    Lock,
    Release,
    Suspend,
    Resume,
}

impl TokenMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenMode::Lock => "lock",
            TokenMode::Release => "release",
            TokenMode::Suspend => "suspend",
            TokenMode::Resume => "resume",
        }
    }
}

impl std::fmt::Display for TokenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
