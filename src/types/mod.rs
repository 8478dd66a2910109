//! Core domain types: robot entities, legs, routes, places, shipments.
//!
//! Everything that crosses the world-model boundary is parsed into these
//! records exactly once, at the client edge. Downstream logic never touches
//! raw attribute maps.

mod robot;
mod route;
mod shipment;
mod state;

pub use robot::{CommandStatus, RobotEntity, RobotMode};
pub use route::{Leg, LegAction, Order, Place, PlanRoute, Pose, WaitingRoute, WaypointPoint};
pub use shipment::{parse_notification_batch, NotificationItem, ShipmentRequest};
pub use state::{Caller, RobotState, TokenMode};
