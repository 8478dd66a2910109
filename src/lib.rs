//! fleet-control: delivery-robot fleet orchestration
//!
//! HTTP control plane for a fleet of autonomous delivery robots sharing a
//! facility with a FIWARE-style world model.
//!
//! ## Architecture
//!
//! - **RobotOrchestrator**: admission control, shipment dispatch, and
//!   per-robot serialization of mutations
//! - **WaypointResolver**: shipment descriptors -> route-plan legs
//! - **MoveCommander**: the navi/refresh command-and-ack protocol
//! - **TokenCoordinator**: distributed mutex with FIFO waiters and refuge
//! - **NotificationPipeline**: throttled telemetry -> mode/state commits
//!   and UI publication

pub mod api;
pub mod config;
pub mod control;
pub mod error;
pub mod routing;
pub mod throttle;
pub mod types;
pub mod world_model;

// Re-export the pieces binaries and tests wire together
pub use api::create_app;
pub use config::Config;
pub use control::{NotificationOutcome, RobotOrchestrator, ShipmentOutcome};
pub use error::ControlError;
pub use throttle::ThrottleStore;
pub use world_model::{EntityStore, WorldModelClient};
