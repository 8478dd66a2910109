//! Orchestration core.
//!
//! [`RobotOrchestrator`] is the service object behind every HTTP endpoint:
//! it owns the entity-store handle, the route resolver, the move
//! commander, the token coordinator and the throttle store, and it
//! serializes all mutations per robot. HTTP handlers are thin adapters
//! over its methods.

mod commander;
mod notifications;
pub mod robot_state;
mod tokens;

pub use commander::MoveCommander;
pub use notifications::NotificationOutcome;
pub use tokens::{TokenCoordinator, TokenSnapshot};

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ControlError;
use crate::routing::WaypointResolver;
use crate::throttle::ThrottleStore;
use crate::types::{Caller, Order, RobotEntity, RobotState, ShipmentRequest};
use crate::world_model::{attr_value, EntityStore, PayloadBuilder};

/// Per-robot mutation locks, created lazily per robot id.
#[derive(Default)]
struct RobotGuards {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RobotGuards {
    async fn acquire(&self, robot_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(robot_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Result of a shipment submission.
#[derive(Debug)]
pub enum ShipmentOutcome {
    Accepted {
        robot_id: String,
        order: Order,
        caller: Caller,
    },
    /// The plan produced zero legs; nothing was dispatched.
    NoLegs,
}

/// Snapshot answered by `GET /robots/<robot_id>/`.
#[derive(Debug, Serialize)]
pub struct RobotStatus {
    pub id: String,
    pub state: RobotState,
    pub destination: String,
}

pub struct RobotOrchestrator {
    config: Arc<Config>,
    store: Arc<dyn EntityStore>,
    payloads: PayloadBuilder,
    resolver: WaypointResolver,
    commander: MoveCommander,
    tokens: TokenCoordinator,
    throttle: ThrottleStore,
    guards: RobotGuards,
}

impl RobotOrchestrator {
    pub fn new(config: Arc<Config>, store: Arc<dyn EntityStore>, throttle: ThrottleStore) -> Self {
        let payloads = PayloadBuilder::new(config.timezone);
        Self {
            resolver: WaypointResolver::new(store.clone(), config.clone()),
            commander: MoveCommander::new(store.clone(), payloads.clone(), config.clone()),
            tokens: TokenCoordinator::new(store.clone(), payloads.clone(), config.clone()),
            payloads,
            store,
            throttle,
            guards: RobotGuards::default(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub(crate) fn payloads(&self) -> &PayloadBuilder {
        &self.payloads
    }

    pub(crate) fn resolver(&self) -> &WaypointResolver {
        &self.resolver
    }

    pub(crate) fn commander(&self) -> &MoveCommander {
        &self.commander
    }

    pub(crate) fn tokens(&self) -> &TokenCoordinator {
        &self.tokens
    }

    pub(crate) fn throttle(&self) -> &ThrottleStore {
        &self.throttle
    }

    pub(crate) async fn guard(&self, robot_id: &str) -> OwnedMutexGuard<()> {
        self.guards.acquire(robot_id).await
    }

    /// Accept a shipment: pick a robot, realize the route, dispatch the
    /// first leg.
    pub async fn handle_shipment(
        &self,
        shipment: &ShipmentRequest,
    ) -> Result<ShipmentOutcome, ControlError> {
        let robot_id = self.select_available_robot().await?;
        let caller = Caller::from_tag(shipment.caller_tag(), &self.config.ordering_list);
        let estimated = self.resolver.estimate_routes(shipment, &robot_id).await?;

        let Some((head, tail)) = estimated.legs.split_first() else {
            info!("ignore shipment, no available waypoints_list");
            return Ok(ShipmentOutcome::NoLegs);
        };

        let _guard = self.guard(&robot_id).await;
        self.commander
            .move_robot(
                &robot_id,
                &head.waypoints,
                head,
                Some(tail),
                Some(&estimated.routes),
                Some(&estimated.order),
                Some(caller),
            )
            .await?;

        Ok(ShipmentOutcome::Accepted {
            robot_id,
            order: estimated.order,
            caller,
        })
    }

    /// Current state and destination of one robot.
    pub async fn robot_status(&self, robot_id: &str) -> Result<RobotStatus, ControlError> {
        let robot = self.fetch_robot(robot_id).await?;
        let state = robot_state::derive_state(&robot, None);
        let destination = self.destination_name(&robot).await?;
        Ok(RobotStatus {
            id: robot_id.to_string(),
            state,
            destination,
        })
    }

    /// Advance one robot to its next leg (external request; mode-checked).
    pub async fn move_next(&self, robot_id: &str) -> Result<(), ControlError> {
        let _guard = self.guard(robot_id).await;
        self.commander.move_next(robot_id, true).await
    }

    /// Dispatch an emergency stop.
    pub async fn emergency_stop(&self, robot_id: &str) -> Result<(), ControlError> {
        let _guard = self.guard(robot_id).await;
        let payload = self.payloads.emergency_command("stop");
        self.patch_robot(robot_id, payload).await?;
        info!("send emergency command (\"stop\") to robot({robot_id})");
        Ok(())
    }

    /// First fleet robot, in declaration order, that can take a shipment.
    async fn select_available_robot(&self) -> Result<String, ControlError> {
        for robot_id in &self.config.robot_list {
            let robot = self.fetch_robot(robot_id).await?;
            if robot.is_available() {
                debug!("available robot found, robot_id={robot_id}");
                return Ok(robot_id.clone());
            }
        }
        Err(ControlError::NoAvailableRobot)
    }

    pub(crate) async fn fetch_robot(&self, robot_id: &str) -> Result<RobotEntity, ControlError> {
        let attrs = self
            .store
            .get_entity(
                &self.config.fiware_service,
                &self.config.robot_servicepath,
                &self.config.robot_type,
                robot_id,
            )
            .await?;
        Ok(RobotEntity::from_attrs(robot_id, &attrs))
    }

    pub(crate) async fn patch_robot(
        &self,
        robot_id: &str,
        payload: Value,
    ) -> Result<(), ControlError> {
        self.store
            .send_command(
                &self.config.fiware_service,
                &self.config.robot_servicepath,
                &self.config.robot_type,
                robot_id,
                payload,
            )
            .await
    }

    /// Display name of the robot's current destination, or "" when the
    /// robot has no current leg or the place cannot be resolved.
    pub(crate) async fn destination_name(
        &self,
        robot: &RobotEntity,
    ) -> Result<String, ControlError> {
        let destination_id = robot
            .navigating_waypoints
            .as_ref()
            .map(|leg| leg.destination.as_str())
            .unwrap_or_default();
        if destination_id.is_empty() {
            return Ok(String::new());
        }

        match self
            .store
            .get_entity(
                &self.config.fiware_service,
                &self.config.robot_servicepath,
                &self.config.place_type,
                destination_id,
            )
            .await
        {
            Ok(place) => Ok(attr_value(&place, "name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()),
            Err(ControlError::NotFound { .. }) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}
