//! Robot telemetry processing.
//!
//! Each batch element runs the same gauntlet: the throttle gate, a fresh
//! robot fetch, the watermark patch, mode-transition detection, token
//! actions on standby arrival, and state propagation to the robot's UI.
//! Elements are processed in input order; a failing element is recorded
//! as ignored and never halts the batch.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{robot_state, RobotOrchestrator};
use crate::error::ControlError;
use crate::routing::WaypointResolver;
use crate::throttle::ThrottleError;
use crate::types::{
    Leg, LegAction, NotificationItem, RobotEntity, RobotMode, RobotState, TokenMode, WaitingRoute,
};

/// Batch verdicts, echoing the raw input elements.
#[derive(Debug, Default)]
pub struct NotificationOutcome {
    pub processed: Vec<Value>,
    pub ignored: Vec<Value>,
}

impl RobotOrchestrator {
    /// Process one telemetry batch in input order.
    pub async fn process_notifications(
        &self,
        items: Vec<NotificationItem>,
    ) -> NotificationOutcome {
        let mut outcome = NotificationOutcome::default();
        for item in items {
            match self.process_notification(&item).await {
                Ok(true) => outcome.processed.push(item.raw),
                Ok(false) => outcome.ignored.push(item.raw),
                Err(e) => {
                    error!(
                        "notification processing failed, robot_id={}, {e}",
                        item.robot_id
                    );
                    outcome.ignored.push(item.raw);
                }
            }
        }
        outcome
    }

    /// Returns whether the element counted as processed.
    async fn process_notification(&self, item: &NotificationItem) -> Result<bool, ControlError> {
        match self.throttle().advance_if_older(&item.robot_id, item.time) {
            Ok(()) => {}
            Err(ThrottleError::Rejected { .. }) => {
                warn!(
                    "ignore notification, robot_id={}, time={}, timedelta lower than the throttling interval",
                    item.robot_id,
                    item.time.to_rfc3339()
                );
                return Ok(false);
            }
            Err(ThrottleError::Storage(e)) => {
                return Err(ControlError::internal(format!(
                    "throttle storage failure, {e}"
                )));
            }
        }

        let _guard = self.guard(&item.robot_id).await;

        let robot = self.fetch_robot(&item.robot_id).await?;
        let next_mode = RobotMode::parse(&item.next_mode);
        let next_state = robot_state::derive_state(&robot, Some(&next_mode));
        let ui_id = self
            .config()
            .ui_id(&item.robot_id)
            .ok_or_else(|| {
                ControlError::internal(format!("unknown robot ui, robot_id={}", item.robot_id))
            })?
            .to_string();

        // The watermark advances for every gated element, including the
        // ones ignored below for lack of a mode transition.
        self.patch_robot(
            &item.robot_id,
            self.payloads().update_last_processed_time(&item.time),
        )
        .await?;
        debug!(
            "update robot last_processed_time, robot_id={}, time={}",
            item.robot_id,
            item.time.to_rfc3339()
        );

        if next_mode == robot.current_mode {
            debug!(
                "ignore notification, next_mode={next_mode} equals current_mode",
            );
            return Ok(false);
        }

        self.patch_robot(&item.robot_id, self.payloads().update_mode(&next_mode))
            .await?;
        info!(
            "update robot mode, robot_id={}, current_mode={}, next_mode={next_mode}",
            item.robot_id, robot.current_mode
        );

        if next_mode == RobotMode::Standby {
            self.dispatch_action(&item.robot_id, &ui_id, &robot).await?;
        }
        self.propagate_state(&item.robot_id, &ui_id, &robot, next_state)
            .await?;
        Ok(true)
    }

    /// Run the token directive attached to the leg the robot just
    /// finished, if any.
    async fn dispatch_action(
        &self,
        robot_id: &str,
        ui_id: &str,
        robot: &RobotEntity,
    ) -> Result<(), ControlError> {
        let Some(leg) = &robot.navigating_waypoints else {
            return Ok(());
        };
        let Some(action) = LegAction::parse(&leg.action) else {
            return Ok(());
        };
        if action.func.is_empty() || action.token.is_empty() {
            return Ok(());
        }

        match action.func.as_str() {
            "lock" => {
                let (has_lock, token) = self.tokens().acquire(&action.token, robot_id).await?;
                if has_lock {
                    self.commander().move_next(robot_id, false).await?;
                    self.publish_token_info(ui_id, &token, TokenMode::Lock)
                        .await?;
                } else {
                    if let Some(waiting_route) = &action.waiting_route {
                        self.take_refuge(robot_id, robot, waiting_route).await?;
                    }
                    self.publish_token_info(ui_id, &token, TokenMode::Suspend)
                        .await?;
                }
            }
            "release" => {
                let (new_owner, token) = self.tokens().release(&action.token, robot_id).await?;
                self.commander().move_next(robot_id, false).await?;
                self.publish_token_info(ui_id, &token, TokenMode::Release)
                    .await?;

                if let Some(new_owner) = new_owner {
                    // the releasing robot's guard is already held
                    let _owner_guard = if new_owner == robot_id {
                        None
                    } else {
                        Some(self.guard(&new_owner).await)
                    };
                    self.commander().move_next(&new_owner, false).await?;
                    let owner_ui = self
                        .config()
                        .ui_id(&new_owner)
                        .ok_or_else(|| {
                            ControlError::internal(format!(
                                "unknown robot ui, robot_id={new_owner}"
                            ))
                        })?
                        .to_string();
                    self.publish_token_info(&owner_ui, &token, TokenMode::Resume)
                        .await?;
                    self.publish_token_info(&owner_ui, &token, TokenMode::Lock)
                        .await?;
                }
            }
            other => debug!("no token handling for action func \"{other}\""),
        }
        Ok(())
    }

    /// Divert the robot onto its waiting route to clear the contended
    /// region while queued for the token.
    async fn take_refuge(
        &self,
        robot_id: &str,
        robot: &RobotEntity,
        waiting_route: &WaitingRoute,
    ) -> Result<(), ControlError> {
        let mut place_ids: HashSet<String> = waiting_route.via.iter().cloned().collect();
        place_ids.insert(waiting_route.to.clone());
        let places = self.resolver().load_places(&place_ids).await?;

        let missing = |place_id: &str| {
            ControlError::upstream(format!("place not found, place_id={place_id}"), "")
        };
        let via_poses = waiting_route
            .via
            .iter()
            .map(|id| places.get(id).ok_or_else(|| missing(id)))
            .collect::<Result<Vec<_>, _>>()?;
        let to_pose = places
            .get(&waiting_route.to)
            .ok_or_else(|| missing(&waiting_route.to))?;

        let destination = robot
            .navigating_waypoints
            .as_ref()
            .map(|leg| leg.destination.clone())
            .unwrap_or_default();
        let leg = Leg {
            to: waiting_route.to.clone(),
            destination,
            action: LegAction::empty_value(),
            waypoints: WaypointResolver::build_waypoints(&via_poses, to_pose),
        };

        self.commander()
            .move_robot(robot_id, &leg.waypoints, &leg, None, None, None, None)
            .await?;
        info!("take refuge a robot({robot_id}) in \"{}\"", waiting_route.to);
        Ok(())
    }

    /// Commit and publish a state change when the derived state moved.
    async fn propagate_state(
        &self,
        robot_id: &str,
        ui_id: &str,
        robot: &RobotEntity,
        next_state: RobotState,
    ) -> Result<(), ControlError> {
        if robot.current_state == next_state.as_str() {
            return Ok(());
        }

        self.patch_robot(robot_id, self.payloads().update_state(next_state))
            .await?;

        // The destination may have changed above (move-next, refuge), so
        // resolve it from a fresh snapshot.
        let fresh = self.fetch_robot(robot_id).await?;
        let destination = self.destination_name(&fresh).await?;

        self.store()
            .send_command(
                &self.config().fiware_service,
                &self.config().robot_ui_servicepath,
                &self.config().robot_ui_type,
                ui_id,
                self.payloads().robot_ui_send_state(next_state, &destination),
            )
            .await?;
        info!(
            "publish new state to robot ui({ui_id}), current_state={}, next_state={next_state}, destination={destination}",
            robot.current_state
        );
        Ok(())
    }

    async fn publish_token_info(
        &self,
        ui_id: &str,
        token: &super::TokenSnapshot,
        mode: TokenMode,
    ) -> Result<(), ControlError> {
        self.store()
            .send_command(
                &self.config().fiware_service,
                &self.config().robot_ui_servicepath,
                &self.config().robot_ui_type,
                ui_id,
                self.payloads().robot_ui_send_token_info(token, mode),
            )
            .await?;
        info!(
            "publish new token_info to robot ui({ui_id}), token={}, mode={mode}, lock_owner_id={}, prev_owner_id={}",
            token.token_id, token.lock_owner_id, token.prev_owner_id
        );
        Ok(())
    }
}
