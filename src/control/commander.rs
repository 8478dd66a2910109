//! The command-and-ack protocol against a robot.
//!
//! A move is a `navi` command patched onto the robot, followed by a
//! bounded poll of `send_cmd_status` until the robot acknowledges. An
//! `ignore` outcome gets exactly one `refresh` retry with the identical
//! context; anything but an `ack` after that is a protocol failure.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::error::ControlError;
use crate::types::{Caller, CommandStatus, Leg, Order, RobotEntity, RobotMode, WaypointPoint};
use crate::world_model::{EntityStore, PayloadBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmdResult {
    Ack,
    Ignore,
}

impl CmdResult {
    fn as_str(self) -> &'static str {
        match self {
            CmdResult::Ack => "ack",
            CmdResult::Ignore => "ignore",
        }
    }
}

pub struct MoveCommander {
    store: Arc<dyn EntityStore>,
    payloads: PayloadBuilder,
    config: Arc<Config>,
}

impl MoveCommander {
    pub fn new(store: Arc<dyn EntityStore>, payloads: PayloadBuilder, config: Arc<Config>) -> Self {
        Self {
            store,
            payloads,
            config,
        }
    }

    /// Dispatch a leg to a robot and wait for its acknowledgment,
    /// retrying once with `refresh` when the robot ignores the `navi`.
    #[allow(clippy::too_many_arguments)]
    pub async fn move_robot(
        &self,
        robot_id: &str,
        cmd_waypoints: &[WaypointPoint],
        navigating_waypoints: &Leg,
        remaining_waypoints_list: Option<&[Leg]>,
        current_routes: Option<&Value>,
        order: Option<&Order>,
        caller: Option<Caller>,
    ) -> Result<(), ControlError> {
        let navi_result = self
            .dispatch(
                robot_id,
                "navi",
                cmd_waypoints,
                navigating_waypoints,
                remaining_waypoints_list,
                current_routes,
                order,
                caller,
            )
            .await?;
        info!(
            "send \"navi\" command to robot({robot_id}), result={}",
            navi_result.as_str()
        );

        if navi_result == CmdResult::Ignore {
            let refresh_result = self
                .dispatch(
                    robot_id,
                    "refresh",
                    cmd_waypoints,
                    navigating_waypoints,
                    remaining_waypoints_list,
                    current_routes,
                    order,
                    caller,
                )
                .await?;
            info!(
                "send \"refresh\" command to robot({robot_id}), result={}",
                refresh_result.as_str()
            );
            if refresh_result != CmdResult::Ack {
                return Err(ControlError::internal(format!(
                    "cannot move robot({robot_id}) to \"{}\" using \"navi\" and \"refresh\", \
                     navi result={} refresh result={}",
                    navigating_waypoints.to,
                    navi_result.as_str(),
                    refresh_result.as_str(),
                )));
            }
        }

        info!(
            "move robot({robot_id}) to \"{}\" (waypoints={}, order={:?}, caller={:?})",
            navigating_waypoints.to,
            serde_json::to_string(cmd_waypoints).unwrap_or_default(),
            order,
            caller,
        );
        Ok(())
    }

    /// Advance a robot onto the head of its remaining legs.
    pub async fn move_next(&self, robot_id: &str, mode_check: bool) -> Result<(), ControlError> {
        let robot = self.fetch_robot(robot_id).await?;
        if mode_check && robot.mode == RobotMode::Navi {
            return Err(ControlError::RobotBusy {
                robot_id: robot_id.to_string(),
            });
        }

        let remaining = robot.remaining_waypoints_list.unwrap_or_default();
        let Some((head, tail)) = remaining.split_first() else {
            return Err(ControlError::NoRemainingWaypoints {
                robot_id: robot_id.to_string(),
            });
        };

        self.move_robot(robot_id, &head.waypoints, head, Some(tail), None, None, None)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        robot_id: &str,
        cmd: &str,
        cmd_waypoints: &[WaypointPoint],
        navigating_waypoints: &Leg,
        remaining_waypoints_list: Option<&[Leg]>,
        current_routes: Option<&Value>,
        order: Option<&Order>,
        caller: Option<Caller>,
    ) -> Result<CmdResult, ControlError> {
        let payload = self.payloads.delivery_robot_command(
            cmd,
            cmd_waypoints,
            navigating_waypoints,
            remaining_waypoints_list,
            current_routes,
            order,
            caller,
        );
        self.store
            .send_command(
                &self.config.fiware_service,
                &self.config.robot_servicepath,
                &self.config.robot_type,
                robot_id,
                payload,
            )
            .await?;

        let info = self.await_ack(robot_id).await?;
        Self::classify(robot_id, &info)
    }

    /// Poll the robot until `send_cmd_status` turns OK, bounded by the
    /// configured attempt budget.
    async fn await_ack(&self, robot_id: &str) -> Result<Value, ControlError> {
        let wait = Duration::from_millis(self.config.movenext_wait_msec);
        let max_attempts = self.config.movenext_wait_max_num;

        let mut last: Option<RobotEntity> = None;
        for attempt in 0..max_attempts {
            let robot = self.fetch_robot(robot_id).await?;
            let acked = robot.send_cmd_status == CommandStatus::Ok;
            last = Some(robot);
            if acked {
                break;
            }
            if attempt + 1 < max_attempts {
                tokio::time::sleep(wait).await;
            }
        }

        match last {
            Some(robot) if robot.send_cmd_status == CommandStatus::Ok => {
                Ok(robot.send_cmd_info.unwrap_or(Value::Null))
            }
            _ => Err(ControlError::internal(format!(
                "send_cmd_status still pending, robot_id={robot_id}, wait_msec={}, wait_count={}",
                self.config.movenext_wait_msec, max_attempts,
            ))),
        }
    }

    /// Interpret `send_cmd_info`: ack and ignore pass through, everything
    /// else is a robot-side error.
    fn classify(robot_id: &str, info: &Value) -> Result<CmdResult, ControlError> {
        let result = info
            .as_object()
            .and_then(|o| o.get("result"))
            .ok_or_else(|| {
                ControlError::internal(format!("invalid send_cmd_info, {info}"))
            })?;

        match result.as_str() {
            Some("ack") => Ok(CmdResult::Ack),
            Some("ignore") => Ok(CmdResult::Ignore),
            _ => {
                let errors = info
                    .get("errors")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Err(ControlError::internal(format!(
                    "move robot error, robot_id={robot_id}, errors=\"{errors}\""
                )))
            }
        }
    }

    async fn fetch_robot(&self, robot_id: &str) -> Result<RobotEntity, ControlError> {
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
}
