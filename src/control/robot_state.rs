//! Pure state derivation over robot attributes.

use tracing::warn;

use crate::types::{Caller, RobotEntity, RobotMode, RobotState};

/// Classify what a robot is doing from its mode, current leg and order.
///
/// `mode_override` substitutes a just-notified mode for the stored one,
/// so the notification pipeline can classify against the incoming value
/// before committing it.
pub fn derive_state(robot: &RobotEntity, mode_override: Option<&RobotMode>) -> RobotState {
    let mode = mode_override.unwrap_or(&robot.mode);
    if *mode == RobotMode::Navi {
        return RobotState::Moving;
    }

    let Some(leg) = &robot.navigating_waypoints else {
        return RobotState::Standby;
    };
    let Some(order) = &robot.order else {
        return RobotState::Standby;
    };

    if leg.to == order.source {
        RobotState::Standby
    } else if leg.to == order.destination {
        match robot.caller.as_deref().map(Caller::value_of) {
            Some(Ok(Caller::Ordering)) => RobotState::Delivering,
            Some(Ok(Caller::Warehouse)) => RobotState::Picking,
            _ => {
                warn!(
                    "unknown caller (estimate state as picking), robot_id={}, caller={:?}",
                    robot.id, robot.caller
                );
                RobotState::Picking
            }
        }
    } else if order.via.contains(&leg.to) {
        RobotState::Picking
    } else {
        RobotState::Moving
    }
}
