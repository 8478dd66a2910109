//! Per-robot notification throttle records.
//!
//! One record per robot holds the timestamp of the last notification that
//! passed the gate, as big-endian epoch milliseconds. Advancement is a
//! compare-and-swap: a notification passes only when the stored time is at
//! least one throttle interval behind it. Rejection is a signal, not a
//! failure; the pipeline turns it into an `ignored_data` entry.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    /// The record is already within one interval of the incoming time.
    #[error("ignore notification, robot_id={robot_id}, time={time}, timedelta lower than the throttling interval")]
    Rejected { robot_id: String, time: String },

    #[error("throttle storage error: {0}")]
    Storage(#[from] sled::Error),
}

pub struct ThrottleStore {
    db: sled::Db,
    interval_msec: i64,
}

impl ThrottleStore {
    /// Open (or create) the throttle database.
    pub fn open(path: &Path, interval_msec: i64) -> Result<Self, ThrottleError> {
        let db = sled::open(path)?;
        Ok(Self { db, interval_msec })
    }

    /// Seed a record for every fleet robot. Existing records are reset to
    /// the epoch so the first notification after startup always passes.
    pub fn init_fleet(&self, robot_ids: &[String]) -> Result<(), ThrottleError> {
        for robot_id in robot_ids {
            self.db
                .insert(robot_id.as_bytes(), 0i64.to_be_bytes().to_vec())?;
        }
        self.db.flush()?;
        Ok(())
    }

    fn decode(raw: Option<&sled::IVec>) -> i64 {
        raw.and_then(|v| <[u8; 8]>::try_from(v.as_ref()).ok())
            .map_or(0, i64::from_be_bytes)
    }

    /// Advance the robot's record to `time` iff the stored time is at
    /// least one interval older. Linearized by the CAS; two racing
    /// notifications cannot both pass with times inside one interval.
    pub fn advance_if_older(
        &self,
        robot_id: &str,
        time: DateTime<FixedOffset>,
    ) -> Result<(), ThrottleError> {
        let incoming = time.timestamp_millis();
        loop {
            let current_raw = self.db.get(robot_id.as_bytes())?;
            let current = Self::decode(current_raw.as_ref());

            if current > incoming - self.interval_msec {
                return Err(ThrottleError::Rejected {
                    robot_id: robot_id.to_string(),
                    time: time.to_rfc3339(),
                });
            }

            let swap = self.db.compare_and_swap(
                robot_id.as_bytes(),
                current_raw,
                Some(incoming.to_be_bytes().to_vec()),
            )?;
            match swap {
                Ok(()) => {
                    debug!(
                        "advance throttle record, robot_id={robot_id}, old={current}, new={incoming}"
                    );
                    return Ok(());
                }
                // lost a race; re-read and re-decide
                Err(_) => continue,
            }
        }
    }

    /// The stored watermark in epoch milliseconds (0 when unset).
    pub fn watermark_msec(&self, robot_id: &str) -> Result<i64, ThrottleError> {
        Ok(Self::decode(self.db.get(robot_id.as_bytes())?.as_ref()))
    }
}
