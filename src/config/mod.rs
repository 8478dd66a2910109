//! Environment-driven configuration.
//!
//! Everything the control plane needs arrives through environment
//! variables, mirroring the deployment manifests: the fleet roster and
//! UI id table are JSON, tenancy names are plain strings, intervals are
//! integers. `Config::from_env()` is called once at startup; a missing
//! mandatory variable is a fatal startup error.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;

/// Separator joining sorted via place ids into a route-plan lookup key.
pub const VIA_SEPARATOR: &str = "|";

/// Page limit for bulk entity listings against the world model.
pub const ORION_LIST_NUM_LIMIT: usize = 1000;

/// Control-plane configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub listen_port: u16,
    /// Time zone used for every TimeInstant stamp.
    pub timezone: Tz,
    /// World-model (Orion) endpoint, e.g. "http://orion:1026".
    pub orion_endpoint: String,
    /// Optional bearer token for the world model.
    pub orion_token: Option<String>,
    /// Tenancy service name sent with every store call.
    pub fiware_service: String,
    /// Service path of delivery-robot and place entities.
    pub robot_servicepath: String,
    /// Entity type of delivery robots.
    pub robot_type: String,
    /// Entity type of places.
    pub place_type: String,
    /// Entity type of route plans.
    pub route_plan_type: String,
    /// Fleet roster. Declaration order is the availability tie-break.
    pub robot_list: Vec<String>,
    /// Service path of robot-ui entities.
    pub robot_ui_servicepath: String,
    /// Entity type of robot-ui entities.
    pub robot_ui_type: String,
    /// robot_id -> ui_id.
    pub id_table: HashMap<String, String>,
    /// ui_id -> robot_id, derived from `id_table`.
    pub reverse_id_table: HashMap<String, String>,
    /// Service path of token entities.
    pub token_servicepath: String,
    /// Entity type of token entities.
    pub token_type: String,
    /// Allowed CORS origins; CORS is disabled when unset.
    pub cors_origins: Option<String>,
    /// Ack-poll interval in milliseconds.
    pub movenext_wait_msec: u64,
    /// Ack-poll attempt cap.
    pub movenext_wait_max_num: u32,
    /// Notification throttle window in milliseconds.
    pub notification_throttling_msec: i64,
    /// Caller tags treated as "ordering" shipments.
    pub ordering_list: Vec<String>,
    /// Directory of the sled database holding throttle records.
    pub throttle_db_path: PathBuf,
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} environment variable is not set"))
}

fn optional_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(v) => Ok(v),
            Err(_) => bail!("can not parse {name}, value={raw}"),
        },
        Err(_) => Ok(default),
    }
}

fn json_string_list(name: &str, raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("{name} must be a JSON array of strings"))
}

impl Config {
    /// Load the configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let robot_list = json_string_list("DELIVERY_ROBOT_LIST", &required("DELIVERY_ROBOT_LIST")?)?;
        if robot_list.is_empty() {
            bail!("DELIVERY_ROBOT_LIST must name at least one robot");
        }

        let id_table: HashMap<String, String> = serde_json::from_str(&required("ID_TABLE")?)
            .context("ID_TABLE must be a JSON object mapping robot ids to ui ids")?;
        let reverse_id_table = id_table
            .iter()
            .map(|(robot, ui)| (ui.clone(), robot.clone()))
            .collect();

        let timezone: Tz = match std::env::var("TIMEZONE") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown TIMEZONE, value={raw}"))?,
            Err(_) => Tz::UTC,
        };

        let ordering_list = match std::env::var("ORDERING_LIST") {
            Ok(raw) => json_string_list("ORDERING_LIST", &raw)?,
            Err(_) => vec!["zaico-extensions".to_string()],
        };

        Ok(Self {
            listen_port: optional_parsed("LISTEN_PORT", 3000)?,
            timezone,
            orion_endpoint: required("ORION_ENDPOINT")?,
            orion_token: std::env::var("ORION_TOKEN").ok(),
            fiware_service: required("FIWARE_SERVICE")?,
            robot_servicepath: required("DELIVERY_ROBOT_SERVICEPATH")?,
            robot_type: required("DELIVERY_ROBOT_TYPE")?,
            place_type: std::env::var("PLACE_TYPE").unwrap_or_else(|_| "place".to_string()),
            route_plan_type: std::env::var("ROUTE_PLAN_TYPE")
                .unwrap_or_else(|_| "route_plan".to_string()),
            robot_list,
            robot_ui_servicepath: required("ROBOT_UI_SERVICEPATH")?,
            robot_ui_type: required("ROBOT_UI_TYPE")?,
            id_table,
            reverse_id_table,
            token_servicepath: required("TOKEN_SERVICEPATH")?,
            token_type: required("TOKEN_TYPE")?,
            cors_origins: std::env::var("CORS_ORIGINS").ok(),
            movenext_wait_msec: optional_parsed("MOVENEXT_WAIT_MSEC", 200)?,
            movenext_wait_max_num: optional_parsed("MOVENEXT_WAIT_MAX_NUM", 25)?,
            notification_throttling_msec: optional_parsed("NOTIFICATION_THROTTLING_MSEC", 500)?,
            ordering_list,
            throttle_db_path: std::env::var("THROTTLE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/throttle")),
        })
    }

    /// The UI entity paired with a robot.
    pub fn ui_id(&self, robot_id: &str) -> Option<&str> {
        self.id_table.get(robot_id).map(String::as_str)
    }
}

#[cfg(test)]
impl Config {
    /// A fixed two-robot config for unit tests; never touches the
    /// environment. Poll settings are tightened so protocol tests run in
    /// milliseconds.
    pub(crate) fn for_tests() -> Self {
        let id_table: HashMap<String, String> = [
            ("robot_01".to_string(), "ui_01".to_string()),
            ("robot_02".to_string(), "ui_02".to_string()),
        ]
        .into_iter()
        .collect();
        let reverse_id_table = id_table
            .iter()
            .map(|(r, u)| (u.clone(), r.clone()))
            .collect();
        Config {
            listen_port: 3000,
            timezone: Tz::UTC,
            orion_endpoint: "http://orion:1026".to_string(),
            orion_token: None,
            fiware_service: "delivery".to_string(),
            robot_servicepath: "/robot".to_string(),
            robot_type: "delivery_robot".to_string(),
            place_type: "place".to_string(),
            route_plan_type: "route_plan".to_string(),
            robot_list: vec!["robot_01".to_string(), "robot_02".to_string()],
            robot_ui_servicepath: "/ui".to_string(),
            robot_ui_type: "robot_ui".to_string(),
            id_table,
            reverse_id_table,
            token_servicepath: "/token".to_string(),
            token_type: "token".to_string(),
            cors_origins: None,
            movenext_wait_msec: 1,
            movenext_wait_max_num: 3,
            notification_throttling_msec: 500,
            ordering_list: vec!["zaico-extensions".to_string()],
            throttle_db_path: PathBuf::from("./data/throttle"),
        }
    }
}
