#![allow(dead_code)]

//! Shared test support: an in-memory entity store and app wiring.
//!
//! The fake store mirrors how the real one applies patches (attribute
//! merge), and can additionally script per-entity snapshot sequences so
//! command-protocol flows can change what successive reads observe.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono_tz::Tz;
use serde_json::{json, Value};

use fleet_control::{create_app, Config, ControlError, EntityStore, RobotOrchestrator, ThrottleStore};

#[derive(Debug, Clone)]
pub struct PatchRecord {
    pub service_path: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
}

type Key = (String, String);

#[derive(Default)]
pub struct FakeStore {
    entities: Mutex<HashMap<Key, Value>>,
    sequences: Mutex<HashMap<Key, VecDeque<Value>>>,
    queries: Mutex<HashMap<(String, String), Vec<Value>>>,
    lists: Mutex<HashMap<String, Vec<Value>>>,
    patches: Mutex<Vec<PatchRecord>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entity(&self, entity_type: &str, entity_id: &str, attrs: Value) {
        self.entities
            .lock()
            .unwrap()
            .insert((entity_type.to_string(), entity_id.to_string()), attrs);
    }

    /// Queue snapshots returned by successive reads; the final snapshot
    /// keeps being returned once the queue drains to one element.
    pub fn push_entity(&self, entity_type: &str, entity_id: &str, attrs: Value) {
        self.sequences
            .lock()
            .unwrap()
            .entry((entity_type.to_string(), entity_id.to_string()))
            .or_default()
            .push_back(attrs);
    }

    pub fn set_query_result(&self, entity_type: &str, query: &str, entities: Vec<Value>) {
        self.queries
            .lock()
            .unwrap()
            .insert((entity_type.to_string(), query.to_string()), entities);
    }

    pub fn set_list(&self, entity_type: &str, entities: Vec<Value>) {
        self.lists
            .lock()
            .unwrap()
            .insert(entity_type.to_string(), entities);
    }

    pub fn patches(&self) -> Vec<PatchRecord> {
        self.patches.lock().unwrap().clone()
    }

    pub fn patches_for(&self, entity_id: &str) -> Vec<PatchRecord> {
        self.patches()
            .into_iter()
            .filter(|p| p.entity_id == entity_id)
            .collect()
    }

    pub fn entity(&self, entity_type: &str, entity_id: &str) -> Option<Value> {
        self.entities
            .lock()
            .unwrap()
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl EntityStore for FakeStore {
    async fn get_entity(
        &self,
        _service: &str,
        _service_path: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Value, ControlError> {
        let key = (entity_type.to_string(), entity_id.to_string());

        if let Some(queue) = self.sequences.lock().unwrap().get_mut(&key) {
            if queue.len() > 1 {
                if let Some(front) = queue.pop_front() {
                    return Ok(front);
                }
            }
            if let Some(front) = queue.front() {
                return Ok(front.clone());
            }
        }

        self.entities
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| {
                ControlError::not_found(
                    "can not get an entity from world model",
                    format!("unknown entity, type={entity_type}, id={entity_id}"),
                )
            })
    }

    async fn query_entity(
        &self,
        _service: &str,
        _service_path: &str,
        entity_type: &str,
        query: &str,
    ) -> Result<Value, ControlError> {
        let results = self
            .queries
            .lock()
            .unwrap()
            .get(&(entity_type.to_string(), query.to_string()))
            .cloned()
            .unwrap_or_default();
        if results.len() != 1 {
            return Err(ControlError::upstream(
                format!("can not retrieve an entity, entity_type={entity_type}, query={query}"),
                format!("matched {} entities", results.len()),
            ));
        }
        Ok(results[0].clone())
    }

    async fn get_entities(
        &self,
        _service: &str,
        _service_path: &str,
        entity_type: &str,
    ) -> Result<Vec<Value>, ControlError> {
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(entity_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_command(
        &self,
        _service: &str,
        service_path: &str,
        entity_type: &str,
        entity_id: &str,
        payload: Value,
    ) -> Result<(), ControlError> {
        self.patches.lock().unwrap().push(PatchRecord {
            service_path: service_path.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            payload: payload.clone(),
        });

        if let Some(attrs) = payload.as_object() {
            let mut entities = self.entities.lock().unwrap();
            let entry = entities
                .entry((entity_type.to_string(), entity_id.to_string()))
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Some(target) = entry.as_object_mut() {
                for (name, value) in attrs {
                    target.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

/// A fixed two-robot config with fast poll settings.
pub fn test_config() -> Config {
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
        throttle_db_path: std::path::PathBuf::from("unused"),
    }
}

/// Everything a scenario needs: the router, the store to seed/inspect,
/// and the tempdir keeping the throttle db alive.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<FakeStore>,
    _throttle_dir: tempfile::TempDir,
}

pub fn build_app() -> TestApp {
    build_app_with_config(test_config())
}

pub fn build_app_with_config(config: Config) -> TestApp {
    let store = Arc::new(FakeStore::new());
    let throttle_dir = tempfile::tempdir().unwrap();
    let throttle =
        ThrottleStore::open(throttle_dir.path(), config.notification_throttling_msec).unwrap();
    throttle.init_fleet(&config.robot_list).unwrap();

    let orchestrator = Arc::new(RobotOrchestrator::new(
        Arc::new(config),
        store.clone(),
        throttle,
    ));
    TestApp {
        app: create_app(orchestrator),
        store,
        _throttle_dir: throttle_dir,
    }
}

// ---------------------------------------------------------------------------
// Entity builders
// ---------------------------------------------------------------------------

/// An idle robot that acknowledges commands immediately.
pub fn idle_robot() -> Value {
    json!({
        "mode": {"value": "standby"},
        "remaining_waypoints_list": {"value": []},
        "send_cmd_status": {"value": "OK"},
        "send_cmd_info": {"value": {"result": "ack"}},
    })
}

pub fn navigating_robot() -> Value {
    json!({
        "mode": {"value": "navi"},
        "remaining_waypoints_list": {"value": []},
    })
}

pub fn place_entity(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": {"value": name},
        "pose": {"value": {"point": format!("p_{id}"), "angle": format!("a_{id}")}},
    })
}

/// Seed the place names and bulk listing used by the standard scenario
/// plan (source B, vias C/D, terminal E, destination dest, shipment via A).
pub fn seed_places(store: &FakeStore) {
    let places = [
        ("A_id", "place_A"),
        ("B_id", "place_B"),
        ("C_id", "place_C"),
        ("D_id", "place_D"),
        ("E_id", "place_E"),
        ("dest_id", "place_dest"),
    ];
    for (id, name) in places {
        store.set_query_result(
            "place",
            &format!("name=={name}"),
            vec![place_entity(id, name)],
        );
        store.set_entity("place", id, place_entity(id, name));
    }
    store.set_list(
        "place",
        places.iter().map(|(id, name)| place_entity(id, name)).collect(),
    );
}

/// One-route plan for `destination==dest_id;via==A_id;robot_id==<robot>`.
pub fn seed_plan(store: &FakeStore, robot_id: &str) {
    store.set_query_result(
        "route_plan",
        &format!("destination==dest_id;via==A_id;robot_id=={robot_id}"),
        vec![json!({
            "id": "plan_01",
            "source": {"value": "B_id"},
            "routes": {"value": [{
                "from": "B_id",
                "via": ["C_id", "D_id"],
                "to": "E_id",
                "destination": "dest_id",
                "action": "action_0",
            }]},
        })],
    );
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (axum::http::StatusCode, Value) {
    use tower::ServiceExt;

    let builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => builder
            .body(axum::body::Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// The `cmd` values of every send_cmd patch applied to one entity.
pub fn commands_for(store: &FakeStore, entity_id: &str) -> Vec<String> {
    store
        .patches_for(entity_id)
        .iter()
        .filter_map(|p| {
            p.payload
                .pointer("/send_cmd/value/cmd")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect()
}
