//! In-memory entity store for unit tests.
//!
//! Patches merge into the stored attribute map (the way the real store
//! applies them), so multi-step flows like token hand-offs observe their
//! own writes. For command-protocol tests a per-entity snapshot queue can
//! script what successive reads return, independent of patches.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::EntityStore;
use crate::error::ControlError;

#[derive(Debug, Clone)]
pub(crate) struct PatchRecord {
    pub service_path: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
}

type Key = (String, String);

#[derive(Default)]
pub(crate) struct ScriptedStore {
    entities: Mutex<HashMap<Key, Value>>,
    sequences: Mutex<HashMap<Key, VecDeque<Value>>>,
    queries: Mutex<HashMap<(String, String), Vec<Value>>>,
    lists: Mutex<HashMap<String, Vec<Value>>>,
    patches: Mutex<Vec<PatchRecord>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entity(&self, entity_type: &str, entity_id: &str, attrs: Value) {
        self.entities
            .lock()
            .unwrap()
            .insert((entity_type.to_string(), entity_id.to_string()), attrs);
    }

    /// Queue a snapshot; reads pop queued snapshots in order and keep
    /// returning the last one once the queue drains to a single element.
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
impl EntityStore for ScriptedStore {
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

        // Merge patched attributes into the stored entity so later reads
        // observe the write, like the real store.
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
