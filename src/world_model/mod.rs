//! World-model access: the entity-store seam, the HTTP client behind it,
//! and the attribute payload builders.
//!
//! The control plane treats the world model as a REST entity store indexed
//! by `(service, service-path, type, id)`. All access goes through the
//! [`EntityStore`] trait so the orchestration logic can be exercised
//! against an in-memory store in tests.

mod client;
pub mod payload;

pub use client::WorldModelClient;
pub use payload::PayloadBuilder;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ControlError;

/// Typed operations against the external entity store.
///
/// Implementations never retry; retry policy belongs to callers.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one entity's attribute map by id. Upstream 404 maps to
    /// [`ControlError::NotFound`] with the body as root cause.
    async fn get_entity(
        &self,
        service: &str,
        service_path: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Value, ControlError>;

    /// Fetch the single entity matching an equality-predicate query
    /// (`attr==value`, `;`-joined). Zero or multiple matches fail.
    async fn query_entity(
        &self,
        service: &str,
        service_path: &str,
        entity_type: &str,
        query: &str,
    ) -> Result<Value, ControlError>;

    /// Bulk-list entities of one type (single page, store list limit).
    async fn get_entities(
        &self,
        service: &str,
        service_path: &str,
        entity_type: &str,
    ) -> Result<Vec<Value>, ControlError>;

    /// Patch entity attributes with a builder payload.
    async fn send_command(
        &self,
        service: &str,
        service_path: &str,
        entity_type: &str,
        entity_id: &str,
        payload: Value,
    ) -> Result<(), ControlError>;
}

/// Unwrap the `value` of one attribute of an entity attribute map.
pub fn attr_value<'a>(attrs: &'a Value, name: &str) -> Option<&'a Value> {
    attrs.get(name)?.get("value")
}

#[cfg(test)]
pub(crate) mod testing;
