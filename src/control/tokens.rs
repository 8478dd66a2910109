//! Distributed mutex coordination over token entities.
//!
//! One token guards one contended region. The store is the source of
//! truth: every decision rereads the token entity inside the per-token
//! critical section, and every transition writes the full token state
//! back. The in-process mirror only adds `prev_owner_id`, which feeds the
//! UI payloads.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::Config;
use crate::error::ControlError;
use crate::world_model::{attr_value, EntityStore, PayloadBuilder};

/// Owner fields captured right after a token transition, for UI publishes.
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    pub token_id: String,
    pub lock_owner_id: String,
    pub prev_owner_id: String,
}

#[derive(Debug, Default)]
struct TokenMirror {
    is_locked: bool,
    lock_owner_id: String,
    prev_owner_id: String,
    waitings: Vec<String>,
}

impl TokenMirror {
    fn snapshot(&self, token_id: &str) -> TokenSnapshot {
        TokenSnapshot {
            token_id: token_id.to_string(),
            lock_owner_id: self.lock_owner_id.clone(),
            prev_owner_id: self.prev_owner_id.clone(),
        }
    }
}

pub struct TokenCoordinator {
    store: Arc<dyn EntityStore>,
    payloads: PayloadBuilder,
    config: Arc<Config>,
    tokens: Mutex<HashMap<String, Arc<Mutex<TokenMirror>>>>,
}

impl TokenCoordinator {
    pub fn new(store: Arc<dyn EntityStore>, payloads: PayloadBuilder, config: Arc<Config>) -> Self {
        Self {
            store,
            payloads,
            config,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Try to take the token. Returns whether the lock was granted; when
    /// it was not, the robot has been enqueued as a waiter (idempotently).
    pub async fn acquire(
        &self,
        token_id: &str,
        robot_id: &str,
    ) -> Result<(bool, TokenSnapshot), ControlError> {
        let slot = self.slot(token_id).await;
        let mut mirror = slot.lock().await;
        self.refresh(token_id, &mut mirror).await?;

        if mirror.is_locked {
            if !mirror.waitings.iter().any(|w| w == robot_id) {
                mirror.waitings.push(robot_id.to_string());
                self.write(token_id, &mirror).await?;
                info!("wait token ({token_id}) by {robot_id}");
            }
            return Ok((false, mirror.snapshot(token_id)));
        }

        mirror.prev_owner_id = std::mem::take(&mut mirror.lock_owner_id);
        mirror.lock_owner_id = robot_id.to_string();
        mirror.is_locked = true;
        mirror.waitings.clear();
        self.write(token_id, &mirror).await?;
        info!("lock token ({token_id}) by {robot_id}");
        Ok((true, mirror.snapshot(token_id)))
    }

    /// Give the token up. Ownership transfers to the head waiter when one
    /// exists; the new owner's id is returned so the caller can resume it.
    pub async fn release(
        &self,
        token_id: &str,
        robot_id: &str,
    ) -> Result<(Option<String>, TokenSnapshot), ControlError> {
        let slot = self.slot(token_id).await;
        let mut mirror = slot.lock().await;
        self.refresh(token_id, &mut mirror).await?;

        if mirror.waitings.is_empty() {
            mirror.prev_owner_id = std::mem::take(&mut mirror.lock_owner_id);
            mirror.is_locked = false;
            self.write(token_id, &mirror).await?;
            info!("release token ({token_id}) by {robot_id}");
            return Ok((None, mirror.snapshot(token_id)));
        }

        let new_owner = mirror.waitings.remove(0);
        mirror.prev_owner_id =
            std::mem::replace(&mut mirror.lock_owner_id, new_owner.clone());
        mirror.is_locked = true;
        self.write(token_id, &mirror).await?;
        info!("switch token ({token_id}) from {robot_id} to {new_owner}");
        Ok((Some(new_owner), mirror.snapshot(token_id)))
    }

    /// Lazily created per-token mutex; linearizes acquire/release.
    async fn slot(&self, token_id: &str) -> Arc<Mutex<TokenMirror>> {
        let mut tokens = self.tokens.lock().await;
        tokens.entry(token_id.to_string()).or_default().clone()
    }

    /// Overwrite the mirror's store-owned fields from the token entity.
    async fn refresh(
        &self,
        token_id: &str,
        mirror: &mut TokenMirror,
    ) -> Result<(), ControlError> {
        let entity = self
            .store
            .get_entity(
                &self.config.fiware_service,
                &self.config.token_servicepath,
                &self.config.token_type,
                token_id,
            )
            .await?;

        mirror.is_locked = attr_value(&entity, "is_locked")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        mirror.lock_owner_id = attr_value(&entity, "lock_owner_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        mirror.waitings = attr_value(&entity, "waitings")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(())
    }

    async fn write(&self, token_id: &str, mirror: &TokenMirror) -> Result<(), ControlError> {
        let payload =
            self.payloads
                .token_info(mirror.is_locked, &mirror.lock_owner_id, &mirror.waitings);
        self.store
            .send_command(
                &self.config.fiware_service,
                &self.config.token_servicepath,
                &self.config.token_type,
                token_id,
                payload,
            )
            .await
    }
}
