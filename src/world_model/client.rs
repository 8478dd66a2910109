//! HTTP client for the world-model entity store.
//!
//! Every call carries the tenancy headers (`FIWARE-SERVICE`,
//! `FIWARE-SERVICEPATH`) and, when configured, a bearer token. Errors are
//! classified at this boundary: 404 stays NotFound, any other non-2xx or
//! unparsable body becomes an upstream failure with the response text as
//! root cause.

use async_trait::async_trait;
use serde_json::Value;

use super::EntityStore;
use crate::config::ORION_LIST_NUM_LIMIT;
use crate::error::ControlError;

#[derive(Clone)]
pub struct WorldModelClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl WorldModelClient {
    pub fn new(endpoint: &str, token: Option<&str>) -> Result<Self, ControlError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ControlError::internal(format!("can not build http client, {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        })
    }

    fn apply_headers(
        &self,
        req: reqwest::RequestBuilder,
        service: &str,
        service_path: &str,
    ) -> reqwest::RequestBuilder {
        let req = req
            .header("FIWARE-SERVICE", service)
            .header("FIWARE-SERVICEPATH", service_path);
        match &self.token {
            Some(token) => req.header("Authorization", format!("bearer {token}")),
            None => req,
        }
    }

    async fn check_status(
        message: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, ControlError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let root_cause = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(ControlError::not_found(message, root_cause))
        } else {
            Err(ControlError::upstream(message, root_cause))
        }
    }

    fn transport(message: &str, err: reqwest::Error) -> ControlError {
        ControlError::upstream(message, err.to_string())
    }
}

#[async_trait]
impl EntityStore for WorldModelClient {
    async fn get_entity(
        &self,
        service: &str,
        service_path: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Value, ControlError> {
        const MSG: &str = "can not get an entity from world model";

        let url = format!("{}/v2/entities/{}", self.endpoint, entity_id);
        let req = self
            .apply_headers(self.http.get(url), service, service_path)
            .query(&[("type", entity_type)]);

        let resp = req.send().await.map_err(|e| Self::transport(MSG, e))?;
        let resp = Self::check_status(MSG, resp).await?;
        resp.json::<Value>()
            .await
            .map_err(|e| ControlError::upstream("can not parse result", e.to_string()))
    }

    async fn query_entity(
        &self,
        service: &str,
        service_path: &str,
        entity_type: &str,
        query: &str,
    ) -> Result<Value, ControlError> {
        const MSG: &str = "can not get entities from world model";

        let url = format!("{}/v2/entities/", self.endpoint);
        let limit = ORION_LIST_NUM_LIMIT.to_string();
        let req = self
            .apply_headers(self.http.get(url), service, service_path)
            .query(&[
                ("type", entity_type),
                ("limit", limit.as_str()),
                ("q", query),
            ]);

        let resp = req.send().await.map_err(|e| Self::transport(MSG, e))?;
        let resp = Self::check_status(MSG, resp).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ControlError::upstream("can not parse result", e.to_string()))?;

        let entities = body.as_array().ok_or_else(|| {
            ControlError::upstream(
                format!("can not retrieve an entity, entity_type={entity_type}, query={query}"),
                body.to_string(),
            )
        })?;
        if entities.len() != 1 {
            return Err(ControlError::upstream(
                format!("can not retrieve an entity, entity_type={entity_type}, query={query}"),
                format!("matched {} entities", entities.len()),
            ));
        }
        Ok(entities[0].clone())
    }

    async fn get_entities(
        &self,
        service: &str,
        service_path: &str,
        entity_type: &str,
    ) -> Result<Vec<Value>, ControlError> {
        const MSG: &str = "can not get entities from world model";

        let url = format!("{}/v2/entities/", self.endpoint);
        let limit = ORION_LIST_NUM_LIMIT.to_string();
        let req = self
            .apply_headers(self.http.get(url), service, service_path)
            .query(&[("type", entity_type), ("limit", limit.as_str())]);

        let resp = req.send().await.map_err(|e| Self::transport(MSG, e))?;
        let resp = Self::check_status(MSG, resp).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ControlError::upstream("can not parse result", e.to_string()))?;

        body.as_array().cloned().ok_or_else(|| {
            ControlError::upstream(
                format!("can not list entities, entity_type={entity_type}"),
                body.to_string(),
            )
        })
    }

    async fn send_command(
        &self,
        service: &str,
        service_path: &str,
        entity_type: &str,
        entity_id: &str,
        payload: Value,
    ) -> Result<(), ControlError> {
        const MSG: &str = "can not send a command to world model";

        let url = format!("{}/v2/entities/{}/attrs", self.endpoint, entity_id);
        let req = self
            .apply_headers(self.http.patch(url), service, service_path)
            .query(&[("type", entity_type)])
            .json(&payload);

        let resp = req.send().await.map_err(|e| Self::transport(MSG, e))?;
        Self::check_status(MSG, resp).await?;
        Ok(())
    }
}
