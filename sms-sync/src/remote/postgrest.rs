//! PostgREST client for the hosted table store
//!
//! Speaks the REST dialect exposed at `{base}/rest/v1/{table}`: `select=*`,
//! `order=column.desc`, `column=eq.value` filters and
//! `Prefer: resolution=merge-duplicates` upserts.

use super::{RemoteError, RemoteStore};
use crate::sync::collections::OrderBy;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("sms-sync/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Whole-request limit; a stalled response fails the fetch cycle instead of
/// holding it open
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Error body returned by PostgREST
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Remote store backed by a hosted PostgREST endpoint
pub struct PostgrestRemoteStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostgrestRemoteStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        Self::with_timeout(base_url, api_key, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        table_url(&self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Api(status.as_u16(), error_message(&body)))
    }

    async fn delete_filtered(&self, table: &str, column: &str, filter: String) -> Result<(), RemoteError> {
        debug!(table = %table, column = %column, filter = %filter, "Deleting remote rows");
        let request = self
            .request(reqwest::Method::DELETE, table)
            .query(&[(column, filter.as_str())]);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for PostgrestRemoteStore {
    async fn select_all(&self, table: &str, order: Option<OrderBy>) -> Result<Vec<Value>, RemoteError> {
        let mut query = vec![("select", "*".to_string())];
        if let Some(order) = order {
            query.push(("order", order_param(order)));
        }

        debug!(table = %table, "Selecting remote rows");
        let response = self
            .send(self.request(reqwest::Method::GET, table).query(&query))
            .await?;

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }

    async fn upsert(&self, table: &str, rows: &[Value], on_conflict: &str) -> Result<(), RemoteError> {
        debug!(table = %table, rows = rows.len(), "Upserting remote rows");
        let request = self
            .request(reqwest::Method::POST, table)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_eq(&self, table: &str, column: &str, value: &str) -> Result<(), RemoteError> {
        self.delete_filtered(table, column, filter_param("eq", value)).await
    }

    async fn delete_neq(&self, table: &str, column: &str, value: &str) -> Result<(), RemoteError> {
        self.delete_filtered(table, column, filter_param("neq", value)).await
    }
}

fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url, table)
}

fn order_param(order: OrderBy) -> String {
    let direction = if order.descending { "desc" } else { "asc" };
    format!("{}.{}", order.column, direction)
}

fn filter_param(operator: &str, value: &str) -> String {
    format!("{}.{}", operator, value)
}

/// Prefer the `message` field of a JSON error body, else the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_string())
}
