// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Minimal Elasticsearch REST client: ping, document indexing and index removal.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

use crate::dispatch::BatchWriter;
use crate::elasticsearch::AppConfig;
use crate::error::{DispatchError, StartupError};
use crate::http::{build_endpoint, Endpoint, DEFAULT_TIMEOUT};

const NDJSON: &str = "application/x-ndjson";
const JSON: &str = "application/json";

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
struct BasicAuth {
    user: String,
    password: String,
}

#[derive(Debug, Clone)]
pub struct ElasticClient {
    endpoint: Endpoint,
    auth: Option<BasicAuth>,
}

impl ElasticClient {
    /// Builds the client and pings the host. Either failure is fatal to the adapter.
    pub async fn connect(config: &AppConfig) -> Result<Self, StartupError> {
        let endpoint = build_endpoint(&config.host_url, &config.tls, DEFAULT_TIMEOUT).await?;
        let auth = config.use_basic_auth.then(|| BasicAuth {
            user: config.user.clone(),
            password: config.password.clone(),
        });
        let client = ElasticClient { endpoint, auth };

        client
            .ping()
            .await
            .map_err(|e| StartupError::Connection {
                endpoint: config.host_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(client)
    }

    pub async fn ping(&self) -> Result<(), DispatchError> {
        let response = self.request(Method::GET, &[])?.send().await?;
        check_status(response).await.map(|_| ())
    }

    /// Writes `records` (serialized JSON documents) into `index`.
    ///
    /// In bulk mode all records go out in a single `_bulk` request and any per-item failure
    /// fails the whole call. Otherwise each record is its own request, stopping at the first
    /// failure.
    pub async fn index(
        &self,
        index: &str,
        records: &[String],
        bulk: bool,
    ) -> Result<(), DispatchError> {
        if bulk {
            return self.bulk_index(index, records).await;
        }

        for record in records {
            let response = self
                .request(Method::POST, &[index, "_doc"])?
                .header(reqwest::header::CONTENT_TYPE, JSON)
                .body(record.clone())
                .send()
                .await?;
            check_status(response).await?;
        }
        Ok(())
    }

    async fn bulk_index(&self, index: &str, records: &[String]) -> Result<(), DispatchError> {
        let response = self
            .request(Method::POST, &["_bulk"])?
            .header(reqwest::header::CONTENT_TYPE, NDJSON)
            .body(bulk_body(index, records))
            .send()
            .await?;
        let body = check_status(response).await?;

        let parsed: BulkResponse = serde_json::from_str(&body)
            .map_err(|e| DispatchError::Other(format!("unreadable bulk response: {e}")))?;
        if parsed.errors {
            let failed = parsed
                .items
                .iter()
                .filter(|item| item.values().any(|result| result.get("error").is_some()))
                .count();
            return Err(DispatchError::Rejected {
                failed,
                total: records.len(),
            });
        }
        Ok(())
    }

    /// Removes every index matching `patterns`. Patterns matching nothing are not an error.
    pub async fn delete_indices(&self, patterns: &[String]) -> Result<(), DispatchError> {
        if patterns.is_empty() {
            return Ok(());
        }
        let joined = patterns.join(",");
        let response = self
            .request(Method::DELETE, &[joined.as_str()])?
            .query(&[("ignore_unavailable", "true")])
            .send()
            .await?;
        check_status(response).await?;
        debug!(indices = ?patterns, "deleted indices");
        Ok(())
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, DispatchError> {
        let url = self.endpoint.url(segments)?;
        let builder = self.endpoint.client.request(method, url);
        Ok(match &self.auth {
            Some(auth) => builder.basic_auth(&auth.user, Some(&auth.password)),
            None => builder,
        })
    }
}

#[async_trait]
impl BatchWriter for ElasticClient {
    async fn write(
        &self,
        destination_key: &str,
        records: &[String],
        bulk: bool,
    ) -> Result<(), DispatchError> {
        self.index(destination_key, records, bulk).await
    }
}

fn bulk_body(index: &str, records: &[String]) -> String {
    let action = serde_json::json!({ "index": { "_index": index } }).to_string();
    let mut body = String::with_capacity(records.iter().map(|r| r.len() + action.len() + 2).sum());
    for record in records {
        body.push_str(&action);
        body.push('\n');
        body.push_str(record);
        body.push('\n');
    }
    body
}

async fn check_status(response: Response) -> Result<String, DispatchError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(DispatchError::Status { status, body })
    }
}
