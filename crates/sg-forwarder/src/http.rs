// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction for the output adapters.
//!
//! Clients are built once at adapter startup. TLS settings come from the adapter config:
//!
//! - **Client identity**: PEM certificate and key files, concatenated into one rustls identity
//! - **Extra root CA**: PEM file added next to the built-in roots
//! - **Server name override**: requests are addressed to the override name and that name is
//!   pinned to the resolved address of the configured host, so certificate verification runs
//!   against the override while the connection still reaches the configured host
//!
//! Any failure here is a [`StartupError`].

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_bool_from_anything;
use tracing::debug;

use crate::error::{DispatchError, StartupError};

/// Per-request timeout applied to every backing-store call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub use_tls: bool,
    pub tls_server_name: String,
    pub tls_client_cert: String,
    pub tls_client_key: String,
    pub tls_ca_cert: String,
}

/// A configured client together with the base URL requests are resolved against.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub client: reqwest::Client,
    base_url: Url,
}

impl Endpoint {
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `segments` to the base URL path, keeping any path prefix of the base.
    ///
    /// Each segment is percent-encoded on its own, so index names carrying `:`, `?`, `#` or `/`
    /// stay a single path segment.
    pub fn url(&self, segments: &[&str]) -> Result<Url, DispatchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DispatchError::Other(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }
}

/// Builds the client for `url` according to `tls`.
pub async fn build_endpoint(
    url: &str,
    tls: &TlsConfig,
    timeout: Duration,
) -> Result<Endpoint, StartupError> {
    let mut base_url = Url::parse(url).map_err(|e| StartupError::Config(format!("{url}: {e}")))?;

    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if tls.use_tls {
        if !tls.tls_client_cert.is_empty() || !tls.tls_client_key.is_empty() {
            let mut pem = read_pem(&tls.tls_client_cert)?;
            pem.extend(read_pem(&tls.tls_client_key)?);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| StartupError::Client(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        if !tls.tls_ca_cert.is_empty() {
            let certificate = reqwest::Certificate::from_pem(&read_pem(&tls.tls_ca_cert)?)
                .map_err(|e| StartupError::Client(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        if !tls.tls_server_name.is_empty() {
            builder = pin_server_name(builder, &mut base_url, &tls.tls_server_name).await?;
        }
    }

    let client = builder
        .build()
        .map_err(|e| StartupError::Client(e.to_string()))?;
    Ok(Endpoint { client, base_url })
}

async fn pin_server_name(
    builder: reqwest::ClientBuilder,
    base_url: &mut Url,
    server_name: &str,
) -> Result<reqwest::ClientBuilder, StartupError> {
    let host = base_url
        .host_str()
        .ok_or_else(|| StartupError::Config(format!("{base_url}: missing host")))?
        .to_string();
    let port = base_url.port_or_known_default().unwrap_or(443);

    let address = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| StartupError::Connection {
            endpoint: base_url.to_string(),
            reason: e.to_string(),
        })?
        .next()
        .ok_or_else(|| StartupError::Connection {
            endpoint: base_url.to_string(),
            reason: "host resolved to no address".to_string(),
        })?;

    base_url
        .set_host(Some(server_name))
        .map_err(|e| StartupError::Config(format!("invalid TLS server name {server_name}: {e}")))?;
    debug!(%host, server_name, %address, "pinned TLS server name");

    Ok(builder.resolve(server_name, address))
}

fn read_pem(path: &str) -> Result<Vec<u8>, StartupError> {
    std::fs::read(Path::new(path))
        .map_err(|e| StartupError::Client(format!("failed to read {path}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_endpoint() {
        let endpoint = build_endpoint("http://localhost:9200", &TlsConfig::default(), DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(endpoint.base_url().as_str(), "http://localhost:9200/");
        assert_eq!(
            endpoint.url(&["_bulk"]).unwrap().as_str(),
            "http://localhost:9200/_bulk"
        );
    }

    #[tokio::test]
    async fn test_url_keeps_base_path() {
        let endpoint = build_endpoint("http://proxy:8080/es", &TlsConfig::default(), DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(
            endpoint.url(&["logs-h1", "_doc"]).unwrap().as_str(),
            "http://proxy:8080/es/logs-h1/_doc"
        );
    }

    #[tokio::test]
    async fn test_url_segments_are_encoded() {
        let endpoint = build_endpoint("http://localhost:9200/", &TlsConfig::default(), DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(endpoint.url(&[]).unwrap().as_str(), "http://localhost:9200/");
        assert_eq!(
            endpoint.url(&["logs-fe80::1-2024-1-2", "_doc"]).unwrap().as_str(),
            "http://localhost:9200/logs-fe80::1-2024-1-2/_doc"
        );
        assert_eq!(
            endpoint.url(&["logs-a#b?c/d-2024-1-2", "_doc"]).unwrap().as_str(),
            "http://localhost:9200/logs-a%23b%3Fc%2Fd-2024-1-2/_doc"
        );
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_startup_error() {
        let result = build_endpoint("not a url", &TlsConfig::default(), DEFAULT_TIMEOUT).await;
        assert!(matches!(result, Err(StartupError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_client_cert_is_a_startup_error() {
        let tls = TlsConfig {
            use_tls: true,
            tls_client_cert: "/nonexistent/cert.pem".to_string(),
            tls_client_key: "/nonexistent/key.pem".to_string(),
            ..TlsConfig::default()
        };
        let result = build_endpoint("https://localhost:9200", &tls, DEFAULT_TIMEOUT).await;
        assert!(matches!(result, Err(StartupError::Client(_))));
    }

    #[tokio::test]
    async fn test_server_name_override_rewrites_host() {
        let tls = TlsConfig {
            use_tls: true,
            tls_server_name: "es.internal".to_string(),
            ..TlsConfig::default()
        };
        let endpoint = build_endpoint("https://127.0.0.1:9200", &tls, DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(endpoint.base_url().as_str(), "https://es.internal:9200/");
    }
}
