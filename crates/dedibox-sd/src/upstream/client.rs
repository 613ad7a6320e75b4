//! HTTP client for the Online/Dedibox REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::ServerApi;
use crate::error::SdError;
use crate::model::ServerDetail;

pub const DEFAULT_API_BASE: &str = "https://api.online.net/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Construction parameters for [`UpstreamClient`].
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Base URL including the API version path, e.g. `https://api.online.net/api/v1`.
    pub api_base: String,
    pub token: String,
    /// Per-call timeout covering connect, headers and body.
    pub timeout: Duration,
}

/// Authenticated client. Built once at startup and shared read-only.
pub struct UpstreamClient {
    http: reqwest::Client,
    base: reqwest::Url,
    token: String,
    /// Listing entries look like `<base path>/server/<id>`.
    listing_prefix: String,
}

impl UpstreamClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, SdError> {
        let token = settings.token.trim();
        if token.is_empty() {
            return Err(SdError::Config("ONLINE_API_TOKEN not set".to_string()));
        }
        let raw = settings.api_base.trim_end_matches('/');
        let base = reqwest::Url::parse(raw)
            .map_err(|e| SdError::Config(format!("invalid API base '{raw}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SdError::Config(format!(
                "invalid API base '{raw}': not a hierarchical URL"
            )));
        }
        let listing_prefix = format!("{}/server/", base.path().trim_end_matches('/'));

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SdError::Config(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(
            base = %base,
            listing_prefix = %listing_prefix,
            timeout_ms = settings.timeout.as_millis() as u64,
            "upstream client ready"
        );
        Ok(Self {
            http,
            base,
            token: token.to_string(),
            listing_prefix,
        })
    }

    /// `<base>/<segments..>`, each segment percent-encoded as a single path
    /// component.
    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET `url` and decode a 200 response body as `T`. `path` names the call
    /// in errors.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: reqwest::Url,
        path: &str,
    ) -> Result<T, SdError> {
        tracing::debug!(url = %url, "upstream GET");
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("X-Pretty-JSON", "1")
            .send()
            .await
            .map_err(|e| SdError::upstream(path, e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(SdError::upstream(path, status));
        }
        let body = resp.bytes().await.map_err(|e| SdError::upstream(path, e))?;
        serde_json::from_slice(&body).map_err(|source| SdError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ServerApi for UpstreamClient {
    async fn list_servers(&self) -> Result<Vec<String>, SdError> {
        let paths: Vec<String> = self.get_json(self.endpoint(&["server"]), "/server").await?;
        let mut ids = Vec::with_capacity(paths.len());
        for p in &paths {
            let id = server_id_from_path(p, &self.listing_prefix);
            if id.is_empty() {
                tracing::warn!(entry = %p, "listing entry has no server id, skipping");
                continue;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    async fn server_detail(&self, server_id: &str) -> Result<ServerDetail, SdError> {
        let url = self.endpoint(&["server", server_id]);
        let doc: JsonValue = self.get_json(url, &detail_path(server_id)).await?;
        ServerDetail::from_json(server_id, doc)
    }
}

/// Reduce a listing entry to its identifier.
///
/// Strips `prefix` when present; otherwise keeps the trailing path segment.
pub fn server_id_from_path(path: &str, prefix: &str) -> String {
    if let Some(id) = path.strip_prefix(prefix) {
        return id.trim_end_matches('/').to_string();
    }
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
}

/// Detail path relative to the API base, as shown in errors and logs.
pub fn detail_path(server_id: &str) -> String {
    format!("/server/{server_id}")
}
