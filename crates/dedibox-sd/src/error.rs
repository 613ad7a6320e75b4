//! Error taxonomy for upstream calls and startup configuration.

/// Failures surfaced by the upstream client and startup wiring.
///
/// Only a failure of the listing call reaches the HTTP caller (as a 502);
/// per-server failures are logged and the server is omitted.
#[derive(Debug, thiserror::Error)]
pub enum SdError {
    /// Required credential missing or unusable setting. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure or non-200 status from the provider API.
    #[error("API {path}: {reason}")]
    Upstream { path: String, reason: String },

    /// Response body is not JSON of the expected shape.
    #[error("API {path}: unexpected response body: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Decodable detail document without a usable `network.ip` list.
    #[error("server {id}: {reason}")]
    MalformedDetail { id: String, reason: String },
}

impl SdError {
    pub fn upstream(path: &str, reason: impl ToString) -> Self {
        SdError::Upstream {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(id: &str, reason: impl ToString) -> Self {
        SdError::MalformedDetail {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}
