//! Per-server detail record decoded from the provider API.

use serde_json::Value as JsonValue;

use crate::error::SdError;

/// Decoded `/server/<id>` document, reduced to what the synthesizer consumes.
#[derive(Debug, Clone)]
pub struct ServerDetail {
    /// `network.ip` in provider order; the first entry is the primary address.
    pub addresses: Vec<String>,
    /// Flat `tags` list; non-string entries are ignored.
    pub tags: Vec<String>,
    /// The whole document, walked by the deep-flatten label policy.
    pub metadata: JsonValue,
}

impl ServerDetail {
    /// Validate and split a decoded detail document.
    ///
    /// Fails when `network.ip` is absent, not an array, empty, or does not
    /// start with a string entry.
    pub fn from_json(id: &str, doc: JsonValue) -> Result<Self, SdError> {
        let ips = match doc.pointer("/network/ip") {
            None | Some(JsonValue::Null) => {
                return Err(SdError::malformed(id, "missing network.ip"));
            }
            Some(JsonValue::Array(items)) => items,
            Some(_) => return Err(SdError::malformed(id, "network.ip is not an array")),
        };
        match ips.first() {
            None => return Err(SdError::malformed(id, "network.ip is empty")),
            Some(JsonValue::String(_)) => {}
            Some(other) => {
                return Err(SdError::malformed(
                    id,
                    format!("network.ip[0] is not a string: {other}"),
                ));
            }
        }
        let addresses = ips
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let tags = doc
            .get("tags")
            .and_then(|t| t.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            addresses,
            tags,
            metadata: doc,
        })
    }
}
