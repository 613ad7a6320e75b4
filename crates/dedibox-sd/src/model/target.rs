//! Prometheus `http_sd_configs` target record.

use std::collections::BTreeMap;

use serde::Serialize;

/// One scrape endpoint plus its labels, serialized as
/// `{"targets": ["<ip>:<port>"], "labels": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub targets: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}
