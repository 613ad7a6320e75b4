//! Target synthesis: one server detail in, zero or one scrape target out.

use crate::labels::LabelPolicy;
use crate::model::{ServerDetail, Target};

/// Default node-exporter port appended to the primary address.
pub const DEFAULT_SCRAPE_PORT: u16 = 9100;

/// Pure transformation from a server detail to a discovery target.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    pub scrape_port: u16,
    pub policy: LabelPolicy,
    /// Rewrite label names into the Prometheus charset.
    pub sanitize_labels: bool,
}

impl Synthesizer {
    /// Build the target for `server_id`, or `None` when the server has no address.
    pub fn synthesize(&self, server_id: &str, detail: &ServerDetail) -> Option<Target> {
        let Some(primary) = detail.addresses.first() else {
            tracing::warn!(server_id = %server_id, "server has no address; skipping");
            return None;
        };

        let mut labels = self.policy.labels_for(detail, self.sanitize_labels);
        labels.insert("server_id".to_string(), server_id.to_string());

        Some(Target {
            targets: vec![endpoint(primary, self.scrape_port)],
            labels,
        })
    }
}

/// `host:port`, bracketing bare IPv6 literals.
fn endpoint(address: &str, port: u16) -> String {
    if address.contains(':') && !address.starts_with('[') {
        format!("[{address}]:{port}")
    } else {
        format!("{address}:{port}")
    }
}
