//! One discovery cycle: list servers, fetch each detail, synthesize targets.

use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::error::SdError;
use crate::model::Target;
use crate::synth::Synthesizer;
use crate::upstream::ServerApi;

/// Run a full cycle against `api`.
///
/// Only a listing failure is returned as an error. Per-server failures are
/// logged and the server is left out. At most `detail_concurrency` detail
/// calls are in flight; output follows listing order either way.
pub async fn discover(
    api: &dyn ServerApi,
    synthesizer: &Synthesizer,
    detail_concurrency: usize,
) -> Result<Vec<Target>, SdError> {
    let started = Instant::now();
    let ids = api.list_servers().await?;
    let listed = ids.len();
    tracing::debug!(listed, "server listing received");

    let targets: Vec<Target> = stream::iter(ids)
        .map(move |id| async move {
            match api.server_detail(&id).await {
                Ok(detail) => synthesizer.synthesize(&id, &detail),
                Err(e) => {
                    tracing::warn!(server_id = %id, error = %e, "skipping server");
                    None
                }
            }
        })
        .buffered(detail_concurrency.max(1))
        .filter_map(|t| async move { t })
        .collect()
        .await;

    tracing::info!(
        listed,
        targets = targets.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "discovery cycle complete"
    );
    Ok(targets)
}
