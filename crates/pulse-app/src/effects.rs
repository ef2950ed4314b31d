//! Effect runner: executes intents queued by the store.

use std::time::Duration;

use pulse_api::DynBackend;
use pulse_store::Intent;
use pulse_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::with_timeout;

/// Drain `intents` until the store is dropped or `cancel` fires.
pub async fn run_effects(
    mut intents: mpsc::UnboundedReceiver<Intent>,
    backend: DynBackend,
    timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = intents.recv() => {
                let Some(intent) = next else {
                    debug!("Intent outbox closed");
                    break;
                };
                execute(&intent, &backend, timeout).await;
            }
        }
    }
    debug!("Effect runner stopped");
}

async fn execute(intent: &Intent, backend: &DynBackend, timeout: Duration) {
    let result = match intent {
        Intent::Reanalyze { mint } => {
            info!(%mint, "Requesting re-analysis after wallet buys");
            with_timeout(timeout, backend.analyze_migration(mint.clone())).await
        }
    };

    match result {
        Ok(()) => Metrics::intent(intent.name(), true),
        Err(e) => {
            warn!(intent = intent.name(), error = %e, "Intent failed");
            Metrics::intent(intent.name(), false);
        }
    }
}
