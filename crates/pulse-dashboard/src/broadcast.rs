//! WebSocket broadcast functionality.
//!
//! The broadcaster waits for the store to publish a new state and fans the
//! serialized message out to every connected WebSocket client, so each
//! change is encoded once regardless of the client count.

use std::sync::Arc;

use pulse_store::TradingState;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::types::ViewMessage;

/// Run the broadcaster task until `cancel` fires or the store is dropped.
pub async fn run_broadcaster(
    mut states: watch::Receiver<Arc<TradingState>>,
    tx: broadcast::Sender<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Broadcaster cancelled");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    debug!("State publisher dropped, stopping broadcaster");
                    break;
                }
                let state = Arc::clone(&states.borrow_and_update());
                if tx.receiver_count() == 0 {
                    trace!(version = state.version, "No WebSocket receivers connected");
                    continue;
                }

                let version = state.version;
                match ViewMessage::state(state).to_json() {
                    Ok(json) => {
                        if let Ok(n) = tx.send(json) {
                            trace!(version, receivers = n, "Broadcast state sent");
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Failed to serialize state update");
                    }
                }
            }
        }
    }
}
