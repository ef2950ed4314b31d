//! Initial/resync snapshot fetch.

use pulse_core::DashboardSnapshot;
use tracing::{info, warn};

use crate::backend::DynBackend;
use crate::error::ApiResult;

/// Fetches the full dashboard snapshot from the backend.
///
/// The aggregate init call and the watchlist call run concurrently. An init
/// failure fails the fetch; a watchlist failure degrades to an empty
/// watchlist with default counters.
#[derive(Clone)]
pub struct SnapshotFetcher {
    backend: DynBackend,
}

impl SnapshotFetcher {
    pub fn new(backend: DynBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &DynBackend {
        &self.backend
    }

    /// Fetch config, stats, wallets, positions, history, migrations and
    /// watchlist in one go.
    pub async fn fetch_initial_state(&self) -> ApiResult<DashboardSnapshot> {
        let init = self.backend.dashboard_init();
        let watchlist = self.backend.watchlist();
        let (init, watchlist) = tokio::join!(init, watchlist);

        let mut snapshot = init?;
        match watchlist {
            Ok(data) => {
                snapshot.watchlist = data.tokens;
                snapshot.watchlist_stats = data.stats;
            }
            Err(e) => {
                warn!(error = %e, "Watchlist fetch failed, using empty watchlist");
                snapshot.watchlist = Vec::new();
                snapshot.watchlist_stats = Default::default();
            }
        }

        info!(
            positions = snapshot.positions.len(),
            history = snapshot.history.len(),
            migrations = snapshot.migrations.len(),
            watchlist = snapshot.watchlist.len(),
            "Snapshot fetched"
        );
        Ok(snapshot)
    }
}
