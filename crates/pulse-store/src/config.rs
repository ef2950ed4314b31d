//! Store tuning.

use serde::{Deserialize, Serialize};

/// Store limits and behavior flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum activity feed length.
    #[serde(default = "default_activity_cap")]
    pub activity_cap: usize,
    /// Maximum ranked migrations kept.
    #[serde(default = "default_migration_limit")]
    pub migration_limit: usize,
    /// Maximum closed positions kept in history.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// Request re-analysis when a tracked wallet buys a PASSed token.
    #[serde(default = "default_reanalyze_on_wallet_buy")]
    pub reanalyze_on_wallet_buy: bool,
}

fn default_activity_cap() -> usize {
    50
}

fn default_migration_limit() -> usize {
    50
}

fn default_history_cap() -> usize {
    200
}

fn default_reanalyze_on_wallet_buy() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            activity_cap: default_activity_cap(),
            migration_limit: default_migration_limit(),
            history_cap: default_history_cap(),
            reanalyze_on_wallet_buy: default_reanalyze_on_wallet_buy(),
        }
    }
}
