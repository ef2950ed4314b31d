//! Ranked migration reducers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pulse_core::{AiDecision, Decision, MigrationStats, RankedMigration, WalletSignal};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{patch_entry, reuse_or_wrap};
use crate::config::StoreConfig;
use crate::event::{
    AiReasoning, MarketDataUpdate, MigrationDetected, MintNotice, SignalDetected, WalletActivity,
};
use crate::intent::Intent;
use crate::state::TradingState;

/// Idempotent prepend, truncated to `limit`.
pub fn migration_detected(
    state: &mut TradingState,
    event: &MigrationDetected,
    ts: i64,
    limit: usize,
) -> bool {
    if state.migration(&event.mint).is_some() {
        return false;
    }

    let detected_at = event.detected_at.unwrap_or(ts);
    let mut migration = RankedMigration::detected(event.mint.clone(), detected_at);
    migration.symbol = event.symbol.clone().unwrap_or_default();
    migration.name = event.name.clone().unwrap_or_default();
    migration.image_url = event.image_url.clone();
    migration.score = event.score.unwrap_or_default();
    migration.score_breakdown = event.score_breakdown.clone().unwrap_or_default();
    migration.signal_source = event.source.clone();

    state.migrations.insert(0, Arc::new(migration));
    state.migrations.truncate(limit);
    true
}

pub fn market_data_updated(state: &mut TradingState, event: &MarketDataUpdate, ts: i64) -> bool {
    patch_entry(
        &mut state.migrations,
        |m| m.mint == event.mint,
        |m| {
            if let Some(v) = event.price {
                m.market.price = v;
            }
            if let Some(v) = event.market_cap {
                m.market.market_cap = v;
            }
            if let Some(v) = event.liquidity {
                m.market.liquidity = v;
            }
            if let Some(v) = event.volume_24h {
                m.market.volume_24h = v;
            }
            if let Some(v) = event.price_change_1h {
                m.market.price_change_1h = v;
            }
            if let Some(v) = event.score {
                m.score = v;
            }
            if let Some(v) = &event.score_breakdown {
                m.score_breakdown.clone_from(v);
            }
            if let Some(v) = event.ready_to_trade {
                m.ready_to_trade = v;
            }
            m.market_data_unavailable = false;
            m.updated_at = ts;
        },
    )
}

/// Record a new AI decision. Clears the re-analysis latch.
pub fn ai_reasoning(state: &mut TradingState, event: &AiReasoning, ts: i64) -> bool {
    patch_entry(
        &mut state.migrations,
        |m| m.mint == event.mint,
        |m| {
            m.ai = Some(AiDecision {
                decision: Decision::from(event.decision.clone()),
                confidence: event.confidence.unwrap_or_default(),
                reasoning: event.reasoning.clone().unwrap_or_default(),
                decided_at: ts,
            });
            m.reanalysis_requested = false;
            m.updated_at = ts;
        },
    )
}

pub fn no_market_data(state: &mut TradingState, event: &MintNotice, ts: i64) -> bool {
    patch_entry(
        &mut state.migrations,
        |m| m.mint == event.mint,
        |m| {
            m.market_data_unavailable = true;
            m.updated_at = ts;
        },
    )
}

pub fn wallet_signal(state: &mut TradingState, event: &WalletActivity, ts: i64) -> bool {
    patch_entry(
        &mut state.migrations,
        |m| m.mint == event.mint,
        |m| record_signal(m, event, ts),
    )
}

/// Record a wallet buy and decide whether it warrants re-analysis.
///
/// A buy on a migration whose last decision was PASS yields one
/// [`Intent::Reanalyze`]; further buys are absorbed by the latch until the
/// next AI decision arrives.
pub fn wallet_buy_detected(
    state: &mut TradingState,
    event: &WalletActivity,
    ts: i64,
    config: &StoreConfig,
) -> (bool, Option<Intent>) {
    let mut intent = None;
    let changed = patch_entry(
        &mut state.migrations,
        |m| m.mint == event.mint,
        |m| {
            record_signal(m, event, ts);
            if config.reanalyze_on_wallet_buy && m.last_decision_passed() && !m.reanalysis_requested
            {
                m.reanalysis_requested = true;
                intent = Some(Intent::Reanalyze {
                    mint: m.mint.clone(),
                });
            }
        },
    );
    if intent.is_some() {
        info!(
            mint = %event.mint,
            wallet = %event.wallet,
            "Wallet buy on PASSed token, requesting re-analysis"
        );
    }
    (changed, intent)
}

pub fn signal_detected(state: &mut TradingState, event: &SignalDetected, ts: i64) -> bool {
    patch_entry(
        &mut state.migrations,
        |m| m.mint == event.mint,
        |m| {
            m.signal_source = Some(event.source.clone());
            if let Some(ready) = event.ready_to_trade {
                m.ready_to_trade = ready;
            }
            if let Some(score) = event.score {
                m.score = score;
            }
            m.updated_at = ts;
        },
    )
}

pub fn migration_expired(state: &mut TradingState, event: &MintNotice) -> bool {
    let before = state.migrations.len();
    state.migrations.retain(|m| m.mint != event.mint);
    state.migrations.len() != before
}

/// Authoritative feed replacement.
pub fn feed_update(
    state: &mut TradingState,
    incoming: Vec<RankedMigration>,
    stats: Option<MigrationStats>,
    limit: usize,
) -> bool {
    let next = merge_migrations(&state.migrations, incoming, limit);
    let mut changed = next.len() != state.migrations.len()
        || next
            .iter()
            .zip(&state.migrations)
            .any(|(a, b)| !Arc::ptr_eq(a, b));
    state.migrations = next;

    if let Some(stats) = stats {
        if stats != state.migration_stats {
            state.migration_stats = stats;
            changed = true;
        }
    }
    debug!(migrations = state.migrations.len(), changed, "Feed update applied");
    changed
}

/// Replace `previous` with `incoming`, deduplicated by mint and truncated.
///
/// Entries equal to their predecessor keep the old `Arc`. The re-analysis
/// latch survives when the AI decision did not change.
pub(crate) fn merge_migrations(
    previous: &[Arc<RankedMigration>],
    incoming: Vec<RankedMigration>,
    limit: usize,
) -> Vec<Arc<RankedMigration>> {
    let by_mint: HashMap<&str, &Arc<RankedMigration>> =
        previous.iter().map(|m| (m.mint.as_str(), m)).collect();
    let mut seen = HashSet::new();

    incoming
        .into_iter()
        .filter(|m| seen.insert(m.mint.clone()))
        .take(limit)
        .map(|mut m| {
            let prev = by_mint.get(m.mint.as_str()).copied();
            if let Some(prev) = prev {
                let same_decision =
                    prev.ai.as_ref().map(|a| &a.decision) == m.ai.as_ref().map(|a| &a.decision);
                if same_decision {
                    m.reanalysis_requested = prev.reanalysis_requested;
                }
            }
            reuse_or_wrap(prev, m)
        })
        .collect()
}

fn record_signal(migration: &mut RankedMigration, event: &WalletActivity, ts: i64) {
    let signal = WalletSignal {
        wallet: event.wallet.clone(),
        action: event.action.clone().unwrap_or_else(|| "buy".to_string()),
        amount_sol: event.amount_sol.unwrap_or(Decimal::ZERO),
        timestamp: event.timestamp.unwrap_or(ts),
    };
    let duplicate = migration
        .recent_signals
        .iter()
        .any(|s| s.wallet == signal.wallet && s.timestamp == signal.timestamp);
    if !duplicate {
        migration.push_signal(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const LIMIT: usize = 50;

    fn detected(mint: &str) -> MigrationDetected {
        MigrationDetected {
            mint: mint.to_string(),
            symbol: Some(format!("{mint}SYM")),
            name: None,
            image_url: None,
            detected_at: None,
            score: Some(42.0),
            score_breakdown: None,
            source: None,
        }
    }

    fn reasoning(mint: &str, decision: &str) -> AiReasoning {
        AiReasoning {
            mint: mint.to_string(),
            decision: decision.to_string(),
            confidence: Some(0.8),
            reasoning: Some("thin liquidity".to_string()),
        }
    }

    fn buy(mint: &str, wallet: &str, ts: i64) -> WalletActivity {
        WalletActivity {
            mint: mint.to_string(),
            wallet: wallet.to_string(),
            action: None,
            amount_sol: Some(dec!(1.5)),
            timestamp: Some(ts),
        }
    }

    #[test]
    fn test_migration_detected_is_idempotent() {
        let mut state = TradingState::default();
        assert!(migration_detected(&mut state, &detected("A"), 1_000, LIMIT));
        assert!(!migration_detected(&mut state, &detected("A"), 1_100, LIMIT));

        assert_eq!(state.migrations.len(), 1);
        assert_eq!(state.migrations[0].symbol, "ASYM");
        assert_eq!(state.migrations[0].detected_at, 1_000);
    }

    #[test]
    fn test_migration_list_is_limited() {
        let mut state = TradingState::default();
        for n in 0..5 {
            migration_detected(&mut state, &detected(&format!("M{n}")), n, 3);
        }
        let mints: Vec<&str> = state.migrations.iter().map(|m| m.mint.as_str()).collect();
        assert_eq!(mints, vec!["M4", "M3", "M2"]);
    }

    #[test]
    fn test_patches_on_unknown_mint_are_noops() {
        let mut state = TradingState::default();
        assert!(!ai_reasoning(&mut state, &reasoning("X", "PASS"), 1));
        assert!(!wallet_signal(&mut state, &buy("X", "w", 1), 1));
        assert!(!migration_expired(
            &mut state,
            &MintNotice {
                mint: "X".to_string(),
                reason: None
            }
        ));
        assert!(state.migrations.is_empty());
    }

    #[test]
    fn test_wallet_buy_after_pass_requests_one_reanalysis() {
        let mut state = TradingState::default();
        let config = StoreConfig::default();
        migration_detected(&mut state, &detected("A"), 1_000, LIMIT);
        ai_reasoning(&mut state, &reasoning("A", "PASS"), 1_100);

        let (_, first) = wallet_buy_detected(&mut state, &buy("A", "w1", 1_200), 1_200, &config);
        let (_, second) = wallet_buy_detected(&mut state, &buy("A", "w2", 1_300), 1_300, &config);
        let (_, third) = wallet_buy_detected(&mut state, &buy("A", "w3", 1_400), 1_400, &config);

        assert_eq!(
            first,
            Some(Intent::Reanalyze {
                mint: "A".to_string()
            })
        );
        assert!(second.is_none());
        assert!(third.is_none());
        assert_eq!(state.migrations[0].wallet_signal_count, 3);

        // A new PASS re-arms the trigger.
        ai_reasoning(&mut state, &reasoning("A", "PASS"), 2_000);
        assert!(!state.migrations[0].reanalysis_requested);
        let (_, again) = wallet_buy_detected(&mut state, &buy("A", "w4", 2_100), 2_100, &config);
        assert!(again.is_some());
    }

    #[test]
    fn test_wallet_buy_without_pass_or_flag_does_nothing_extra() {
        let mut state = TradingState::default();
        migration_detected(&mut state, &detected("A"), 1_000, LIMIT);
        migration_detected(&mut state, &detected("B"), 1_000, LIMIT);
        ai_reasoning(&mut state, &reasoning("A", "BUY"), 1_100);
        ai_reasoning(&mut state, &reasoning("B", "PASS"), 1_100);

        let (changed, intent) =
            wallet_buy_detected(&mut state, &buy("A", "w", 1_200), 1_200, &StoreConfig::default());
        assert!(changed);
        assert!(intent.is_none());

        let disabled = StoreConfig {
            reanalyze_on_wallet_buy: false,
            ..Default::default()
        };
        let (_, intent) = wallet_buy_detected(&mut state, &buy("B", "w", 1_200), 1_200, &disabled);
        assert!(intent.is_none());
        assert!(!state.migration("B").unwrap().reanalysis_requested);
    }

    #[test]
    fn test_duplicate_wallet_signal_is_ignored() {
        let mut state = TradingState::default();
        migration_detected(&mut state, &detected("A"), 1_000, LIMIT);
        assert!(wallet_signal(&mut state, &buy("A", "w", 1_200), 1_200));
        assert!(!wallet_signal(&mut state, &buy("A", "w", 1_200), 1_250));
        assert_eq!(state.migrations[0].wallet_signal_count, 1);
    }

    #[test]
    fn test_market_data_and_no_market_data() {
        let mut state = TradingState::default();
        migration_detected(&mut state, &detected("A"), 1_000, LIMIT);
        assert!(no_market_data(
            &mut state,
            &MintNotice {
                mint: "A".to_string(),
                reason: None
            },
            1_100
        ));
        assert!(state.migrations[0].market_data_unavailable);

        let update = MarketDataUpdate {
            mint: "A".to_string(),
            price: Some(dec!(0.01)),
            market_cap: Some(dec!(12000)),
            liquidity: None,
            volume_24h: None,
            price_change_1h: Some(3.5),
            score: None,
            score_breakdown: None,
            ready_to_trade: Some(true),
        };
        assert!(market_data_updated(&mut state, &update, 1_200));
        let m = &state.migrations[0];
        assert!(!m.market_data_unavailable);
        assert_eq!(m.market.market_cap, dec!(12000));
        assert!(m.ready_to_trade);
        assert_eq!(m.score, 42.0);
    }

    #[test]
    fn test_feed_update_reuses_and_carries_latch() {
        let mut state = TradingState::default();
        migration_detected(&mut state, &detected("A"), 1_000, LIMIT);
        migration_detected(&mut state, &detected("B"), 1_000, LIMIT);
        ai_reasoning(&mut state, &reasoning("A", "PASS"), 1_100);
        wallet_buy_detected(&mut state, &buy("A", "w", 1_200), 1_200, &StoreConfig::default());

        let b_before = Arc::clone(state.migration("B").unwrap());
        let mut incoming: Vec<RankedMigration> = state
            .migrations
            .iter()
            .map(|m| RankedMigration::clone(m))
            .collect();
        for m in &mut incoming {
            m.reanalysis_requested = false;
        }
        incoming.push(RankedMigration::detected("C", 1_300));

        let stats = MigrationStats {
            total_detected: 3,
            ..Default::default()
        };
        assert!(feed_update(&mut state, incoming, Some(stats), LIMIT));

        assert_eq!(state.migrations.len(), 3);
        assert!(state.migration("A").unwrap().reanalysis_requested);
        assert!(Arc::ptr_eq(state.migration("B").unwrap(), &b_before));
        assert_eq!(state.migration_stats.total_detected, 3);
    }

    #[test]
    fn test_migration_expired_removes() {
        let mut state = TradingState::default();
        migration_detected(&mut state, &detected("A"), 1_000, LIMIT);
        assert!(migration_expired(
            &mut state,
            &MintNotice {
                mint: "A".to_string(),
                reason: Some("ttl".to_string())
            }
        ));
        assert!(state.migrations.is_empty());
    }
}
