//! Side effects requested by reducers.
//!
//! Reducers never perform I/O. When a transition calls for a backend call,
//! the reducer emits an [`Intent`]; the store forwards it to an outbox that a
//! separate effect runner drains.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// Ask the backend to re-run AI analysis for a migration.
    Reanalyze { mint: String },
}

impl Intent {
    /// Short name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reanalyze { .. } => "reanalyze",
        }
    }
}
