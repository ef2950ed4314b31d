//! Reconciliation store for the Pulse dashboard client.
//!
//! Merges the REST snapshot, push events and optimistic user actions into
//! one consistent [`TradingState`]:
//! - [`reduce`]: pure `(state, event) -> state` transitions
//! - [`Store`]: serialized dispatch, state publication and the intent outbox
//! - [`RoutingTable`]: which push channel each event type is read from

pub mod config;
pub mod error;
pub mod event;
pub mod intent;
pub mod reducer;
pub mod routing;
pub mod state;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use event::{PushEvent, StoreEvent};
pub use intent::Intent;
pub use reducer::{reduce, Reduction};
pub use routing::{Channel, RoutingTable};
pub use state::TradingState;
pub use store::Store;
