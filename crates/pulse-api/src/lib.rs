//! Backend REST access for the Pulse dashboard client.
//!
//! - [`BackendApi`]: the REST surface as a trait, with [`HttpBackend`] over
//!   reqwest and [`MockBackend`] for tests
//! - [`SnapshotFetcher`]: the full-state fetch used at startup and on resync
//! - [`wire`]: backend JSON shapes and their mapping into `pulse_core` types

pub mod backend;
pub mod client;
pub mod error;
pub mod snapshot;
pub mod wire;

pub use backend::{
    BackendApi, BackendCall, BoxFuture, ConfigUpdate, DynBackend, MockBackend, TrackOptions,
    WatchlistData,
};
pub use client::{HttpBackend, HttpBackendConfig};
pub use error::{ApiError, ApiResult};
pub use snapshot::SnapshotFetcher;
