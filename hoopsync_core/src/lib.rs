//! Hoopsync Core - Cross-source basketball entity resolution and sync.
//!
//! This crate provides:
//! - Canonical data model for teams, players, games, stats and play-by-play
//! - Per-provider feed converters into the canonical model
//! - Name normalization and rule-based matching (no edit distance)
//! - Tiered player deduplication across providers
//! - Storage behind a trait, with Postgres and in-memory backends
//! - Sync orchestration with per-run audit records and a streaming variant
//! - Play-by-play link inference for feeds without explicit event links

pub mod convert;
pub mod error;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod store;
pub mod sync;

pub use convert::{CanonicalConverter, ContinentalFeedConverter, NationalFeedConverter};
pub use error::{ConversionError, ProviderError, StoreError, SyncError};
pub use matching::{PlayerDeduplicator, TeamMatcher};
pub use providers::{ProviderAdapter, ReplayProvider};
pub use store::{DbPoolConfig, MemStore, PgStore, Store};
pub use sync::{SyncEvent, SyncManager};
