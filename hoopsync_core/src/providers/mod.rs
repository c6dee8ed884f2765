//! Provider adapter interface.
//!
//! An adapter owns the transport to one external data source and hands
//! back raw JSON payloads; its paired
//! [`CanonicalConverter`](crate::convert::CanonicalConverter) owns the
//! payload shape. The sync layer only ever sees raw `Value`s plus the
//! converter, so a live HTTP adapter and a file replay of its captured
//! responses are interchangeable.

use async_trait::async_trait;
use serde_json::Value;

use crate::convert::CanonicalConverter;
use crate::error::ProviderError;
use crate::models::GameStatus;

pub mod replay;

pub use replay::ReplayProvider;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider key, used in external-id maps and SyncRun rows.
    fn key(&self) -> &str;

    /// The converter that understands this provider's payload shape.
    fn converter(&self) -> &dyn CanonicalConverter;

    async fn get_teams(&self) -> ProviderResult<Vec<Value>>;

    async fn get_schedule(&self, season: &str) -> ProviderResult<Vec<Value>>;

    async fn get_game_boxscore(&self, game_external_id: &str) -> ProviderResult<Vec<Value>>;

    async fn get_game_pbp(&self, game_external_id: &str) -> ProviderResult<Vec<Value>>;

    /// Whether a raw schedule entry represents a finished game. The
    /// default asks the converter; adapters with a cheaper signal can
    /// override.
    fn is_game_final(&self, raw_game: &Value) -> bool {
        self.converter()
            .convert_game(raw_game)
            .map(|g| g.status == GameStatus::Final)
            .unwrap_or(false)
    }
}
