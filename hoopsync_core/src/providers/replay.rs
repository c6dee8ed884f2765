//! File-backed provider adapter.
//!
//! Serves captured provider responses from a directory, one JSON array
//! per file:
//!
//! ```text
//! <dir>/teams.json
//! <dir>/schedule_<season>.json
//! <dir>/boxscore_<game_id>.json
//! <dir>/pbp_<game_id>.json
//! ```
//!
//! Used for offline backfills and for exercising the full sync path in
//! tests without a network.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::convert::CanonicalConverter;
use crate::error::ProviderError;

use super::{ProviderAdapter, ProviderResult};

pub struct ReplayProvider {
    key: String,
    converter: Box<dyn CanonicalConverter>,
    dir: PathBuf,
}

impl ReplayProvider {
    pub fn new(
        key: impl Into<String>,
        converter: Box<dyn CanonicalConverter>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            key: key.into(),
            converter,
            dir: dir.into(),
        }
    }

    async fn read_array(&self, file_name: &str) -> ProviderResult<Vec<Value>> {
        let path = self.dir.join(file_name);
        let bytes = read_file(&path).await?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Validation(format!("{}: {e}", path.display())))?;
        match value {
            Value::Array(items) => {
                debug!(file = %path.display(), count = items.len(), "replayed capture");
                Ok(items)
            }
            _ => Err(ProviderError::Validation(format!(
                "{}: expected a JSON array",
                path.display()
            ))),
        }
    }
}

async fn read_file(path: &Path) -> ProviderResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProviderError::NotFound(path.display().to_string())
        } else {
            ProviderError::Connection(format!("{}: {e}", path.display()))
        }
    })
}

#[async_trait]
impl ProviderAdapter for ReplayProvider {
    fn key(&self) -> &str {
        &self.key
    }

    fn converter(&self) -> &dyn CanonicalConverter {
        self.converter.as_ref()
    }

    async fn get_teams(&self) -> ProviderResult<Vec<Value>> {
        self.read_array("teams.json").await
    }

    async fn get_schedule(&self, season: &str) -> ProviderResult<Vec<Value>> {
        self.read_array(&format!("schedule_{season}.json")).await
    }

    async fn get_game_boxscore(&self, game_external_id: &str) -> ProviderResult<Vec<Value>> {
        self.read_array(&format!("boxscore_{game_external_id}.json"))
            .await
    }

    async fn get_game_pbp(&self, game_external_id: &str) -> ProviderResult<Vec<Value>> {
        self.read_array(&format!("pbp_{game_external_id}.json")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::national::NationalFeedConverter;
    use serde_json::json;

    fn provider(dir: &Path) -> ReplayProvider {
        ReplayProvider::new("ibl", Box::new(NationalFeedConverter), dir)
    }

    #[tokio::test]
    async fn test_reads_captured_arrays() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("teams.json"),
            json!([{"team_id": "1", "team_name": "Hapoel Holon"}]).to_string(),
        )
        .unwrap();

        let p = provider(dir.path());
        let teams = p.get_teams().await.unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0]["team_name"], "Hapoel Holon");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        let err = p.get_game_boxscore("g404").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_non_array_payload_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("teams.json"), "{}").unwrap();
        let p = provider(dir.path());
        let err = p.get_teams().await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_is_game_final_via_converter() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        let raw = json!({
            "game_id": "g1",
            "home_team_id": "1",
            "away_team_id": "2",
            "home_score": "88",
            "away_score": "80",
            "status": "final"
        });
        assert!(p.is_game_final(&raw));
        let scheduled = json!({
            "game_id": "g2",
            "home_team_id": "1",
            "away_team_id": "2",
            "status": "scheduled"
        });
        assert!(!p.is_game_final(&scheduled));
    }
}
