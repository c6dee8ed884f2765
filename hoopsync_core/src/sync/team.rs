//! Team entity syncer.

use std::sync::Arc;
use serde_json::Value;

use crate::error::SyncError;
use crate::matching::TeamMatcher;
use crate::models::{Team, TeamSeason};
use crate::providers::ProviderAdapter;
use crate::store::Store;

/// What a single entity sync did to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Skipped,
}

pub struct TeamSyncer {
    matcher: TeamMatcher,
}

impl TeamSyncer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            matcher: TeamMatcher::new(store),
        }
    }

    pub fn matcher(&self) -> &TeamMatcher {
        &self.matcher
    }

    /// Convert and resolve one raw provider team into its Team and
    /// per-season membership row.
    pub async fn sync_team(
        &self,
        adapter: &dyn ProviderAdapter,
        raw: &Value,
        season: &str,
    ) -> Result<(Team, TeamSeason, SyncOutcome), SyncError> {
        let canonical = adapter.converter().convert_team(raw)?;
        let provider = adapter.key();

        // Classify before resolving so the tally reflects what
        // find_or_create is about to do.
        let outcome = if self
            .matcher
            .get_by_external_id(provider, &canonical.external_id)
            .await?
            .is_some()
        {
            SyncOutcome::Skipped
        } else if self
            .matcher
            .match_across_providers(&canonical.name, canonical.city.as_deref())
            .await?
            .is_some()
        {
            SyncOutcome::Updated
        } else {
            SyncOutcome::Created
        };

        let (team, ts) = self
            .matcher
            .find_or_create_team_season(provider, &canonical, season)
            .await?;
        Ok((team, ts, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::national::NationalFeedConverter;
    use crate::providers::ReplayProvider;
    use crate::store::MemStore;
    use serde_json::json;

    fn adapter() -> ReplayProvider {
        ReplayProvider::new("ibl", Box::new(NationalFeedConverter), "/nonexistent")
    }

    #[tokio::test]
    async fn test_sync_team_outcomes() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let syncer = TeamSyncer::new(store.clone());
        let a = adapter();

        let raw = json!({"team_id": "7", "team_name": "Maccabi Tel Aviv"});
        let (_, _, outcome) = syncer.sync_team(&a, &raw, "2025-26").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Created);

        // Same id again: already known for this provider.
        let (_, _, outcome) = syncer.sync_team(&a, &raw, "2025-26").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);

        assert_eq!(store.all_teams().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_team_merge_counts_as_update() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let syncer = TeamSyncer::new(store.clone());
        let ibl = adapter();
        let eurocup = ReplayProvider::new(
            "eurocup",
            Box::new(crate::convert::continental::ContinentalFeedConverter),
            "/nonexistent",
        );

        let raw = json!({"team_id": "7", "team_name": "Maccabi Tel Aviv"});
        syncer.sync_team(&ibl, &raw, "2025-26").await.unwrap();

        let raw2 = json!({"code": "MTA", "name": "Maccabi Playtika Tel Aviv"});
        let (team, _, outcome) = syncer.sync_team(&eurocup, &raw2, "2025-26").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Updated);
        assert_eq!(team.external_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_payload_is_conversion_error() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let syncer = TeamSyncer::new(store);
        let a = adapter();
        let err = syncer
            .sync_team(&a, &json!({"team_name": "No Id"}), "2025-26")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conversion(_)));
    }
}
