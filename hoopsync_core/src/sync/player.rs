//! Player entity syncer: deduplication plus roster bookkeeping.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::SyncError;
use crate::matching::PlayerDeduplicator;
use crate::models::{CanonicalPlayer, Player, PlayerTeamHistory, Team};
use crate::store::Store;

pub struct PlayerSyncer {
    store: Arc<dyn Store>,
    dedup: PlayerDeduplicator,
}

impl PlayerSyncer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            dedup: PlayerDeduplicator::new(store.clone()),
            store,
        }
    }

    pub fn deduplicator(&self) -> &PlayerDeduplicator {
        &self.dedup
    }

    /// Resolve the player through the dedup cascade and find-or-create
    /// the roster entry for (player, team, season). Jersey and
    /// positions on an existing entry are backfilled, never
    /// overwritten.
    pub async fn sync_player(
        &self,
        provider: &str,
        raw: &CanonicalPlayer,
        team: &Team,
        season: &str,
    ) -> Result<(Player, PlayerTeamHistory), SyncError> {
        let player = self
            .dedup
            .find_or_create_player(provider, raw, Some(team), Some(season))
            .await?;

        if let Some(mut membership) = self.store.membership(player.id, team.id, season).await? {
            let mut changed = false;
            if membership.jersey.is_none() && raw.jersey.is_some() {
                membership.jersey = raw.jersey;
                changed = true;
            }
            if membership.positions.is_empty() && !raw.positions.is_empty() {
                membership.positions = raw.positions.clone();
                changed = true;
            }
            if changed {
                self.store.update_membership(&membership).await?;
            }
            return Ok((player, membership));
        }

        let membership = self
            .store
            .insert_membership(PlayerTeamHistory {
                id: Uuid::new_v4(),
                player_id: player.id,
                team_id: team.id,
                season: season.to_string(),
                jersey: raw.jersey,
                positions: raw.positions.clone(),
            })
            .await?;
        Ok((player, membership))
    }

    /// Find-or-create the roster entry for an already-resolved player.
    /// Jersey is backfilled only when the stored entry has none.
    pub async fn ensure_membership(
        &self,
        player: &Player,
        team: &Team,
        season: &str,
        jersey: Option<i32>,
    ) -> Result<PlayerTeamHistory, SyncError> {
        if let Some(mut membership) = self.store.membership(player.id, team.id, season).await? {
            if membership.jersey.is_none() && jersey.is_some() {
                membership.jersey = jersey;
                self.store.update_membership(&membership).await?;
            }
            return Ok(membership);
        }
        self.store
            .insert_membership(PlayerTeamHistory {
                id: Uuid::new_v4(),
                player_id: player.id,
                team_id: team.id,
                season: season.to_string(),
                jersey,
                positions: Vec::new(),
            })
            .await
            .map_err(SyncError::from)
    }
}
