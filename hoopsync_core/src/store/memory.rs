//! In-memory [`Store`] backed by `tokio::sync::RwLock` maps.
//!
//! Used by the test suite and by file-replay runs where no database is
//! available. Enforces the same uniqueness rules the relational schema
//! does, so code exercised against it behaves identically on Postgres.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    EventLink, Game, PbpEvent, Player, PlayerGameLine, PlayerTeamHistory, SyncRun, SyncStatus,
    Team, TeamGameLine, TeamSeason,
};
use crate::normalize::last_name_key;

use super::{Store, StoreResult};

#[derive(Default)]
struct Inner {
    teams: HashMap<Uuid, Team>,
    team_seasons: HashMap<Uuid, TeamSeason>,
    players: HashMap<Uuid, Player>,
    memberships: HashMap<Uuid, PlayerTeamHistory>,
    games: HashMap<Uuid, Game>,
    player_lines: HashMap<Uuid, Vec<PlayerGameLine>>,
    team_lines: HashMap<Uuid, Vec<TeamGameLine>>,
    events: HashMap<Uuid, Vec<PbpEvent>>,
    links: HashMap<Uuid, Vec<EventLink>>,
    sync_runs: HashMap<Uuid, SyncRun>,
}

#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation(constraint.to_string())
}

fn not_found(what: &str, id: Uuid) -> StoreError {
    StoreError::NotFound(format!("{what} {id}"))
}

#[async_trait]
impl Store for MemStore {
    async fn insert_team(&self, team: Team) -> StoreResult<Team> {
        let mut inner = self.inner.write().await;
        for existing in inner.teams.values() {
            for (provider, ext) in &team.external_ids {
                if existing.external_ids.get(provider) == Some(ext) {
                    return Err(unique("teams_external_ids"));
                }
            }
        }
        inner.teams.insert(team.id, team.clone());
        Ok(team)
    }

    async fn update_team(&self, team: &Team) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        for existing in inner.teams.values() {
            if existing.id == team.id {
                continue;
            }
            for (provider, ext) in &team.external_ids {
                if existing.external_ids.get(provider) == Some(ext) {
                    return Err(unique("teams_external_ids"));
                }
            }
        }
        if !inner.teams.contains_key(&team.id) {
            return Err(not_found("team", team.id));
        }
        inner.teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn team_by_id(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.inner.read().await.teams.get(&id).cloned())
    }

    async fn team_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Team>> {
        let inner = self.inner.read().await;
        Ok(inner
            .teams
            .values()
            .find(|t| t.external_ids.get(provider).map(String::as_str) == Some(external_id))
            .cloned())
    }

    async fn all_teams(&self) -> StoreResult<Vec<Team>> {
        Ok(self.inner.read().await.teams.values().cloned().collect())
    }

    async fn insert_team_season(&self, ts: TeamSeason) -> StoreResult<TeamSeason> {
        let mut inner = self.inner.write().await;
        if inner
            .team_seasons
            .values()
            .any(|e| e.team_id == ts.team_id && e.season == ts.season)
        {
            return Err(unique("team_seasons_team_season"));
        }
        inner.team_seasons.insert(ts.id, ts.clone());
        Ok(ts)
    }

    async fn update_team_season(&self, ts: &TeamSeason) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.team_seasons.contains_key(&ts.id) {
            return Err(not_found("team season", ts.id));
        }
        inner.team_seasons.insert(ts.id, ts.clone());
        Ok(())
    }

    async fn team_season(&self, team_id: Uuid, season: &str) -> StoreResult<Option<TeamSeason>> {
        let inner = self.inner.read().await;
        Ok(inner
            .team_seasons
            .values()
            .find(|e| e.team_id == team_id && e.season == season)
            .cloned())
    }

    async fn team_season_by_external_id(
        &self,
        season: &str,
        external_id: &str,
    ) -> StoreResult<Option<TeamSeason>> {
        let inner = self.inner.read().await;
        Ok(inner
            .team_seasons
            .values()
            .find(|e| e.season == season && e.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn insert_player(&self, player: Player) -> StoreResult<Player> {
        let mut inner = self.inner.write().await;
        for existing in inner.players.values() {
            for (provider, ext) in &player.external_ids {
                if existing.external_ids.get(provider) == Some(ext) {
                    return Err(unique("players_external_ids"));
                }
            }
        }
        inner.players.insert(player.id, player.clone());
        Ok(player)
    }

    async fn update_player(&self, player: &Player) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        for existing in inner.players.values() {
            if existing.id == player.id {
                continue;
            }
            for (provider, ext) in &player.external_ids {
                if existing.external_ids.get(provider) == Some(ext) {
                    return Err(unique("players_external_ids"));
                }
            }
        }
        if !inner.players.contains_key(&player.id) {
            return Err(not_found("player", player.id));
        }
        inner.players.insert(player.id, player.clone());
        Ok(())
    }

    async fn player_by_id(&self, id: Uuid) -> StoreResult<Option<Player>> {
        Ok(self.inner.read().await.players.get(&id).cloned())
    }

    async fn player_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Player>> {
        let inner = self.inner.read().await;
        Ok(inner
            .players
            .values()
            .find(|p| p.external_ids.get(provider).map(String::as_str) == Some(external_id))
            .cloned())
    }

    async fn players_by_last_name_keys(&self, keys: &[String]) -> StoreResult<Vec<Player>> {
        let inner = self.inner.read().await;
        Ok(inner
            .players
            .values()
            .filter(|p| keys.iter().any(|k| last_name_key(&p.last_name) == *k))
            .cloned()
            .collect())
    }

    async fn all_players(&self) -> StoreResult<Vec<Player>> {
        Ok(self.inner.read().await.players.values().cloned().collect())
    }

    async fn insert_membership(&self, m: PlayerTeamHistory) -> StoreResult<PlayerTeamHistory> {
        let mut inner = self.inner.write().await;
        if inner
            .memberships
            .values()
            .any(|e| e.player_id == m.player_id && e.team_id == m.team_id && e.season == m.season)
        {
            return Err(unique("player_team_history_player_team_season"));
        }
        inner.memberships.insert(m.id, m.clone());
        Ok(m)
    }

    async fn update_membership(&self, m: &PlayerTeamHistory) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.memberships.contains_key(&m.id) {
            return Err(not_found("roster entry", m.id));
        }
        inner.memberships.insert(m.id, m.clone());
        Ok(())
    }

    async fn membership(
        &self,
        player_id: Uuid,
        team_id: Uuid,
        season: &str,
    ) -> StoreResult<Option<PlayerTeamHistory>> {
        let inner = self.inner.read().await;
        Ok(inner
            .memberships
            .values()
            .find(|e| e.player_id == player_id && e.team_id == team_id && e.season == season)
            .cloned())
    }

    async fn membership_by_jersey(
        &self,
        team_id: Uuid,
        season: &str,
        jersey: i32,
    ) -> StoreResult<Option<PlayerTeamHistory>> {
        let inner = self.inner.read().await;
        Ok(inner
            .memberships
            .values()
            .find(|e| e.team_id == team_id && e.season == season && e.jersey == Some(jersey))
            .cloned())
    }

    async fn memberships_for_team(&self, team_id: Uuid) -> StoreResult<Vec<PlayerTeamHistory>> {
        let inner = self.inner.read().await;
        Ok(inner
            .memberships
            .values()
            .filter(|e| e.team_id == team_id)
            .cloned()
            .collect())
    }

    async fn insert_game(&self, game: Game) -> StoreResult<Game> {
        let mut inner = self.inner.write().await;
        if inner
            .games
            .values()
            .any(|g| g.provider == game.provider && g.external_id == game.external_id)
        {
            return Err(unique("games_provider_external_id"));
        }
        inner.games.insert(game.id, game.clone());
        Ok(game)
    }

    async fn update_game(&self, game: &Game) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.games.contains_key(&game.id) {
            return Err(not_found("game", game.id));
        }
        inner.games.insert(game.id, game.clone());
        Ok(())
    }

    async fn game_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Game>> {
        let inner = self.inner.read().await;
        Ok(inner
            .games
            .values()
            .find(|g| g.provider == provider && g.external_id == external_id)
            .cloned())
    }

    async fn replace_boxscore(
        &self,
        game_id: Uuid,
        player_lines: Vec<PlayerGameLine>,
        team_lines: Vec<TeamGameLine>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.player_lines.insert(game_id, player_lines);
        inner.team_lines.insert(game_id, team_lines);
        Ok(())
    }

    async fn player_lines_for_game(&self, game_id: Uuid) -> StoreResult<Vec<PlayerGameLine>> {
        let inner = self.inner.read().await;
        Ok(inner.player_lines.get(&game_id).cloned().unwrap_or_default())
    }

    async fn team_lines_for_game(&self, game_id: Uuid) -> StoreResult<Vec<TeamGameLine>> {
        let inner = self.inner.read().await;
        Ok(inner.team_lines.get(&game_id).cloned().unwrap_or_default())
    }

    async fn replace_pbp(
        &self,
        game_id: Uuid,
        events: Vec<PbpEvent>,
        links: Vec<EventLink>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let mut seen = std::collections::HashSet::new();
        for ev in &events {
            if !seen.insert(ev.sequence) {
                return Err(unique("pbp_events_game_sequence"));
            }
        }
        inner.events.insert(game_id, events);
        inner.links.insert(game_id, links);
        Ok(())
    }

    async fn events_for_game(&self, game_id: Uuid) -> StoreResult<Vec<PbpEvent>> {
        let inner = self.inner.read().await;
        Ok(inner.events.get(&game_id).cloned().unwrap_or_default())
    }

    async fn links_for_game(&self, game_id: Uuid) -> StoreResult<Vec<EventLink>> {
        let inner = self.inner.read().await;
        Ok(inner.links.get(&game_id).cloned().unwrap_or_default())
    }

    async fn insert_sync_run(&self, run: &SyncRun) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.sync_runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_sync_run(&self, run: &SyncRun) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.sync_runs.contains_key(&run.id) {
            return Err(not_found("sync run", run.id));
        }
        inner.sync_runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn sync_runs_in_progress(&self) -> StoreResult<u32> {
        let inner = self.inner.read().await;
        Ok(inner
            .sync_runs
            .values()
            .filter(|r| r.status == SyncStatus::InProgress)
            .count() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StatTotals, SyncEntity};
    use std::collections::HashMap as Map;

    fn team(name: &str, provider: &str, ext: &str) -> Team {
        let mut ids = Map::new();
        ids.insert(provider.to_string(), ext.to_string());
        Team {
            id: Uuid::new_v4(),
            name: name.to_string(),
            short_name: None,
            city: None,
            country: None,
            external_ids: ids,
        }
    }

    #[tokio::test]
    async fn test_team_external_id_unique_per_provider() {
        let store = MemStore::new();
        store.insert_team(team("Maccabi Tel Aviv", "ibl", "7")).await.unwrap();
        let err = store
            .insert_team(team("Someone Else", "ibl", "7"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        // Same external id under a different provider is fine.
        store.insert_team(team("Other Club", "eurocup", "7")).await.unwrap();
    }

    #[tokio::test]
    async fn test_team_lookup_by_external_id() {
        let store = MemStore::new();
        let t = store.insert_team(team("Hapoel Jerusalem", "ibl", "3")).await.unwrap();
        let found = store.team_by_external_id("ibl", "3").await.unwrap().unwrap();
        assert_eq!(found.id, t.id);
        assert!(store.team_by_external_id("eurocup", "3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_game_unique_per_provider_and_external_id() {
        let store = MemStore::new();
        let home = Uuid::new_v4();
        let away = Uuid::new_v4();
        let g = Game {
            id: Uuid::new_v4(),
            provider: "ibl".into(),
            external_id: "g1".into(),
            season: "2025-26".into(),
            home_team_id: home,
            away_team_id: away,
            home_score: 0,
            away_score: 0,
            status: crate::models::GameStatus::Scheduled,
            scheduled_at: None,
        };
        store.insert_game(g.clone()).await.unwrap();
        let dup = Game {
            id: Uuid::new_v4(),
            ..g.clone()
        };
        assert!(store.insert_game(dup).await.is_err());
    }

    #[tokio::test]
    async fn test_replace_boxscore_is_wholesale() {
        let store = MemStore::new();
        let game_id = Uuid::new_v4();
        let line = |pts| PlayerGameLine {
            id: Uuid::new_v4(),
            game_id,
            player_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            jersey: None,
            stats: StatTotals {
                points: pts,
                ..Default::default()
            },
        };
        store
            .replace_boxscore(game_id, vec![line(10), line(12)], vec![])
            .await
            .unwrap();
        store.replace_boxscore(game_id, vec![line(8)], vec![]).await.unwrap();
        let lines = store.player_lines_for_game(game_id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].stats.points, 8);
    }

    #[tokio::test]
    async fn test_players_by_last_name_keys_uses_stripped_key() {
        let store = MemStore::new();
        let p = Player {
            id: Uuid::new_v4(),
            first_name: "Luka".into(),
            last_name: "Dončić".into(),
            birth_date: None,
            height_cm: None,
            positions: vec![],
            external_ids: Map::new(),
        };
        store.insert_player(p).await.unwrap();
        let hits = store
            .players_by_last_name_keys(&["doncic".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_runs_in_progress_count() {
        let store = MemStore::new();
        let mut run = SyncRun::start("ibl", SyncEntity::Teams);
        store.insert_sync_run(&run).await.unwrap();
        assert_eq!(store.sync_runs_in_progress().await.unwrap(), 1);
        run.status = SyncStatus::Completed;
        store.update_sync_run(&run).await.unwrap();
        assert_eq!(store.sync_runs_in_progress().await.unwrap(), 0);
    }
}
