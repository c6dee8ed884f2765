//! Sync orchestration.
//!
//! [`SyncManager`] drives one provider at a time: team-list sync, full
//! season sync (optionally with play-by-play), targeted single-game
//! re-sync, and a streaming season variant that re-expresses the same
//! pass as an ordered progress-event sequence. Every operation opens a
//! [`SyncRun`] audit row before touching the provider and finalizes it
//! exactly once, so even a total failure is visible after the fact.
//! Per-game failures are isolated: they are counted and recorded in
//! the run's error detail, and the loop moves on.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::models::{CanonicalGame, Game, GameStatus, SyncEntity, SyncRun, SyncStatus};
use crate::providers::ProviderAdapter;
use crate::store::retry::execute_with_retry;
use crate::store::Store;

pub mod game;
pub mod player;
pub mod team;

pub use game::GameSyncer;
pub use player::PlayerSyncer;
pub use team::{SyncOutcome, TeamSyncer};

// Losing the audit row to a connection blip would leave an operation
// with no record, so run writes retry on transient storage errors.
const AUDIT_WRITE_ATTEMPTS: u32 = 3;

/// Progress notifications emitted by the streaming season sync.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Started {
        phase: String,
        total: u32,
    },
    Progress {
        current: u32,
        total: u32,
        game_external_id: String,
        /// Schedule-reported status; `None` for an unparseable entry.
        status: Option<GameStatus>,
    },
    GameSynced {
        game_external_id: String,
    },
    GameError {
        game_external_id: String,
        error: String,
    },
    Completed {
        run: SyncRun,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub key: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusReport {
    pub providers: Vec<ProviderStatus>,
    pub in_progress_runs: u32,
}

struct RegisteredProvider {
    adapter: Arc<dyn ProviderAdapter>,
    enabled: bool,
}

pub struct SyncManager {
    store: Arc<dyn Store>,
    providers: HashMap<String, RegisteredProvider>,
    teams: TeamSyncer,
    games: GameSyncer,
}

impl SyncManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            teams: TeamSyncer::new(store.clone()),
            games: GameSyncer::new(store.clone()),
            providers: HashMap::new(),
            store,
        }
    }

    pub fn register_provider(&mut self, adapter: Arc<dyn ProviderAdapter>, enabled: bool) {
        self.providers
            .insert(adapter.key().to_string(), RegisteredProvider { adapter, enabled });
    }

    fn adapter(&self, provider: &str) -> Result<Arc<dyn ProviderAdapter>, SyncError> {
        match self.providers.get(provider) {
            Some(entry) if entry.enabled => Ok(entry.adapter.clone()),
            _ => Err(SyncError::UnknownProvider(provider.to_string())),
        }
    }

    /// Sync the provider's team list into Team + TeamSeason rows.
    pub async fn sync_teams(&self, provider: &str, season: &str) -> Result<SyncRun, SyncError> {
        let mut run = SyncRun::start(provider, SyncEntity::Teams);
        execute_with_retry(|| self.store.insert_sync_run(&run), AUDIT_WRITE_ATTEMPTS).await?;

        let adapter = match self.adapter(provider) {
            Ok(a) => a,
            Err(e) => return self.finalize_failed(run, &e.to_string()).await,
        };
        let raw_teams = match adapter.get_teams().await {
            Ok(t) => t,
            Err(e) => return self.finalize_failed(run, &e.to_string()).await,
        };

        let mut error_details = Vec::new();
        for (i, raw) in raw_teams.iter().enumerate() {
            run.processed += 1;
            match self.teams.sync_team(adapter.as_ref(), raw, season).await {
                Ok((_, _, SyncOutcome::Created)) => run.created += 1,
                Ok((_, _, SyncOutcome::Updated)) => run.updated += 1,
                Ok((_, _, SyncOutcome::Skipped)) => run.skipped += 1,
                Err(e) => {
                    warn!(provider, index = i, error = %e, "team record failed");
                    run.errors += 1;
                    error_details.push(json!({ "index": i, "error": e.to_string() }));
                }
            }
        }

        info!(
            provider,
            season,
            created = run.created,
            updated = run.updated,
            skipped = run.skipped,
            errors = run.errors,
            "team sync finished"
        );
        self.finalize(run, error_details).await
    }

    /// Sync a whole season's games. Already-stored games are counted
    /// as skipped without re-fetching their box score or PBP.
    pub async fn sync_season(
        &self,
        provider: &str,
        season: &str,
        include_pbp: bool,
    ) -> Result<SyncRun, SyncError> {
        self.run_season(provider, season, include_pbp, None).await
    }

    /// Streaming variant of [`sync_season`](Self::sync_season): the
    /// same pass, re-expressed as an ordered event sequence. The
    /// stream always terminates with [`SyncEvent::Completed`]; if the
    /// receiver is dropped, the sync stops at the next game boundary
    /// (in-flight per-game work completes to its transactional
    /// boundary first).
    pub fn sync_season_stream(
        self: &Arc<Self>,
        provider: &str,
        season: &str,
        include_pbp: bool,
    ) -> mpsc::Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel(32);
        let manager = self.clone();
        let provider = provider.to_string();
        let season = season.to_string();
        tokio::spawn(async move {
            if let Err(e) = manager
                .run_season(&provider, &season, include_pbp, Some(&tx))
                .await
            {
                warn!(provider, error = %e, "streaming season sync aborted");
            }
        });
        rx
    }

    /// Targeted re-sync of one stored game: refresh the game row from
    /// the provider's schedule, then replace box score (and optionally
    /// play-by-play). The game row must already exist; season sync
    /// creates it.
    pub async fn sync_game(
        &self,
        provider: &str,
        external_id: &str,
        include_pbp: bool,
    ) -> Result<SyncRun, SyncError> {
        let mut run = SyncRun::start(provider, SyncEntity::Game);
        execute_with_retry(|| self.store.insert_sync_run(&run), AUDIT_WRITE_ATTEMPTS).await?;

        let adapter = match self.adapter(provider) {
            Ok(a) => a,
            Err(e) => return self.finalize_failed(run, &e.to_string()).await,
        };
        let game = match self.store.game_by_external_id(provider, external_id).await {
            Ok(Some(g)) => g,
            Ok(None) => {
                return self
                    .finalize_failed(run, &format!("game '{external_id}' is not stored; sync the season first"))
                    .await;
            }
            Err(e) => return self.finalize_failed(run, &e.to_string()).await,
        };

        run.processed = 1;
        match self.resync_stored_game(adapter.as_ref(), game, include_pbp).await {
            Ok(()) => {
                run.updated = 1;
                self.finalize(run, Vec::new()).await
            }
            Err(e) => {
                run.errors = 1;
                let detail = vec![json!({ "game": external_id, "error": e.to_string() })];
                self.finalize(run, detail).await
            }
        }
    }

    /// Refresh a stored game's scores/status from the schedule, then
    /// re-sync its details. A game skipped by season sync can only
    /// move live to final here, so the schedule entry wins when it can
    /// be fetched; a failed schedule fetch keeps the stored row.
    async fn resync_stored_game(
        &self,
        adapter: &dyn ProviderAdapter,
        game: Game,
        include_pbp: bool,
    ) -> Result<(), SyncError> {
        let game = match adapter.get_schedule(&game.season).await {
            Ok(schedule) => {
                let mut refreshed = game;
                for raw in &schedule {
                    match adapter.converter().convert_game(raw) {
                        Ok(c) if c.external_id == refreshed.external_id => {
                            let (g, _) = self
                                .games
                                .sync_game(adapter.key(), &c, &refreshed.season)
                                .await?;
                            refreshed = g;
                            break;
                        }
                        _ => {}
                    }
                }
                refreshed
            }
            Err(e) => {
                warn!(
                    provider = adapter.key(),
                    game = %game.external_id,
                    error = %e,
                    "schedule refresh failed, keeping stored game row"
                );
                game
            }
        };
        self.sync_game_details(adapter, &game, include_pbp).await
    }

    /// Configured providers and the count of runs currently open.
    pub async fn get_sync_status(&self) -> Result<SyncStatusReport, SyncError> {
        let mut providers: Vec<ProviderStatus> = self
            .providers
            .values()
            .map(|p| ProviderStatus {
                key: p.adapter.key().to_string(),
                enabled: p.enabled,
            })
            .collect();
        providers.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(SyncStatusReport {
            providers,
            in_progress_runs: self.store.sync_runs_in_progress().await?,
        })
    }

    async fn run_season(
        &self,
        provider: &str,
        season: &str,
        include_pbp: bool,
        progress: Option<&mpsc::Sender<SyncEvent>>,
    ) -> Result<SyncRun, SyncError> {
        let mut run = SyncRun::start(provider, SyncEntity::Season);
        execute_with_retry(|| self.store.insert_sync_run(&run), AUDIT_WRITE_ATTEMPTS).await?;

        let adapter = match self.adapter(provider) {
            Ok(a) => a,
            Err(e) => {
                let run = self.finalize_failed(run, &e.to_string()).await?;
                emit(progress, SyncEvent::Completed { run: run.clone() }).await;
                return Ok(run);
            }
        };
        let schedule = match adapter.get_schedule(season).await {
            Ok(s) => s,
            Err(e) => {
                let run = self.finalize_failed(run, &e.to_string()).await?;
                emit(progress, SyncEvent::Completed { run: run.clone() }).await;
                return Ok(run);
            }
        };

        let total = schedule.len() as u32;
        let mut open = emit(
            progress,
            SyncEvent::Started {
                phase: "season".to_string(),
                total,
            },
        )
        .await;

        let mut error_details = Vec::new();
        for (i, raw_game) in schedule.iter().enumerate() {
            if progress.is_some() && !open {
                warn!(provider, season, "progress receiver dropped, stopping season sync");
                break;
            }
            run.processed += 1;

            let canonical = adapter.converter().convert_game(raw_game);
            let (external_id, status) = match &canonical {
                Ok(g) => (g.external_id.clone(), Some(g.status)),
                Err(_) => (format!("#{i}"), None),
            };
            open &= emit(
                progress,
                SyncEvent::Progress {
                    current: i as u32 + 1,
                    total,
                    game_external_id: external_id.clone(),
                    status,
                },
            )
            .await;

            let result = match canonical {
                Ok(g) => {
                    self.sync_one_game(adapter.as_ref(), &g, season, include_pbp)
                        .await
                }
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(Some(_)) => {
                    run.created += 1;
                    open &= emit(
                        progress,
                        SyncEvent::GameSynced {
                            game_external_id: external_id,
                        },
                    )
                    .await;
                }
                Ok(None) => run.skipped += 1,
                Err(e) => {
                    warn!(provider, game = %external_id, error = %e, "game sync failed");
                    run.errors += 1;
                    error_details.push(json!({ "game": external_id, "error": e.to_string() }));
                    open &= emit(
                        progress,
                        SyncEvent::GameError {
                            game_external_id: external_id,
                            error: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        }

        info!(
            provider,
            season,
            created = run.created,
            skipped = run.skipped,
            errors = run.errors,
            "season sync finished"
        );
        let run = self.finalize(run, error_details).await?;
        emit(progress, SyncEvent::Completed { run: run.clone() }).await;
        Ok(run)
    }

    /// One game of a season pass. `Ok(None)` means already stored and
    /// skipped.
    async fn sync_one_game(
        &self,
        adapter: &dyn ProviderAdapter,
        canonical: &CanonicalGame,
        season: &str,
        include_pbp: bool,
    ) -> Result<Option<Game>, SyncError> {
        if self
            .store
            .game_by_external_id(adapter.key(), &canonical.external_id)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let (game, _) = self.games.sync_game(adapter.key(), canonical, season).await?;
        self.sync_game_details(adapter, &game, include_pbp).await?;
        Ok(Some(game))
    }

    async fn sync_game_details(
        &self,
        adapter: &dyn ProviderAdapter,
        game: &Game,
        include_pbp: bool,
    ) -> Result<(), SyncError> {
        let raw_lines = adapter.get_game_boxscore(&game.external_id).await?;
        self.games.sync_boxscore(adapter, game, &raw_lines).await?;
        if include_pbp {
            let raw_events = adapter.get_game_pbp(&game.external_id).await?;
            self.games.sync_pbp(adapter, game, &raw_events).await?;
        }
        Ok(())
    }

    async fn finalize(
        &self,
        mut run: SyncRun,
        error_details: Vec<Value>,
    ) -> Result<SyncRun, SyncError> {
        run.status = if run.errors > 0 {
            SyncStatus::Partial
        } else {
            SyncStatus::Completed
        };
        if !error_details.is_empty() {
            run.error_detail = Some(Value::Array(error_details));
        }
        run.completed_at = Some(Utc::now());
        execute_with_retry(|| self.store.update_sync_run(&run), AUDIT_WRITE_ATTEMPTS).await?;
        Ok(run)
    }

    async fn finalize_failed(&self, mut run: SyncRun, message: &str) -> Result<SyncRun, SyncError> {
        warn!(provider = %run.provider, message, "sync run failed");
        run.status = SyncStatus::Failed;
        run.error_message = Some(message.to_string());
        run.completed_at = Some(Utc::now());
        execute_with_retry(|| self.store.update_sync_run(&run), AUDIT_WRITE_ATTEMPTS).await?;
        Ok(run)
    }
}

/// Send one progress event; `true` while the receiver is still
/// listening. A `None` sink always counts as open.
async fn emit(progress: Option<&mpsc::Sender<SyncEvent>>, event: SyncEvent) -> bool {
    match progress {
        Some(tx) => tx.send(event).await.is_ok(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::national::NationalFeedConverter;
    use crate::error::StoreError;
    use crate::models::{
        EventLink, PbpEvent, Player, PlayerGameLine, PlayerTeamHistory, Team, TeamGameLine,
        TeamSeason,
    };
    use crate::providers::ReplayProvider;
    use crate::store::{MemStore, StoreResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use uuid::Uuid;

    /// MemStore passthrough whose game lookups always fail.
    struct BrokenGameReads(MemStore);

    #[async_trait]
    impl Store for BrokenGameReads {
        async fn insert_team(&self, team: Team) -> StoreResult<Team> {
            self.0.insert_team(team).await
        }
        async fn update_team(&self, team: &Team) -> StoreResult<()> {
            self.0.update_team(team).await
        }
        async fn team_by_id(&self, id: Uuid) -> StoreResult<Option<Team>> {
            self.0.team_by_id(id).await
        }
        async fn team_by_external_id(
            &self,
            provider: &str,
            external_id: &str,
        ) -> StoreResult<Option<Team>> {
            self.0.team_by_external_id(provider, external_id).await
        }
        async fn all_teams(&self) -> StoreResult<Vec<Team>> {
            self.0.all_teams().await
        }
        async fn insert_team_season(&self, ts: TeamSeason) -> StoreResult<TeamSeason> {
            self.0.insert_team_season(ts).await
        }
        async fn update_team_season(&self, ts: &TeamSeason) -> StoreResult<()> {
            self.0.update_team_season(ts).await
        }
        async fn team_season(
            &self,
            team_id: Uuid,
            season: &str,
        ) -> StoreResult<Option<TeamSeason>> {
            self.0.team_season(team_id, season).await
        }
        async fn team_season_by_external_id(
            &self,
            season: &str,
            external_id: &str,
        ) -> StoreResult<Option<TeamSeason>> {
            self.0.team_season_by_external_id(season, external_id).await
        }
        async fn insert_player(&self, player: Player) -> StoreResult<Player> {
            self.0.insert_player(player).await
        }
        async fn update_player(&self, player: &Player) -> StoreResult<()> {
            self.0.update_player(player).await
        }
        async fn player_by_id(&self, id: Uuid) -> StoreResult<Option<Player>> {
            self.0.player_by_id(id).await
        }
        async fn player_by_external_id(
            &self,
            provider: &str,
            external_id: &str,
        ) -> StoreResult<Option<Player>> {
            self.0.player_by_external_id(provider, external_id).await
        }
        async fn players_by_last_name_keys(&self, keys: &[String]) -> StoreResult<Vec<Player>> {
            self.0.players_by_last_name_keys(keys).await
        }
        async fn all_players(&self) -> StoreResult<Vec<Player>> {
            self.0.all_players().await
        }
        async fn insert_membership(&self, m: PlayerTeamHistory) -> StoreResult<PlayerTeamHistory> {
            self.0.insert_membership(m).await
        }
        async fn update_membership(&self, m: &PlayerTeamHistory) -> StoreResult<()> {
            self.0.update_membership(m).await
        }
        async fn membership(
            &self,
            player_id: Uuid,
            team_id: Uuid,
            season: &str,
        ) -> StoreResult<Option<PlayerTeamHistory>> {
            self.0.membership(player_id, team_id, season).await
        }
        async fn membership_by_jersey(
            &self,
            team_id: Uuid,
            season: &str,
            jersey: i32,
        ) -> StoreResult<Option<PlayerTeamHistory>> {
            self.0.membership_by_jersey(team_id, season, jersey).await
        }
        async fn memberships_for_team(&self, team_id: Uuid) -> StoreResult<Vec<PlayerTeamHistory>> {
            self.0.memberships_for_team(team_id).await
        }
        async fn insert_game(&self, game: Game) -> StoreResult<Game> {
            self.0.insert_game(game).await
        }
        async fn update_game(&self, game: &Game) -> StoreResult<()> {
            self.0.update_game(game).await
        }
        async fn game_by_external_id(
            &self,
            _provider: &str,
            _external_id: &str,
        ) -> StoreResult<Option<Game>> {
            Err(StoreError::Backend("storage offline".to_string()))
        }
        async fn replace_boxscore(
            &self,
            game_id: Uuid,
            player_lines: Vec<PlayerGameLine>,
            team_lines: Vec<TeamGameLine>,
        ) -> StoreResult<()> {
            self.0.replace_boxscore(game_id, player_lines, team_lines).await
        }
        async fn player_lines_for_game(&self, game_id: Uuid) -> StoreResult<Vec<PlayerGameLine>> {
            self.0.player_lines_for_game(game_id).await
        }
        async fn team_lines_for_game(&self, game_id: Uuid) -> StoreResult<Vec<TeamGameLine>> {
            self.0.team_lines_for_game(game_id).await
        }
        async fn replace_pbp(
            &self,
            game_id: Uuid,
            events: Vec<PbpEvent>,
            links: Vec<EventLink>,
        ) -> StoreResult<()> {
            self.0.replace_pbp(game_id, events, links).await
        }
        async fn events_for_game(&self, game_id: Uuid) -> StoreResult<Vec<PbpEvent>> {
            self.0.events_for_game(game_id).await
        }
        async fn links_for_game(&self, game_id: Uuid) -> StoreResult<Vec<EventLink>> {
            self.0.links_for_game(game_id).await
        }
        async fn insert_sync_run(&self, run: &SyncRun) -> StoreResult<()> {
            self.0.insert_sync_run(run).await
        }
        async fn update_sync_run(&self, run: &SyncRun) -> StoreResult<()> {
            self.0.update_sync_run(run).await
        }
        async fn sync_runs_in_progress(&self) -> StoreResult<u32> {
            self.0.sync_runs_in_progress().await
        }
    }

    fn write_captures(dir: &Path) {
        std::fs::write(
            dir.join("teams.json"),
            json!([
                {"team_id": "1", "team_name": "Hapoel Holon"},
                {"team_id": "2", "team_name": "Maccabi Tel Aviv"}
            ])
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.join("schedule_2025-26.json"),
            json!([
                {"game_id": "g1", "home_team_id": "1", "away_team_id": "2",
                 "home_score": "88", "away_score": "80", "status": "final"}
            ])
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.join("boxscore_g1.json"),
            json!([
                {"player_id": "p1", "player_name": "Chris Babb", "jersey": "2",
                 "team_id": "1", "minutes": "30:00", "points": "12"},
                {"player_id": "p2", "player_name": "John DiBartolomeo", "jersey": "12",
                 "team_id": "2", "minutes": "25:00", "points": "9"}
            ])
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.join("pbp_g1.json"),
            json!([
                {"sequence": "1", "period": "1", "clock": "09:20", "event_type": "shot",
                 "team_id": "1", "player_id": "p1", "success": "1"},
                {"sequence": "2", "period": "1", "clock": "09:19", "event_type": "assist",
                 "team_id": "1", "player_id": "p2"}
            ])
            .to_string(),
        )
        .unwrap();
    }

    fn manager(dir: &Path) -> Arc<SyncManager> {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let mut m = SyncManager::new(store);
        m.register_provider(
            Arc::new(ReplayProvider::new(
                "ibl",
                Box::new(NationalFeedConverter),
                dir,
            )),
            true,
        );
        Arc::new(m)
    }

    #[tokio::test]
    async fn test_sync_teams_counts() {
        let dir = tempfile::tempdir().unwrap();
        write_captures(dir.path());
        let m = manager(dir.path());

        let run = m.sync_teams("ibl", "2025-26").await.unwrap();
        assert_eq!(run.status, SyncStatus::Completed);
        assert_eq!(run.processed, 2);
        assert_eq!(run.created, 2);
        assert!(run.completed_at.is_some());

        // Idempotent: second pass only skips.
        let run = m.sync_teams("ibl", "2025-26").await.unwrap();
        assert_eq!(run.created, 0);
        assert_eq!(run.skipped, 2);
    }

    #[tokio::test]
    async fn test_unknown_provider_still_leaves_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let run = m.sync_teams("nope", "2025-26").await.unwrap();
        assert_eq!(run.status, SyncStatus::Failed);
        assert!(run.completed_at.is_some());
        assert!(run.error_message.is_some());
    }

    #[tokio::test]
    async fn test_adapter_failure_on_first_call_marks_run_failed() {
        let dir = tempfile::tempdir().unwrap();
        // No capture files at all: get_teams fails immediately.
        let m = manager(dir.path());
        let run = m.sync_teams("ibl", "2025-26").await.unwrap();
        assert_eq!(run.status, SyncStatus::Failed);
        assert!(run.completed_at.is_some());
        assert_eq!(m.store.sync_runs_in_progress().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sync_season_then_skip_on_resync() {
        let dir = tempfile::tempdir().unwrap();
        write_captures(dir.path());
        let m = manager(dir.path());
        m.sync_teams("ibl", "2025-26").await.unwrap();

        let run = m.sync_season("ibl", "2025-26", true).await.unwrap();
        assert_eq!(run.status, SyncStatus::Completed);
        assert_eq!(run.created, 1);
        assert_eq!(run.errors, 0);

        let game = m
            .store
            .game_by_external_id("ibl", "g1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(game.home_score, 88);
        assert_eq!(m.store.player_lines_for_game(game.id).await.unwrap().len(), 2);
        assert_eq!(m.store.events_for_game(game.id).await.unwrap().len(), 2);
        // The feed declares no links, so the assist link is inferred.
        assert_eq!(m.store.links_for_game(game.id).await.unwrap().len(), 1);

        // Stored games are skipped, not re-fetched.
        let run = m.sync_season("ibl", "2025-26", true).await.unwrap();
        assert_eq!(run.created, 0);
        assert_eq!(run.skipped, 1);
    }

    #[tokio::test]
    async fn test_season_isolates_per_game_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_captures(dir.path());
        // Add a second game with no box-score capture.
        std::fs::write(
            dir.path().join("schedule_2025-26.json"),
            json!([
                {"game_id": "g1", "home_team_id": "1", "away_team_id": "2",
                 "home_score": "88", "away_score": "80", "status": "final"},
                {"game_id": "g2", "home_team_id": "2", "away_team_id": "1", "status": "final"}
            ])
            .to_string(),
        )
        .unwrap();
        let m = manager(dir.path());
        m.sync_teams("ibl", "2025-26").await.unwrap();

        let run = m.sync_season("ibl", "2025-26", false).await.unwrap();
        assert_eq!(run.status, SyncStatus::Partial);
        assert_eq!(run.created, 1);
        assert_eq!(run.errors, 1);
        assert!(run.error_detail.is_some());
        // The good game still landed.
        assert!(m.store.game_by_external_id("ibl", "g1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stream_orders_events_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        write_captures(dir.path());
        let m = manager(dir.path());
        m.sync_teams("ibl", "2025-26").await.unwrap();

        let mut rx = m.sync_season_stream("ibl", "2025-26", false);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }

        assert!(matches!(events.first(), Some(SyncEvent::Started { total: 1, .. })));
        assert!(matches!(
            events.get(1),
            Some(SyncEvent::Progress {
                current: 1,
                total: 1,
                game_external_id,
                status: Some(GameStatus::Final),
            }) if game_external_id == "g1"
        ));
        assert!(matches!(
            events.last(),
            Some(SyncEvent::Completed { run }) if run.status == SyncStatus::Completed
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, SyncEvent::GameSynced { game_external_id } if game_external_id == "g1")));
    }

    #[tokio::test]
    async fn test_targeted_game_resync() {
        let dir = tempfile::tempdir().unwrap();
        write_captures(dir.path());
        let m = manager(dir.path());
        m.sync_teams("ibl", "2025-26").await.unwrap();
        m.sync_season("ibl", "2025-26", false).await.unwrap();

        let run = m.sync_game("ibl", "g1", true).await.unwrap();
        assert_eq!(run.status, SyncStatus::Completed);
        assert_eq!(run.updated, 1);

        // Unknown game: run exists, marked failed.
        let run = m.sync_game("ibl", "g404", false).await.unwrap();
        assert_eq!(run.status, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_targeted_resync_moves_live_game_to_final() {
        let dir = tempfile::tempdir().unwrap();
        write_captures(dir.path());
        std::fs::write(
            dir.path().join("schedule_2025-26.json"),
            json!([
                {"game_id": "g1", "home_team_id": "1", "away_team_id": "2",
                 "home_score": "40", "away_score": "38", "status": "live"}
            ])
            .to_string(),
        )
        .unwrap();
        let m = manager(dir.path());
        m.sync_teams("ibl", "2025-26").await.unwrap();
        m.sync_season("ibl", "2025-26", false).await.unwrap();

        let game = m.store.game_by_external_id("ibl", "g1").await.unwrap().unwrap();
        assert_eq!(game.status, GameStatus::Live);

        // The schedule now reports the game finished. Season re-sync
        // skips stored games, so only the targeted path picks it up.
        std::fs::write(
            dir.path().join("schedule_2025-26.json"),
            json!([
                {"game_id": "g1", "home_team_id": "1", "away_team_id": "2",
                 "home_score": "88", "away_score": "80", "status": "final"}
            ])
            .to_string(),
        )
        .unwrap();
        let run = m.sync_season("ibl", "2025-26", false).await.unwrap();
        assert_eq!(run.skipped, 1);

        let run = m.sync_game("ibl", "g1", false).await.unwrap();
        assert_eq!(run.status, SyncStatus::Completed);
        let game = m.store.game_by_external_id("ibl", "g1").await.unwrap().unwrap();
        assert_eq!(game.status, GameStatus::Final);
        assert_eq!(game.home_score, 88);
        assert_eq!(game.away_score, 80);
    }

    #[tokio::test]
    async fn test_store_failure_during_targeted_sync_finalizes_run() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(BrokenGameReads(MemStore::new()));
        let mut m = SyncManager::new(store.clone());
        m.register_provider(
            Arc::new(ReplayProvider::new(
                "ibl",
                Box::new(NationalFeedConverter),
                dir.path(),
            )),
            true,
        );

        let run = m.sync_game("ibl", "g1", false).await.unwrap();
        assert_eq!(run.status, SyncStatus::Failed);
        assert!(run.completed_at.is_some());
        assert!(run.error_message.is_some());
        // The audit row is finalized, not stranded in progress.
        assert_eq!(store.sync_runs_in_progress().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_reports_providers_and_open_runs() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let status = m.get_sync_status().await.unwrap();
        assert_eq!(status.providers.len(), 1);
        assert_eq!(status.providers[0].key, "ibl");
        assert!(status.providers[0].enabled);
        assert_eq!(status.in_progress_runs, 0);
    }
}
