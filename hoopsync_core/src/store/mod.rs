//! Storage collaborator interface.
//!
//! The engine never talks to a database directly; it goes through the
//! [`Store`] trait, which exposes per-entity reads/writes, the
//! predicate lookups the matchers need (provider-id mapping lookups,
//! roster scans, normalized-last-name candidate queries), and composite
//! replace operations that each backend commits as one transactional
//! unit. Unique-constraint collisions surface as
//! [`StoreError::UniqueViolation`](crate::error::StoreError).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    EventLink, Game, PbpEvent, Player, PlayerGameLine, PlayerTeamHistory, SyncRun, Team,
    TeamGameLine, TeamSeason,
};

pub mod memory;
pub mod postgres;
pub mod retry;

pub use memory::MemStore;
pub use postgres::{DbPoolConfig, PgStore};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // Teams
    async fn insert_team(&self, team: Team) -> StoreResult<Team>;
    async fn update_team(&self, team: &Team) -> StoreResult<()>;
    async fn team_by_id(&self, id: Uuid) -> StoreResult<Option<Team>>;
    /// Lookup through the provider-id mapping (a JSON-containment
    /// predicate on relational backends).
    async fn team_by_external_id(&self, provider: &str, external_id: &str)
        -> StoreResult<Option<Team>>;
    async fn all_teams(&self) -> StoreResult<Vec<Team>>;

    // Team seasons
    async fn insert_team_season(&self, ts: TeamSeason) -> StoreResult<TeamSeason>;
    async fn update_team_season(&self, ts: &TeamSeason) -> StoreResult<()>;
    async fn team_season(&self, team_id: Uuid, season: &str) -> StoreResult<Option<TeamSeason>>;
    async fn team_season_by_external_id(
        &self,
        season: &str,
        external_id: &str,
    ) -> StoreResult<Option<TeamSeason>>;

    // Players
    async fn insert_player(&self, player: Player) -> StoreResult<Player>;
    async fn update_player(&self, player: &Player) -> StoreResult<()>;
    async fn player_by_id(&self, id: Uuid) -> StoreResult<Option<Player>>;
    async fn player_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Player>>;
    /// Players whose last-name key (suffix-stripped, normalized last
    /// name) equals any of the given keys.
    async fn players_by_last_name_keys(&self, keys: &[String]) -> StoreResult<Vec<Player>>;
    async fn all_players(&self) -> StoreResult<Vec<Player>>;

    // Roster history
    async fn insert_membership(&self, m: PlayerTeamHistory) -> StoreResult<PlayerTeamHistory>;
    async fn update_membership(&self, m: &PlayerTeamHistory) -> StoreResult<()>;
    async fn membership(
        &self,
        player_id: Uuid,
        team_id: Uuid,
        season: &str,
    ) -> StoreResult<Option<PlayerTeamHistory>>;
    async fn membership_by_jersey(
        &self,
        team_id: Uuid,
        season: &str,
        jersey: i32,
    ) -> StoreResult<Option<PlayerTeamHistory>>;
    /// Every roster entry this team has ever had, any season.
    async fn memberships_for_team(&self, team_id: Uuid) -> StoreResult<Vec<PlayerTeamHistory>>;

    // Games
    async fn insert_game(&self, game: Game) -> StoreResult<Game>;
    async fn update_game(&self, game: &Game) -> StoreResult<()>;
    async fn game_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Game>>;

    // Box score: full replace per game, one transactional unit.
    async fn replace_boxscore(
        &self,
        game_id: Uuid,
        player_lines: Vec<PlayerGameLine>,
        team_lines: Vec<TeamGameLine>,
    ) -> StoreResult<()>;
    async fn player_lines_for_game(&self, game_id: Uuid) -> StoreResult<Vec<PlayerGameLine>>;
    async fn team_lines_for_game(&self, game_id: Uuid) -> StoreResult<Vec<TeamGameLine>>;

    // Play-by-play: full replace per game, one transactional unit.
    async fn replace_pbp(
        &self,
        game_id: Uuid,
        events: Vec<PbpEvent>,
        links: Vec<EventLink>,
    ) -> StoreResult<()>;
    async fn events_for_game(&self, game_id: Uuid) -> StoreResult<Vec<PbpEvent>>;
    async fn links_for_game(&self, game_id: Uuid) -> StoreResult<Vec<EventLink>>;

    // Sync audit
    async fn insert_sync_run(&self, run: &SyncRun) -> StoreResult<()>;
    async fn update_sync_run(&self, run: &SyncRun) -> StoreResult<()>;
    async fn sync_runs_in_progress(&self) -> StoreResult<u32>;
}
