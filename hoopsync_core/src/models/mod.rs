//! Entity types shared across the engine.
//!
//! Two families live here: the *stored* entities (deduplicated teams,
//! players, games, box-score lines, play-by-play events, sync audit
//! rows) and the *canonical* structures produced by the per-provider
//! converters. External ids are kept as a provider-key → id map on each
//! deduplicated entity, one entry per provider that has ever supplied
//! it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Playing position, closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    PointGuard,
    ShootingGuard,
    SmallForward,
    PowerForward,
    Center,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::PointGuard => "point_guard",
            Position::ShootingGuard => "shooting_guard",
            Position::SmallForward => "small_forward",
            Position::PowerForward => "power_forward",
            Position::Center => "center",
        }
    }
}

/// Provider-agnostic game status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
}

/// Play-by-play event type, closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PbpEventKind {
    Shot,
    FreeThrow,
    Rebound,
    Assist,
    Steal,
    Block,
    Turnover,
    Foul,
    Substitution,
    Timeout,
    JumpBall,
    PeriodStart,
    PeriodEnd,
}

/// Deduplicated real-world team. At most one row per real-world club;
/// a provider's external id maps to exactly one team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub short_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// provider key -> that provider's external id
    pub external_ids: HashMap<String, String>,
}

/// Association of a team to one competition-edition, carrying the
/// competition-specific external id. Unique per (team, season).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSeason {
    pub id: Uuid,
    pub team_id: Uuid,
    pub season: String,
    pub external_id: Option<String>,
}

/// Deduplicated real-world player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub height_cm: Option<i32>,
    /// Order-preserving, may be empty.
    pub positions: Vec<Position>,
    pub external_ids: HashMap<String, String>,
}

impl Player {
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// A player's roster entry for a team within a season. Unique per
/// (player, team, season); the jersey number doubles as a secondary
/// identity key within that scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTeamHistory {
    pub id: Uuid,
    pub player_id: Uuid,
    pub team_id: Uuid,
    pub season: String,
    pub jersey: Option<i32>,
    pub positions: Vec<Position>,
}

/// One match, keyed per provider by external id. Re-sync updates
/// score/status in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub provider: String,
    pub external_id: String,
    pub season: String,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub home_score: i32,
    pub away_score: i32,
    pub status: GameStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Box-score counting stats shared by player and team lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatTotals {
    pub seconds_played: i32,
    pub points: i32,
    pub rebounds_off: i32,
    pub rebounds_def: i32,
    pub assists: i32,
    pub steals: i32,
    pub blocks: i32,
    pub turnovers: i32,
    pub fouls: i32,
    pub fg_made: i32,
    pub fg_attempted: i32,
    pub three_made: i32,
    pub three_attempted: i32,
    pub ft_made: i32,
    pub ft_attempted: i32,
}

impl StatTotals {
    pub fn rebounds_total(&self) -> i32 {
        self.rebounds_off + self.rebounds_def
    }

    /// Component-wise sum, used when rolling player lines up into a
    /// team line.
    pub fn add(&mut self, other: &StatTotals) {
        self.seconds_played += other.seconds_played;
        self.points += other.points;
        self.rebounds_off += other.rebounds_off;
        self.rebounds_def += other.rebounds_def;
        self.assists += other.assists;
        self.steals += other.steals;
        self.blocks += other.blocks;
        self.turnovers += other.turnovers;
        self.fouls += other.fouls;
        self.fg_made += other.fg_made;
        self.fg_attempted += other.fg_attempted;
        self.three_made += other.three_made;
        self.three_attempted += other.three_attempted;
        self.ft_made += other.ft_made;
        self.ft_attempted += other.ft_attempted;
    }
}

/// One box-score row per player per game. Regenerated wholesale on
/// every re-sync of a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerGameLine {
    pub id: Uuid,
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub team_id: Uuid,
    pub jersey: Option<i32>,
    pub stats: StatTotals,
}

/// One box-score row per team per game, a summation over that team's
/// player lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamGameLine {
    pub id: Uuid,
    pub game_id: Uuid,
    pub team_id: Uuid,
    pub stats: StatTotals,
}

/// One play-by-play event. Unique per (game, sequence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PbpEvent {
    pub id: Uuid,
    pub game_id: Uuid,
    pub sequence: i32,
    pub period: i32,
    /// Game clock, seconds remaining in the period.
    pub clock_seconds: i32,
    pub kind: PbpEventKind,
    pub sub_type: Option<String>,
    pub team_id: Option<Uuid>,
    pub player_id: Option<Uuid>,
    pub success: Option<bool>,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

/// Directed association between two events of the same game (e.g. an
/// assist pointing at the shot it created). Regenerated with the
/// events on re-sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLink {
    pub id: Uuid,
    pub game_id: Uuid,
    pub from_event_id: Uuid,
    pub to_event_id: Uuid,
}

/// Which entity family a sync run covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntity {
    Teams,
    Season,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InProgress,
    Completed,
    Failed,
    Partial,
}

/// Audit record for one sync invocation. Created at operation start,
/// finalized exactly once at completion; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub provider: String,
    pub entity: SyncEntity,
    pub status: SyncStatus,
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errors: u32,
    pub error_message: Option<String>,
    pub error_detail: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncRun {
    pub fn start(provider: &str, entity: SyncEntity) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.to_string(),
            entity,
            status: SyncStatus::InProgress,
            processed: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            errors: 0,
            error_message: None,
            error_detail: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

// ---------------------------------------------------------------------
// Canonical structures (converter output, provider-agnostic)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTeam {
    pub external_id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPlayer {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub height_cm: Option<i32>,
    pub positions: Vec<Position>,
    pub jersey: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGame {
    pub external_id: String,
    pub home_team_external_id: String,
    pub away_team_external_id: String,
    pub home_score: i32,
    pub away_score: i32,
    pub status: GameStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// One provider stat line. The player reference may be an external id,
/// a jersey number, a name, or any combination; resolution is the
/// deduplicator's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStatLine {
    pub player_external_id: Option<String>,
    pub player_name: String,
    pub jersey: Option<i32>,
    pub team_external_id: String,
    pub stats: StatTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPbpEvent {
    pub sequence: i32,
    pub period: i32,
    pub clock_seconds: i32,
    pub kind: PbpEventKind,
    pub sub_type: Option<String>,
    pub team_external_id: Option<String>,
    pub player_external_id: Option<String>,
    pub success: Option<bool>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    /// Sequence numbers of explicitly related events, if the provider
    /// supplies them.
    pub related_sequences: Vec<i32>,
}
