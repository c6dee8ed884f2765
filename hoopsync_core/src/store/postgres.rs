//! PostgreSQL [`Store`] implementation.
//!
//! Provider-id maps live in JSONB columns and are queried with the `@>`
//! containment operator, which the GIN index on those columns serves.
//! Composite replace operations run inside one transaction so a game's
//! box score or play-by-play is never observable half-written.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::env;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    EventLink, Game, PbpEvent, Player, PlayerGameLine, PlayerTeamHistory, StatTotals, SyncRun,
    Team, TeamGameLine, TeamSeason,
};
use crate::normalize::last_name_key;

use super::{Store, StoreResult};

/// Database pool configuration.
#[derive(Debug, Clone)]
pub struct DbPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),  // 5 minutes
            max_lifetime: Duration::from_secs(1800), // 30 minutes
        }
    }
}

impl DbPoolConfig {
    /// Create config from environment variables with fallback to the
    /// provided defaults.
    pub fn from_env_with_defaults(defaults: Self) -> Self {
        Self {
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_connections),
            acquire_timeout: env::var("DB_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
            idle_timeout: env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            max_lifetime: env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_lifetime),
        }
    }
}

/// Create a database connection pool with the given configuration.
pub async fn create_pool(database_url: &str, config: &DbPoolConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .context("Failed to create database connection pool")?;

    tracing::info!(
        "Database pool created: max={}, min={}, acquire_timeout={}s",
        config.max_connections,
        config.min_connections,
        config.acquire_timeout.as_secs()
    );

    Ok(pool)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, config: &DbPoolConfig) -> Result<Self> {
        Ok(Self::new(create_pool(database_url, config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// Snake-case enums (status, event kind, sync entity) travel as text
// columns; serde already owns the spelling.
fn enum_to_str<T: Serialize>(v: &T) -> Result<String, StoreError> {
    match serde_json::to_value(v) {
        Ok(Value::String(s)) => Ok(s),
        other => Err(StoreError::Backend(format!(
            "non-string enum encoding: {other:?}"
        ))),
    }
}

fn enum_from_str<T: DeserializeOwned>(s: &str) -> Result<T, StoreError> {
    serde_json::from_value(Value::String(s.to_string()))
        .map_err(|e| StoreError::Backend(format!("bad enum value '{s}': {e}")))
}

fn json_decode<T: DeserializeOwned>(v: Value, what: &str) -> Result<T, StoreError> {
    serde_json::from_value(v).map_err(|e| StoreError::Backend(format!("bad {what} column: {e}")))
}

fn json_encode<T: Serialize>(v: &T, what: &str) -> Result<Value, StoreError> {
    serde_json::to_value(v).map_err(|e| StoreError::Backend(format!("bad {what} value: {e}")))
}

fn team_from_row(row: &PgRow) -> Result<Team, StoreError> {
    Ok(Team {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        short_name: row.try_get("short_name")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        external_ids: json_decode(row.try_get("external_ids")?, "external_ids")?,
    })
}

fn team_season_from_row(row: &PgRow) -> Result<TeamSeason, StoreError> {
    Ok(TeamSeason {
        id: row.try_get("id")?,
        team_id: row.try_get("team_id")?,
        season: row.try_get("season")?,
        external_id: row.try_get("external_id")?,
    })
}

fn player_from_row(row: &PgRow) -> Result<Player, StoreError> {
    Ok(Player {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        birth_date: row.try_get("birth_date")?,
        height_cm: row.try_get("height_cm")?,
        positions: json_decode(row.try_get("positions")?, "positions")?,
        external_ids: json_decode(row.try_get("external_ids")?, "external_ids")?,
    })
}

fn membership_from_row(row: &PgRow) -> Result<PlayerTeamHistory, StoreError> {
    Ok(PlayerTeamHistory {
        id: row.try_get("id")?,
        player_id: row.try_get("player_id")?,
        team_id: row.try_get("team_id")?,
        season: row.try_get("season")?,
        jersey: row.try_get("jersey")?,
        positions: json_decode(row.try_get("positions")?, "positions")?,
    })
}

fn game_from_row(row: &PgRow) -> Result<Game, StoreError> {
    Ok(Game {
        id: row.try_get("id")?,
        provider: row.try_get("provider")?,
        external_id: row.try_get("external_id")?,
        season: row.try_get("season")?,
        home_team_id: row.try_get("home_team_id")?,
        away_team_id: row.try_get("away_team_id")?,
        home_score: row.try_get("home_score")?,
        away_score: row.try_get("away_score")?,
        status: enum_from_str(row.try_get::<String, _>("status")?.as_str())?,
        scheduled_at: row.try_get("scheduled_at")?,
    })
}

fn stats_from_row(row: &PgRow) -> Result<StatTotals, StoreError> {
    Ok(StatTotals {
        seconds_played: row.try_get("seconds_played")?,
        points: row.try_get("points")?,
        rebounds_off: row.try_get("rebounds_off")?,
        rebounds_def: row.try_get("rebounds_def")?,
        assists: row.try_get("assists")?,
        steals: row.try_get("steals")?,
        blocks: row.try_get("blocks")?,
        turnovers: row.try_get("turnovers")?,
        fouls: row.try_get("fouls")?,
        fg_made: row.try_get("fg_made")?,
        fg_attempted: row.try_get("fg_attempted")?,
        three_made: row.try_get("three_made")?,
        three_attempted: row.try_get("three_attempted")?,
        ft_made: row.try_get("ft_made")?,
        ft_attempted: row.try_get("ft_attempted")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<PbpEvent, StoreError> {
    Ok(PbpEvent {
        id: row.try_get("id")?,
        game_id: row.try_get("game_id")?,
        sequence: row.try_get("sequence")?,
        period: row.try_get("period")?,
        clock_seconds: row.try_get("clock_seconds")?,
        kind: enum_from_str(row.try_get::<String, _>("kind")?.as_str())?,
        sub_type: row.try_get("sub_type")?,
        team_id: row.try_get("team_id")?,
        player_id: row.try_get("player_id")?,
        success: row.try_get("success")?,
        x: row.try_get("x")?,
        y: row.try_get("y")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn insert_team(&self, team: Team) -> StoreResult<Team> {
        sqlx::query(
            "INSERT INTO teams (id, name, short_name, city, country, external_ids)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.short_name)
        .bind(&team.city)
        .bind(&team.country)
        .bind(json_encode(&team.external_ids, "external_ids")?)
        .execute(&self.pool)
        .await?;
        Ok(team)
    }

    async fn update_team(&self, team: &Team) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE teams
             SET name = $2, short_name = $3, city = $4, country = $5, external_ids = $6
             WHERE id = $1",
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.short_name)
        .bind(&team.city)
        .bind(&team.country)
        .bind(json_encode(&team.external_ids, "external_ids")?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("team {}", team.id)));
        }
        Ok(())
    }

    async fn team_by_id(&self, id: Uuid) -> StoreResult<Option<Team>> {
        let row = sqlx::query("SELECT * FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    async fn team_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Team>> {
        let row = sqlx::query(
            "SELECT * FROM teams
             WHERE external_ids @> jsonb_build_object($1::text, $2::text)",
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    async fn all_teams(&self) -> StoreResult<Vec<Team>> {
        let rows = sqlx::query("SELECT * FROM teams ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(team_from_row).collect()
    }

    async fn insert_team_season(&self, ts: TeamSeason) -> StoreResult<TeamSeason> {
        sqlx::query(
            "INSERT INTO team_seasons (id, team_id, season, external_id)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(ts.id)
        .bind(ts.team_id)
        .bind(&ts.season)
        .bind(&ts.external_id)
        .execute(&self.pool)
        .await?;
        Ok(ts)
    }

    async fn update_team_season(&self, ts: &TeamSeason) -> StoreResult<()> {
        let result = sqlx::query("UPDATE team_seasons SET external_id = $2 WHERE id = $1")
            .bind(ts.id)
            .bind(&ts.external_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("team season {}", ts.id)));
        }
        Ok(())
    }

    async fn team_season(&self, team_id: Uuid, season: &str) -> StoreResult<Option<TeamSeason>> {
        let row = sqlx::query("SELECT * FROM team_seasons WHERE team_id = $1 AND season = $2")
            .bind(team_id)
            .bind(season)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(team_season_from_row).transpose()
    }

    async fn team_season_by_external_id(
        &self,
        season: &str,
        external_id: &str,
    ) -> StoreResult<Option<TeamSeason>> {
        let row = sqlx::query("SELECT * FROM team_seasons WHERE season = $1 AND external_id = $2")
            .bind(season)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(team_season_from_row).transpose()
    }

    async fn insert_player(&self, player: Player) -> StoreResult<Player> {
        sqlx::query(
            "INSERT INTO players
               (id, first_name, last_name, last_name_key, birth_date, height_cm,
                positions, external_ids)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(player.id)
        .bind(&player.first_name)
        .bind(&player.last_name)
        .bind(last_name_key(&player.last_name))
        .bind(player.birth_date)
        .bind(player.height_cm)
        .bind(json_encode(&player.positions, "positions")?)
        .bind(json_encode(&player.external_ids, "external_ids")?)
        .execute(&self.pool)
        .await?;
        Ok(player)
    }

    async fn update_player(&self, player: &Player) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE players
             SET first_name = $2, last_name = $3, last_name_key = $4, birth_date = $5,
                 height_cm = $6, positions = $7, external_ids = $8
             WHERE id = $1",
        )
        .bind(player.id)
        .bind(&player.first_name)
        .bind(&player.last_name)
        .bind(last_name_key(&player.last_name))
        .bind(player.birth_date)
        .bind(player.height_cm)
        .bind(json_encode(&player.positions, "positions")?)
        .bind(json_encode(&player.external_ids, "external_ids")?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("player {}", player.id)));
        }
        Ok(())
    }

    async fn player_by_id(&self, id: Uuid) -> StoreResult<Option<Player>> {
        let row = sqlx::query("SELECT * FROM players WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(player_from_row).transpose()
    }

    async fn player_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Player>> {
        let row = sqlx::query(
            "SELECT * FROM players
             WHERE external_ids @> jsonb_build_object($1::text, $2::text)",
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(player_from_row).transpose()
    }

    async fn players_by_last_name_keys(&self, keys: &[String]) -> StoreResult<Vec<Player>> {
        let rows = sqlx::query("SELECT * FROM players WHERE last_name_key = ANY($1)")
            .bind(keys)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(player_from_row).collect()
    }

    async fn all_players(&self) -> StoreResult<Vec<Player>> {
        let rows = sqlx::query("SELECT * FROM players ORDER BY last_name, first_name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(player_from_row).collect()
    }

    async fn insert_membership(&self, m: PlayerTeamHistory) -> StoreResult<PlayerTeamHistory> {
        sqlx::query(
            "INSERT INTO player_team_history (id, player_id, team_id, season, jersey, positions)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(m.id)
        .bind(m.player_id)
        .bind(m.team_id)
        .bind(&m.season)
        .bind(m.jersey)
        .bind(json_encode(&m.positions, "positions")?)
        .execute(&self.pool)
        .await?;
        Ok(m)
    }

    async fn update_membership(&self, m: &PlayerTeamHistory) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE player_team_history SET jersey = $2, positions = $3 WHERE id = $1",
        )
        .bind(m.id)
        .bind(m.jersey)
        .bind(json_encode(&m.positions, "positions")?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("roster entry {}", m.id)));
        }
        Ok(())
    }

    async fn membership(
        &self,
        player_id: Uuid,
        team_id: Uuid,
        season: &str,
    ) -> StoreResult<Option<PlayerTeamHistory>> {
        let row = sqlx::query(
            "SELECT * FROM player_team_history
             WHERE player_id = $1 AND team_id = $2 AND season = $3",
        )
        .bind(player_id)
        .bind(team_id)
        .bind(season)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(membership_from_row).transpose()
    }

    async fn membership_by_jersey(
        &self,
        team_id: Uuid,
        season: &str,
        jersey: i32,
    ) -> StoreResult<Option<PlayerTeamHistory>> {
        let row = sqlx::query(
            "SELECT * FROM player_team_history
             WHERE team_id = $1 AND season = $2 AND jersey = $3
             LIMIT 1",
        )
        .bind(team_id)
        .bind(season)
        .bind(jersey)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(membership_from_row).transpose()
    }

    async fn memberships_for_team(&self, team_id: Uuid) -> StoreResult<Vec<PlayerTeamHistory>> {
        let rows = sqlx::query("SELECT * FROM player_team_history WHERE team_id = $1")
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(membership_from_row).collect()
    }

    async fn insert_game(&self, game: Game) -> StoreResult<Game> {
        sqlx::query(
            "INSERT INTO games
               (id, provider, external_id, season, home_team_id, away_team_id,
                home_score, away_score, status, scheduled_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(game.id)
        .bind(&game.provider)
        .bind(&game.external_id)
        .bind(&game.season)
        .bind(game.home_team_id)
        .bind(game.away_team_id)
        .bind(game.home_score)
        .bind(game.away_score)
        .bind(enum_to_str(&game.status)?)
        .bind(game.scheduled_at)
        .execute(&self.pool)
        .await?;
        Ok(game)
    }

    async fn update_game(&self, game: &Game) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE games
             SET home_score = $2, away_score = $3, status = $4, scheduled_at = $5
             WHERE id = $1",
        )
        .bind(game.id)
        .bind(game.home_score)
        .bind(game.away_score)
        .bind(enum_to_str(&game.status)?)
        .bind(game.scheduled_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("game {}", game.id)));
        }
        Ok(())
    }

    async fn game_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Game>> {
        let row = sqlx::query("SELECT * FROM games WHERE provider = $1 AND external_id = $2")
            .bind(provider)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(game_from_row).transpose()
    }

    async fn replace_boxscore(
        &self,
        game_id: Uuid,
        player_lines: Vec<PlayerGameLine>,
        team_lines: Vec<TeamGameLine>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM player_game_lines WHERE game_id = $1")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM team_game_lines WHERE game_id = $1")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;

        for line in &player_lines {
            sqlx::query(
                "INSERT INTO player_game_lines
                   (id, game_id, player_id, team_id, jersey, seconds_played, points,
                    rebounds_off, rebounds_def, assists, steals, blocks, turnovers, fouls,
                    fg_made, fg_attempted, three_made, three_attempted, ft_made, ft_attempted)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                         $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
            )
            .bind(line.id)
            .bind(line.game_id)
            .bind(line.player_id)
            .bind(line.team_id)
            .bind(line.jersey)
            .bind(line.stats.seconds_played)
            .bind(line.stats.points)
            .bind(line.stats.rebounds_off)
            .bind(line.stats.rebounds_def)
            .bind(line.stats.assists)
            .bind(line.stats.steals)
            .bind(line.stats.blocks)
            .bind(line.stats.turnovers)
            .bind(line.stats.fouls)
            .bind(line.stats.fg_made)
            .bind(line.stats.fg_attempted)
            .bind(line.stats.three_made)
            .bind(line.stats.three_attempted)
            .bind(line.stats.ft_made)
            .bind(line.stats.ft_attempted)
            .execute(&mut *tx)
            .await?;
        }

        for line in &team_lines {
            sqlx::query(
                "INSERT INTO team_game_lines
                   (id, game_id, team_id, seconds_played, points, rebounds_off, rebounds_def,
                    assists, steals, blocks, turnovers, fouls, fg_made, fg_attempted,
                    three_made, three_attempted, ft_made, ft_attempted)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                         $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            )
            .bind(line.id)
            .bind(line.game_id)
            .bind(line.team_id)
            .bind(line.stats.seconds_played)
            .bind(line.stats.points)
            .bind(line.stats.rebounds_off)
            .bind(line.stats.rebounds_def)
            .bind(line.stats.assists)
            .bind(line.stats.steals)
            .bind(line.stats.blocks)
            .bind(line.stats.turnovers)
            .bind(line.stats.fouls)
            .bind(line.stats.fg_made)
            .bind(line.stats.fg_attempted)
            .bind(line.stats.three_made)
            .bind(line.stats.three_attempted)
            .bind(line.stats.ft_made)
            .bind(line.stats.ft_attempted)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn player_lines_for_game(&self, game_id: Uuid) -> StoreResult<Vec<PlayerGameLine>> {
        let rows = sqlx::query("SELECT * FROM player_game_lines WHERE game_id = $1")
            .bind(game_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(PlayerGameLine {
                    id: row.try_get("id")?,
                    game_id: row.try_get("game_id")?,
                    player_id: row.try_get("player_id")?,
                    team_id: row.try_get("team_id")?,
                    jersey: row.try_get("jersey")?,
                    stats: stats_from_row(row)?,
                })
            })
            .collect()
    }

    async fn team_lines_for_game(&self, game_id: Uuid) -> StoreResult<Vec<TeamGameLine>> {
        let rows = sqlx::query("SELECT * FROM team_game_lines WHERE game_id = $1")
            .bind(game_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(TeamGameLine {
                    id: row.try_get("id")?,
                    game_id: row.try_get("game_id")?,
                    team_id: row.try_get("team_id")?,
                    stats: stats_from_row(row)?,
                })
            })
            .collect()
    }

    async fn replace_pbp(
        &self,
        game_id: Uuid,
        events: Vec<PbpEvent>,
        links: Vec<EventLink>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // Links reference events, so they go first.
        sqlx::query("DELETE FROM event_links WHERE game_id = $1")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pbp_events WHERE game_id = $1")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;

        for ev in &events {
            sqlx::query(
                "INSERT INTO pbp_events
                   (id, game_id, sequence, period, clock_seconds, kind, sub_type,
                    team_id, player_id, success, x, y)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(ev.id)
            .bind(ev.game_id)
            .bind(ev.sequence)
            .bind(ev.period)
            .bind(ev.clock_seconds)
            .bind(enum_to_str(&ev.kind)?)
            .bind(&ev.sub_type)
            .bind(ev.team_id)
            .bind(ev.player_id)
            .bind(ev.success)
            .bind(ev.x)
            .bind(ev.y)
            .execute(&mut *tx)
            .await?;
        }

        for link in &links {
            sqlx::query(
                "INSERT INTO event_links (id, game_id, from_event_id, to_event_id)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(link.id)
            .bind(link.game_id)
            .bind(link.from_event_id)
            .bind(link.to_event_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn events_for_game(&self, game_id: Uuid) -> StoreResult<Vec<PbpEvent>> {
        let rows = sqlx::query("SELECT * FROM pbp_events WHERE game_id = $1 ORDER BY sequence")
            .bind(game_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn links_for_game(&self, game_id: Uuid) -> StoreResult<Vec<EventLink>> {
        let rows = sqlx::query("SELECT * FROM event_links WHERE game_id = $1")
            .bind(game_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(EventLink {
                    id: row.try_get("id")?,
                    game_id: row.try_get("game_id")?,
                    from_event_id: row.try_get("from_event_id")?,
                    to_event_id: row.try_get("to_event_id")?,
                })
            })
            .collect()
    }

    async fn insert_sync_run(&self, run: &SyncRun) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sync_runs
               (id, provider, entity, status, processed, created, updated, skipped,
                errors, error_message, error_detail, started_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(run.id)
        .bind(&run.provider)
        .bind(enum_to_str(&run.entity)?)
        .bind(enum_to_str(&run.status)?)
        .bind(run.processed as i32)
        .bind(run.created as i32)
        .bind(run.updated as i32)
        .bind(run.skipped as i32)
        .bind(run.errors as i32)
        .bind(&run.error_message)
        .bind(&run.error_detail)
        .bind(run.started_at)
        .bind(run.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_sync_run(&self, run: &SyncRun) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE sync_runs
             SET status = $2, processed = $3, created = $4, updated = $5, skipped = $6,
                 errors = $7, error_message = $8, error_detail = $9, completed_at = $10
             WHERE id = $1",
        )
        .bind(run.id)
        .bind(enum_to_str(&run.status)?)
        .bind(run.processed as i32)
        .bind(run.created as i32)
        .bind(run.updated as i32)
        .bind(run.skipped as i32)
        .bind(run.errors as i32)
        .bind(&run.error_message)
        .bind(&run.error_detail)
        .bind(run.completed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("sync run {}", run.id)));
        }
        Ok(())
    }

    async fn sync_runs_in_progress(&self) -> StoreResult<u32> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sync_runs WHERE status = 'in_progress'")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u32)
    }
}
