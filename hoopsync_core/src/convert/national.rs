//! Converter for the national league feed ("ibl").
//!
//! This feed is stringly typed: numeric fields arrive as strings
//! (sometimes blank), heights as meters ("2.06"), positions as English
//! words, and game clocks as "MM:SS". It supplies no explicit links
//! between play-by-play events, so link inference runs downstream.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{
    clock_to_seconds, height_meters_to_cm, int_field, opt_jersey, opt_str, req_id, req_str,
    CanonicalConverter,
};
use crate::error::ConversionError;
use crate::models::{
    CanonicalGame, CanonicalPbpEvent, CanonicalPlayer, CanonicalStatLine, CanonicalTeam,
    GameStatus, PbpEventKind, Position, StatTotals,
};
use crate::normalize::parse_full_name;

pub const PROVIDER: &str = "ibl";

#[derive(Debug, Default)]
pub struct NationalFeedConverter;

impl NationalFeedConverter {
    pub fn new() -> Self {
        Self
    }
}

impl CanonicalConverter for NationalFeedConverter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn convert_team(&self, raw: &Value) -> Result<CanonicalTeam, ConversionError> {
        Ok(CanonicalTeam {
            external_id: req_id(raw, "team_id")?,
            name: req_str(raw, "team_name")?.to_string(),
            short_name: opt_str(raw, "short_name"),
            city: opt_str(raw, "city"),
            country: opt_str(raw, "country"),
        })
    }

    fn convert_player(&self, raw: &Value) -> Result<CanonicalPlayer, ConversionError> {
        let (first_name, last_name) = parse_full_name(req_str(raw, "player_name")?);

        let height_cm = match opt_str(raw, "height") {
            Some(h) => Some(height_meters_to_cm("height", &h)?),
            None => None,
        };

        let positions = match opt_str(raw, "position") {
            Some(p) => parse_position_words(&p)?,
            None => Vec::new(),
        };

        let birth_date = match opt_str(raw, "birth_date") {
            Some(d) => Some(parse_birth_date("birth_date", &d)?),
            None => None,
        };

        Ok(CanonicalPlayer {
            external_id: req_id(raw, "player_id")?,
            first_name,
            last_name,
            birth_date,
            height_cm,
            positions,
            jersey: opt_jersey(raw, "jersey"),
        })
    }

    fn convert_game(&self, raw: &Value) -> Result<CanonicalGame, ConversionError> {
        Ok(CanonicalGame {
            external_id: req_id(raw, "game_id")?,
            home_team_external_id: req_id(raw, "home_team_id")?,
            away_team_external_id: req_id(raw, "away_team_id")?,
            home_score: int_field(raw, "home_score")?,
            away_score: int_field(raw, "away_score")?,
            status: parse_status(req_str(raw, "status")?)?,
            scheduled_at: match opt_str(raw, "date") {
                Some(d) => Some(parse_datetime("date", &d)?),
                None => None,
            },
        })
    }

    fn convert_player_stats(&self, raw: &Value) -> Result<CanonicalStatLine, ConversionError> {
        let seconds_played = match opt_str(raw, "minutes") {
            Some(m) => clock_to_seconds("minutes", &m)?,
            None => 0,
        };

        Ok(CanonicalStatLine {
            player_external_id: opt_str(raw, "player_id"),
            player_name: req_str(raw, "player_name")?.to_string(),
            jersey: opt_jersey(raw, "jersey"),
            team_external_id: req_id(raw, "team_id")?,
            stats: StatTotals {
                seconds_played,
                points: int_field(raw, "points")?,
                rebounds_off: int_field(raw, "rebounds_off")?,
                rebounds_def: int_field(raw, "rebounds_def")?,
                assists: int_field(raw, "assists")?,
                steals: int_field(raw, "steals")?,
                blocks: int_field(raw, "blocks")?,
                turnovers: int_field(raw, "turnovers")?,
                fouls: int_field(raw, "fouls")?,
                fg_made: int_field(raw, "fg_made")?,
                fg_attempted: int_field(raw, "fg_attempted")?,
                three_made: int_field(raw, "three_made")?,
                three_attempted: int_field(raw, "three_attempted")?,
                ft_made: int_field(raw, "ft_made")?,
                ft_attempted: int_field(raw, "ft_attempted")?,
            },
        })
    }

    fn convert_pbp_event(&self, raw: &Value) -> Result<CanonicalPbpEvent, ConversionError> {
        let success = match opt_str(raw, "success").as_deref() {
            Some("1") => Some(true),
            Some("0") => Some(false),
            Some(other) => {
                return Err(ConversionError::unknown_value("success", other));
            }
            None => None,
        };

        Ok(CanonicalPbpEvent {
            sequence: int_field(raw, "sequence")?,
            period: int_field(raw, "period")?,
            clock_seconds: clock_to_seconds("clock", req_str(raw, "clock")?)?,
            kind: parse_event_kind(req_str(raw, "event_type")?)?,
            sub_type: opt_str(raw, "sub_type"),
            team_external_id: opt_str(raw, "team_id"),
            player_external_id: opt_str(raw, "player_id"),
            success,
            x: raw.get("x").and_then(Value::as_f64).map(|v| v as f32),
            y: raw.get("y").and_then(Value::as_f64).map(|v| v as f32),
            // The national feed never supplies explicit links.
            related_sequences: Vec::new(),
        })
    }
}

/// English position words to the closed vocabulary, as ordered lists.
fn parse_position_words(value: &str) -> Result<Vec<Position>, ConversionError> {
    let mut positions = Vec::new();
    for word in value.split(&['-', '/'][..]) {
        let expanded: &[Position] = match word.trim().to_lowercase().as_str() {
            "guard" => &[Position::PointGuard, Position::ShootingGuard],
            "forward" => &[Position::SmallForward, Position::PowerForward],
            "center" => &[Position::Center],
            "point guard" => &[Position::PointGuard],
            "shooting guard" => &[Position::ShootingGuard],
            "small forward" => &[Position::SmallForward],
            "power forward" => &[Position::PowerForward],
            other => return Err(ConversionError::unknown_value("position", other)),
        };
        for p in expanded {
            if !positions.contains(p) {
                positions.push(*p);
            }
        }
    }
    Ok(positions)
}

fn parse_status(value: &str) -> Result<GameStatus, ConversionError> {
    match value.to_lowercase().as_str() {
        "scheduled" | "upcoming" => Ok(GameStatus::Scheduled),
        "live" | "in_progress" => Ok(GameStatus::Live),
        "final" | "finished" | "ended" => Ok(GameStatus::Final),
        other => Err(ConversionError::unknown_value("status", other)),
    }
}

fn parse_event_kind(value: &str) -> Result<PbpEventKind, ConversionError> {
    match value.to_lowercase().as_str() {
        "shot" => Ok(PbpEventKind::Shot),
        "free_throw" => Ok(PbpEventKind::FreeThrow),
        "rebound" => Ok(PbpEventKind::Rebound),
        "assist" => Ok(PbpEventKind::Assist),
        "steal" => Ok(PbpEventKind::Steal),
        "block" => Ok(PbpEventKind::Block),
        "turnover" => Ok(PbpEventKind::Turnover),
        "foul" => Ok(PbpEventKind::Foul),
        "substitution" => Ok(PbpEventKind::Substitution),
        "timeout" => Ok(PbpEventKind::Timeout),
        "jump_ball" => Ok(PbpEventKind::JumpBall),
        "period_start" => Ok(PbpEventKind::PeriodStart),
        "period_end" => Ok(PbpEventKind::PeriodEnd),
        other => Err(ConversionError::unknown_value("event_type", other)),
    }
}

fn parse_birth_date(field: &str, value: &str) -> Result<chrono::NaiveDate, ConversionError> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ConversionError::out_of_range(field, format!("'{value}' is not YYYY-MM-DD")))
}

fn parse_datetime(field: &str, value: &str) -> Result<DateTime<Utc>, ConversionError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ConversionError::out_of_range(field, format!("'{value}' is not RFC 3339")))
}
