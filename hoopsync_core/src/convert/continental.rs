//! Converter for the continental competition feed ("eurocup").
//!
//! A typed feed: numeric fields arrive as numbers, heights in whole
//! centimeters, positions as letter codes, teams as club codes with
//! sponsor-prefixed display names. Play-by-play events carry explicit
//! related-sequence links.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{
    clock_to_seconds, int_field, opt_jersey, opt_str, req_id, req_str, validate_height_cm,
    CanonicalConverter,
};
use crate::error::ConversionError;
use crate::models::{
    CanonicalGame, CanonicalPbpEvent, CanonicalPlayer, CanonicalStatLine, CanonicalTeam,
    GameStatus, PbpEventKind, Position, StatTotals,
};

pub const PROVIDER: &str = "eurocup";

#[derive(Debug, Default)]
pub struct ContinentalFeedConverter;

impl ContinentalFeedConverter {
    pub fn new() -> Self {
        Self
    }
}

impl CanonicalConverter for ContinentalFeedConverter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn convert_team(&self, raw: &Value) -> Result<CanonicalTeam, ConversionError> {
        Ok(CanonicalTeam {
            external_id: req_id(raw, "code")?,
            name: req_str(raw, "name")?.to_string(),
            short_name: opt_str(raw, "shortName"),
            city: opt_str(raw, "city"),
            country: opt_str(raw, "countryCode"),
        })
    }

    fn convert_player(&self, raw: &Value) -> Result<CanonicalPlayer, ConversionError> {
        let height_cm = match raw.get("heightCm") {
            None | Some(Value::Null) => None,
            Some(_) => {
                let cm = int_field(raw, "heightCm")?;
                if cm == 0 {
                    None
                } else {
                    Some(validate_height_cm("heightCm", cm)?)
                }
            }
        };

        let positions = match opt_str(raw, "position") {
            Some(p) => parse_position_code(&p)?,
            None => Vec::new(),
        };

        let birth_date = match opt_str(raw, "birthDate") {
            Some(d) => Some(parse_birth_date("birthDate", &d)?),
            None => None,
        };

        Ok(CanonicalPlayer {
            external_id: req_id(raw, "personCode")?,
            first_name: req_str(raw, "firstName")?.to_string(),
            last_name: req_str(raw, "lastName")?.to_string(),
            birth_date,
            height_cm,
            positions,
            jersey: opt_jersey(raw, "dorsal"),
        })
    }

    fn convert_game(&self, raw: &Value) -> Result<CanonicalGame, ConversionError> {
        let played = raw.get("played").and_then(Value::as_bool).unwrap_or(false);
        let live = raw.get("live").and_then(Value::as_bool).unwrap_or(false);
        let status = if played {
            GameStatus::Final
        } else if live {
            GameStatus::Live
        } else {
            GameStatus::Scheduled
        };

        Ok(CanonicalGame {
            external_id: req_id(raw, "gameCode")?,
            home_team_external_id: req_id(raw, "localClub")?,
            away_team_external_id: req_id(raw, "roadClub")?,
            home_score: int_field(raw, "localScore")?,
            away_score: int_field(raw, "roadScore")?,
            status,
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
            player_external_id: opt_str(raw, "personCode"),
            player_name: req_str(raw, "playerName")?.to_string(),
            jersey: opt_jersey(raw, "dorsal"),
            team_external_id: req_id(raw, "clubCode")?,
            stats: StatTotals {
                seconds_played,
                points: int_field(raw, "points")?,
                rebounds_off: int_field(raw, "offensiveRebounds")?,
                rebounds_def: int_field(raw, "defensiveRebounds")?,
                assists: int_field(raw, "assists")?,
                steals: int_field(raw, "steals")?,
                blocks: int_field(raw, "blocks")?,
                turnovers: int_field(raw, "turnovers")?,
                fouls: int_field(raw, "foulsCommitted")?,
                fg_made: int_field(raw, "fieldGoalsMade")?,
                fg_attempted: int_field(raw, "fieldGoalsAttempted")?,
                three_made: int_field(raw, "threePointersMade")?,
                three_attempted: int_field(raw, "threePointersAttempted")?,
                ft_made: int_field(raw, "freeThrowsMade")?,
                ft_attempted: int_field(raw, "freeThrowsAttempted")?,
            },
        })
    }

    fn convert_pbp_event(&self, raw: &Value) -> Result<CanonicalPbpEvent, ConversionError> {
        let related_sequences = match raw.get("related") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut seqs = Vec::with_capacity(items.len());
                for item in items {
                    let seq = item.as_i64().ok_or_else(|| {
                        ConversionError::out_of_range("related", format!("bad entry {item}"))
                    })?;
                    seqs.push(seq as i32);
                }
                seqs
            }
            Some(other) => {
                return Err(ConversionError::out_of_range(
                    "related",
                    format!("unexpected value {other}"),
                ));
            }
        };

        Ok(CanonicalPbpEvent {
            sequence: int_field(raw, "seq")?,
            period: int_field(raw, "period")?,
            clock_seconds: clock_to_seconds("clock", req_str(raw, "clock")?)?,
            kind: parse_event_code(req_str(raw, "type")?)?,
            sub_type: opt_str(raw, "subType"),
            team_external_id: opt_str(raw, "clubCode"),
            player_external_id: opt_str(raw, "personCode"),
            success: raw.get("success").and_then(Value::as_bool),
            x: raw.get("coordX").and_then(Value::as_f64).map(|v| v as f32),
            y: raw.get("coordY").and_then(Value::as_f64).map(|v| v as f32),
            related_sequences,
        })
    }
}

/// Letter position codes to the closed vocabulary. Combined codes
/// ("G", "F", "G-F") expand to ordered lists.
fn parse_position_code(value: &str) -> Result<Vec<Position>, ConversionError> {
    let mut positions = Vec::new();
    for code in value.split(&['-', '/'][..]) {
        let expanded: &[Position] = match code.trim().to_uppercase().as_str() {
            "PG" => &[Position::PointGuard],
            "SG" => &[Position::ShootingGuard],
            "SF" => &[Position::SmallForward],
            "PF" => &[Position::PowerForward],
            "C" => &[Position::Center],
            "G" => &[Position::PointGuard, Position::ShootingGuard],
            "F" => &[Position::SmallForward, Position::PowerForward],
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

fn parse_event_code(value: &str) -> Result<PbpEventKind, ConversionError> {
    match value.to_uppercase().as_str() {
        "SHOT" => Ok(PbpEventKind::Shot),
        "FT" => Ok(PbpEventKind::FreeThrow),
        "REB" => Ok(PbpEventKind::Rebound),
        "AST" => Ok(PbpEventKind::Assist),
        "STL" => Ok(PbpEventKind::Steal),
        "BLK" => Ok(PbpEventKind::Block),
        "TOV" => Ok(PbpEventKind::Turnover),
        "FOUL" => Ok(PbpEventKind::Foul),
        "SUB" => Ok(PbpEventKind::Substitution),
        "TOUT" => Ok(PbpEventKind::Timeout),
        "JB" => Ok(PbpEventKind::JumpBall),
        "BP" => Ok(PbpEventKind::PeriodStart),
        "EP" => Ok(PbpEventKind::PeriodEnd),
        other => Err(ConversionError::unknown_value("type", other)),
    }
}

fn parse_birth_date(field: &str, value: &str) -> Result<chrono::NaiveDate, ConversionError> {
    // Sometimes a bare date, sometimes a full timestamp.
    let date_part = value.split('T').next().unwrap_or(value);
    chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| ConversionError::out_of_range(field, format!("'{value}' is not a date")))
}

fn parse_datetime(field: &str, value: &str) -> Result<DateTime<Utc>, ConversionError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ConversionError::out_of_range(field, format!("'{value}' is not RFC 3339")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_team() {
        let conv = ContinentalFeedConverter::new();
        let team = conv
            .convert_team(&json!({
                "code": "TEL",
                "name": "Maccabi Playtika Tel Aviv",
                "countryCode": "ISR",
            }))
            .unwrap();
        assert_eq!(team.external_id, "TEL");
        assert_eq!(team.country.as_deref(), Some("ISR"));
    }

    #[test]
    fn test_convert_player() {
        let conv = ContinentalFeedConverter::new();
        let player = conv
            .convert_player(&json!({
                "personCode": "P003421",
                "firstName": "Wade",
                "lastName": "Baldwin IV",
                "position": "G",
                "heightCm": 196,
                "dorsal": 4,
                "birthDate": "1996-04-29T00:00:00",
            }))
            .unwrap();
        assert_eq!(player.external_id, "P003421");
        assert_eq!(player.height_cm, Some(196));
        assert_eq!(
            player.positions,
            vec![Position::PointGuard, Position::ShootingGuard]
        );
        assert_eq!(
            player.birth_date,
            Some(chrono::NaiveDate::from_ymd_opt(1996, 4, 29).unwrap())
        );
    }

    #[test]
    fn test_convert_player_rejects_implausible_height() {
        let conv = ContinentalFeedConverter::new();
        let err = conv
            .convert_player(&json!({
                "personCode": "P1",
                "firstName": "A",
                "lastName": "B",
                "heightCm": 320,
            }))
            .unwrap_err();
        assert_eq!(err.field, "heightCm");
    }

    #[test]
    fn test_convert_game_status_from_flags() {
        let conv = ContinentalFeedConverter::new();
        let raw = json!({
            "gameCode": "E2024_124",
            "localClub": "TEL",
            "roadClub": "JER",
            "localScore": 89,
            "roadScore": 80,
            "played": true,
        });
        assert_eq!(conv.convert_game(&raw).unwrap().status, GameStatus::Final);

        let raw = json!({
            "gameCode": "E2024_125",
            "localClub": "TEL",
            "roadClub": "JER",
            "live": true,
        });
        assert_eq!(conv.convert_game(&raw).unwrap().status, GameStatus::Live);
    }

    #[test]
    fn test_convert_pbp_event_with_links() {
        let conv = ContinentalFeedConverter::new();
        let ev = conv
            .convert_pbp_event(&json!({
                "seq": 13,
                "period": 1,
                "clock": "07:42",
                "type": "AST",
                "clubCode": "TEL",
                "personCode": "P003421",
                "related": [12],
            }))
            .unwrap();
        assert_eq!(ev.kind, PbpEventKind::Assist);
        assert_eq!(ev.related_sequences, vec![12]);
    }

    #[test]
    fn test_convert_stats() {
        let conv = ContinentalFeedConverter::new();
        let line = conv
            .convert_player_stats(&json!({
                "personCode": "P003421",
                "playerName": "BALDWIN, WADE",
                "dorsal": 4,
                "clubCode": "TEL",
                "minutes": "28:17",
                "points": 18,
                "assists": 7,
                "defensiveRebounds": 3,
            }))
            .unwrap();
        assert_eq!(line.stats.seconds_played, 1697);
        assert_eq!(line.stats.assists, 7);
        assert_eq!(line.stats.rebounds_off, 0);
    }
}
