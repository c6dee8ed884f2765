//! Game syncer: game rows, box scores, play-by-play.
//!
//! Box scores and play-by-play are replaced wholesale per game on
//! every sync, so a re-sync can never leave stale rows behind. Stat
//! lines whose player cannot be resolved are skipped and logged, never
//! fatal for the game.

use std::collections::HashMap;
use std::sync::Arc;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::PlayerSyncer;
use crate::error::SyncError;
use crate::models::{
    CanonicalGame, CanonicalPbpEvent, CanonicalPlayer, CanonicalStatLine, EventLink, Game,
    PbpEvent, PbpEventKind, Player, PlayerGameLine, StatTotals, Team, TeamGameLine,
};
use crate::normalize::{names_equal, names_equal_fuzzy, parse_full_name};
use crate::providers::ProviderAdapter;
use crate::store::Store;

/// Link-inference windows, in game-clock seconds.
const ASSIST_AFTER_SHOT_SECS: i32 = 2;
const REBOUND_AFTER_MISS_SECS: i32 = 3;
const STEAL_AFTER_TURNOVER_SECS: i32 = 2;
const BLOCK_AFTER_MISS_SECS: i32 = 1;
const FREE_THROW_AFTER_FOUL_SECS: i32 = 5;

/// How many preceding events an inference scan may visit.
const LINK_LOOKBACK_EVENTS: usize = 10;

pub struct GameSyncer {
    store: Arc<dyn Store>,
    players: PlayerSyncer,
}

impl GameSyncer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            players: PlayerSyncer::new(store.clone()),
            store,
        }
    }

    /// Upsert one game. Both teams must already be known under this
    /// provider's external ids; games cannot be synced before teams.
    pub async fn sync_game(
        &self,
        provider: &str,
        canonical: &CanonicalGame,
        season: &str,
    ) -> Result<(Game, bool), SyncError> {
        let home = self
            .store
            .team_by_external_id(provider, &canonical.home_team_external_id)
            .await?;
        let away = self
            .store
            .team_by_external_id(provider, &canonical.away_team_external_id)
            .await?;
        let (home, away) = match (home, away) {
            (Some(h), Some(a)) => (h, a),
            _ => {
                return Err(SyncError::TeamsNotFound {
                    game_external_id: canonical.external_id.clone(),
                    home: canonical.home_team_external_id.clone(),
                    away: canonical.away_team_external_id.clone(),
                })
            }
        };

        if let Some(mut game) = self
            .store
            .game_by_external_id(provider, &canonical.external_id)
            .await?
        {
            game.home_score = canonical.home_score;
            game.away_score = canonical.away_score;
            game.status = canonical.status;
            if game.scheduled_at.is_none() {
                game.scheduled_at = canonical.scheduled_at;
            }
            self.store.update_game(&game).await?;
            return Ok((game, false));
        }

        let game = self
            .store
            .insert_game(Game {
                id: Uuid::new_v4(),
                provider: provider.to_string(),
                external_id: canonical.external_id.clone(),
                season: season.to_string(),
                home_team_id: home.id,
                away_team_id: away.id,
                home_score: canonical.home_score,
                away_score: canonical.away_score,
                status: canonical.status,
                scheduled_at: canonical.scheduled_at,
            })
            .await?;
        Ok((game, true))
    }

    /// Full-replace box-score sync. Returns the written lines plus how
    /// many provider lines were skipped as unresolvable.
    pub async fn sync_boxscore(
        &self,
        adapter: &dyn ProviderAdapter,
        game: &Game,
        raw_lines: &[Value],
    ) -> Result<(Vec<PlayerGameLine>, Vec<TeamGameLine>, u32), SyncError> {
        let provider = adapter.key();
        let mut player_lines = Vec::new();
        let mut skipped = 0u32;

        for raw in raw_lines {
            let line = match adapter.converter().convert_player_stats(raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!(game = %game.external_id, error = %e, "skipping malformed stat line");
                    skipped += 1;
                    continue;
                }
            };

            let Some(team) = self
                .store
                .team_by_external_id(provider, &line.team_external_id)
                .await?
            else {
                warn!(
                    game = %game.external_id,
                    team_external_id = %line.team_external_id,
                    "skipping stat line for unknown team"
                );
                skipped += 1;
                continue;
            };

            match self.resolve_stat_player(provider, &line, &team, &game.season).await? {
                Some(player) => {
                    player_lines.push(PlayerGameLine {
                        id: Uuid::new_v4(),
                        game_id: game.id,
                        player_id: player.id,
                        team_id: team.id,
                        jersey: line.jersey,
                        stats: line.stats,
                    });
                }
                None => {
                    warn!(
                        game = %game.external_id,
                        player = %line.player_name,
                        "skipping stat line for unresolvable player"
                    );
                    skipped += 1;
                }
            }
        }

        let team_lines = aggregate_team_lines(game.id, &player_lines);
        self.store
            .replace_boxscore(game.id, player_lines.clone(), team_lines.clone())
            .await?;
        Ok((player_lines, team_lines, skipped))
    }

    /// Full-replace play-by-play sync: events, then explicit links
    /// from declared related sequences, then inference for providers
    /// that do not declare any.
    pub async fn sync_pbp(
        &self,
        adapter: &dyn ProviderAdapter,
        game: &Game,
        raw_events: &[Value],
    ) -> Result<Vec<PbpEvent>, SyncError> {
        let provider = adapter.key();
        let mut canonicals: Vec<CanonicalPbpEvent> = Vec::new();
        for raw in raw_events {
            match adapter.converter().convert_pbp_event(raw) {
                Ok(ev) => canonicals.push(ev),
                Err(e) => {
                    warn!(game = %game.external_id, error = %e, "skipping malformed pbp event");
                }
            }
        }
        canonicals.sort_by_key(|ev| ev.sequence);

        // Provider references resolve best-effort; an unknown id just
        // leaves the reference empty.
        let mut team_cache: HashMap<String, Option<Uuid>> = HashMap::new();
        let mut player_cache: HashMap<String, Option<Uuid>> = HashMap::new();

        let mut events = Vec::with_capacity(canonicals.len());
        for ev in &canonicals {
            let team_id = match &ev.team_external_id {
                Some(ext) => match team_cache.get(ext) {
                    Some(cached) => *cached,
                    None => {
                        let id = self
                            .store
                            .team_by_external_id(provider, ext)
                            .await?
                            .map(|t| t.id);
                        team_cache.insert(ext.clone(), id);
                        id
                    }
                },
                None => None,
            };
            let player_id = match &ev.player_external_id {
                Some(ext) => match player_cache.get(ext) {
                    Some(cached) => *cached,
                    None => {
                        let id = self
                            .store
                            .player_by_external_id(provider, ext)
                            .await?
                            .map(|p| p.id);
                        player_cache.insert(ext.clone(), id);
                        id
                    }
                },
                None => None,
            };
            events.push(PbpEvent {
                id: Uuid::new_v4(),
                game_id: game.id,
                sequence: ev.sequence,
                period: ev.period,
                clock_seconds: ev.clock_seconds,
                kind: ev.kind,
                sub_type: ev.sub_type.clone(),
                team_id,
                player_id,
                success: ev.success,
                x: ev.x,
                y: ev.y,
            });
        }

        let by_sequence: HashMap<i32, Uuid> =
            events.iter().map(|e| (e.sequence, e.id)).collect();

        let mut links = Vec::new();
        let mut any_declared = false;
        for (ev, canonical) in events.iter().zip(&canonicals) {
            for related in &canonical.related_sequences {
                any_declared = true;
                if *related == ev.sequence {
                    continue;
                }
                match by_sequence.get(related) {
                    Some(target) => links.push(EventLink {
                        id: Uuid::new_v4(),
                        game_id: game.id,
                        from_event_id: ev.id,
                        to_event_id: *target,
                    }),
                    None => debug!(
                        game = %game.external_id,
                        sequence = ev.sequence,
                        related,
                        "declared link target not in batch"
                    ),
                }
            }
        }

        if !any_declared {
            links = infer_links(game.id, &events);
        }

        self.store.replace_pbp(game.id, events.clone(), links).await?;
        Ok(events)
    }

    /// Stat lines may carry a player id, a jersey, a name, or any
    /// combination. A known id wins; an unknown-but-present id runs
    /// the full dedup cascade and roster bookkeeping (same-provider
    /// feeds can disagree on player ids); otherwise jersey then
    /// roster name, else skip.
    async fn resolve_stat_player(
        &self,
        provider: &str,
        line: &CanonicalStatLine,
        team: &Team,
        season: &str,
    ) -> Result<Option<Player>, SyncError> {
        if let Some(ext) = &line.player_external_id {
            if let Some(p) = self.store.player_by_external_id(provider, ext).await? {
                // Keep the roster entry current even for known ids.
                self.players
                    .ensure_membership(&p, team, season, line.jersey)
                    .await?;
                return Ok(Some(p));
            }
            let (first_name, last_name) = parse_full_name(&line.player_name);
            let raw = CanonicalPlayer {
                external_id: ext.clone(),
                first_name,
                last_name,
                birth_date: None,
                height_cm: None,
                positions: vec![],
                jersey: line.jersey,
            };
            let (p, _) = self.players.sync_player(provider, &raw, team, season).await?;
            return Ok(Some(p));
        }

        if let Some(jersey) = line.jersey {
            if let Some(m) = self
                .store
                .membership_by_jersey(team.id, season, jersey)
                .await?
            {
                return Ok(self.store.player_by_id(m.player_id).await?);
            }
        }

        let (first, last) = parse_full_name(&line.player_name);
        let roster = self.players.deduplicator().find_all_by_team(team.id).await?;
        Ok(roster.into_iter().find(|p| {
            names_equal(&p.full_name(), &line.player_name)
                || (names_equal_fuzzy(&p.last_name, &last)
                    && !first.is_empty()
                    && names_equal(&p.first_name, &first))
        }))
    }
}

fn aggregate_team_lines(game_id: Uuid, player_lines: &[PlayerGameLine]) -> Vec<TeamGameLine> {
    let mut totals: HashMap<Uuid, StatTotals> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();
    for line in player_lines {
        if !totals.contains_key(&line.team_id) {
            order.push(line.team_id);
        }
        totals.entry(line.team_id).or_default().add(&line.stats);
    }
    order
        .into_iter()
        .map(|team_id| TeamGameLine {
            id: Uuid::new_v4(),
            game_id,
            team_id,
            stats: totals[&team_id],
        })
        .collect()
}

/// Scan each event backward against its predecessors (same period,
/// bounded look-back) and link the first qualifying one per rule.
fn infer_links(game_id: Uuid, events: &[PbpEvent]) -> Vec<EventLink> {
    let mut links = Vec::new();
    for (i, ev) in events.iter().enumerate() {
        let Some(rule) = LinkRule::for_kind(ev.kind) else {
            continue;
        };
        let target = events[..i]
            .iter()
            .rev()
            .take(LINK_LOOKBACK_EVENTS)
            .take_while(|prev| prev.period == ev.period)
            .find(|prev| rule.qualifies(ev, prev));
        if let Some(prev) = target {
            links.push(EventLink {
                id: Uuid::new_v4(),
                game_id,
                from_event_id: ev.id,
                to_event_id: prev.id,
            });
        }
    }
    links
}

struct LinkRule {
    predecessor: PbpEventKind,
    window_secs: i32,
    /// Required success flag on the predecessor, if any.
    predecessor_success: Option<bool>,
    team: TeamRelation,
}

enum TeamRelation {
    Same,
    Opposing,
    Any,
}

impl LinkRule {
    fn for_kind(kind: PbpEventKind) -> Option<Self> {
        match kind {
            PbpEventKind::Assist => Some(Self {
                predecessor: PbpEventKind::Shot,
                window_secs: ASSIST_AFTER_SHOT_SECS,
                predecessor_success: Some(true),
                team: TeamRelation::Same,
            }),
            PbpEventKind::Rebound => Some(Self {
                predecessor: PbpEventKind::Shot,
                window_secs: REBOUND_AFTER_MISS_SECS,
                predecessor_success: Some(false),
                team: TeamRelation::Any,
            }),
            PbpEventKind::Steal => Some(Self {
                predecessor: PbpEventKind::Turnover,
                window_secs: STEAL_AFTER_TURNOVER_SECS,
                predecessor_success: None,
                team: TeamRelation::Opposing,
            }),
            PbpEventKind::Block => Some(Self {
                predecessor: PbpEventKind::Shot,
                window_secs: BLOCK_AFTER_MISS_SECS,
                predecessor_success: Some(false),
                team: TeamRelation::Any,
            }),
            PbpEventKind::FreeThrow => Some(Self {
                predecessor: PbpEventKind::Foul,
                window_secs: FREE_THROW_AFTER_FOUL_SECS,
                predecessor_success: None,
                team: TeamRelation::Any,
            }),
            _ => None,
        }
    }

    fn qualifies(&self, ev: &PbpEvent, prev: &PbpEvent) -> bool {
        if prev.kind != self.predecessor {
            return false;
        }
        if let Some(required) = self.predecessor_success {
            if prev.success != Some(required) {
                return false;
            }
        }
        // Clock counts down within a period.
        let elapsed = prev.clock_seconds - ev.clock_seconds;
        if elapsed < 0 || elapsed > self.window_secs {
            return false;
        }
        match self.team {
            TeamRelation::Any => true,
            TeamRelation::Same => match (ev.team_id, prev.team_id) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            TeamRelation::Opposing => match (ev.team_id, prev.team_id) {
                (Some(a), Some(b)) => a != b,
                _ => false,
            },
        }
    }
}
