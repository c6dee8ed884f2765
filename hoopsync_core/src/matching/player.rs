//! Tiered player deduplication.
//!
//! Resolution runs a strict tier order and short-circuits at the first
//! hit: provider external id, jersey-on-roster, team-roster name
//! match, global biographical match, create. The later tiers widen
//! recall, so each carries a guard: roster name matching excludes
//! players already mapped to the incoming provider, and the global
//! tier never accepts on name alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CanonicalPlayer, Player, Team};
use crate::normalize::{last_name_key, names_equal, names_equal_fuzzy, normalize};
use crate::store::{Store, StoreResult};

/// Height agreement tolerance for the global biographical tier,
/// inclusive.
const HEIGHT_TOLERANCE_CM: i32 = 3;

pub struct PlayerDeduplicator {
    store: Arc<dyn Store>,
}

impl PlayerDeduplicator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve an incoming provider player record to an existing
    /// Player or create one. `team` and `season` scope the roster
    /// tiers when available.
    pub async fn find_or_create_player(
        &self,
        provider: &str,
        raw: &CanonicalPlayer,
        team: Option<&Team>,
        season: Option<&str>,
    ) -> StoreResult<Player> {
        // Tier 1: exact external id.
        if let Some(mut player) = self
            .store
            .player_by_external_id(provider, &raw.external_id)
            .await?
        {
            if backfill_bio(&mut player, raw) {
                self.store.update_player(&player).await?;
            }
            return Ok(player);
        }

        // Tier 2: jersey on roster.
        if let (Some(team), Some(season), Some(jersey)) = (team, season, raw.jersey) {
            if let Some(membership) = self
                .store
                .membership_by_jersey(team.id, season, jersey)
                .await?
            {
                if let Some(player) = self.store.player_by_id(membership.player_id).await? {
                    debug!(
                        player = %player.full_name(),
                        team = %team.name,
                        jersey,
                        "matched player by roster jersey"
                    );
                    return self.merge_external_id(player, provider, &raw.external_id, Some(raw)).await;
                }
            }
        }

        // Tier 3: name match within the team's roster.
        if let Some(team) = team {
            if let Some(player) = self.roster_name_match(provider, raw, team).await? {
                debug!(
                    player = %player.full_name(),
                    team = %team.name,
                    "matched player by roster name"
                );
                return self.merge_external_id(player, provider, &raw.external_id, Some(raw)).await;
            }
        }

        // Tier 4: global biographical match.
        if let Some(player) = self.global_bio_match(provider, raw).await? {
            debug!(player = %player.full_name(), "matched player biographically");
            return self.merge_external_id(player, provider, &raw.external_id, Some(raw)).await;
        }

        // Tier 5: create.
        let mut player = Player {
            id: Uuid::new_v4(),
            first_name: raw.first_name.clone(),
            last_name: raw.last_name.clone(),
            birth_date: raw.birth_date,
            height_cm: raw.height_cm,
            positions: raw.positions.clone(),
            external_ids: Default::default(),
        };
        player
            .external_ids
            .insert(provider.to_string(), raw.external_id.clone());
        let player = self.store.insert_player(player).await?;
        info!(player = %player.full_name(), provider, "created player");
        Ok(player)
    }

    /// Add or overwrite one provider mapping, optionally backfilling
    /// empty biographical fields from the payload.
    pub async fn merge_external_id(
        &self,
        mut player: Player,
        provider: &str,
        external_id: &str,
        raw: Option<&CanonicalPlayer>,
    ) -> StoreResult<Player> {
        player
            .external_ids
            .insert(provider.to_string(), external_id.to_string());
        if let Some(raw) = raw {
            backfill_bio(&mut player, raw);
        }
        self.store.update_player(&player).await?;
        Ok(player)
    }

    /// Every distinct player with a roster entry for this team, any
    /// season.
    pub async fn find_all_by_team(&self, team_id: Uuid) -> StoreResult<Vec<Player>> {
        let memberships = self.store.memberships_for_team(team_id).await?;
        let mut seen = HashSet::new();
        let mut players = Vec::new();
        for m in memberships {
            if seen.insert(m.player_id) {
                if let Some(p) = self.store.player_by_id(m.player_id).await? {
                    players.push(p);
                }
            }
        }
        Ok(players)
    }

    /// Offline audit query: pairs of players that share a full name,
    /// or a last name plus birth date. For human review, never merged
    /// automatically.
    pub async fn find_potential_duplicates(&self) -> StoreResult<Vec<(Player, Player)>> {
        let players = self.store.all_players().await?;

        let mut by_full_name: HashMap<(String, String), Vec<&Player>> = HashMap::new();
        let mut by_last_birth: HashMap<(String, String), Vec<&Player>> = HashMap::new();
        for p in &players {
            by_full_name
                .entry((p.first_name.to_lowercase(), p.last_name.to_lowercase()))
                .or_default()
                .push(p);
            if let Some(bd) = p.birth_date {
                by_last_birth
                    .entry((p.last_name.to_lowercase(), bd.to_string()))
                    .or_default()
                    .push(p);
            }
        }

        let mut seen_pairs = HashSet::new();
        let mut pairs = Vec::new();
        for group in by_full_name.values().chain(by_last_birth.values()) {
            for (i, a) in group.iter().enumerate() {
                for b in &group[i + 1..] {
                    let key = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };
                    if seen_pairs.insert(key) {
                        pairs.push(((*a).clone(), (*b).clone()));
                    }
                }
            }
        }
        Ok(pairs)
    }

    async fn roster_name_match(
        &self,
        provider: &str,
        raw: &CanonicalPlayer,
        team: &Team,
    ) -> StoreResult<Option<Player>> {
        let full = full_name(raw);
        let roster = self.find_all_by_team(team.id).await?;
        Ok(roster.into_iter().find(|p| {
            // A player already mapped to this provider would have hit
            // tier 1; matching it here on name would be a self-match.
            if p.external_ids.contains_key(provider) {
                return false;
            }
            names_equal(&p.full_name(), &full)
                || (names_equal_fuzzy(&p.last_name, &raw.last_name)
                    && first_initial_matches(&p.first_name, &raw.first_name))
        }))
    }

    async fn global_bio_match(
        &self,
        provider: &str,
        raw: &CanonicalPlayer,
    ) -> StoreResult<Option<Player>> {
        // Name alone is never sufficient at global scope.
        if raw.birth_date.is_none() && raw.height_cm.is_none() {
            return Ok(None);
        }

        let mut keys = vec![normalize(&raw.last_name), last_name_key(&raw.last_name)];
        keys.dedup();
        let full = full_name(raw);

        let mut matches: Vec<Player> = self
            .store
            .players_by_last_name_keys(&keys)
            .await?
            .into_iter()
            .filter(|p| !p.external_ids.contains_key(provider))
            .filter(|p| {
                names_equal(&p.full_name(), &full)
                    || names_equal_fuzzy(&p.full_name(), &full)
                    || (names_equal_fuzzy(&p.last_name, &raw.last_name)
                        && first_initial_matches(&p.first_name, &raw.first_name))
            })
            .collect();

        if let Some(bd) = raw.birth_date {
            let exact: Vec<Player> = matches
                .iter()
                .filter(|p| p.birth_date == Some(bd))
                .cloned()
                .collect();
            if !exact.is_empty() {
                matches = exact;
            }
        }
        if matches.len() > 1 {
            if let Some(h) = raw.height_cm {
                let close: Vec<Player> = matches
                    .iter()
                    .filter(|p| {
                        p.height_cm
                            .map_or(false, |ph| (ph - h).abs() <= HEIGHT_TOLERANCE_CM)
                    })
                    .cloned()
                    .collect();
                if !close.is_empty() {
                    matches = close;
                }
            }
        }

        if matches.len() != 1 {
            return Ok(None);
        }
        let candidate = matches.remove(0);
        if contradicts(&candidate, raw) {
            return Ok(None);
        }
        Ok(Some(candidate))
    }
}

fn full_name(raw: &CanonicalPlayer) -> String {
    if raw.last_name.is_empty() {
        raw.first_name.clone()
    } else {
        format!("{} {}", raw.first_name, raw.last_name)
    }
}

fn first_initial_matches(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    match (a.chars().next(), b.chars().next()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// A populated candidate field that disagrees with a supplied payload
/// field blocks the match. Absence on either side is only "no
/// contradiction," never a match signal.
fn contradicts(candidate: &Player, raw: &CanonicalPlayer) -> bool {
    if let (Some(a), Some(b)) = (candidate.birth_date, raw.birth_date) {
        if a != b {
            return true;
        }
    }
    if let (Some(a), Some(b)) = (candidate.height_cm, raw.height_cm) {
        if (a - b).abs() > HEIGHT_TOLERANCE_CM {
            return true;
        }
    }
    false
}

/// Fill empty biographical fields from the payload; never overwrite a
/// populated one. Returns whether anything changed.
fn backfill_bio(player: &mut Player, raw: &CanonicalPlayer) -> bool {
    let mut changed = false;
    if player.positions.is_empty() && !raw.positions.is_empty() {
        player.positions = raw.positions.clone();
        changed = true;
    }
    if player.height_cm.is_none() && raw.height_cm.is_some() {
        player.height_cm = raw.height_cm;
        changed = true;
    }
    if player.birth_date.is_none() && raw.birth_date.is_some() {
        player.birth_date = raw.birth_date;
        changed = true;
    }
    changed
}
