//! Team resolution across providers.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{CanonicalTeam, Team, TeamSeason};
use crate::normalize::{normalize, team_names_equal};
use crate::store::{Store, StoreResult};

/// Club-type words stripped from the front of a team name when
/// inferring a city.
const CLUB_PREFIXES: &[&str] = &["maccabi", "hapoel", "elitzur", "ironi", "bnei", "as", "bc", "kk"];

/// Cap on generated short names (initials).
const SHORT_NAME_MAX: usize = 4;

pub struct TeamMatcher {
    store: Arc<dyn Store>,
}

impl TeamMatcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Exact lookup through the provider-id mapping.
    pub async fn get_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> StoreResult<Option<Team>> {
        self.store.team_by_external_id(provider, external_id).await
    }

    /// Scan existing teams for the first whose name satisfies
    /// [`team_names_equal`], optionally corroborated by normalized
    /// city. Linear in team count; team cardinality per deployment is
    /// tens to low hundreds.
    pub async fn match_across_providers(
        &self,
        name: &str,
        city: Option<&str>,
    ) -> StoreResult<Option<Team>> {
        let teams = self.store.all_teams().await?;
        Ok(teams
            .into_iter()
            .find(|team| {
                if !team_names_equal(&team.name, name) {
                    return false;
                }
                // When both sides carry a city, it must corroborate.
                match (city, team.city.as_deref()) {
                    (Some(query), Some(stored)) => normalize(query) == normalize(stored),
                    _ => true,
                }
            }))
    }

    /// Resolve a provider team record: exact id, then name match with
    /// id merge, then create.
    pub async fn find_or_create_team(
        &self,
        provider: &str,
        raw: &CanonicalTeam,
    ) -> StoreResult<Team> {
        if let Some(team) = self.get_by_external_id(provider, &raw.external_id).await? {
            return Ok(team);
        }

        if let Some(mut team) = self
            .match_across_providers(&raw.name, raw.city.as_deref())
            .await?
        {
            debug!(
                team = %team.name,
                provider,
                external_id = %raw.external_id,
                "matched team by name, merging provider id"
            );
            team.external_ids
                .insert(provider.to_string(), raw.external_id.clone());
            self.store.update_team(&team).await?;
            return Ok(team);
        }

        let city = raw.city.clone().or_else(|| infer_city(&raw.name));
        let short_name = raw.short_name.clone().or_else(|| initials(&raw.name));
        let mut team = Team {
            id: Uuid::new_v4(),
            name: raw.name.clone(),
            short_name,
            city,
            country: raw.country.clone(),
            external_ids: Default::default(),
        };
        team.external_ids
            .insert(provider.to_string(), raw.external_id.clone());
        let team = self.store.insert_team(team).await?;
        info!(team = %team.name, provider, "created team");
        Ok(team)
    }

    /// Resolve the team, then find-or-create its per-season membership
    /// row. The competition-specific external id is filled in only if
    /// not already set; a differing later value is logged and ignored.
    pub async fn find_or_create_team_season(
        &self,
        provider: &str,
        raw: &CanonicalTeam,
        season: &str,
    ) -> StoreResult<(Team, TeamSeason)> {
        let team = self.find_or_create_team(provider, raw).await?;

        if let Some(mut ts) = self.store.team_season(team.id, season).await? {
            match &ts.external_id {
                None => {
                    ts.external_id = Some(raw.external_id.clone());
                    self.store.update_team_season(&ts).await?;
                }
                Some(existing) if existing != &raw.external_id => {
                    warn!(
                        team = %team.name,
                        season,
                        existing = %existing,
                        incoming = %raw.external_id,
                        "conflicting season external id, keeping first"
                    );
                }
                Some(_) => {}
            }
            return Ok((team, ts));
        }

        let ts = self
            .store
            .insert_team_season(TeamSeason {
                id: Uuid::new_v4(),
                team_id: team.id,
                season: season.to_string(),
                external_id: Some(raw.external_id.clone()),
            })
            .await?;
        Ok((team, ts))
    }

    pub async fn get_team_season_by_external_id(
        &self,
        season: &str,
        external_id: &str,
    ) -> StoreResult<Option<TeamSeason>> {
        self.store
            .team_season_by_external_id(season, external_id)
            .await
    }
}

/// Strip leading club-type words; the remainder, if any, is the city.
fn infer_city(name: &str) -> Option<String> {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let stripped: Vec<&str> = tokens
        .iter()
        .copied()
        .skip_while(|t| CLUB_PREFIXES.contains(&t.to_lowercase().as_str()))
        .collect();
    if stripped.is_empty() || stripped.len() == tokens.len() {
        None
    } else {
        Some(stripped.join(" "))
    }
}

/// First letter of each token, uppercased, capped.
fn initials(name: &str) -> Option<String> {
    let s: String = name
        .split_whitespace()
        .filter_map(|t| t.chars().next())
        .take(SHORT_NAME_MAX)
        .flat_map(|c| c.to_uppercase())
        .collect();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
