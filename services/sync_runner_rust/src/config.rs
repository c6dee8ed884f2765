use anyhow::{bail, Result};
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub provider: String,
    pub season: String,
    pub replay_dir: String,
    pub entity: SyncTarget,
    pub include_pbp: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncTarget {
    Teams,
    Season,
    Game(String),
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let entity = match env::var("SYNC_ENTITY")
            .unwrap_or_else(|_| "season".to_string())
            .as_str()
        {
            "teams" => SyncTarget::Teams,
            "season" => SyncTarget::Season,
            "game" => match env::var("GAME_EXTERNAL_ID") {
                Ok(id) => SyncTarget::Game(id),
                Err(_) => bail!("SYNC_ENTITY=game requires GAME_EXTERNAL_ID"),
            },
            other => bail!("unknown SYNC_ENTITY '{other}' (teams, season, game)"),
        };

        let season = match env::var("SEASON") {
            Ok(s) => s,
            Err(_) => bail!("SEASON must be set (e.g. 2025-26)"),
        };
        let replay_dir = match env::var("REPLAY_DIR") {
            Ok(d) => d,
            Err(_) => bail!("REPLAY_DIR must be set"),
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            provider: env::var("PROVIDER").unwrap_or_else(|_| "ibl".to_string()),
            season,
            replay_dir,
            entity,
            include_pbp: env::var("INCLUDE_PBP")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
        })
    }
}
