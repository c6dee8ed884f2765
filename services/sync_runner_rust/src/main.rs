mod config;

use crate::config::{Config, SyncTarget};
use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hoopsync_core::convert::{ContinentalFeedConverter, NationalFeedConverter};
use hoopsync_core::models::{SyncRun, SyncStatus};
use hoopsync_core::providers::ReplayProvider;
use hoopsync_core::store::{DbPoolConfig, MemStore, PgStore, Store};
use hoopsync_core::sync::{SyncEvent, SyncManager};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Sync Runner...");

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool_config = DbPoolConfig::from_env_with_defaults(DbPoolConfig::default());
            let store = PgStore::connect(url, &pool_config)
                .await
                .context("Failed to connect to database")?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory storage (nothing will persist)");
            Arc::new(MemStore::new())
        }
    };

    let mut manager = SyncManager::new(store);
    match config.provider.as_str() {
        "ibl" => manager.register_provider(
            Arc::new(ReplayProvider::new(
                "ibl",
                Box::new(NationalFeedConverter::new()),
                config.replay_dir.clone(),
            )),
            true,
        ),
        "eurocup" => manager.register_provider(
            Arc::new(ReplayProvider::new(
                "eurocup",
                Box::new(ContinentalFeedConverter::new()),
                config.replay_dir.clone(),
            )),
            true,
        ),
        other => bail!("unknown provider '{other}' (ibl, eurocup)"),
    }
    let manager = Arc::new(manager);

    let run = match &config.entity {
        SyncTarget::Teams => manager.sync_teams(&config.provider, &config.season).await?,
        SyncTarget::Game(external_id) => {
            manager
                .sync_game(&config.provider, external_id, config.include_pbp)
                .await?
        }
        SyncTarget::Season => {
            // Teams first, so game syncs can resolve both sides.
            let teams_run = manager.sync_teams(&config.provider, &config.season).await?;
            report("teams", &teams_run);

            let mut rx =
                manager.sync_season_stream(&config.provider, &config.season, config.include_pbp);
            let mut summary = None;
            while let Some(event) = rx.recv().await {
                match event {
                    SyncEvent::Started { phase, total } => {
                        info!(phase, total, "season sync started")
                    }
                    SyncEvent::Progress {
                        current,
                        total,
                        game_external_id,
                        status,
                    } => info!(current, total, game = %game_external_id, status = ?status, "syncing"),
                    SyncEvent::GameSynced { game_external_id } => {
                        info!(game = %game_external_id, "game synced")
                    }
                    SyncEvent::GameError {
                        game_external_id,
                        error,
                    } => warn!(game = %game_external_id, error, "game failed"),
                    SyncEvent::Completed { run } => summary = Some(run),
                }
            }
            match summary {
                Some(run) => run,
                None => bail!("season sync stream ended without a summary"),
            }
        }
    };

    report("sync", &run);
    if run.status == SyncStatus::Failed {
        bail!(
            "sync run failed: {}",
            run.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn report(label: &str, run: &SyncRun) {
    info!(
        label,
        provider = %run.provider,
        status = ?run.status,
        processed = run.processed,
        created = run.created,
        updated = run.updated,
        skipped = run.skipped,
        errors = run.errors,
        "run finished"
    );
}
