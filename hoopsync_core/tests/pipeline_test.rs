//! Cross-Provider Pipeline Tests
//!
//! Drives the full sync path over replay captures from two providers
//! that cover the same league: the stringly national feed ("ibl") and
//! the typed continental feed ("eurocup"). Verifies that teams and
//! players resolve to single canonical entities across both sources
//! and that repeated runs never grow the stored data.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use hoopsync_core::convert::{ContinentalFeedConverter, NationalFeedConverter};
use hoopsync_core::models::SyncStatus;
use hoopsync_core::providers::ReplayProvider;
use hoopsync_core::store::{MemStore, Store};
use hoopsync_core::sync::SyncManager;

const SEASON: &str = "2025-26";

fn write_national_captures(dir: &Path) {
    std::fs::write(
        dir.join("teams.json"),
        json!([
            {"team_id": "77", "team_name": "Maccabi Tel Aviv", "city": "Tel Aviv"},
            {"team_id": "12", "team_name": "Hapoel Jerusalem", "city": "Jerusalem"}
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join(format!("schedule_{SEASON}.json")),
        json!([
            {"game_id": "g100", "home_team_id": "77", "away_team_id": "12",
             "home_score": "89", "away_score": "80", "status": "final"}
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join("boxscore_g100.json"),
        json!([
            {"player_id": "3021", "player_name": "Wade Baldwin IV", "jersey": "4",
             "team_id": "77", "minutes": "31:25", "points": "22", "assists": "6"},
            {"player_id": "8812", "player_name": "Yovel Zoosman", "jersey": "19",
             "team_id": "12", "minutes": "27:00", "points": "10"}
        ])
        .to_string(),
    )
    .unwrap();
    // The national feed declares no event links.
    std::fs::write(
        dir.join("pbp_g100.json"),
        json!([
            {"sequence": "1", "period": "1", "clock": "09:20", "event_type": "shot",
             "team_id": "77", "player_id": "3021", "success": "1"},
            {"sequence": "2", "period": "1", "clock": "09:19", "event_type": "assist",
             "team_id": "77", "player_id": "3021"}
        ])
        .to_string(),
    )
    .unwrap();
}

fn write_continental_captures(dir: &Path) {
    std::fs::write(
        dir.join("teams.json"),
        json!([
            {"code": "TEL", "name": "Maccabi Playtika Tel Aviv", "city": "Tel Aviv",
             "countryCode": "ISR"},
            {"code": "JER", "name": "Hapoel Bank Yahav Jerusalem", "city": "Jerusalem",
             "countryCode": "ISR"}
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join(format!("schedule_{SEASON}.json")),
        json!([
            {"gameCode": "E_1", "localClub": "TEL", "roadClub": "JER",
             "localScore": 78, "roadScore": 75, "played": true}
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join("boxscore_E_1.json"),
        json!([
            {"personCode": "P003421", "playerName": "BALDWIN, WADE", "dorsal": 4,
             "clubCode": "TEL", "minutes": "28:17", "points": 18, "assists": 7},
            {"personCode": "P009917", "playerName": "ZOOSMAN, YOVEL", "dorsal": 19,
             "clubCode": "JER", "minutes": "25:40", "points": 9}
        ])
        .to_string(),
    )
    .unwrap();
    // The continental feed carries explicit related-sequence links.
    std::fs::write(
        dir.join("pbp_E_1.json"),
        json!([
            {"seq": 5, "period": 1, "clock": "08:11", "type": "SHOT",
             "clubCode": "TEL", "personCode": "P003421", "success": true},
            {"seq": 6, "period": 1, "clock": "08:10", "type": "AST",
             "clubCode": "TEL", "personCode": "P003421", "related": [5]}
        ])
        .to_string(),
    )
    .unwrap();
}

fn setup(root: &Path) -> (Arc<dyn Store>, Arc<SyncManager>) {
    let ibl_dir = root.join("ibl");
    let eurocup_dir = root.join("eurocup");
    std::fs::create_dir_all(&ibl_dir).unwrap();
    std::fs::create_dir_all(&eurocup_dir).unwrap();
    write_national_captures(&ibl_dir);
    write_continental_captures(&eurocup_dir);

    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let mut manager = SyncManager::new(store.clone());
    manager.register_provider(
        Arc::new(ReplayProvider::new(
            "ibl",
            Box::new(NationalFeedConverter),
            ibl_dir,
        )),
        true,
    );
    manager.register_provider(
        Arc::new(ReplayProvider::new(
            "eurocup",
            Box::new(ContinentalFeedConverter),
            eurocup_dir,
        )),
        true,
    );
    (store, Arc::new(manager))
}

#[tokio::test]
async fn test_teams_resolve_across_providers() {
    let root = tempfile::tempdir().unwrap();
    let (store, manager) = setup(root.path());

    manager.sync_teams("ibl", SEASON).await.unwrap();
    let run = manager.sync_teams("eurocup", SEASON).await.unwrap();
    assert_eq!(run.status, SyncStatus::Completed);
    // Sponsor-prefixed continental names land on the existing teams.
    assert_eq!(run.updated, 2);

    let teams = store.all_teams().await.unwrap();
    assert_eq!(teams.len(), 2);

    let maccabi = store
        .team_by_external_id("ibl", "77")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(maccabi.external_ids.get("eurocup").map(String::as_str), Some("TEL"));
}

#[tokio::test]
async fn test_players_resolve_across_providers() {
    let root = tempfile::tempdir().unwrap();
    let (store, manager) = setup(root.path());

    manager.sync_teams("ibl", SEASON).await.unwrap();
    manager.sync_teams("eurocup", SEASON).await.unwrap();
    manager.sync_season("ibl", SEASON, true).await.unwrap();
    let run = manager.sync_season("eurocup", SEASON, true).await.unwrap();
    assert_eq!(run.status, SyncStatus::Completed);
    assert_eq!(run.errors, 0);

    // The continental box score carries different player ids for the
    // same people; jersey-on-roster resolution merges instead of
    // duplicating.
    let by_ibl = store
        .player_by_external_id("ibl", "3021")
        .await
        .unwrap()
        .unwrap();
    let by_eurocup = store
        .player_by_external_id("eurocup", "P003421")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_ibl.id, by_eurocup.id);
    assert_eq!(by_ibl.last_name, "Baldwin IV");
    assert_eq!(store.all_players().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_links_inferred_or_declared_per_feed() {
    let root = tempfile::tempdir().unwrap();
    let (store, manager) = setup(root.path());

    manager.sync_teams("ibl", SEASON).await.unwrap();
    manager.sync_teams("eurocup", SEASON).await.unwrap();
    manager.sync_season("ibl", SEASON, true).await.unwrap();
    manager.sync_season("eurocup", SEASON, true).await.unwrap();

    // National feed: no declared links, the assist link is inferred.
    let ibl_game = store
        .game_by_external_id("ibl", "g100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(store.events_for_game(ibl_game.id).await.unwrap().len(), 2);
    assert_eq!(store.links_for_game(ibl_game.id).await.unwrap().len(), 1);

    // Continental feed: the declared link is stored as-is.
    let ec_game = store
        .game_by_external_id("eurocup", "E_1")
        .await
        .unwrap()
        .unwrap();
    let links = store.links_for_game(ec_game.id).await.unwrap();
    assert_eq!(links.len(), 1);
    let events = store.events_for_game(ec_game.id).await.unwrap();
    let shot = events.iter().find(|e| e.sequence == 5).unwrap();
    assert_eq!(links[0].to_event_id, shot.id);
}

#[tokio::test]
async fn test_repeated_runs_never_grow_data() {
    let root = tempfile::tempdir().unwrap();
    let (store, manager) = setup(root.path());

    for _ in 0..2 {
        manager.sync_teams("ibl", SEASON).await.unwrap();
        manager.sync_teams("eurocup", SEASON).await.unwrap();
        manager.sync_season("ibl", SEASON, true).await.unwrap();
        manager.sync_season("eurocup", SEASON, true).await.unwrap();
    }

    assert_eq!(store.all_teams().await.unwrap().len(), 2);
    assert_eq!(store.all_players().await.unwrap().len(), 2);

    // Second season pass skipped both stored games outright.
    let run = manager.sync_season("ibl", SEASON, true).await.unwrap();
    assert_eq!(run.created, 0);
    assert_eq!(run.skipped, 1);

    // Targeted re-sync replaces rows in place.
    let game = store
        .game_by_external_id("ibl", "g100")
        .await
        .unwrap()
        .unwrap();
    manager.sync_game("ibl", "g100", true).await.unwrap();
    assert_eq!(store.player_lines_for_game(game.id).await.unwrap().len(), 2);
    assert_eq!(store.events_for_game(game.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_every_operation_is_audited() {
    let root = tempfile::tempdir().unwrap();
    let (store, manager) = setup(root.path());

    // Break the continental schedule so season setup fails outright.
    std::fs::remove_file(root.path().join("eurocup").join(format!("schedule_{SEASON}.json")))
        .unwrap();

    manager.sync_teams("ibl", SEASON).await.unwrap();
    let run = manager.sync_season("eurocup", SEASON, false).await.unwrap();
    assert_eq!(run.status, SyncStatus::Failed);
    assert!(run.completed_at.is_some());
    assert!(run.error_message.is_some());
    assert_eq!(store.sync_runs_in_progress().await.unwrap(), 0);
}
