mod common;

use hoopslab::store::text;
use hoopslab::{HoopsApi, SqliteStore, Store};

use common::{read_fixture, test_settings};

#[test]
fn on_disk_store_creates_parent_dirs_and_persists() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("hoopslab.sqlite");

    {
        let store = SqliteStore::open(&path).expect("store should open");
        store
            .execute_batch(&read_fixture("seed.sql"))
            .expect("seed fixture should load");
    }
    assert!(path.exists());

    // Reopening runs the idempotent schema again over existing tables.
    let store = SqliteStore::open(&path).expect("store should reopen");
    let name: Option<String> = store
        .query_one("SELECT name FROM players WHERE player_id = ?", &[text("NBA_2544")])
        .expect("query should run");
    assert_eq!(name.as_deref(), Some("LeBron James"));

    let api = HoopsApi::new(store, test_settings());
    let team = api.team("1610612744", None).expect("team exists");
    assert_eq!(team.team.name, "Golden State Warriors");
}

#[test]
fn empty_store_reports_not_found() {
    let store = SqliteStore::open_in_memory().expect("in-memory store");
    let api = HoopsApi::new(store, test_settings());
    assert!(api.player("201939", None).expect_err("empty store").is_not_found());
    let games = api.games(None, None, None).expect("listing still runs");
    assert!(games.games.is_empty());
}
