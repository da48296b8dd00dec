#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use hoopslab::{HoopsApi, Settings, SqliteStore};

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("in-memory store");
    store
        .execute_batch(&read_fixture("seed.sql"))
        .expect("seed fixture should load");
    store
}

/// Settings that ignore the process environment.
pub fn test_settings() -> Settings {
    Settings::from_lookup(|_| None)
}

pub fn seeded_api() -> HoopsApi<SqliteStore> {
    HoopsApi::new(seeded_store(), test_settings())
}
