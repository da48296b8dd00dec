use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};

use crate::error::StoreError;

/// Decode one result row into a typed record.
pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Single-column rows, used for key and season lookups.
impl FromRow for String {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        row.get(0)
    }
}

/// Read-only query contract the resolver and query API run against.
///
/// Parameters bind positionally; statements are fixed per call site and
/// `IN (...)` lists are sized with [`placeholders`].
pub trait Store: Sync {
    fn query_one<T: FromRow>(&self, sql: &str, params: &[Value]) -> Result<Option<T>, StoreError>;

    fn query_all<T: FromRow>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, StoreError>;
}

impl<S: Store> Store for &S {
    fn query_one<T: FromRow>(&self, sql: &str, params: &[Value]) -> Result<Option<T>, StoreError> {
        (**self).query_one(sql, params)
    }

    fn query_all<T: FromRow>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, StoreError> {
        (**self).query_all(sql, params)
    }
}

/// `?,?,?` with `n` markers. `n == 0` yields an empty string; callers must
/// not issue an `IN ()` query in that case.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

pub fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

pub fn texts<I, S>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(text).collect()
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run a batch of statements, e.g. to load fixture rows.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for SqliteStore {
    fn query_one<T: FromRow>(&self, sql: &str, params: &[Value]) -> Result<Option<T>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let row = stmt
            .query_row(params_from_iter(params.iter()), |row| T::from_row(row))
            .optional()?;
        Ok(row)
    }

    fn query_all<T: FromRow>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| T::from_row(row))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            player_id TEXT PRIMARY KEY,
            league_id TEXT NOT NULL,
            name TEXT NOT NULL,
            birthdate TEXT NULL,
            height_cm REAL NULL,
            weight_kg REAL NULL,
            position TEXT NULL,
            nationality TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_players_name ON players(name);

        CREATE TABLE IF NOT EXISTS teams (
            team_id TEXT PRIMARY KEY,
            league_id TEXT NOT NULL,
            season_id TEXT NULL,
            name TEXT NOT NULL,
            abbrev TEXT NULL,
            city TEXT NULL,
            country TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS games (
            game_id TEXT PRIMARY KEY,
            league_id TEXT NOT NULL,
            season_id TEXT NOT NULL,
            game_date TEXT NOT NULL,
            home_team_id TEXT NOT NULL,
            away_team_id TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            venue TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_games_season ON games(season_id);
        CREATE INDEX IF NOT EXISTS idx_games_date ON games(game_date);

        CREATE TABLE IF NOT EXISTS boxscore_lines (
            game_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            minutes REAL NULL,
            pts INTEGER NULL,
            ast INTEGER NULL,
            reb INTEGER NULL,
            fg3m INTEGER NULL,
            fg3a INTEGER NULL,
            PRIMARY KEY (game_id, player_id)
        );

        CREATE TABLE IF NOT EXISTS player_season_features (
            season_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            team_id TEXT NULL,
            gp INTEGER NULL,
            minutes REAL NULL,
            usage_proxy REAL NULL,
            ts_proxy REAL NULL,
            ast_rate_proxy REAL NULL,
            tov_rate_proxy REAL NULL,
            reb_share_proxy REAL NULL,
            clutch_impact REAL NULL,
            archetype_vector_json TEXT NULL,
            PRIMARY KEY (season_id, player_id)
        );

        CREATE TABLE IF NOT EXISTS player_shot_profiles (
            season_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            rim_rate REAL NULL,
            mid_rate REAL NULL,
            corner3_rate REAL NULL,
            abv3_rate REAL NULL,
            rim_fg_pct REAL NULL,
            mid_fg_pct REAL NULL,
            three_fg_pct REAL NULL,
            PRIMARY KEY (season_id, player_id)
        );

        CREATE TABLE IF NOT EXISTS team_shot_profiles (
            season_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            rim_rate REAL NULL,
            mid_rate REAL NULL,
            corner3_rate REAL NULL,
            abv3_rate REAL NULL,
            rim_fg_pct REAL NULL,
            mid_fg_pct REAL NULL,
            three_fg_pct REAL NULL,
            PRIMARY KEY (season_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS player_translation_metrics (
            season_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            standardized_usage REAL NULL,
            standardized_ts REAL NULL,
            standardized_creation REAL NULL,
            translation_score REAL NULL,
            nba_equivalent_rating REAL NULL,
            PRIMARY KEY (season_id, player_id)
        );

        CREATE TABLE IF NOT EXISTS nba_gravity (
            season_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            gravity_overall REAL NULL,
            gravity_on_ball REAL NULL,
            gravity_off_ball REAL NULL,
            updated_at TEXT NULL,
            PRIMARY KEY (season_id, player_id)
        );

        CREATE TABLE IF NOT EXISTS team_gravity_effect (
            season_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            team_gravity_load REAL NULL,
            gravity_adjusted_offense REAL NULL,
            gravity_spillover REAL NULL,
            model_version TEXT NULL,
            computed_at TEXT NULL,
            PRIMARY KEY (season_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS team_fatigue_effect (
            season_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            fatigue_score REAL NULL,
            rest_disadvantage_games INTEGER NULL,
            travel_km REAL NULL,
            model_version TEXT NULL,
            computed_at TEXT NULL,
            PRIMARY KEY (season_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS team_play_style_metrics (
            season_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            transition_poss_rate REAL NULL,
            set_play_poss_rate REAL NULL,
            transition_off_rating REAL NULL,
            set_play_off_rating REAL NULL,
            pace_proxy REAL NULL,
            early_offense_rate REAL NULL,
            PRIMARY KEY (season_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS lineup_impact_snapshots (
            season_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            lineup_key TEXT NOT NULL,
            player_ids_json TEXT NOT NULL,
            avg_gravity REAL NULL,
            offense_projection REAL NULL,
            spacing_index REAL NULL,
            transition_fit REAL NULL,
            set_play_fit REAL NULL,
            gravity_delta_vs_team REAL NULL,
            PRIMARY KEY (season_id, team_id, lineup_key)
        );

        CREATE TABLE IF NOT EXISTS game_fatigue_flags (
            game_id TEXT PRIMARY KEY,
            home_fatigue_score REAL NULL,
            away_fatigue_score REAL NULL,
            rest_disadvantage_flag INTEGER NULL,
            travel_disadvantage_flag INTEGER NULL
        );

        CREATE TABLE IF NOT EXISTS game_momentum (
            game_id TEXT PRIMARY KEY,
            best_run_team_id TEXT NULL,
            best_run_points INTEGER NULL,
            swing_index REAL NULL,
            clutch_possessions INTEGER NULL,
            clutch_net_rating_home REAL NULL,
            clutch_net_rating_away REAL NULL
        );
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_match_cardinality() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(4), "?,?,?,?");
    }

    #[test]
    fn query_one_returns_none_for_missing_row() {
        let store = SqliteStore::open_in_memory().expect("in-memory store");
        let row: Option<String> = store
            .query_one(
                "SELECT player_id FROM players WHERE player_id = ?",
                &[text("NBA_1")],
            )
            .expect("query should run");
        assert!(row.is_none());
    }

    #[test]
    fn bad_statement_is_a_store_error() {
        let store = SqliteStore::open_in_memory().expect("in-memory store");
        let res: Result<Vec<String>, _> = store.query_all("SELECT nope FROM missing_table", &[]);
        assert!(matches!(res, Err(StoreError::Sqlite(_))));
    }
}
