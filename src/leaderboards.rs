//! Season-wide top lists. Season ids are taken as given; an unknown season
//! yields an empty list rather than NotFound.

use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::{HoopsApi, require_season};
use crate::error::ApiResult;
use crate::response_cache::{TTL_SEASON_METRICS, cache_key};
use crate::store::{FromRow, Store, text};

const LEADERBOARD_LIMIT: i64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardPayload<T> {
    pub season: String,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityLeader {
    pub player_id: String,
    pub name: String,
    pub gravity_overall: Option<f64>,
    pub gravity_on_ball: Option<f64>,
    pub gravity_off_ball: Option<f64>,
}

impl FromRow for GravityLeader {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            name: row.get("name")?,
            gravity_overall: row.get("gravity_overall")?,
            gravity_on_ball: row.get("gravity_on_ball")?,
            gravity_off_ball: row.get("gravity_off_ball")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClutchLeader {
    pub player_id: String,
    pub name: String,
    pub clutch_impact: Option<f64>,
}

impl FromRow for ClutchLeader {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            name: row.get("name")?,
            clutch_impact: row.get("clutch_impact")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationLeader {
    pub player_id: String,
    pub name: String,
    pub league_id: String,
    pub translation_score: Option<f64>,
    pub nba_equivalent_rating: Option<f64>,
}

impl FromRow for TranslationLeader {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            name: row.get("name")?,
            league_id: row.get("league_id")?,
            translation_score: row.get("translation_score")?,
            nba_equivalent_rating: row.get("nba_equivalent_rating")?,
        })
    }
}

impl<S: Store> HoopsApi<S> {
    pub fn gravity_leaderboard(&self, season: Option<&str>) -> ApiResult<LeaderboardPayload<GravityLeader>> {
        self.leaderboard(
            "gravity",
            season,
            r#"
            SELECT p.player_id AS player_id, p.name AS name, g.gravity_overall AS gravity_overall,
                   g.gravity_on_ball AS gravity_on_ball, g.gravity_off_ball AS gravity_off_ball
            FROM nba_gravity g
            JOIN players p ON p.player_id = g.player_id
            WHERE g.season_id = ?
            ORDER BY g.gravity_overall DESC
            LIMIT ?
            "#,
        )
    }

    pub fn clutch_leaderboard(&self, season: Option<&str>) -> ApiResult<LeaderboardPayload<ClutchLeader>> {
        self.leaderboard(
            "clutch",
            season,
            r#"
            SELECT p.player_id AS player_id, p.name AS name, f.clutch_impact AS clutch_impact
            FROM player_season_features f
            JOIN players p ON p.player_id = f.player_id
            WHERE f.season_id = ?
            ORDER BY f.clutch_impact DESC
            LIMIT ?
            "#,
        )
    }

    pub fn translation_leaderboard(
        &self,
        season: Option<&str>,
    ) -> ApiResult<LeaderboardPayload<TranslationLeader>> {
        self.leaderboard(
            "translation",
            season,
            r#"
            SELECT p.player_id AS player_id, p.name AS name, p.league_id AS league_id,
                   m.translation_score AS translation_score,
                   m.nba_equivalent_rating AS nba_equivalent_rating
            FROM player_translation_metrics m
            JOIN players p ON p.player_id = m.player_id
            WHERE m.season_id = ?
            ORDER BY m.translation_score DESC
            LIMIT ?
            "#,
        )
    }

    fn leaderboard<T>(&self, board: &str, season: Option<&str>, sql: &str) -> ApiResult<LeaderboardPayload<T>>
    where
        T: FromRow + Serialize + DeserializeOwned,
    {
        let season = require_season(season)?;
        let key = cache_key(&[Some("leaderboard"), Some(board), Some(season)]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            let results: Vec<T> = self
                .store()
                .query_all(sql, &[text(season), LEADERBOARD_LIMIT.into()])?;
            Ok(LeaderboardPayload {
                season: season.to_string(),
                results,
            })
        })
    }
}
