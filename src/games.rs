use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::api::{HoopsApi, Resolved, optional_param};
use crate::error::{ApiError, ApiResult};
use crate::ids::EntityKind;
use crate::response_cache::{TTL_SEASON_METRICS, cache_key};
use crate::store::{FromRow, Store, text};

const DEFAULT_GAMES_LIMIT: i64 = 20;
const MAX_GAMES_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRow {
    pub game_id: String,
    pub league_id: String,
    pub season_id: String,
    pub game_date: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

impl FromRow for GameRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            game_id: row.get("game_id")?,
            league_id: row.get("league_id")?,
            season_id: row.get("season_id")?,
            game_date: row.get("game_date")?,
            home_team_id: row.get("home_team_id")?,
            away_team_id: row.get("away_team_id")?,
            home_score: row.get("home_score")?,
            away_score: row.get("away_score")?,
            venue: row.get("venue")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxscoreLine {
    pub player_id: String,
    pub team_id: String,
    pub minutes: Option<f64>,
    pub pts: Option<i64>,
    pub ast: Option<i64>,
    pub reb: Option<i64>,
    pub fg3m: Option<i64>,
    pub fg3a: Option<i64>,
}

impl FromRow for BoxscoreLine {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            team_id: row.get("team_id")?,
            minutes: row.get("minutes")?,
            pts: row.get("pts")?,
            ast: row.get("ast")?,
            reb: row.get("reb")?,
            fg3m: row.get("fg3m")?,
            fg3a: row.get("fg3a")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesPayload {
    pub games: Vec<GameRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDetail {
    pub game: GameRow,
    pub boxscore: Vec<BoxscoreLine>,
    pub resolved: Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFatigueFlags {
    pub game_id: String,
    pub home_fatigue_score: Option<f64>,
    pub away_fatigue_score: Option<f64>,
    pub rest_disadvantage_flag: Option<bool>,
    pub travel_disadvantage_flag: Option<bool>,
}

impl FromRow for GameFatigueFlags {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            game_id: row.get("game_id")?,
            home_fatigue_score: row.get("home_fatigue_score")?,
            away_fatigue_score: row.get("away_fatigue_score")?,
            rest_disadvantage_flag: row.get("rest_disadvantage_flag")?,
            travel_disadvantage_flag: row.get("travel_disadvantage_flag")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMomentum {
    pub game_id: String,
    pub best_run_team_id: Option<String>,
    pub best_run_points: Option<i64>,
    pub swing_index: Option<f64>,
    pub clutch_possessions: Option<i64>,
    pub clutch_net_rating_home: Option<f64>,
    pub clutch_net_rating_away: Option<f64>,
}

impl FromRow for GameMomentum {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            game_id: row.get("game_id")?,
            best_run_team_id: row.get("best_run_team_id")?,
            best_run_points: row.get("best_run_points")?,
            swing_index: row.get("swing_index")?,
            clutch_possessions: row.get("clutch_possessions")?,
            clutch_net_rating_home: row.get("clutch_net_rating_home")?,
            clutch_net_rating_away: row.get("clutch_net_rating_away")?,
        })
    }
}

/// Validated filters for the games listing.
#[derive(Debug, Clone, PartialEq)]
pub struct GameListQuery {
    pub season: Option<String>,
    pub league: Option<String>,
    pub limit: i64,
}

impl GameListQuery {
    pub fn parse(season: Option<&str>, league: Option<&str>, limit: Option<&str>) -> ApiResult<Self> {
        let invalid = || ApiError::invalid("Invalid query params");
        let season = optional_param(season).map(str::to_string);
        if season.as_ref().is_some_and(|s| s.chars().count() > 32) {
            return Err(invalid());
        }
        let league = optional_param(league).map(str::to_ascii_uppercase);
        if league
            .as_ref()
            .is_some_and(|l| !(2..=8).contains(&l.chars().count()))
        {
            return Err(invalid());
        }
        let limit = match optional_param(limit) {
            Some(raw) => raw.parse::<i64>().map_err(|_| invalid())?,
            None => DEFAULT_GAMES_LIMIT,
        };
        if !(1..=MAX_GAMES_LIMIT).contains(&limit) {
            return Err(invalid());
        }
        Ok(Self {
            season,
            league,
            limit,
        })
    }
}

impl<S: Store> HoopsApi<S> {
    pub fn games(&self, season: Option<&str>, league: Option<&str>, limit: Option<&str>) -> ApiResult<GamesPayload> {
        let query = GameListQuery::parse(season, league, limit)?;
        let limit_str = query.limit.to_string();
        let key = cache_key(&[
            Some("games"),
            Some(query.season.as_deref().unwrap_or("")),
            Some(query.league.as_deref().unwrap_or("")),
            Some(limit_str.as_str()),
        ]);

        self.cached(&key, None, || {
            let mut sql = String::from(
                "SELECT game_id, league_id, season_id, game_date, home_team_id, away_team_id, \
                 home_score, away_score, venue FROM games",
            );
            let mut params: Vec<Value> = Vec::new();
            let mut filters: Vec<&str> = Vec::new();
            if let Some(season) = &query.season {
                filters.push("season_id = ?");
                params.push(text(season.as_str()));
            }
            if let Some(league) = &query.league {
                filters.push("league_id = ?");
                params.push(text(league.as_str()));
            }
            if !filters.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&filters.join(" AND "));
            }
            sql.push_str(" ORDER BY game_date DESC LIMIT ?");
            params.push(query.limit.into());

            let games: Vec<GameRow> = self.store().query_all(&sql, &params)?;
            Ok(GamesPayload { games })
        })
    }

    pub fn game(&self, raw_id: &str) -> ApiResult<GameDetail> {
        let game_id = self.require(raw_id, EntityKind::Game, "Game not found")?;
        let key = cache_key(&[Some("game"), Some(game_id.as_str())]);
        self.cached(&key, None, || {
            let game: GameRow = self
                .store()
                .query_one(
                    r#"
                    SELECT game_id, league_id, season_id, game_date, home_team_id, away_team_id,
                           home_score, away_score, venue
                    FROM games
                    WHERE game_id = ?
                    "#,
                    &[text(game_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found("Game not found"))?;
            let boxscore: Vec<BoxscoreLine> = self.store().query_all(
                r#"
                SELECT player_id, team_id, minutes, pts, ast, reb, fg3m, fg3a
                FROM boxscore_lines
                WHERE game_id = ?
                ORDER BY team_id ASC, pts DESC
                "#,
                &[text(game_id.as_str())],
            )?;
            Ok(GameDetail {
                game,
                boxscore,
                resolved: Resolved::game(&game_id),
            })
        })
    }

    pub fn game_fatigue_flags(&self, raw_id: &str) -> ApiResult<GameFatigueFlags> {
        let not_found = "fatigue flags not found";
        let game_id = self.require(raw_id, EntityKind::Game, not_found)?;
        let key = cache_key(&[Some("game"), Some(game_id.as_str()), Some("fatigue-flags")]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            self.store()
                .query_one(
                    r#"
                    SELECT game_id, home_fatigue_score, away_fatigue_score,
                           rest_disadvantage_flag, travel_disadvantage_flag
                    FROM game_fatigue_flags
                    WHERE game_id = ?
                    "#,
                    &[text(game_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found(not_found))
        })
    }

    pub fn game_momentum(&self, raw_id: &str) -> ApiResult<GameMomentum> {
        let not_found = "momentum record not found";
        let game_id = self.require(raw_id, EntityKind::Game, not_found)?;
        let key = cache_key(&[Some("game"), Some(game_id.as_str()), Some("momentum")]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            self.store()
                .query_one(
                    r#"
                    SELECT game_id, best_run_team_id, best_run_points, swing_index, clutch_possessions,
                           clutch_net_rating_home, clutch_net_rating_away
                    FROM game_momentum
                    WHERE game_id = ?
                    "#,
                    &[text(game_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found(not_found))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_and_normalizes() {
        let q = GameListQuery::parse(None, Some(" el "), None).expect("valid");
        assert_eq!(q.league.as_deref(), Some("EL"));
        assert_eq!(q.limit, 20);
        assert!(q.season.is_none());
    }

    #[test]
    fn list_query_rejects_out_of_range() {
        assert!(GameListQuery::parse(None, None, Some("0")).is_err());
        assert!(GameListQuery::parse(None, None, Some("101")).is_err());
        assert!(GameListQuery::parse(None, None, Some("ten")).is_err());
        assert!(GameListQuery::parse(None, Some("X"), None).is_err());
        assert!(GameListQuery::parse(None, Some("TOOLONGID"), None).is_err());
        assert_eq!(
            GameListQuery::parse(Some("NBA_2025"), None, Some("100"))
                .expect("valid")
                .limit,
            100
        );
    }
}
