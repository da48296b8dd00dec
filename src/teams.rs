use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::api::{HoopsApi, Resolved, optional_param, require_season};
use crate::error::{ApiError, ApiResult};
use crate::ids::{EntityKind, MetricsTable};
use crate::players::{ShotProfile, ShotProfilePayload};
use crate::response_cache::{TTL_SEASON_METRICS, cache_key};
use crate::store::{FromRow, Store, text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRow {
    pub team_id: String,
    pub league_id: String,
    pub season_id: Option<String>,
    pub name: String,
    pub abbrev: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl FromRow for TeamRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            team_id: row.get("team_id")?,
            league_id: row.get("league_id")?,
            season_id: row.get("season_id")?,
            name: row.get("name")?,
            abbrev: row.get("abbrev")?,
            city: row.get("city")?,
            country: row.get("country")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGravityEffect {
    pub season_id: String,
    pub team_id: String,
    pub team_gravity_load: Option<f64>,
    pub gravity_adjusted_offense: Option<f64>,
    pub gravity_spillover: Option<f64>,
    pub model_version: Option<String>,
    pub computed_at: Option<String>,
}

impl FromRow for TeamGravityEffect {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            season_id: row.get("season_id")?,
            team_id: row.get("team_id")?,
            team_gravity_load: row.get("team_gravity_load")?,
            gravity_adjusted_offense: row.get("gravity_adjusted_offense")?,
            gravity_spillover: row.get("gravity_spillover")?,
            model_version: row.get("model_version")?,
            computed_at: row.get("computed_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamDetail {
    pub team: TeamRow,
    pub gravity: Option<TeamGravityEffect>,
    pub resolved: Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPlayStyle {
    pub season_id: String,
    pub team_id: String,
    pub transition_poss_rate: Option<f64>,
    pub set_play_poss_rate: Option<f64>,
    pub transition_off_rating: Option<f64>,
    pub set_play_off_rating: Option<f64>,
    pub pace_proxy: Option<f64>,
    pub early_offense_rate: Option<f64>,
}

impl FromRow for TeamPlayStyle {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            season_id: row.get("season_id")?,
            team_id: row.get("team_id")?,
            transition_poss_rate: row.get("transition_poss_rate")?,
            set_play_poss_rate: row.get("set_play_poss_rate")?,
            transition_off_rating: row.get("transition_off_rating")?,
            set_play_off_rating: row.get("set_play_off_rating")?,
            pace_proxy: row.get("pace_proxy")?,
            early_offense_rate: row.get("early_offense_rate")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayStylePayload {
    #[serde(flatten)]
    pub play_style: TeamPlayStyle,
    pub resolved: Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamFatigue {
    pub season_id: String,
    pub team_id: String,
    pub fatigue_score: Option<f64>,
    pub rest_disadvantage_games: Option<i64>,
    pub travel_km: Option<f64>,
    pub model_version: Option<String>,
    pub computed_at: Option<String>,
}

impl FromRow for TeamFatigue {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            season_id: row.get("season_id")?,
            team_id: row.get("team_id")?,
            fatigue_score: row.get("fatigue_score")?,
            rest_disadvantage_games: row.get("rest_disadvantage_games")?,
            travel_km: row.get("travel_km")?,
            model_version: row.get("model_version")?,
            computed_at: row.get("computed_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FatiguePayload {
    #[serde(flatten)]
    pub fatigue: TeamFatigue,
    pub resolved: Resolved,
}

impl<S: Store> HoopsApi<S> {
    pub fn team(&self, raw_id: &str, season: Option<&str>) -> ApiResult<TeamDetail> {
        let team_id = self.require(raw_id, EntityKind::Team, "Team not found")?;
        let requested = optional_param(season);
        let season_id = match requested {
            Some(s) => self.season_for(MetricsTable::TeamGravityEffect, &team_id, Some(s))?,
            None => None,
        };

        let key = cache_key(&[Some("teams"), Some(team_id.as_str()), Some(requested.unwrap_or(""))]);
        self.cached(&key, None, || {
            let team: TeamRow = self
                .store()
                .query_one(
                    r#"
                    SELECT team_id, league_id, season_id, name, abbrev, city, country
                    FROM teams
                    WHERE team_id = ?
                    "#,
                    &[text(team_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found("Team not found"))?;

            let gravity = match season_id.as_deref() {
                Some(season) => self.store().query_one::<TeamGravityEffect>(
                    "SELECT * FROM team_gravity_effect WHERE team_id = ? AND season_id = ?",
                    &[text(team_id.as_str()), text(season)],
                )?,
                None => None,
            };

            Ok(TeamDetail {
                team,
                gravity,
                resolved: Resolved::team(&team_id, season_id.as_deref()),
            })
        })
    }

    pub fn team_play_style(&self, raw_id: &str, season: Option<&str>) -> ApiResult<PlayStylePayload> {
        let not_found = "play style record not found";
        let requested = require_season(season)?;
        let team_id = self.require(raw_id, EntityKind::Team, not_found)?;
        let season = self
            .season_for(MetricsTable::TeamPlayStyle, &team_id, Some(requested))?
            .ok_or_else(|| ApiError::not_found(not_found))?;

        let key = cache_key(&[Some("team"), Some(team_id.as_str()), Some("play-style"), Some(season.as_str())]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            let play_style: TeamPlayStyle = self
                .store()
                .query_one(
                    r#"
                    SELECT season_id, team_id, transition_poss_rate, set_play_poss_rate,
                           transition_off_rating, set_play_off_rating, pace_proxy, early_offense_rate
                    FROM team_play_style_metrics
                    WHERE season_id = ? AND team_id = ?
                    "#,
                    &[text(season.as_str()), text(team_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found(not_found))?;
            Ok(PlayStylePayload {
                play_style,
                resolved: Resolved::team(&team_id, Some(season.as_str())),
            })
        })
    }

    pub fn team_fatigue(&self, raw_id: &str, season: Option<&str>) -> ApiResult<FatiguePayload> {
        let not_found = "fatigue record not found";
        let requested = require_season(season)?;
        let team_id = self.require(raw_id, EntityKind::Team, not_found)?;
        let season = self
            .season_for(MetricsTable::TeamFatigue, &team_id, Some(requested))?
            .ok_or_else(|| ApiError::not_found(not_found))?;

        let key = cache_key(&[Some("team"), Some(team_id.as_str()), Some("fatigue"), Some(season.as_str())]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            let fatigue: TeamFatigue = self
                .store()
                .query_one(
                    r#"
                    SELECT season_id, team_id, fatigue_score, rest_disadvantage_games, travel_km,
                           model_version, computed_at
                    FROM team_fatigue_effect
                    WHERE season_id = ? AND team_id = ?
                    "#,
                    &[text(season.as_str()), text(team_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found(not_found))?;
            Ok(FatiguePayload {
                fatigue,
                resolved: Resolved::team(&team_id, Some(season.as_str())),
            })
        })
    }

    pub fn team_shot_profile(&self, raw_id: &str, season: Option<&str>) -> ApiResult<ShotProfilePayload> {
        let not_found = "team shot profile not found";
        let requested = require_season(season)?;
        let team_id = self.require(raw_id, EntityKind::Team, not_found)?;
        let season = self
            .season_for(MetricsTable::TeamShotProfiles, &team_id, Some(requested))?
            .ok_or_else(|| ApiError::not_found(not_found))?;

        let key = cache_key(&[Some("team"), Some(team_id.as_str()), Some("shot-profile"), Some(season.as_str())]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            let profile: ShotProfile = self
                .store()
                .query_one(
                    r#"
                    SELECT season_id, team_id AS entity_id, rim_rate, mid_rate, corner3_rate, abv3_rate,
                           rim_fg_pct, mid_fg_pct, three_fg_pct
                    FROM team_shot_profiles
                    WHERE season_id = ? AND team_id = ?
                    "#,
                    &[text(season.as_str()), text(team_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found(not_found))?;
            Ok(ShotProfilePayload {
                profile,
                resolved: Resolved::team(&team_id, Some(season.as_str())),
            })
        })
    }
}
