use rayon::prelude::*;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::api::{HoopsApi, Resolved, optional_param, require_season};
use crate::error::{ApiError, ApiResult};
use crate::ids::{EntityKind, MetricsTable};
use crate::response_cache::{TTL_PAIRWISE, TTL_SEASON_METRICS, cache_key};
use crate::similarity::{cosine_similarity, parse_feature_vector, round_to};
use crate::store::{FromRow, Store, text};

const SEARCH_MAX_LEN: usize = 80;
const SEARCH_LIMIT: i64 = 25;
const COMP_SCORE_DECIMALS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSearchRow {
    pub player_id: String,
    pub league_id: String,
    pub name: String,
    pub position: Option<String>,
    pub nationality: Option<String>,
}

impl FromRow for PlayerSearchRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            league_id: row.get("league_id")?,
            name: row.get("name")?,
            position: row.get("position")?,
            nationality: row.get("nationality")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSearchResults {
    pub results: Vec<PlayerSearchRow>,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub player_id: String,
    pub league_id: String,
    pub name: String,
    pub birthdate: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub position: Option<String>,
    pub nationality: Option<String>,
}

impl FromRow for PlayerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            league_id: row.get("league_id")?,
            name: row.get("name")?,
            birthdate: row.get("birthdate")?,
            height_cm: row.get("height_cm")?,
            weight_kg: row.get("weight_kg")?,
            position: row.get("position")?,
            nationality: row.get("nationality")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSeasonFeatures {
    pub season_id: String,
    pub player_id: String,
    pub team_id: Option<String>,
    pub gp: Option<i64>,
    pub minutes: Option<f64>,
    pub usage_proxy: Option<f64>,
    pub ts_proxy: Option<f64>,
    pub ast_rate_proxy: Option<f64>,
    pub tov_rate_proxy: Option<f64>,
    pub reb_share_proxy: Option<f64>,
    pub clutch_impact: Option<f64>,
    pub archetype_vector_json: Option<String>,
}

impl FromRow for PlayerSeasonFeatures {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            season_id: row.get("season_id")?,
            player_id: row.get("player_id")?,
            team_id: row.get("team_id")?,
            gp: row.get("gp")?,
            minutes: row.get("minutes")?,
            usage_proxy: row.get("usage_proxy")?,
            ts_proxy: row.get("ts_proxy")?,
            ast_rate_proxy: row.get("ast_rate_proxy")?,
            tov_rate_proxy: row.get("tov_rate_proxy")?,
            reb_share_proxy: row.get("reb_share_proxy")?,
            clutch_impact: row.get("clutch_impact")?,
            archetype_vector_json: row.get("archetype_vector_json")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDetail {
    pub player: PlayerRow,
    pub features: Option<PlayerSeasonFeatures>,
    pub resolved: Resolved,
}

/// Player with an archetype vector, as read for comps scoring.
#[derive(Debug, Clone)]
struct ArchetypeRow {
    player_id: String,
    name: String,
    league_id: String,
    archetype_vector_json: Option<String>,
}

impl FromRow for ArchetypeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            name: row.get("name")?,
            league_id: row.get("league_id")?,
            archetype_vector_json: row.get("archetype_vector_json")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompTarget {
    pub player_id: String,
    pub name: String,
    pub league_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comp {
    pub player_id: String,
    pub name: String,
    pub league_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompsPayload {
    pub season: String,
    pub target: CompTarget,
    pub comps: Vec<Comp>,
    pub resolved: Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRow {
    pub player_id: String,
    pub name: String,
    pub league_id: String,
    pub usage_proxy: Option<f64>,
    pub ts_proxy: Option<f64>,
    pub ast_rate_proxy: Option<f64>,
    pub tov_rate_proxy: Option<f64>,
    pub reb_share_proxy: Option<f64>,
}

impl FromRow for CompareRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            name: row.get("name")?,
            league_id: row.get("league_id")?,
            usage_proxy: row.get("usage_proxy")?,
            ts_proxy: row.get("ts_proxy")?,
            ast_rate_proxy: row.get("ast_rate_proxy")?,
            tov_rate_proxy: row.get("tov_rate_proxy")?,
            reb_share_proxy: row.get("reb_share_proxy")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparePayload {
    pub season: String,
    #[serde(rename = "playerA")]
    pub player_a: CompareRow,
    #[serde(rename = "playerB")]
    pub player_b: CompareRow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotProfile {
    pub season_id: String,
    pub entity_id: String,
    pub rim_rate: Option<f64>,
    pub mid_rate: Option<f64>,
    pub corner3_rate: Option<f64>,
    pub abv3_rate: Option<f64>,
    pub rim_fg_pct: Option<f64>,
    pub mid_fg_pct: Option<f64>,
    pub three_fg_pct: Option<f64>,
}

impl FromRow for ShotProfile {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            season_id: row.get("season_id")?,
            entity_id: row.get("entity_id")?,
            rim_rate: row.get("rim_rate")?,
            mid_rate: row.get("mid_rate")?,
            corner3_rate: row.get("corner3_rate")?,
            abv3_rate: row.get("abv3_rate")?,
            rim_fg_pct: row.get("rim_fg_pct")?,
            mid_fg_pct: row.get("mid_fg_pct")?,
            three_fg_pct: row.get("three_fg_pct")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotProfilePayload {
    #[serde(flatten)]
    pub profile: ShotProfile,
    pub resolved: Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTranslation {
    pub season_id: String,
    pub player_id: String,
    pub name: String,
    pub league_id: String,
    pub standardized_usage: Option<f64>,
    pub standardized_ts: Option<f64>,
    pub standardized_creation: Option<f64>,
    pub translation_score: Option<f64>,
    pub nba_equivalent_rating: Option<f64>,
}

impl FromRow for PlayerTranslation {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            season_id: row.get("season_id")?,
            player_id: row.get("player_id")?,
            name: row.get("name")?,
            league_id: row.get("league_id")?,
            standardized_usage: row.get("standardized_usage")?,
            standardized_ts: row.get("standardized_ts")?,
            standardized_creation: row.get("standardized_creation")?,
            translation_score: row.get("translation_score")?,
            nba_equivalent_rating: row.get("nba_equivalent_rating")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationPayload {
    #[serde(flatten)]
    pub translation: PlayerTranslation,
    pub resolved: Resolved,
}

/// Score every candidate against `target`, best first. Ties keep input
/// order; the list is cut to `limit`.
pub fn rank_comps(target: &[f64], candidates: Vec<(CompTarget, Vec<f64>)>, limit: usize) -> Vec<Comp> {
    let mut comps = candidates
        .into_par_iter()
        .map(|(who, vector)| Comp {
            player_id: who.player_id,
            name: who.name,
            league_id: who.league_id,
            score: round_to(cosine_similarity(target, &vector), COMP_SCORE_DECIMALS),
        })
        .collect::<Vec<_>>();
    comps.sort_by(|a, b| b.score.total_cmp(&a.score));
    comps.truncate(limit);
    comps
}

impl<S: Store> HoopsApi<S> {
    pub fn search_players(&self, q: &str) -> ApiResult<PlayerSearchResults> {
        let q = q.trim();
        if q.is_empty() || q.chars().count() > SEARCH_MAX_LEN {
            return Err(ApiError::invalid("Invalid search query"));
        }
        let q = q.to_lowercase();
        let key = cache_key(&[Some("players"), Some("search"), Some(q.as_str())]);
        if let Some(results) = self.cache().get_json::<Vec<PlayerSearchRow>>(&key) {
            return Ok(PlayerSearchResults {
                results,
                cached: true,
            });
        }

        let results: Vec<PlayerSearchRow> = self.store().query_all(
            r#"
            SELECT player_id, league_id, name, position, nationality
            FROM players
            WHERE lower(name) LIKE ?
            ORDER BY name ASC
            LIMIT ?
            "#,
            &[text(format!("%{q}%")), SEARCH_LIMIT.into()],
        )?;
        self.cache().put_json(&key, &results, Some(TTL_SEASON_METRICS));
        Ok(PlayerSearchResults {
            results,
            cached: false,
        })
    }

    /// Player row, plus season features when a season is asked for and any
    /// season of features exists.
    pub fn player(&self, raw_id: &str, season: Option<&str>) -> ApiResult<PlayerDetail> {
        let player_id = self.require(raw_id, EntityKind::Player, "Player not found")?;
        let requested = optional_param(season);
        let season_id = match requested {
            Some(s) => self.season_for(MetricsTable::PlayerSeasonFeatures, &player_id, Some(s))?,
            None => None,
        };

        let key = cache_key(&[Some("players"), Some(player_id.as_str()), Some(requested.unwrap_or(""))]);
        self.cached(&key, None, || {
            let player: PlayerRow = self
                .store()
                .query_one(
                    r#"
                    SELECT player_id, league_id, name, birthdate, height_cm, weight_kg, position, nationality
                    FROM players
                    WHERE player_id = ?
                    "#,
                    &[text(player_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found("Player not found"))?;

            let features = match season_id.as_deref() {
                Some(season) => self.store().query_one::<PlayerSeasonFeatures>(
                    "SELECT * FROM player_season_features WHERE player_id = ? AND season_id = ?",
                    &[text(player_id.as_str()), text(season)],
                )?,
                None => None,
            };

            Ok(PlayerDetail {
                player,
                features,
                resolved: Resolved::player(&player_id, season_id.as_deref()),
            })
        })
    }

    pub fn player_comps(&self, raw_id: &str, season: Option<&str>, k: Option<&str>) -> ApiResult<CompsPayload> {
        let requested = require_season(season)?;
        let limit = self.settings().comps_limit(k);
        let player_id = self.require(raw_id, EntityKind::Player, "Target player features not found")?;
        let season = self
            .season_for(MetricsTable::PlayerSeasonFeatures, &player_id, Some(requested))?
            .ok_or_else(|| ApiError::not_found("Target player features not found"))?;

        let limit_str = limit.to_string();
        let key = cache_key(&[
            Some("players"),
            Some(player_id.as_str()),
            Some("comps"),
            Some(season.as_str()),
            Some(limit_str.as_str()),
        ]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            let target: ArchetypeRow = self
                .store()
                .query_one(
                    r#"
                    SELECT f.player_id AS player_id, p.name AS name, p.league_id AS league_id,
                           f.archetype_vector_json AS archetype_vector_json
                    FROM player_season_features f
                    JOIN players p ON p.player_id = f.player_id
                    WHERE f.player_id = ? AND f.season_id = ?
                    "#,
                    &[text(player_id.as_str()), text(season.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found("Target player features not found"))?;

            let others: Vec<ArchetypeRow> = self.store().query_all(
                r#"
                SELECT f.player_id AS player_id, p.name AS name, p.league_id AS league_id,
                       f.archetype_vector_json AS archetype_vector_json
                FROM player_season_features f
                JOIN players p ON p.player_id = f.player_id
                WHERE f.season_id = ? AND f.player_id != ?
                ORDER BY f.player_id ASC
                "#,
                &[text(season.as_str()), text(player_id.as_str())],
            )?;

            let target_vec = parse_feature_vector(target.archetype_vector_json.as_deref());
            let candidates = others
                .into_iter()
                .map(|row| {
                    let vector = parse_feature_vector(row.archetype_vector_json.as_deref());
                    let who = CompTarget {
                        player_id: row.player_id,
                        name: row.name,
                        league_id: row.league_id,
                    };
                    (who, vector)
                })
                .collect::<Vec<_>>();

            Ok(CompsPayload {
                season: season.clone(),
                target: CompTarget {
                    player_id: target.player_id,
                    name: target.name,
                    league_id: target.league_id,
                },
                comps: rank_comps(&target_vec, candidates, limit),
                resolved: Resolved::player(&player_id, Some(season.as_str())),
            })
        })
    }

    pub fn compare(&self, raw_a: Option<&str>, raw_b: Option<&str>, season: Option<&str>) -> ApiResult<ComparePayload> {
        let (Some(raw_a), Some(raw_b), Some(season)) =
            (optional_param(raw_a), optional_param(raw_b), optional_param(season))
        else {
            return Err(ApiError::invalid("playerA, playerB and season are required"));
        };
        let not_found = "One or both players not found";
        let a = self.require(raw_a, EntityKind::Player, not_found)?;
        let b = self.require(raw_b, EntityKind::Player, not_found)?;

        let key = cache_key(&[Some("compare"), Some(a.as_str()), Some(b.as_str()), Some(season)]);
        self.cached(&key, Some(TTL_PAIRWISE), || {
            let fetch = |player_id: &str| -> ApiResult<CompareRow> {
                self.store()
                    .query_one(
                        r#"
                        SELECT p.player_id AS player_id, p.name AS name, p.league_id AS league_id,
                               f.usage_proxy AS usage_proxy, f.ts_proxy AS ts_proxy,
                               f.ast_rate_proxy AS ast_rate_proxy, f.tov_rate_proxy AS tov_rate_proxy,
                               f.reb_share_proxy AS reb_share_proxy
                        FROM players p
                        LEFT JOIN player_season_features f
                          ON f.player_id = p.player_id AND f.season_id = ?
                        WHERE p.player_id = ?
                        "#,
                        &[text(season), text(player_id)],
                    )?
                    .ok_or_else(|| ApiError::not_found(not_found))
            };
            Ok(ComparePayload {
                season: season.to_string(),
                player_a: fetch(&a)?,
                player_b: fetch(&b)?,
            })
        })
    }

    pub fn player_shot_profile(&self, raw_id: &str, season: Option<&str>) -> ApiResult<ShotProfilePayload> {
        let not_found = "player shot profile not found";
        let requested = require_season(season)?;
        let player_id = self.require(raw_id, EntityKind::Player, not_found)?;
        let season = self
            .season_for(MetricsTable::PlayerShotProfiles, &player_id, Some(requested))?
            .ok_or_else(|| ApiError::not_found(not_found))?;

        let key = cache_key(&[Some("player"), Some(player_id.as_str()), Some("shot-profile"), Some(season.as_str())]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            let profile: ShotProfile = self
                .store()
                .query_one(
                    r#"
                    SELECT season_id, player_id AS entity_id, rim_rate, mid_rate, corner3_rate, abv3_rate,
                           rim_fg_pct, mid_fg_pct, three_fg_pct
                    FROM player_shot_profiles
                    WHERE season_id = ? AND player_id = ?
                    "#,
                    &[text(season.as_str()), text(player_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found(not_found))?;
            Ok(ShotProfilePayload {
                profile,
                resolved: Resolved::player(&player_id, Some(season.as_str())),
            })
        })
    }

    pub fn player_translation(&self, raw_id: &str, season: Option<&str>) -> ApiResult<TranslationPayload> {
        let not_found = "translation record not found";
        let requested = require_season(season)?;
        let player_id = self.require(raw_id, EntityKind::Player, not_found)?;
        let season = self
            .season_for(MetricsTable::PlayerTranslation, &player_id, Some(requested))?
            .ok_or_else(|| ApiError::not_found(not_found))?;

        let key = cache_key(&[Some("player"), Some(player_id.as_str()), Some("translation"), Some(season.as_str())]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            let translation: PlayerTranslation = self
                .store()
                .query_one(
                    r#"
                    SELECT m.season_id AS season_id, m.player_id AS player_id, p.name AS name,
                           p.league_id AS league_id, m.standardized_usage AS standardized_usage,
                           m.standardized_ts AS standardized_ts,
                           m.standardized_creation AS standardized_creation,
                           m.translation_score AS translation_score,
                           m.nba_equivalent_rating AS nba_equivalent_rating
                    FROM player_translation_metrics m
                    JOIN players p ON p.player_id = m.player_id
                    WHERE m.season_id = ? AND m.player_id = ?
                    "#,
                    &[text(season.as_str()), text(player_id.as_str())],
                )?
                .ok_or_else(|| ApiError::not_found(not_found))?;
            Ok(TranslationPayload {
                translation,
                resolved: Resolved::player(&player_id, Some(season.as_str())),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who(id: &str) -> CompTarget {
        CompTarget {
            player_id: id.to_string(),
            name: format!("Player {id}"),
            league_id: "NBA".to_string(),
        }
    }

    #[test]
    fn comps_rank_best_first_and_truncate() {
        let target = vec![1.0, 0.0];
        let candidates = vec![
            (who("orthogonal"), vec![0.0, 1.0]),
            (who("same"), vec![2.0, 0.0]),
            (who("corrupt"), Vec::new()),
            (who("diagonal"), vec![1.0, 1.0]),
        ];
        let comps = rank_comps(&target, candidates, 3);
        let ids = comps.iter().map(|c| c.player_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["same", "diagonal", "orthogonal"]);
        assert_eq!(comps[0].score, 1.0);
        assert_eq!(comps[1].score, 0.7071);
    }

    #[test]
    fn comps_ties_keep_input_order() {
        let target = vec![1.0];
        let candidates = vec![
            (who("b"), vec![3.0]),
            (who("a"), vec![1.0]),
            (who("c"), vec![2.0]),
        ];
        let comps = rank_comps(&target, candidates, 10);
        let ids = comps.iter().map(|c| c.player_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
