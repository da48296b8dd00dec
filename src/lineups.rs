use std::collections::HashMap;

use rayon::prelude::*;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{HoopsApi, Resolved, optional_param, require_season};
use crate::error::{ApiError, ApiResult};
use crate::ids::{EntityKind, MetricsTable};
use crate::lineup_impact::{
    FeatureFallback, LINEUP_SIZE, LineupFeatureRow, LineupProjection, project_lineup_impact,
};
use crate::response_cache::{TTL_PAIRWISE, TTL_SEASON_METRICS, cache_key};
use crate::store::{FromRow, Store, placeholders, text, texts};

const SNAPSHOT_LIMIT: i64 = 20;

/// Feature proxies as stored; absent proxies count as 0 in the projection.
#[derive(Debug, Clone)]
struct FeatureProxyRow {
    player_id: String,
    usage_proxy: Option<f64>,
    ts_proxy: Option<f64>,
    ast_rate_proxy: Option<f64>,
    tov_rate_proxy: Option<f64>,
}

impl FromRow for FeatureProxyRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            usage_proxy: row.get("usage_proxy")?,
            ts_proxy: row.get("ts_proxy")?,
            ast_rate_proxy: row.get("ast_rate_proxy")?,
            tov_rate_proxy: row.get("tov_rate_proxy")?,
        })
    }
}

impl From<FeatureProxyRow> for LineupFeatureRow {
    fn from(row: FeatureProxyRow) -> Self {
        Self {
            player_id: row.player_id,
            usage: row.usage_proxy.unwrap_or(0.0),
            true_shooting: row.ts_proxy.unwrap_or(0.0),
            assist_rate: row.ast_rate_proxy.unwrap_or(0.0),
            turnover_rate: row.tov_rate_proxy.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone)]
struct GravityRow {
    player_id: String,
    gravity_overall: Option<f64>,
}

impl FromRow for GravityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            player_id: row.get("player_id")?,
            gravity_overall: row.get("gravity_overall")?,
        })
    }
}

#[derive(Debug, Clone)]
struct BaselineRow {
    gravity_adjusted_offense: Option<f64>,
}

impl FromRow for BaselineRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            gravity_adjusted_offense: row.get("gravity_adjusted_offense")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupImpactPayload {
    #[serde(flatten)]
    pub projection: LineupProjection,
    pub resolved: Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupSnapshot {
    pub lineup_key: String,
    pub player_ids: Vec<String>,
    pub avg_gravity: Option<f64>,
    pub offense_projection: Option<f64>,
    pub spacing_index: Option<f64>,
    pub transition_fit: Option<f64>,
    pub set_play_fit: Option<f64>,
    pub gravity_delta_vs_team: Option<f64>,
}

impl FromRow for LineupSnapshot {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw_ids: String = row.get("player_ids_json")?;
        Ok(Self {
            lineup_key: row.get("lineup_key")?,
            player_ids: serde_json::from_str(&raw_ids).unwrap_or_default(),
            avg_gravity: row.get("avg_gravity")?,
            offense_projection: row.get("offense_projection")?,
            spacing_index: row.get("spacing_index")?,
            transition_fit: row.get("transition_fit")?,
            set_play_fit: row.get("set_play_fit")?,
            gravity_delta_vs_team: row.get("gravity_delta_vs_team")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupSnapshotsPayload {
    pub season: String,
    pub team_id: String,
    pub results: Vec<LineupSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<Resolved>,
}

/// Split a `players=` list on commas, dropping blanks.
pub fn parse_player_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

impl<S: Store> HoopsApi<S> {
    pub fn lineup_impact(
        &self,
        raw_team: &str,
        season: Option<&str>,
        players: Option<&str>,
    ) -> ApiResult<LineupImpactPayload> {
        let (Some(requested_season), Some(players_raw)) = (optional_param(season), optional_param(players))
        else {
            return Err(ApiError::invalid("season and players query params are required"));
        };

        let team_id = self.require(raw_team, EntityKind::Team, "team not found")?;
        let season = self
            .season_for(MetricsTable::TeamPlayStyle, &team_id, Some(requested_season))?
            .unwrap_or_else(|| requested_season.to_string());

        let requested_players = parse_player_list(players_raw);
        if requested_players.len() != LINEUP_SIZE {
            return Err(ApiError::invalid("exactly five players are required"));
        }

        // Player lookups are independent reads.
        let resolved_players = requested_players
            .par_iter()
            .map(|raw| {
                self.resolve(raw, EntityKind::Player)?
                    .ok_or_else(|| ApiError::not_found(format!("player not found: {raw}")))
            })
            .collect::<ApiResult<Vec<String>>>()?;

        let mut key_parts = vec![
            Some("team"),
            Some(team_id.as_str()),
            Some("lineup-impact"),
            Some(season.as_str()),
        ];
        key_parts.extend(resolved_players.iter().map(|p| Some(p.as_str())));
        let key = cache_key(&key_parts);

        self.cached(&key, Some(TTL_PAIRWISE), || {
            let features = self.lineup_features(&season, &resolved_players)?;
            let gravity = self.lineup_gravity(&season, &resolved_players)?;
            let baseline = self.baseline_offense(&season, &team_id)?;

            let projection = project_lineup_impact(&team_id, &season, &features, &gravity, baseline)?;
            info!(
                team = %team_id,
                season = %season,
                offense = projection.metrics.offense_projection,
                "lineup projected"
            );
            Ok(LineupImpactPayload {
                projection,
                resolved: Resolved::team(&team_id, Some(season.as_str())),
            })
        })
    }

    /// Feature rows in lineup order. Players without a row for `season` fall
    /// back to their latest row from any season.
    fn lineup_features(&self, season: &str, players: &[String]) -> ApiResult<Vec<LineupFeatureRow>> {
        let mut params = vec![text(season)];
        params.extend(texts(players.iter().cloned()));
        let rows: Vec<FeatureProxyRow> = self.store().query_all(
            &format!(
                r#"
                SELECT player_id, usage_proxy, ts_proxy, ast_rate_proxy, tov_rate_proxy
                FROM player_season_features
                WHERE season_id = ? AND player_id IN ({})
                "#,
                placeholders(players.len())
            ),
            &params,
        )?;
        let mut by_player: HashMap<String, FeatureProxyRow> =
            rows.into_iter().map(|r| (r.player_id.clone(), r)).collect();

        let missing = players
            .iter()
            .filter(|p| !by_player.contains_key(*p))
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            let policy = FeatureFallback::default();
            debug!(season, ?missing, ?policy, "feature rows missing for season");
            match policy {
                FeatureFallback::IgnoreSeasonOnMiss => {
                    let fallback: Vec<FeatureProxyRow> = self.store().query_all(
                        &format!(
                            r#"
                            SELECT player_id, usage_proxy, ts_proxy, ast_rate_proxy, tov_rate_proxy
                            FROM player_season_features
                            WHERE player_id IN ({})
                            ORDER BY season_id DESC
                            "#,
                            placeholders(missing.len())
                        ),
                        &texts(missing.iter().cloned()),
                    )?;
                    for row in fallback {
                        by_player.entry(row.player_id.clone()).or_insert(row);
                    }
                }
            }
        }

        players
            .iter()
            .map(|p| {
                by_player
                    .get(p)
                    .cloned()
                    .map(LineupFeatureRow::from)
                    .ok_or_else(|| ApiError::not_found(format!("missing player features for {p}")))
            })
            .collect()
    }

    fn lineup_gravity(&self, season: &str, players: &[String]) -> ApiResult<HashMap<String, f64>> {
        let mut params: Vec<Value> = vec![text(season)];
        params.extend(texts(players.iter().cloned()));
        let rows: Vec<GravityRow> = self.store().query_all(
            &format!(
                r#"
                SELECT player_id, gravity_overall
                FROM nba_gravity
                WHERE season_id = ? AND player_id IN ({})
                "#,
                placeholders(players.len())
            ),
            &params,
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.gravity_overall.map(|g| (r.player_id, g)))
            .collect())
    }

    fn baseline_offense(&self, season: &str, team_id: &str) -> ApiResult<f64> {
        let baseline: Option<BaselineRow> = self.store().query_one(
            r#"
            SELECT gravity_adjusted_offense
            FROM team_gravity_effect
            WHERE season_id = ? AND team_id = ?
            "#,
            &[text(season), text(team_id)],
        )?;
        Ok(baseline
            .and_then(|b| b.gravity_adjusted_offense)
            .unwrap_or(0.0))
    }

    pub fn lineup_snapshots(&self, raw_team: &str, season: Option<&str>) -> ApiResult<LineupSnapshotsPayload> {
        let requested = require_season(season)?;
        let team_id = self.require(raw_team, EntityKind::Team, "team not found")?;
        let Some(season) = self.season_for(MetricsTable::LineupImpactSnapshots, &team_id, Some(requested))? else {
            return Ok(LineupSnapshotsPayload {
                season: requested.to_string(),
                team_id,
                results: Vec::new(),
                resolved: None,
            });
        };

        let key = cache_key(&[Some("team"), Some(team_id.as_str()), Some("lineup-snapshots"), Some(season.as_str())]);
        self.cached(&key, Some(TTL_SEASON_METRICS), || {
            let results: Vec<LineupSnapshot> = self.store().query_all(
                r#"
                SELECT lineup_key, player_ids_json, avg_gravity, offense_projection, spacing_index,
                       transition_fit, set_play_fit, gravity_delta_vs_team
                FROM lineup_impact_snapshots
                WHERE season_id = ? AND team_id = ?
                ORDER BY offense_projection DESC
                LIMIT ?
                "#,
                &[text(season.as_str()), text(team_id.as_str()), SNAPSHOT_LIMIT.into()],
            )?;
            Ok(LineupSnapshotsPayload {
                season: season.clone(),
                team_id: team_id.clone(),
                results,
                resolved: Some(Resolved::team(&team_id, Some(season.as_str()))),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_list_drops_blanks() {
        assert_eq!(
            parse_player_list(" 201939, ,2544,,EL_9001 "),
            vec!["201939", "2544", "EL_9001"]
        );
        assert!(parse_player_list(" , ").is_empty());
    }
}
