use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LineupError;
use crate::similarity::round_to;

pub const LINEUP_SIZE: usize = 5;

// Calibrated weights; fixed values, not tunables.
const OFFENSE_BASE: f64 = 102.0;
const OFFENSE_GRAVITY: f64 = 0.12;
const OFFENSE_TS: f64 = 25.0;
const OFFENSE_USAGE: f64 = 12.0;
const OFFENSE_TOV: f64 = 10.0;
const SPACING_TS: f64 = 100.0;
const SPACING_GRAVITY: f64 = 0.2;
const TRANSITION_SCALE: f64 = 100.0;
const TRANSITION_GRAVITY: f64 = 0.05;
const SET_PLAY_TS: f64 = 100.0;
const SET_PLAY_AST: f64 = 25.0;
const SET_PLAY_TOV: f64 = 20.0;
const SET_PLAY_GRAVITY: f64 = 0.08;

const OUTPUT_DECIMALS: i32 = 2;

/// Per-player proxies the projection reads from `player_season_features`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupFeatureRow {
    pub player_id: String,
    pub usage: f64,
    pub true_shooting: f64,
    pub assist_rate: f64,
    pub turnover_rate: f64,
}

/// What a lineup member without a gravity row contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GravityFallback {
    /// Gravity data lags feature data; a missing score counts as 0.
    #[default]
    ZeroOnMissing,
}

impl GravityFallback {
    pub fn score(self, found: Option<f64>) -> f64 {
        match self {
            GravityFallback::ZeroOnMissing => found.filter(|g| g.is_finite()).unwrap_or(0.0),
        }
    }
}

/// Where to look when a player has no feature row for the resolved season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureFallback {
    /// Take any season's row for that player, latest season first.
    #[default]
    IgnoreSeasonOnMiss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupMetrics {
    pub avg_gravity: f64,
    pub offense_projection: f64,
    pub spacing_index: f64,
    pub transition_fit: f64,
    pub set_play_fit: f64,
    pub gravity_delta_vs_team: f64,
    pub baseline_team_offense: f64,
}

/// Computed per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupProjection {
    #[serde(rename = "season")]
    pub season_id: String,
    pub team_id: String,
    pub players: Vec<String>,
    pub metrics: LineupMetrics,
}

#[derive(Debug, Clone, Copy, Default)]
struct LineupAverages {
    gravity: f64,
    usage: f64,
    true_shooting: f64,
    assist_rate: f64,
    turnover_rate: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn averages(
    players: &[LineupFeatureRow],
    gravity: &HashMap<String, f64>,
    fallback: GravityFallback,
) -> LineupAverages {
    LineupAverages {
        gravity: mean(
            players
                .iter()
                .map(|p| fallback.score(gravity.get(&p.player_id).copied())),
        ),
        usage: mean(players.iter().map(|p| p.usage)),
        true_shooting: mean(players.iter().map(|p| p.true_shooting)),
        assist_rate: mean(players.iter().map(|p| p.assist_rate)),
        turnover_rate: mean(players.iter().map(|p| p.turnover_rate)),
    }
}

/// Project team-level offense for a five-man lineup and compare it against
/// the team's stored gravity-adjusted offense.
///
/// `players` must hold exactly [`LINEUP_SIZE`] rows; their order is kept in
/// the output and a player listed twice is averaged once per slot. Every metric is rounded half away from zero to two
/// decimals, and the delta is taken from the rounded projection.
pub fn project_lineup_impact(
    team_id: &str,
    season_id: &str,
    players: &[LineupFeatureRow],
    gravity: &HashMap<String, f64>,
    baseline_offense: f64,
) -> Result<LineupProjection, LineupError> {
    if players.len() != LINEUP_SIZE {
        return Err(LineupError::WrongPlayerCount {
            expected: LINEUP_SIZE,
            got: players.len(),
        });
    }

    let fallback = GravityFallback::default();
    let missing_gravity = players
        .iter()
        .filter(|p| !gravity.contains_key(&p.player_id))
        .count();
    if missing_gravity > 0 {
        debug!(team = team_id, season = season_id, missing_gravity, "gravity defaulted to 0");
    }

    let avg = averages(players, gravity, fallback);

    let offense_projection = round_to(
        OFFENSE_BASE + OFFENSE_GRAVITY * avg.gravity + OFFENSE_TS * avg.true_shooting
            + OFFENSE_USAGE * avg.usage
            - OFFENSE_TOV * avg.turnover_rate,
        OUTPUT_DECIMALS,
    );
    let spacing_index = round_to(
        SPACING_TS * avg.true_shooting + SPACING_GRAVITY * avg.gravity,
        OUTPUT_DECIMALS,
    );
    let transition_fit = round_to(
        TRANSITION_SCALE * (avg.usage + avg.assist_rate - avg.turnover_rate)
            + TRANSITION_GRAVITY * avg.gravity,
        OUTPUT_DECIMALS,
    );
    let set_play_fit = round_to(
        SET_PLAY_TS * avg.true_shooting + SET_PLAY_AST * avg.assist_rate
            - SET_PLAY_TOV * avg.turnover_rate
            + SET_PLAY_GRAVITY * avg.gravity,
        OUTPUT_DECIMALS,
    );
    let gravity_delta_vs_team = round_to(offense_projection - baseline_offense, OUTPUT_DECIMALS);

    Ok(LineupProjection {
        season_id: season_id.to_string(),
        team_id: team_id.to_string(),
        players: players.iter().map(|p| p.player_id.clone()).collect(),
        metrics: LineupMetrics {
            avg_gravity: round_to(avg.gravity, OUTPUT_DECIMALS),
            offense_projection,
            spacing_index,
            transition_fit,
            set_play_fit,
            gravity_delta_vs_team,
            baseline_team_offense: baseline_offense,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, usage: f64, ts: f64, ast: f64, tov: f64) -> LineupFeatureRow {
        LineupFeatureRow {
            player_id: id.to_string(),
            usage,
            true_shooting: ts,
            assist_rate: ast,
            turnover_rate: tov,
        }
    }

    fn uniform_lineup(usage: f64, ts: f64, ast: f64, tov: f64) -> Vec<LineupFeatureRow> {
        (1..=5)
            .map(|i| row(&format!("NBA_{i}"), usage, ts, ast, tov))
            .collect()
    }

    fn uniform_gravity(value: f64) -> HashMap<String, f64> {
        (1..=5).map(|i| (format!("NBA_{i}"), value)).collect()
    }

    #[test]
    fn reference_lineup_matches_hand_computation() {
        let players = uniform_lineup(0.20, 0.58, 0.22, 0.12);
        let out = project_lineup_impact("NBA_T", "NBA_2025", &players, &uniform_gravity(5.0), 108.4)
            .expect("five players");

        assert_eq!(out.metrics.offense_projection, 118.3);
        assert_eq!(out.metrics.gravity_delta_vs_team, 9.9);
        assert_eq!(out.metrics.avg_gravity, 5.0);
        // 100 * 0.58 + 0.2 * 5
        assert_eq!(out.metrics.spacing_index, 59.0);
        // 100 * (0.20 + 0.22 - 0.12) + 0.05 * 5
        assert_eq!(out.metrics.transition_fit, 30.25);
        // 58 + 5.5 - 2.4 + 0.4
        assert_eq!(out.metrics.set_play_fit, 61.5);
        assert_eq!(out.metrics.baseline_team_offense, 108.4);
        assert_eq!(out.players, vec!["NBA_1", "NBA_2", "NBA_3", "NBA_4", "NBA_5"]);
    }

    #[test]
    fn averages_are_unweighted_across_five() {
        let players = vec![
            row("A", 0.30, 0.60, 0.20, 0.10),
            row("B", 0.10, 0.50, 0.20, 0.10),
            row("C", 0.20, 0.55, 0.20, 0.10),
            row("D", 0.20, 0.55, 0.20, 0.10),
            row("E", 0.20, 0.55, 0.20, 0.10),
        ];
        let gravity = HashMap::from([("A".to_string(), 10.0), ("B".to_string(), 0.0)]);
        let out = project_lineup_impact("T", "S", &players, &gravity, 0.0).expect("five players");
        // avg gravity = 10 / 5 with C, D, E defaulted to zero
        assert_eq!(out.metrics.avg_gravity, 2.0);
        // 102 + 0.24 + 13.75 + 2.4 - 1.0
        assert_eq!(out.metrics.offense_projection, 117.39);
        assert_eq!(out.metrics.gravity_delta_vs_team, 117.39);
    }

    #[test]
    fn missing_gravity_counts_as_zero() {
        let players = uniform_lineup(0.20, 0.58, 0.22, 0.12);
        let with_zero = project_lineup_impact("T", "S", &players, &uniform_gravity(0.0), 100.0)
            .expect("five players");
        let without = project_lineup_impact("T", "S", &players, &HashMap::new(), 100.0)
            .expect("five players");
        assert_eq!(with_zero.metrics, without.metrics);
        assert_eq!(GravityFallback::ZeroOnMissing.score(Some(f64::NAN)), 0.0);
    }

    #[test]
    fn identical_inputs_serialize_identically() {
        let players = uniform_lineup(0.213, 0.577, 0.219, 0.121);
        let gravity = uniform_gravity(63.7);
        let a = project_lineup_impact("T", "S", &players, &gravity, 111.1).expect("five players");
        let b = project_lineup_impact("T", "S", &players, &gravity, 111.1).expect("five players");
        assert_eq!(
            serde_json::to_string(&a).expect("serialize"),
            serde_json::to_string(&b).expect("serialize")
        );
    }

    #[test]
    fn raising_positive_coefficient_inputs_raises_offense() {
        let gravity = uniform_gravity(5.0);
        let base = project_lineup_impact("T", "S", &uniform_lineup(0.20, 0.58, 0.22, 0.12), &gravity, 0.0)
            .expect("five players");
        let up = project_lineup_impact("T", "S", &uniform_lineup(0.25, 0.63, 0.27, 0.12), &gravity, 0.0)
            .expect("five players");
        let more_tov = project_lineup_impact("T", "S", &uniform_lineup(0.20, 0.58, 0.22, 0.20), &gravity, 0.0)
            .expect("five players");
        assert!(up.metrics.offense_projection > base.metrics.offense_projection);
        assert!(more_tov.metrics.offense_projection < base.metrics.offense_projection);
    }

    #[test]
    fn wrong_lineup_size_fails_fast() {
        let mut players = uniform_lineup(0.2, 0.5, 0.2, 0.1);
        players.pop();
        let err = project_lineup_impact("T", "S", &players, &HashMap::new(), 0.0).unwrap_err();
        assert_eq!(err, LineupError::WrongPlayerCount { expected: 5, got: 4 });
    }

    #[test]
    fn repeated_player_counts_once_per_slot() {
        let mut players = uniform_lineup(0.20, 0.58, 0.22, 0.12);
        players[4] = players[0].clone();
        let gravity = HashMap::from([("NBA_1".to_string(), 10.0)]);
        let out = project_lineup_impact("T", "S", &players, &gravity, 0.0).expect("five slots");
        // NBA_1 fills two of five slots: (10 + 10) / 5
        assert_eq!(out.metrics.avg_gravity, 4.0);
        assert_eq!(out.players[0], out.players[4]);
    }
}
