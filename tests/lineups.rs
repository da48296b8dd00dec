mod common;

use hoopslab::ApiError;

use common::seeded_api;

const WARRIORS: &str = "1610612744";
const STARTERS: &str = "201939, 2544, 203999, 1628369, 1627759";

#[test]
fn lineup_projection_uses_stored_features_and_gravity() {
    let api = seeded_api();
    let out = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some(STARTERS))
        .expect("lineup should project");

    let p = &out.projection;
    assert_eq!(p.team_id, "NBA_1610612744");
    assert_eq!(p.season_id, "NBA_2025");
    assert_eq!(
        p.players,
        vec!["NBA_201939", "NBA_2544", "NBA_203999", "NBA_1628369", "NBA_1627759"]
    );
    assert_eq!(p.metrics.avg_gravity, 5.0);
    assert_eq!(p.metrics.offense_projection, 118.3);
    assert_eq!(p.metrics.spacing_index, 59.0);
    assert_eq!(p.metrics.transition_fit, 30.25);
    assert_eq!(p.metrics.set_play_fit, 61.5);
    assert_eq!(p.metrics.baseline_team_offense, 108.4);
    assert_eq!(p.metrics.gravity_delta_vs_team, 9.9);
    assert_eq!(out.resolved.team_id.as_deref(), Some("NBA_1610612744"));
    assert_eq!(out.resolved.season_id.as_deref(), Some("NBA_2025"));
}

#[test]
fn lineup_payload_serializes_flat() {
    let api = seeded_api();
    let out = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some(STARTERS))
        .expect("lineup should project");
    let json = serde_json::to_value(&out).expect("serialize");
    assert_eq!(json["season"], "NBA_2025");
    assert_eq!(json["metrics"]["offense_projection"], 118.3);
    assert_eq!(json["resolved"]["team_id"], "NBA_1610612744");
}

#[test]
fn unknown_team_season_falls_back_to_latest_play_style_season() {
    let api = seeded_api();
    let out = api
        .lineup_impact(WARRIORS, Some("NBA_2026"), Some(STARTERS))
        .expect("lineup should project");
    assert_eq!(out.projection.season_id, "NBA_2025");
    assert_eq!(out.projection.metrics.offense_projection, 118.3);
}

#[test]
fn player_without_season_features_uses_latest_other_season() {
    let api = seeded_api();
    // Edwards only has NBA_2024 features, identical to Brown's NBA_2025 row.
    let out = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some("201939,2544,203999,1628369,1630162"))
        .expect("lineup should project");
    assert_eq!(out.projection.players[4], "NBA_1630162");
    assert_eq!(out.projection.metrics.offense_projection, 118.3);
    assert_eq!(out.projection.metrics.avg_gravity, 5.0);
}

#[test]
fn team_without_baseline_compares_against_zero() {
    let api = seeded_api();
    let out = api
        .lineup_impact("1610612738", Some("NBA_2025"), Some(STARTERS))
        .expect("lineup should project");
    assert_eq!(out.projection.team_id, "NBA_1610612738");
    assert_eq!(out.projection.season_id, "NBA_2025");
    assert_eq!(out.projection.metrics.baseline_team_offense, 0.0);
    assert_eq!(out.projection.metrics.gravity_delta_vs_team, 118.3);
}

#[test]
fn lineup_requires_exactly_five_players() {
    let api = seeded_api();
    for players in ["201939,2544,203999,1628369", "201939,2544,203999,1628369,1627759,1630162", " , "] {
        let err = api
            .lineup_impact(WARRIORS, Some("NBA_2025"), Some(players))
            .expect_err("wrong lineup size");
        assert!(matches!(err, ApiError::InvalidInput(_)), "{players}: {err}");
    }
}

#[test]
fn lineup_requires_season_and_players() {
    let api = seeded_api();
    let err = api
        .lineup_impact(WARRIORS, None, Some(STARTERS))
        .expect_err("season missing");
    assert!(matches!(err, ApiError::InvalidInput(_)));
    let err = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some("   "))
        .expect_err("players missing");
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[test]
fn unknown_team_or_player_is_not_found() {
    let api = seeded_api();
    let err = api
        .lineup_impact("999", Some("NBA_2025"), Some(STARTERS))
        .expect_err("unknown team");
    assert!(err.is_not_found());

    // The team is resolved before the lineup size is checked.
    let err = api
        .lineup_impact("999", Some("NBA_2025"), Some("201939,2544"))
        .expect_err("unknown team");
    assert!(err.is_not_found(), "{err}");

    let err = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some("201939,2544,203999,1628369,424242"))
        .expect_err("unknown player");
    assert!(err.is_not_found());
    assert!(err.to_string().contains("424242"), "{err}");
}

#[test]
fn player_with_no_features_anywhere_is_not_found() {
    let api = seeded_api();
    let err = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some("201939,2544,203999,1628369,EL_9002"))
        .expect_err("no features for EL_9002");
    assert!(err.is_not_found());
    assert!(err.to_string().contains("EL_9002"), "{err}");
}

#[test]
fn same_player_listed_twice_is_averaged_per_slot() {
    let api = seeded_api();
    let out = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some("201939,NBA_201939,2544,203999,1628369"))
        .expect("lineup should project");

    let p = &out.projection;
    assert_eq!(
        p.players,
        vec!["NBA_201939", "NBA_201939", "NBA_2544", "NBA_203999", "NBA_1628369"]
    );
    // gravity (9 + 9 + 6 + 5 + 3) / 5
    assert_eq!(p.metrics.avg_gravity, 6.4);
    // 102 + 0.12 * 6.4 + 25 * 0.596 + 12 * 0.24 - 10 * 0.136
    assert_eq!(p.metrics.offense_projection, 119.19);
    assert_eq!(p.metrics.spacing_index, 60.88);
    assert_eq!(p.metrics.transition_fit, 35.92);
    assert_eq!(p.metrics.set_play_fit, 63.69);
    assert_eq!(p.metrics.gravity_delta_vs_team, 10.79);
}

#[test]
fn repeated_lineup_is_served_from_cache() {
    let api = seeded_api();
    let first = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some(STARTERS))
        .expect("lineup should project");
    let cached = api.cache().len();
    let second = api
        .lineup_impact(WARRIORS, Some("NBA_2025"), Some(STARTERS))
        .expect("lineup should project");
    assert_eq!(api.cache().len(), cached);
    assert_eq!(first.projection, second.projection);
}

#[test]
fn snapshots_are_best_offense_first() {
    let api = seeded_api();
    let out = api
        .lineup_snapshots(WARRIORS, Some("NBA_2025"))
        .expect("snapshots should load");
    let keys = out.results.iter().map(|s| s.lineup_key.as_str()).collect::<Vec<_>>();
    assert_eq!(keys, vec!["small", "big", "broken"]);
    assert_eq!(out.results[0].player_ids.len(), 5);
    assert!(out.results[2].player_ids.is_empty());
    assert!(out.resolved.is_some());
}

#[test]
fn team_without_snapshots_gets_an_empty_list() {
    let api = seeded_api();
    let out = api
        .lineup_snapshots("1610612738", Some("NBA_2025"))
        .expect("empty snapshots");
    assert_eq!(out.team_id, "NBA_1610612738");
    assert_eq!(out.season, "NBA_2025");
    assert!(out.results.is_empty());
    assert!(out.resolved.is_none());
}
