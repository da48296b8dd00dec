//! Identity resolution: raw caller identifiers to canonical store keys, and
//! season hints to seasons that actually have data.
//!
//! Canonical keys are league-prefixed (`NBA_201939`, `EL_9001`). Callers send
//! bare ids, mixed case, or fully qualified keys; [`expand_candidates`]
//! produces every plausible canonical form and [`resolve_canonical_key`]
//! picks the earliest one the store knows about.

use std::collections::HashSet;

use tracing::debug;

use crate::error::StoreError;
use crate::store::{Store, placeholders, text, texts};

/// Marks an id as already league-qualified.
pub const QUALIFIED_SEPARATOR: char = '_';

/// The two league namespaces a bare id may belong to, in preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueNamespaces {
    pub primary: String,
    pub secondary: String,
}

impl Default for LeagueNamespaces {
    fn default() -> Self {
        Self {
            primary: "NBA".to_string(),
            secondary: "EL".to_string(),
        }
    }
}

impl LeagueNamespaces {
    /// `"NBA,EL"` style list; needs exactly two non-empty prefixes.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts = raw
            .split([',', ';', ' '])
            .map(|p| p.trim().to_ascii_uppercase())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>();
        match parts.as_slice() {
            [primary, secondary] => Some(Self {
                primary: primary.clone(),
                secondary: secondary.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Team,
    Game,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Player => "players",
            EntityKind::Team => "teams",
            EntityKind::Game => "games",
        }
    }

    pub fn id_column(self) -> &'static str {
        match self {
            EntityKind::Player => "player_id",
            EntityKind::Team => "team_id",
            EntityKind::Game => "game_id",
        }
    }
}

/// Season-partitioned metrics tables, each keyed by `(entity id, season_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricsTable {
    PlayerSeasonFeatures,
    PlayerShotProfiles,
    PlayerTranslation,
    PlayerGravity,
    TeamShotProfiles,
    TeamGravityEffect,
    TeamFatigue,
    TeamPlayStyle,
    LineupImpactSnapshots,
}

impl MetricsTable {
    pub const ALL: [MetricsTable; 9] = [
        MetricsTable::PlayerSeasonFeatures,
        MetricsTable::PlayerShotProfiles,
        MetricsTable::PlayerTranslation,
        MetricsTable::PlayerGravity,
        MetricsTable::TeamShotProfiles,
        MetricsTable::TeamGravityEffect,
        MetricsTable::TeamFatigue,
        MetricsTable::TeamPlayStyle,
        MetricsTable::LineupImpactSnapshots,
    ];

    pub fn table(self) -> &'static str {
        match self {
            MetricsTable::PlayerSeasonFeatures => "player_season_features",
            MetricsTable::PlayerShotProfiles => "player_shot_profiles",
            MetricsTable::PlayerTranslation => "player_translation_metrics",
            MetricsTable::PlayerGravity => "nba_gravity",
            MetricsTable::TeamShotProfiles => "team_shot_profiles",
            MetricsTable::TeamGravityEffect => "team_gravity_effect",
            MetricsTable::TeamFatigue => "team_fatigue_effect",
            MetricsTable::TeamPlayStyle => "team_play_style_metrics",
            MetricsTable::LineupImpactSnapshots => "lineup_impact_snapshots",
        }
    }

    pub fn entity(self) -> EntityKind {
        match self {
            MetricsTable::PlayerSeasonFeatures
            | MetricsTable::PlayerShotProfiles
            | MetricsTable::PlayerTranslation
            | MetricsTable::PlayerGravity => EntityKind::Player,
            MetricsTable::TeamShotProfiles
            | MetricsTable::TeamGravityEffect
            | MetricsTable::TeamFatigue
            | MetricsTable::TeamPlayStyle
            | MetricsTable::LineupImpactSnapshots => EntityKind::Team,
        }
    }

    pub fn id_column(self) -> &'static str {
        self.entity().id_column()
    }
}

/// Ordered, de-duplicated canonical forms of one raw id. Position is
/// preference: index 0 beats index 1 when both exist in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet(Vec<String>);

impl CandidateSet {
    pub fn from_ordered<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for item in items {
            let item = item.into();
            if item.is_empty() {
                continue;
            }
            if seen.insert(item.clone()) {
                out.push(item);
            }
        }
        Self(out)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

pub fn expand_candidates(raw: &str) -> CandidateSet {
    expand_candidates_with(raw, &LeagueNamespaces::default())
}

pub fn expand_candidates_with(raw: &str, leagues: &LeagueNamespaces) -> CandidateSet {
    let value = raw.trim();
    if value.is_empty() {
        return CandidateSet::default();
    }
    let upper = value.to_uppercase();
    if value.contains(QUALIFIED_SEPARATOR) {
        return CandidateSet::from_ordered([value.to_string(), upper]);
    }
    CandidateSet::from_ordered([
        value.to_string(),
        upper,
        format!("{}{QUALIFIED_SEPARATOR}{value}", leagues.primary),
        format!("{}{QUALIFIED_SEPARATOR}{value}", leagues.secondary),
    ])
}

/// Pick the single existing canonical key for `candidates`, preferring the
/// earliest candidate when several rows match. `Ok(None)` means no such
/// entity; an empty set never touches the store.
pub fn resolve_canonical_key<S: Store>(
    store: &S,
    candidates: &CandidateSet,
    kind: EntityKind,
) -> Result<Option<String>, StoreError> {
    if candidates.is_empty() {
        return Ok(None);
    }
    let sql = format!(
        "SELECT {col} FROM {table} WHERE {col} IN ({marks})",
        col = kind.id_column(),
        table = kind.table(),
        marks = placeholders(candidates.len()),
    );
    let found: HashSet<String> = store
        .query_all::<String>(&sql, &texts(candidates.iter().cloned()))?
        .into_iter()
        .collect();

    let resolved = candidates.iter().find(|c| found.contains(*c)).cloned();
    match &resolved {
        Some(key) => debug!(kind = ?kind, key = %key, "resolved canonical key"),
        None => debug!(kind = ?kind, candidates = ?candidates.as_slice(), "no canonical key"),
    }
    Ok(resolved)
}

/// Expand and resolve in one step.
pub fn resolve_entity<S: Store>(
    store: &S,
    raw: &str,
    kind: EntityKind,
    leagues: &LeagueNamespaces,
) -> Result<Option<String>, StoreError> {
    let candidates = expand_candidates_with(raw, leagues);
    resolve_canonical_key(store, &candidates, kind)
}

/// Season to read from `table` for `entity_id`.
///
/// An existing `requested` season is returned unchanged. Otherwise the
/// entity's greatest season key wins. Season keys compare as text
/// (`NBA_2024` < `NBA_2025`), which assumes one fixed-width
/// `PREFIX_YEAR` format per entity.
pub fn resolve_season<S: Store>(
    store: &S,
    table: MetricsTable,
    entity_id: &str,
    requested: Option<&str>,
) -> Result<Option<String>, StoreError> {
    let requested = requested.map(str::trim).filter(|s| !s.is_empty());

    if let Some(season) = requested {
        let sql = format!(
            "SELECT season_id FROM {table} WHERE {col} = ? AND season_id = ? LIMIT 1",
            table = table.table(),
            col = table.id_column(),
        );
        let exact: Option<String> = store.query_one(&sql, &[text(entity_id), text(season)])?;
        if exact.is_some() {
            return Ok(Some(season.to_string()));
        }
    }

    let sql = format!(
        "SELECT season_id FROM {table} WHERE {col} = ? ORDER BY season_id DESC LIMIT 1",
        table = table.table(),
        col = table.id_column(),
    );
    let latest: Option<String> = store.query_one(&sql, &[text(entity_id)])?;
    match (&latest, requested) {
        (Some(season), Some(asked)) => debug!(
            table = table.table(),
            entity = entity_id,
            requested = asked,
            fallback = %season,
            "season fallback to latest available"
        ),
        (None, _) => debug!(table = table.table(), entity = entity_id, "no season partition"),
        _ => {}
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(set: &CandidateSet) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn bare_numeric_id_gets_both_league_prefixes() {
        let set = expand_candidates(" 201939 ");
        assert_eq!(items(&set), vec!["201939", "NBA_201939", "EL_201939"]);
    }

    #[test]
    fn bare_alpha_id_keeps_case_variant() {
        let set = expand_candidates("abc");
        assert_eq!(items(&set), vec!["abc", "ABC", "NBA_abc", "EL_abc"]);
    }

    #[test]
    fn qualified_id_only_gets_upper_case_variant() {
        assert_eq!(items(&expand_candidates("nba_2544")), vec!["nba_2544", "NBA_2544"]);
        assert_eq!(items(&expand_candidates("EL_9001")), vec!["EL_9001"]);
    }

    #[test]
    fn blank_id_expands_to_nothing() {
        assert!(expand_candidates("").is_empty());
        assert!(expand_candidates("   \t").is_empty());
    }

    #[test]
    fn candidate_set_drops_empties_and_keeps_first_occurrence() {
        let set = CandidateSet::from_ordered(["b", "", "a", "b", "c", "a"]);
        assert_eq!(items(&set), vec!["b", "a", "c"]);
    }

    #[test]
    fn custom_namespaces_are_used_in_order() {
        let leagues = LeagueNamespaces::parse("gl;wnba").expect("two prefixes");
        let set = expand_candidates_with("7", &leagues);
        assert_eq!(items(&set), vec!["7", "GL_7", "WNBA_7"]);
    }

    #[test]
    fn namespaces_need_exactly_two_prefixes() {
        assert!(LeagueNamespaces::parse("").is_none());
        assert!(LeagueNamespaces::parse("NBA").is_none());
        assert!(LeagueNamespaces::parse("NBA,EL,GL").is_none());
    }

    #[test]
    fn metrics_tables_map_to_entity_columns() {
        assert_eq!(MetricsTable::TeamPlayStyle.id_column(), "team_id");
        assert_eq!(MetricsTable::PlayerGravity.table(), "nba_gravity");
        let players = MetricsTable::ALL
            .iter()
            .filter(|t| t.entity() == EntityKind::Player)
            .count();
        assert_eq!(players, 4);
    }
}
