//! In-process query API: the lookups the dashboard consumes, each one
//! resolving raw identifiers first, then reading typed rows and caching the
//! serialized payload.

use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{ApiError, ApiResult};
use crate::ids::{self, EntityKind, MetricsTable};
use crate::response_cache::ResponseCache;
use crate::store::Store;

pub const SERVICE_NAME: &str = "hoopslab-api";
const MAX_SEASON_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
    pub service: String,
    pub ts: String,
}

/// Canonical keys a payload was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolved {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_id: Option<String>,
}

impl Resolved {
    pub fn player(player_id: &str, season_id: Option<&str>) -> Self {
        Self {
            player_id: Some(player_id.to_string()),
            season_id: season_id.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn team(team_id: &str, season_id: Option<&str>) -> Self {
        Self {
            team_id: Some(team_id.to_string()),
            season_id: season_id.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn game(game_id: &str) -> Self {
        Self {
            game_id: Some(game_id.to_string()),
            ..Self::default()
        }
    }
}

pub struct HoopsApi<S: Store> {
    store: S,
    cache: ResponseCache,
    settings: Settings,
}

impl<S: Store> HoopsApi<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        let cache = ResponseCache::new(settings.cache_ttl);
        Self {
            store,
            cache,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn health(&self) -> Health {
        Health {
            ok: true,
            service: SERVICE_NAME.to_string(),
            ts: Utc::now().to_rfc3339(),
        }
    }

    pub(crate) fn resolve(&self, raw: &str, kind: EntityKind) -> ApiResult<Option<String>> {
        Ok(ids::resolve_entity(
            &self.store,
            raw,
            kind,
            &self.settings.leagues,
        )?)
    }

    /// Resolve or fail with `NotFound(not_found)`.
    pub(crate) fn require(&self, raw: &str, kind: EntityKind, not_found: &str) -> ApiResult<String> {
        self.resolve(raw, kind)?
            .ok_or_else(|| ApiError::not_found(not_found))
    }

    pub(crate) fn season_for(
        &self,
        table: MetricsTable,
        entity_id: &str,
        requested: Option<&str>,
    ) -> ApiResult<Option<String>> {
        Ok(ids::resolve_season(&self.store, table, entity_id, requested)?)
    }

    /// Serve `key` from the cache, or build it with `load` and cache the
    /// result. Errors are never cached.
    pub(crate) fn cached<T, F>(&self, key: &str, ttl: Option<Duration>, load: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> ApiResult<T>,
    {
        if let Some(hit) = self.cache.get_json::<T>(key) {
            return Ok(hit);
        }
        let value = load()?;
        self.cache.put_json(key, &value, ttl);
        Ok(value)
    }
}

/// Trimmed, non-empty season parameter of bounded length.
pub(crate) fn require_season(raw: Option<&str>) -> ApiResult<&str> {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() && s.chars().count() <= MAX_SEASON_LEN => Ok(s),
        _ => Err(ApiError::invalid("season is required")),
    }
}

pub(crate) fn optional_param(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_param_is_trimmed_and_bounded() {
        assert_eq!(require_season(Some(" NBA_2025 ")).ok(), Some("NBA_2025"));
        assert!(require_season(None).is_err());
        assert!(require_season(Some("   ")).is_err());
        assert!(require_season(Some(&"9".repeat(33))).is_err());
    }

    #[test]
    fn resolved_skips_absent_keys_when_serialized() {
        let json = serde_json::to_string(&Resolved::team("NBA_1610612738", Some("NBA_2025")))
            .expect("serialize");
        assert_eq!(json, r#"{"team_id":"NBA_1610612738","season_id":"NBA_2025"}"#);
    }
}
