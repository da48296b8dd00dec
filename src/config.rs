use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::ids::LeagueNamespaces;

const APP_DIR: &str = "hoopslab";
const DB_FILE: &str = "hoopslab.sqlite";

pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 10;
pub const DEFAULT_COMPS_K: usize = 10;
pub const MAX_COMPS_K: usize = 50;

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub comps_default_k: usize,
    pub comps_max_k: usize,
    pub leagues: LeagueNamespaces,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            comps_default_k: DEFAULT_COMPS_K,
            comps_max_k: MAX_COMPS_K,
            leagues: LeagueNamespaces::default(),
        }
    }
}

impl Settings {
    /// Load `.env.local` / `.env` if present, then read `HOOPSLAB_*` overrides.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key).and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
        };

        let db_path = get("HOOPSLAB_DB")
            .map(|p| PathBuf::from(p.trim()))
            .or_else(default_db_path);
        let cache_ttl_secs = get("HOOPSLAB_CACHE_TTL_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS)
            .max(1);
        let comps_max_k = get("HOOPSLAB_COMPS_MAX_K")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(MAX_COMPS_K)
            .max(1);
        let comps_default_k = get("HOOPSLAB_COMPS_DEFAULT_K")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_COMPS_K)
            .clamp(1, comps_max_k);
        let leagues = get("HOOPSLAB_LEAGUE_PREFIXES")
            .and_then(|raw| LeagueNamespaces::parse(&raw))
            .unwrap_or_default();

        Self {
            db_path,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            comps_default_k,
            comps_max_k,
            leagues,
        }
    }

    /// Clamp a caller-supplied comps size; missing or non-positive falls back
    /// to the default.
    pub fn comps_limit(&self, requested: Option<&str>) -> usize {
        match requested.and_then(|raw| raw.trim().parse::<f64>().ok()) {
            Some(k) if k.is_finite() && k > 0.0 => (k as usize).clamp(1, self.comps_max_k),
            _ => self.comps_default_k,
        }
    }
}

pub fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DB_FILE))
}
