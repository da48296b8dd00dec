pub mod api;
pub mod config;
pub mod error;
pub mod games;
pub mod ids;
pub mod leaderboards;
pub mod lineup_impact;
pub mod lineups;
pub mod logging;
pub mod players;
pub mod response_cache;
pub mod similarity;
pub mod store;
pub mod teams;

pub use api::HoopsApi;
pub use config::Settings;
pub use error::{ApiError, ApiResult, LineupError, StoreError};
pub use store::{SqliteStore, Store};
