use thiserror::Error;

/// Failure reaching or reading the relational store. Always fatal for the
/// request that hit it; nothing retries.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineupError {
    #[error("lineup needs exactly {expected} players, got {got}")]
    WrongPlayerCount { expected: usize, got: usize },
}

/// Outcome of a query API call that did not produce a payload.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lineup(#[from] LineupError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Store failures are the only variant a caller should surface as a
    /// service error rather than a client-facing message.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
