#[derive(Debug, thiserror::Error)]
pub enum CategorizerError {
    #[error("SQLite error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Supabase request failed: {0}")]
    Supabase(String),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Vocabulary term is empty")]
    EmptyTerm,

    #[error("Unknown category label: {0:?}")]
    UnknownCategory(String),

    #[error("Invalid review decision: {0}")]
    InvalidDecision(String),

    #[error("Vocabulary item not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
