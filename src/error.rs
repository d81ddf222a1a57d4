use thiserror::Error;

/// Persistence failures. `ResultNotFound` and `LabelOutOfRange` are
/// invariant violations surfaced immediately; the rest are fatal I/O.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored result for query {query_id} and url {url}")]
    ResultNotFound { query_id: i64, url: String },

    #[error("label {label} is outside [0, {max_label}]")]
    LabelOutOfRange { label: u8, max_label: u8 },

    #[error("corrupt payload stored for url {url}")]
    Payload {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Transient failures of the search collaborator. The orchestrator skips
/// the affected query and retries it on the next run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("search request failed")]
    Http(#[from] reqwest::Error),
}

/// Transient failures of the judge collaborator. Malformed but parseable
/// completions are not errors; they degrade to no-decision outcomes.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("judge request failed")]
    Http(#[from] reqwest::Error),

    #[error("judge response contained no completion choices")]
    EmptyCompletion,
}
