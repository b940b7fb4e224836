use thiserror::Error;

/// Domain/infrastructure error taxonomy for the pipeline. Fatal startup
/// failures are raised directly as `anyhow::Error` via `.context(...)`;
/// this enum covers errors the pipeline must classify and handle in place.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid bookmaker pairing: {0}")]
    InvalidPairing(String),

    #[error("feed request failed: {0}")]
    FeedTransport(String),

    #[error("feed rate limited, retry after {retry_after:?}s")]
    FeedRateLimited { retry_after: Option<u64> },

    #[error("dedupe store error: {0}")]
    DedupeStore(String),

    #[error("telegram transport error: {0}")]
    TelegramTransport(String),

    #[error("telegram rate limited, retry after {0}s")]
    TelegramRateLimited(u64),

    #[error("telegram rejected the request: {0}")]
    TelegramBadRequest(String),

    #[error("telegram bot forbidden on this chat")]
    TelegramForbidden,

    #[error("gateway queue is full")]
    QueueFull,
}

/// Outcome of a single validator in the chain. Not an error in the Rust
/// sense — a normal, tracked application-level result.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub validator: &'static str,
    pub reason: String,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.validator, self.reason)
    }
}
