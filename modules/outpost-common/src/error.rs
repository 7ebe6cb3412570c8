use thiserror::Error;

/// Error kinds shared across the pipeline.
///
/// `BrokerFailure` is deliberately never returned from a call site that
/// propagates to the Supervisor — publishers catch and log it themselves
/// (see `outpost-events`). It is listed here because step code still needs
/// a name for "the broker failed" when constructing log messages.
#[derive(Debug, Error)]
pub enum OutpostError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("fetch via strategy {strategy} failed: {cause}")]
    FetchError { strategy: String, cause: String },

    #[error("all fetch strategies exhausted: {0:?}")]
    AllStrategiesExhausted(Vec<String>),

    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("LLM collaborator failure: {0}")]
    LlmFailure(String),

    #[error("dependency timed out after {0:?}")]
    DependencyTimeout(std::time::Duration),

    #[error("broker failure (non-fatal): {0}")]
    BrokerFailure(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("job cancelled: queue timeout exceeded")]
    Cancelled,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OutpostError>;
