use thiserror::Error;

pub type Result<T> = std::result::Result<T, WafError>;

#[derive(Debug, Error)]
pub enum WafError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for WafError {
    fn from(err: reqwest::Error) -> Self {
        WafError::Network(err.to_string())
    }
}
