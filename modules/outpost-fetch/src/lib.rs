//! Fetch Strategy Manager: fetch a URL via an ordered list of
//! strategies with per-publisher memory and WAF-aware failure.

pub mod manager;
pub mod strategies;

pub use manager::FetchManager;
pub use strategies::{direct::DirectStrategy, proxy::ProxyStrategy};

use async_trait::async_trait;
use outpost_common::FetchResult;

/// Error from a single strategy attempt.
#[derive(Debug, Clone, thiserror::Error)]
#[error("strategy {strategy} failed: {cause}")]
pub struct FetchError {
    pub strategy: String,
    pub cause: String,
}

/// Raised when every configured strategy has failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("all fetch strategies exhausted: {errors:?}")]
pub struct AllStrategiesExhausted {
    pub errors: Vec<FetchError>,
}

pub type FetchOutcome = std::result::Result<FetchResult, FetchError>;

/// Shared shape every fetch strategy implements (REDESIGN FLAGS: "Polymorphic
/// fetcher with shared state" — an interface `{name; fetch(url) -> Result |
/// Error}`, no escalated privileges beyond the URL itself).
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, url: &str) -> FetchOutcome;
}
