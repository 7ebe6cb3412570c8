use outpost_common::FetchResult;
use tracing::{debug, warn};

use crate::{AllStrategiesExhausted, FetchError, FetchStrategy};

/// Orders and retries fetch strategies, remembering which one last won for a
/// publisher. `fetch_manager` owns no storage: it reports the new
/// preference back to the caller, which is the only actor allowed to persist
/// the narrow `publisher.fetch_strategy` column.
pub struct FetchManager {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

/// Outcome of a `FetchManager::fetch` call: the winning result, plus the new
/// preferred-strategy name when it differs from what the caller passed in.
pub struct FetchManagerOutcome {
    pub result: FetchResult,
    pub new_preference: Option<String>,
}

impl FetchManager {
    /// Strategies are tried in *declared* order by default. `register`
    /// preserves that declaration order.
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Fetch `url`, trying `preferred_strategy` first if set and known, then
    /// the remaining strategies in declared order.
    pub async fn fetch(
        &self,
        url: &str,
        preferred_strategy: Option<&str>,
    ) -> Result<FetchManagerOutcome, AllStrategiesExhausted> {
        let order = self.ordering_for(preferred_strategy);
        let mut errors = Vec::new();

        for idx in order {
            let strategy = &self.strategies[idx];
            debug!(url, strategy = strategy.name(), "attempting fetch strategy");
            match strategy.fetch(url).await {
                Ok(result) => {
                    let winner = strategy.name().to_string();
                    let new_preference = if preferred_strategy != Some(winner.as_str()) {
                        Some(winner)
                    } else {
                        None
                    };
                    return Ok(FetchManagerOutcome {
                        result,
                        new_preference,
                    });
                }
                Err(e) => {
                    warn!(url, strategy = strategy.name(), error = %e.cause, "fetch strategy failed");
                    errors.push(e);
                }
            }
        }

        Err(AllStrategiesExhausted { errors })
    }

    /// Indices into `self.strategies` in the order they should be tried.
    fn ordering_for(&self, preferred_strategy: Option<&str>) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.strategies.len()).collect();
        if let Some(preferred) = preferred_strategy {
            if let Some(pos) = self.strategies.iter().position(|s| s.name() == preferred) {
                order.remove(pos);
                order.insert(0, pos);
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeStrategy {
        name: &'static str,
        succeeds: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FetchStrategy for FakeStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, url: &str) -> crate::FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeeds {
                Ok(FetchResult {
                    body: "<html>ok</html>".to_string(),
                    status: 200,
                    strategy: self.name.to_string(),
                    final_url: url.to_string(),
                    headers: Vec::new(),
                })
            } else {
                Err(FetchError {
                    strategy: self.name.to_string(),
                    cause: "boom".to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn falls_back_from_a_to_b_and_remembers_b() {
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let manager = FetchManager::new(vec![
            Box::new(FakeStrategy {
                name: "direct",
                succeeds: false,
                calls: a_calls.clone(),
            }),
            Box::new(FakeStrategy {
                name: "proxy",
                succeeds: true,
                calls: b_calls.clone(),
            }),
        ]);

        let outcome = manager.fetch("https://example.com", None).await.unwrap();
        assert_eq!(outcome.result.strategy, "proxy");
        assert_eq!(outcome.new_preference, Some("proxy".to_string()));
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_call_tries_preferred_strategy_first_and_writes_nothing() {
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let manager = FetchManager::new(vec![
            Box::new(FakeStrategy {
                name: "direct",
                succeeds: false,
                calls: a_calls.clone(),
            }),
            Box::new(FakeStrategy {
                name: "proxy",
                succeeds: true,
                calls: b_calls.clone(),
            }),
        ]);

        let outcome = manager.fetch("https://example.com", Some("proxy")).await.unwrap();
        assert_eq!(outcome.result.strategy, "proxy");
        assert_eq!(outcome.new_preference, None, "no write when unchanged");
        assert_eq!(a_calls.load(Ordering::SeqCst), 0, "direct should not be tried first");
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_strategies_exhausted_carries_both_errors() {
        let manager = FetchManager::new(vec![
            Box::new(FakeStrategy {
                name: "direct",
                succeeds: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(FakeStrategy {
                name: "proxy",
                succeeds: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        ]);

        let err = manager.fetch("https://example.com", None).await.unwrap_err();
        assert_eq!(err.errors.len(), 2);
    }
}
