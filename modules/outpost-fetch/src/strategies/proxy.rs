//! Strategy B: a proxy API fetcher authenticated by a shared secret.

use async_trait::async_trait;
use outpost_common::FetchResult;
use outpost_proxy_client::ProxyApiClient;

use crate::{FetchError, FetchOutcome, FetchStrategy};

pub struct ProxyStrategy {
    client: ProxyApiClient,
}

impl ProxyStrategy {
    pub fn new(client: ProxyApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for ProxyStrategy {
    fn name(&self) -> &'static str {
        "proxy"
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        let body = self.client.fetch(url).await.map_err(|e| FetchError {
            strategy: self.name().to_string(),
            cause: e.to_string(),
        })?;

        Ok(FetchResult {
            body,
            status: 200,
            strategy: self.name().to_string(),
            final_url: url.to_string(),
            headers: Vec::new(),
        })
    }
}
