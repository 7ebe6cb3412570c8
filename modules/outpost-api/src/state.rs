use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use ai_client::Claude;
use outpost_common::Config;
use outpost_events::EventBus;
use outpost_fetch::FetchManager;
use outpost_pipeline::{Store, Supervisor};
use outpost_waf_client::WafClient;
use tokio::sync::Mutex;

/// Shared application state: one struct wrapped in a single `Arc`, handed
/// to every handler via `Router::with_state`.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub event_bus: Arc<dyn EventBus>,
    pub supervisor: Arc<Supervisor>,
    pub config: Config,
    pub rate_limiter: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        fetch_manager: FetchManager,
        event_bus: Arc<dyn EventBus>,
        waf_client: WafClient,
        ai: Claude,
        config: Config,
    ) -> Self {
        let supervisor = Arc::new(Supervisor::new(
            store.clone(),
            fetch_manager,
            event_bus.clone(),
            waf_client,
            ai,
            config.publisher_freshness_ttl,
            config.article_freshness_ttl,
            config.robots_user_agent.clone(),
        ));

        Self {
            store,
            event_bus,
            supervisor,
            config,
            rate_limiter: Mutex::new(HashMap::new()),
        }
    }
}
