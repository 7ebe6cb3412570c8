//! Process entrypoint: wires the durable store, fetch manager, event bus,
//! and external collaborators into a `Supervisor`, starts the worker pool
//! (a pool of worker processes drawing from a durable job queue), and
//! serves the HTTP boundary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use outpost_common::Config;
use outpost_events::{BroadcastEventBus, EventBus, RedisEventBus};
use outpost_fetch::{DirectStrategy, FetchManager, ProxyStrategy};
use outpost_pipeline::{run_migrations, InMemoryStore, PgStore, Store};
use outpost_proxy_client::ProxyApiClient;
use outpost_waf_client::WafClient;

mod routes;
mod sse;
mod state;
mod templates;
mod worker;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("outpost=info".parse()?))
        .init();

    let config = Config::from_env();
    config.log_redacted();

    let store: Arc<dyn Store> = if config.database_url.is_empty() {
        tracing::warn!("DATABASE_URL is empty, falling back to an in-memory store");
        Arc::new(InMemoryStore::new())
    } else {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(20)
            .connect(&config.database_url)
            .await?;
        run_migrations(&pool).await?;
        Arc::new(PgStore::from_pool(pool))
    };

    let event_bus: Arc<dyn EventBus> = match &config.redis_url {
        Some(url) if !url.is_empty() => Arc::new(RedisEventBus::connect(url).await?),
        _ => {
            tracing::warn!("REDIS_URL not set, falling back to an in-process broadcast bus");
            Arc::new(BroadcastEventBus::new())
        }
    };

    let proxy_client = ProxyApiClient::new(
        config.proxy_api_url.clone(),
        config.proxy_api_user.clone(),
        config.proxy_api_key.clone(),
    );
    let fetch_manager = FetchManager::new(vec![
        Box::new(DirectStrategy::new(config.fetch_timeout)),
        Box::new(ProxyStrategy::new(proxy_client)),
    ]);

    let waf_client = WafClient::new(config.waf_fingerprinter_url.clone());
    let ai = Claude::new(config.anthropic_api_key.clone(), "claude-sonnet-4-20250514");

    let state = Arc::new(AppState::new(
        store,
        fetch_manager,
        event_bus,
        waf_client,
        ai,
        config.clone(),
    ));

    worker::spawn_pool(state.clone(), config.workers, config.job_timeout);

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/submit", post(routes::submit))
        .route("/jobs/{id}", get(routes::job_page))
        .route("/api/jobs/{id}", get(routes::job_json))
        .route("/api/jobs/{id}/stream", get(sse::stream_job))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        );

    let addr: SocketAddr = format!("{}:{}", config.web_host, config.web_port).parse()?;
    tracing::info!("Outpost API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
