//! SSE streamer: relay a job's lifecycle events to an HTTP client without
//! ever losing the terminal event.
//!
//! The ordering is load-bearing: subscribe to the broker *before* reading
//! the job's current status.
//! If the job has already finished by the time we check, we synthesize a
//! single `done` frame instead of waiting on a broker message that will
//! never come — the real completion event was published before we ever
//! subscribed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::Stream;
use outpost_common::{JobStatus, StepName, StepStatus};
use uuid::Uuid;

use crate::state::AppState;

/// `GET /api/jobs/{uuid}/stream`.
pub async fn stream_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    let job = match state.store.get_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return (StatusCode::NOT_FOUND, "job not found").into_response(),
        Err(e) => {
            tracing::error!(error = %e, %job_id, "failed to load job for SSE stream");
            return (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response();
        }
    };

    // Subscribe before the status re-read below: a job that finishes in the
    // gap between the store read above and the subscribe call must still
    // have its terminal event land on this subscription.
    let mut subscription = state.event_bus.subscribe(job_id).await;

    let current = match state.store.get_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => job,
        Err(_) => job,
    };

    let stream = async_stream::stream! {
        if matches!(current.status, JobStatus::Completed | JobStatus::Failed) {
            let data = serde_json::json!({
                "waf_result": current.waf_result,
                "tos_result": current.tos_result,
            });
            let payload = serde_json::json!({
                "step": StepName::Pipeline,
                "status": step_status_for(current.status),
                "data": data,
            });
            yield Ok::<Event, Infallible>(
                Event::default().event("done").data(payload.to_string()),
            );
            return;
        }

        while let Some(msg) = subscription.next().await {
            let is_terminal = msg.event.step == StepName::Pipeline
                && matches!(msg.event.status, StepStatus::Completed | StepStatus::Failed);
            let event = if is_terminal {
                Event::default().event("done").data(msg.raw_json)
            } else {
                Event::default().data(msg.raw_json)
            };
            yield Ok::<Event, Infallible>(event);
            if is_terminal {
                return;
            }
        }
    };

    let mut response = Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    // Content-Type is set by axum's Sse already; add the two remaining
    // headers a reverse proxy needs to avoid buffering the stream.
    response
        .headers_mut()
        .insert("cache-control", HeaderValue::from_static("no-cache"));
    response
        .headers_mut()
        .insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

fn step_status_for(status: JobStatus) -> StepStatus {
    match status {
        JobStatus::Failed => StepStatus::Failed,
        _ => StepStatus::Completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_client::Claude;
    use axum::routing::get;
    use axum::Router;
    use outpost_common::Config;
    use outpost_events::BroadcastEventBus;
    use outpost_fetch::FetchManager;
    use outpost_pipeline::{InMemoryStore, Store};
    use outpost_waf_client::WafClient;
    use std::time::Duration;

    #[test]
    fn terminal_status_maps_to_failed_step_status() {
        assert!(matches!(step_status_for(JobStatus::Failed), StepStatus::Failed));
        assert!(matches!(step_status_for(JobStatus::Completed), StepStatus::Completed));
    }

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            redis_url: None,
            anthropic_api_key: "sk-ant-test".to_string(),
            waf_fingerprinter_url: "http://127.0.0.1:9".to_string(),
            proxy_api_url: "http://127.0.0.1:9".to_string(),
            proxy_api_user: String::new(),
            proxy_api_key: String::new(),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            workers: 1,
            publisher_freshness_ttl: Duration::from_secs(86_400),
            article_freshness_ttl: Duration::from_secs(86_400),
            job_timeout: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(30),
            robots_user_agent: "itsascout".to_string(),
        }
    }

    /// A client subscribing to an already-`completed` job must receive
    /// exactly one `event: done` frame and then EOF — never hang waiting on
    /// a broker message that already happened (spec §4.9, invariant 12/13,
    /// scenario E2E-F).
    #[tokio::test]
    async fn already_completed_job_yields_one_done_frame_then_closes() {
        let in_memory: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let publisher = in_memory
            .get_or_create_publisher("example.com", "https://example.com")
            .await
            .unwrap();
        let job = in_memory
            .create_job("https://example.com/a", "https://example.com/a", publisher.id)
            .await
            .unwrap();
        in_memory
            .update_job(
                job.id,
                outpost_pipeline::store::JobUpdate {
                    status: Some(JobStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let job_id = job.id;

        let fetch_manager = FetchManager::new(vec![]);
        let waf_client = WafClient::new("http://127.0.0.1:9");
        let ai = Claude::new("sk-ant-test", "claude-test");
        let state = Arc::new(AppState::new(
            in_memory,
            fetch_manager,
            Arc::new(BroadcastEventBus::new()),
            waf_client,
            ai,
            test_config(),
        ));

        let app = Router::new()
            .route("/api/jobs/{id}/stream", get(stream_job))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("http://{addr}/api/jobs/{job_id}/stream");
        let response = reqwest::get(&url).await.unwrap();
        assert!(response.status().is_success());

        let body = response.text().await.unwrap();
        let done_frames = body.matches("event: done").count();
        assert_eq!(done_frames, 1, "exactly one done frame, got body: {body}");
    }
}
