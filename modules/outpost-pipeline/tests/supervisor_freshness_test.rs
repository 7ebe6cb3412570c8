//! Integration coverage for the Pipeline Supervisor (C7) driven through the
//! Freshness/Dedup Layer (C8): a fresh publisher's steps must be skipped and
//! copied from the prior completed job, while a brand-new article URL under
//! that same publisher still runs its own steps (spec §4.8, invariant 10,
//! scenario E2E-C).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use outpost_common::{FetchResult, StepName, StepStatus};
use outpost_events::{BroadcastEventBus, EventBus};
use outpost_fetch::{FetchManager, FetchOutcome, FetchStrategy};
use outpost_pipeline::store::{InMemoryStore, Store};
use outpost_pipeline::supervisor::Supervisor;
use uuid::Uuid;

struct StaticHtmlStrategy;

#[async_trait]
impl FetchStrategy for StaticHtmlStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        Ok(FetchResult {
            body: "<html><head><title>Example</title></head><body>hello</body></html>".to_string(),
            status: 200,
            strategy: "direct".to_string(),
            final_url: url.to_string(),
            headers: Vec::new(),
        })
    }
}

fn test_supervisor(store: Arc<dyn Store>, bus: Arc<dyn EventBus>) -> Supervisor {
    let fetch_manager = FetchManager::new(vec![Box::new(StaticHtmlStrategy)]);
    // Unreachable loopback ports: the WAF/LLM collaborators fail fast and
    // their steps fall back to `{error}`, per spec §4.4/§7 "never abort".
    let waf_client = outpost_waf_client::WafClient::new("http://127.0.0.1:9");
    let ai = ai_client::Claude::new("sk-ant-test", "claude-test").with_base_url("http://127.0.0.1:9");

    Supervisor::new(
        store,
        fetch_manager,
        bus,
        waf_client,
        ai,
        Duration::from_secs(86_400),
        Duration::from_secs(3_600),
        "itsascout".to_string(),
    )
}

async fn drain(mut sub: Box<dyn outpost_events::EventSubscription>, job_id: Uuid) -> Vec<(StepName, StepStatus)> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), sub.next()).await {
            Ok(Some(msg)) => {
                let is_terminal = msg.event.step == StepName::Pipeline
                    && matches!(msg.event.status, StepStatus::Completed | StepStatus::Failed);
                events.push((msg.event.step, msg.event.status));
                if is_terminal {
                    break;
                }
            }
            _ => break,
        }
    }
    let _ = job_id;
    events
}

#[tokio::test]
async fn second_job_on_a_fresh_publisher_skips_publisher_steps_and_copies_results() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());
    let supervisor = test_supervisor(store.clone(), bus.clone());

    let publisher = store
        .get_or_create_publisher("example.com", "https://example.com")
        .await
        .unwrap();

    let job_a = store
        .create_job(
            "https://example.com/article-a",
            "https://example.com/article-a",
            publisher.id,
        )
        .await
        .unwrap();
    let sub_a = bus.subscribe(job_a.id).await;
    supervisor.run(job_a.id).await.expect("first job should complete");
    let events_a = drain(sub_a, job_a.id).await;
    assert!(
        events_a
            .iter()
            .any(|(step, status)| *step == StepName::Waf && *status == StepStatus::Completed),
        "first job runs the WAF step: {events_a:?}"
    );

    let job_a = store.get_job(job_a.id).await.unwrap().unwrap();
    assert_eq!(job_a.status, outpost_common::JobStatus::Completed);
    let publisher_after_a = store.get_publisher(publisher.id).await.unwrap().unwrap();
    assert!(publisher_after_a.last_checked_at.is_some(), "publisher-level steps stamp last_checked_at");

    // Second submission, same publisher, a brand-new article URL.
    let job_b = store
        .create_job(
            "https://example.com/article-b",
            "https://example.com/article-b",
            publisher.id,
        )
        .await
        .unwrap();
    let sub_b = bus.subscribe(job_b.id).await;
    supervisor.run(job_b.id).await.expect("second job should complete");
    let events_b = drain(sub_b, job_b.id).await;

    for step in [
        StepName::Waf,
        StepName::TosDiscovery,
        StepName::TosEvaluation,
        StepName::Robots,
        StepName::AiBotBlocking,
        StepName::Sitemap,
        StepName::Rss,
        StepName::Rsl,
        StepName::PublisherDetails,
    ] {
        assert!(
            events_b.contains(&(step, StepStatus::Skipped)),
            "expected {step:?} to be skipped on the fresh second job: {events_b:?}"
        );
    }
    assert!(
        !events_b.contains(&(StepName::Waf, StepStatus::Started)),
        "a skipped step must never run: {events_b:?}"
    );

    // Article-level steps are NOT fresh for this new URL and must still run.
    assert!(events_b.contains(&(StepName::ArticleExtraction, StepStatus::Completed)));
    assert!(events_b.contains(&(StepName::PaywallDetection, StepStatus::Completed)));
    assert!(events_b.contains(&(StepName::Pipeline, StepStatus::Completed)));

    let job_b = store.get_job(job_b.id).await.unwrap().unwrap();
    assert_eq!(job_b.waf_result, job_a.waf_result, "publisher-level result copied verbatim from the prior job");
    assert!(job_b.article_result.is_some(), "article steps populate their own result on the new job");

    let article = store
        .find_article_metadata("https://example.com/article-b")
        .await
        .unwrap();
    assert!(article.is_some(), "a fresh article URL gets its own ArticleMetadata row");
}
