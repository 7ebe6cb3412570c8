//! Pipeline Supervisor: orchestrates the Step Library in a
//! fixed order, enforcing freshness, persisting per-step results with
//! narrow per-field writes, and emitting lifecycle events.

use std::sync::Arc;
use std::time::Duration;

use ai_client::Claude;
use chrono::Utc;
use outpost_common::{
    JobStatus, Publisher, ResolutionJob, StepEvent, StepName, StepStatus,
};
use outpost_domains::{article, canonical, metadata, paywall, robots, rsl, rss, scorer, tos, waf};
use outpost_events::EventBus;
use outpost_fetch::FetchManager;
use outpost_waf_client::WafClient;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::store::{JobUpdate, NewArticleMetadata, PublisherUpdate, Store, StoreError};
use crate::{should_skip_article_steps, should_skip_publisher_steps};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("job {0} not found")]
    JobNotFound(Uuid),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

pub struct Supervisor {
    store: Arc<dyn Store>,
    fetch_manager: FetchManager,
    event_bus: Arc<dyn EventBus>,
    waf_client: WafClient,
    ai: Claude,
    publisher_freshness_ttl: Duration,
    article_freshness_ttl: Duration,
    robots_user_agent: String,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn Store>,
        fetch_manager: FetchManager,
        event_bus: Arc<dyn EventBus>,
        waf_client: WafClient,
        ai: Claude,
        publisher_freshness_ttl: Duration,
        article_freshness_ttl: Duration,
        robots_user_agent: String,
    ) -> Self {
        Self {
            store,
            fetch_manager,
            event_bus,
            waf_client,
            ai,
            publisher_freshness_ttl,
            article_freshness_ttl,
            robots_user_agent,
        }
    }

    async fn emit(&self, job_id: Uuid, step: StepName, status: StepStatus, data: Option<Value>) {
        let mut event = StepEvent::new(step, status);
        if let Some(data) = data {
            event = event.with_data(data);
        }
        self.event_bus.publish(job_id, event).await;
    }

    /// Fetch `url` on `publisher`'s behalf, persisting a strategy-preference
    /// change as the narrow single-field write the Fetch Manager is allowed
    /// to make.
    async fn fetch_and_remember(
        &self,
        publisher: &mut Publisher,
        url: &str,
    ) -> Result<outpost_common::FetchResult, String> {
        match self
            .fetch_manager
            .fetch(url, publisher.fetch_strategy.as_deref())
            .await
        {
            Ok(outcome) => {
                if let Some(new_preference) = outcome.new_preference {
                    self.store
                        .update_publisher(
                            publisher.id,
                            PublisherUpdate {
                                fetch_strategy: Some(new_preference.clone()),
                                ..Default::default()
                            },
                        )
                        .await
                        .map_err(|e| e.to_string())?;
                    publisher.fetch_strategy = Some(new_preference);
                }
                Ok(outcome.result)
            }
            Err(exhausted) => Err(exhausted.to_string()),
        }
    }

    async fn ensure_homepage(&self, ctx: &mut PipelineContext, publisher: &mut Publisher) -> Option<String> {
        if ctx.homepage.is_some() {
            return None;
        }
        match self.fetch_and_remember(publisher, &publisher.homepage_url.clone()).await {
            Ok(result) => {
                ctx.homepage = Some(result);
                None
            }
            Err(e) => Some(e),
        }
    }

    pub async fn run(&self, job_id: Uuid) -> Result<(), PipelineError> {
        let result = self.run_inner(job_id).await;
        if let Err(e) = &result {
            self.store
                .update_job(
                    job_id,
                    JobUpdate {
                        status: Some(JobStatus::Failed),
                        error: Some(e.to_string()),
                        ..Default::default()
                    },
                )
                .await
                .ok();
            self.emit(job_id, StepName::Pipeline, StepStatus::Failed, Some(serde_json::json!({"error": e.to_string()}))).await;
        }
        result
    }

    async fn run_inner(&self, job_id: Uuid) -> Result<(), PipelineError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))?;
        let mut publisher = self
            .store
            .get_publisher(job.publisher_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))?;

        self.store
            .update_job(
                job_id,
                JobUpdate {
                    status: Some(JobStatus::Running),
                    ..Default::default()
                },
            )
            .await?;

        self.emit(
            job_id,
            StepName::PublisherDetails,
            StepStatus::Started,
            Some(serde_json::json!({
                "publisher_id": publisher.id,
                "domain": publisher.domain,
                "name": publisher.name,
            })),
        )
        .await;

        let mut ctx = PipelineContext::default();

        if should_skip_publisher_steps(&publisher, self.publisher_freshness_ttl, Utc::now()) {
            self.skip_publisher_steps(job_id, &job, &publisher).await?;
        } else {
            self.run_publisher_steps(job_id, &job, &mut publisher, &mut ctx).await?;
            self.store
                .update_publisher(
                    publisher.id,
                    PublisherUpdate {
                        last_checked_at: Some(Utc::now()),
                        ..Default::default()
                    },
                )
                .await?;
        }

        self.run_article_steps(job_id, &job, &mut publisher, &ctx).await?;

        self.store
            .update_job(
                job_id,
                JobUpdate {
                    status: Some(JobStatus::Completed),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(job_id, StepName::Pipeline, StepStatus::Completed, None).await;

        Ok(())
    }

    const PUBLISHER_STEP_NAMES: [StepName; 9] = [
        StepName::Waf,
        StepName::TosDiscovery,
        StepName::TosEvaluation,
        StepName::Robots,
        StepName::AiBotBlocking,
        StepName::Sitemap,
        StepName::Rss,
        StepName::Rsl,
        StepName::PublisherDetails,
    ];

    async fn skip_publisher_steps(
        &self,
        job_id: Uuid,
        job: &ResolutionJob,
        publisher: &Publisher,
    ) -> Result<(), PipelineError> {
        for step in Self::PUBLISHER_STEP_NAMES {
            self.emit(
                job_id,
                step,
                StepStatus::Skipped,
                Some(serde_json::json!({"reason": "fresh"})),
            )
            .await;
        }

        if let Some(prior) = self
            .store
            .most_recent_completed_job_for_publisher(publisher.id, job_id)
            .await?
        {
            self.store
                .update_job(
                    job_id,
                    JobUpdate {
                        waf_result: Some(prior.waf_result.unwrap_or(Value::Null)),
                        tos_result: Some(prior.tos_result.unwrap_or(Value::Null)),
                        robots_result: Some(prior.robots_result.unwrap_or(Value::Null)),
                        ai_bot_result: Some(prior.ai_bot_result.unwrap_or(Value::Null)),
                        sitemap_result: Some(prior.sitemap_result.unwrap_or(Value::Null)),
                        rss_result: Some(prior.rss_result.unwrap_or(Value::Null)),
                        rsl_result: Some(prior.rsl_result.unwrap_or(Value::Null)),
                        metadata_result: Some(prior.metadata_result.unwrap_or(Value::Null)),
                        ..Default::default()
                    },
                )
                .await?;
        }

        let _ = job;
        Ok(())
    }

    async fn run_publisher_steps(
        &self,
        job_id: Uuid,
        job: &ResolutionJob,
        publisher: &mut Publisher,
        ctx: &mut PipelineContext,
    ) -> Result<(), PipelineError> {
        // Step 1: WAF.
        self.emit(job_id, StepName::Waf, StepStatus::Started, None).await;
        let waf_result = waf::detect(&self.waf_client, &publisher.homepage_url).await;
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    waf_result: Some(serde_json::to_value(&waf_result).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;
        self.store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    waf_detected: Some(waf_result.waf_detected),
                    waf_type: Some(waf_result.waf_type.clone()),
                    ..Default::default()
                },
            )
            .await?;
        publisher.waf_detected = Some(waf_result.waf_detected);
        publisher.waf_type = Some(waf_result.waf_type.clone());
        self.emit(
            job_id,
            StepName::Waf,
            StepStatus::Completed,
            serde_json::to_value(&waf_result).ok(),
        )
        .await;

        // Step 2: ToS discovery.
        self.emit(job_id, StepName::TosDiscovery, StepStatus::Started, None).await;
        let homepage_error = self.ensure_homepage(ctx, publisher).await;
        let homepage_url = Url::parse(&publisher.homepage_url).ok();
        let discovery = match (&homepage_error, &homepage_url) {
            (None, Some(base)) => {
                let anchors = tos::extract_anchors(ctx.homepage_html(), base);
                tos::discover(&self.ai, &publisher.homepage_url, &anchors).await
            }
            _ => tos::TosDiscoveryResult {
                tos_url: None,
                confidence: 0.0,
                notes: None,
                error: Some(homepage_error.clone().unwrap_or_else(|| "invalid homepage URL".to_string())),
            },
        };
        ctx.tos_url = discovery.tos_url.clone();
        self.emit(
            job_id,
            StepName::TosDiscovery,
            StepStatus::Completed,
            serde_json::to_value(&discovery).ok(),
        )
        .await;

        // Step 3: ToS evaluation.
        self.emit(job_id, StepName::TosEvaluation, StepStatus::Started, None).await;
        let evaluation = match &ctx.tos_url {
            None => tos::skipped("no ToS URL discovered"),
            Some(tos_url) => match self.fetch_and_remember(publisher, tos_url).await {
                Ok(result) => tos::evaluate(&self.ai, &result.body).await,
                Err(e) => tos::TosEvaluationResult {
                    permissions: Vec::new(),
                    document_type: None,
                    confidence_score: 0.0,
                    territorial_exceptions: None,
                    arbitration_clauses: None,
                    skipped: false,
                    reason: None,
                    error: Some(e),
                },
            },
        };
        let tos_result = tos::merge(&discovery, &evaluation);
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    tos_result: Some(tos_result.clone()),
                    ..Default::default()
                },
            )
            .await?;
        self.store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    tos_url: discovery.tos_url.clone(),
                    tos_permissions: Some(serde_json::to_value(&evaluation.permissions).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;
        publisher.tos_url = discovery.tos_url.clone();
        self.emit(
            job_id,
            StepName::TosEvaluation,
            StepStatus::Completed,
            serde_json::to_value(&evaluation).ok(),
        )
        .await;

        // Step 4: Robots.
        self.emit(job_id, StepName::Robots, StepStatus::Started, None).await;
        let robots_url = format!("https://{}/robots.txt", publisher.domain);
        let (robots_result, robots_txt) = match self.fetch_and_remember(publisher, &robots_url).await {
            Err(e) => (
                robots::RobotsResult {
                    robots_found: false,
                    url_allowed: None,
                    sitemaps: Vec::new(),
                    crawl_delay: None,
                    licenses: Vec::new(),
                    error: Some(e),
                },
                None,
            ),
            Ok(fetched) if robots::looks_like_html_challenge(&fetched.body) => (
                robots::RobotsResult {
                    robots_found: false,
                    url_allowed: None,
                    sitemaps: Vec::new(),
                    crawl_delay: None,
                    licenses: Vec::new(),
                    error: Some("robots.txt request returned a WAF challenge page".to_string()),
                },
                None,
            ),
            Ok(fetched) => {
                let parsed = robots::RobotsTxt::parse(&fetched.body);
                let canonical_path = Url::parse(&job.canonical_url)
                    .map(|u| u.path().to_string())
                    .unwrap_or_else(|_| "/".to_string());
                let url_allowed = parsed.can_fetch(&self.robots_user_agent, &canonical_path);
                let crawl_delay = parsed.crawl_delay(&self.robots_user_agent);
                let result = robots::RobotsResult {
                    robots_found: true,
                    url_allowed: Some(url_allowed),
                    sitemaps: parsed.sitemaps.clone(),
                    crawl_delay,
                    licenses: parsed.licenses.clone(),
                    error: None,
                };
                (result, Some(parsed))
            }
        };
        ctx.robots_raw_text = robots_txt.as_ref().map(|r| r.raw_text.clone());
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    robots_result: Some(serde_json::to_value(&robots_result).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;
        self.store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    robots_found: Some(robots_result.robots_found),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(
            job_id,
            StepName::Robots,
            StepStatus::Completed,
            serde_json::to_value(&robots_result).ok(),
        )
        .await;

        // Step 5: AI bot blocking.
        self.emit(job_id, StepName::AiBotBlocking, StepStatus::Started, None).await;
        let ai_bot_result = match &robots_txt {
            Some(parsed) => robots::evaluate_ai_bots(parsed),
            None => robots::evaluate_ai_bots(&robots::RobotsTxt::parse("")),
        };
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    ai_bot_result: Some(serde_json::to_value(&ai_bot_result).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;
        self.store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    ai_bot_blocks: Some(serde_json::to_value(&ai_bot_result).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(
            job_id,
            StepName::AiBotBlocking,
            StepStatus::Completed,
            serde_json::to_value(&ai_bot_result).ok(),
        )
        .await;

        // Step 6: Sitemap discovery.
        self.emit(job_id, StepName::Sitemap, StepStatus::Started, None).await;
        let mut robots_sitemaps = Vec::new();
        if let (Some(base), true) = (&homepage_url, !robots_result.sitemaps.is_empty()) {
            for raw in &robots_result.sitemaps {
                if let Ok(resolved) = base.join(raw) {
                    robots_sitemaps.push(resolved.to_string());
                } else {
                    robots_sitemaps.push(raw.clone());
                }
            }
        }
        let mut probe_hit = None;
        if robots_sitemaps.is_empty() {
            if let Some(base) = &homepage_url {
                for path in outpost_domains::sitemap::WELL_KNOWN_SITEMAP_PATHS {
                    let Ok(candidate) = base.join(path) else { continue };
                    if let Ok(fetched) = self.fetch_and_remember(publisher, candidate.as_str()).await {
                        if outpost_domains::sitemap::looks_like_sitemap_xml(&fetched.body) {
                            probe_hit = Some(candidate.to_string());
                            break;
                        }
                    }
                }
            }
        }
        let sitemap_result = outpost_domains::sitemap::resolve(&robots_sitemaps, probe_hit);
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    sitemap_result: Some(serde_json::to_value(&sitemap_result).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;
        self.store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    sitemap_urls: Some(sitemap_result.sitemap_urls.clone()),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(
            job_id,
            StepName::Sitemap,
            StepStatus::Completed,
            serde_json::to_value(&sitemap_result).ok(),
        )
        .await;

        // Step 7: RSS discovery.
        self.emit(job_id, StepName::Rss, StepStatus::Started, None).await;
        let rss_result = match &homepage_url {
            Some(base) => rss::extract_feeds(ctx.homepage_html(), base),
            None => rss::RssResult { feeds: Vec::new(), count: 0 },
        };
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    rss_result: Some(serde_json::to_value(&rss_result).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;
        self.store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    rss_feed_urls: Some(rss_result.feeds.iter().map(|f| f.url.clone()).collect()),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(
            job_id,
            StepName::Rss,
            StepStatus::Completed,
            serde_json::to_value(&rss_result).ok(),
        )
        .await;

        // Step 8: RSL detection.
        self.emit(job_id, StepName::Rsl, StepStatus::Started, None).await;
        let rsl_result = match &homepage_url {
            Some(base) => rsl::resolve(
                &robots_result.licenses,
                rsl::html_license_links(ctx.homepage_html(), base),
                rsl::http_link_header_licenses(ctx.homepage_headers()),
            ),
            None => rsl::resolve(&robots_result.licenses, Vec::new(), Vec::new()),
        };
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    rsl_result: Some(serde_json::to_value(&rsl_result).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;
        self.store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    rsl_detected: Some(rsl_result.rsl_detected),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(
            job_id,
            StepName::Rsl,
            StepStatus::Completed,
            serde_json::to_value(&rsl_result).ok(),
        )
        .await;

        // Step 9: Publisher details (organization).
        self.emit(job_id, StepName::PublisherDetails, StepStatus::Started, None).await;
        let scorer_result = scorer::resolve_organization(ctx.homepage_html(), &publisher.homepage_url);
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    metadata_result: Some(serde_json::to_value(&scorer_result).unwrap_or(Value::Null)),
                    ..Default::default()
                },
            )
            .await?;

        let discovered_name = scorer_result
            .organization
            .as_ref()
            .and_then(|org| org.name.clone())
            .filter(|name| !name.is_empty());
        let mut publisher_update = PublisherUpdate {
            organization_details: Some(serde_json::to_value(&scorer_result).unwrap_or(Value::Null)),
            ..Default::default()
        };
        if publisher.has_default_name() {
            if let Some(name) = &discovered_name {
                publisher_update.name = Some(name.clone());
                publisher.name = name.clone();
            }
        }
        self.store.update_publisher(publisher.id, publisher_update).await?;
        self.emit(
            job_id,
            StepName::PublisherDetails,
            StepStatus::Completed,
            serde_json::to_value(&scorer_result).ok(),
        )
        .await;

        Ok(())
    }

    async fn run_article_steps(
        &self,
        job_id: Uuid,
        job: &ResolutionJob,
        publisher: &mut Publisher,
        ctx: &PipelineContext,
    ) -> Result<(), PipelineError> {
        let article_url = job.canonical_url.clone();

        let prior_article = self.store.find_article_metadata(&article_url).await?;
        let fresh = prior_article
            .as_ref()
            .map(|a| should_skip_article_steps(a.created_at, self.article_freshness_ttl, Utc::now()))
            .unwrap_or(false);

        if fresh {
            for step in [
                StepName::ArticleExtraction,
                StepName::PaywallDetection,
                StepName::MetadataProfile,
            ] {
                self.emit(
                    job_id,
                    step,
                    StepStatus::Skipped,
                    Some(serde_json::json!({"reason": "fresh"})),
                )
                .await;
            }
            return Ok(());
        }

        let is_homepage = canonical::extract_domain(&article_url).ok() == Some(publisher.domain.clone())
            && article_url.trim_end_matches('/') == publisher.homepage_url.trim_end_matches('/');

        let article_html = if is_homepage && ctx.homepage.is_some() {
            ctx.homepage_html().to_string()
        } else {
            self.fetch_and_remember(publisher, &article_url)
                .await
                .map(|r| r.body)
                .unwrap_or_default()
        };

        self.emit(job_id, StepName::ArticleExtraction, StepStatus::Started, None).await;
        let extraction = article::extract(&article_html);
        self.emit(
            job_id,
            StepName::ArticleExtraction,
            StepStatus::Completed,
            serde_json::to_value(&extraction).ok(),
        )
        .await;

        self.emit(job_id, StepName::PaywallDetection, StepStatus::Started, None).await;
        let paywall_result = paywall::classify(&article_html, extraction.jsonld_fields.as_ref());
        self.emit(
            job_id,
            StepName::PaywallDetection,
            StepStatus::Completed,
            serde_json::to_value(&paywall_result).ok(),
        )
        .await;

        self.emit(job_id, StepName::MetadataProfile, StepStatus::Started, None).await;
        let extraction_value = serde_json::to_value(&extraction).unwrap_or(Value::Null);
        let profile = metadata::profile(&self.ai, &extraction_value).await;
        self.emit(
            job_id,
            StepName::MetadataProfile,
            StepStatus::Completed,
            serde_json::to_value(&profile).ok(),
        )
        .await;

        let mut article_result = match serde_json::to_value(&extraction) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        article_result.insert("paywall".to_string(), serde_json::to_value(&paywall_result).unwrap_or(Value::Null));
        article_result.insert("profile".to_string(), serde_json::to_value(&profile).unwrap_or(Value::Null));

        self.store
            .update_job(
                job_id,
                JobUpdate {
                    article_result: Some(Value::Object(article_result)),
                    ..Default::default()
                },
            )
            .await?;

        self.store
            .create_article_metadata(NewArticleMetadata {
                job_id,
                article_url,
                jsonld_fields: extraction.jsonld_fields.clone(),
                opengraph_fields: extraction.opengraph_fields.clone(),
                microdata_fields: extraction.microdata_fields.clone(),
                twitter_cards: extraction.twitter_cards.clone(),
                has_jsonld: extraction.has_jsonld,
                has_opengraph: extraction.has_opengraph,
                has_microdata: extraction.has_microdata,
                has_twitter_cards: extraction.has_twitter_cards,
                paywall_status: paywall_result.paywall_status,
                paywall_signals: paywall_result.signals.clone(),
                llm_summary: if profile.summary.is_empty() { None } else { Some(profile.summary.clone()) },
            })
            .await?;

        let has_paywall = matches!(
            paywall_result.paywall_status,
            outpost_common::PaywallStatus::Paywalled | outpost_common::PaywallStatus::Metered
        );
        self.store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    has_paywall: Some(has_paywall),
                    ..Default::default()
                },
            )
            .await?;

        Ok(())
    }
}
