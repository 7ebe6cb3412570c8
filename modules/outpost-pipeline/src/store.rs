//! Durable-store abstraction: the Supervisor needs a typed store with
//! partial-column update semantics since row-level writes are narrow enough
//! that last-writer-wins on per-field updates is acceptable.
//!
//! `PublisherUpdate` / `JobUpdate` model a narrow write: a `None` field
//! means "leave this column alone", avoiding a full-row read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outpost_common::{ArticleMetadata, PaywallStatus, Publisher, ResolutionJob};
use serde_json::Value;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Failure(String),
}

#[derive(Debug, Clone, Default)]
pub struct PublisherUpdate {
    pub name: Option<String>,
    pub waf_detected: Option<bool>,
    pub waf_type: Option<String>,
    pub tos_url: Option<String>,
    pub tos_permissions: Option<Value>,
    pub robots_found: Option<bool>,
    pub sitemap_urls: Option<Vec<String>>,
    pub rss_feed_urls: Option<Vec<String>>,
    pub rsl_detected: Option<bool>,
    pub ai_bot_blocks: Option<Value>,
    pub organization_details: Option<Value>,
    pub has_paywall: Option<bool>,
    /// Written only by the Fetch Manager's caller on a strategy change.
    pub fetch_strategy: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl PublisherUpdate {
    pub fn is_empty(&self) -> bool {
        let Self {
            name,
            waf_detected,
            waf_type,
            tos_url,
            tos_permissions,
            robots_found,
            sitemap_urls,
            rss_feed_urls,
            rsl_detected,
            ai_bot_blocks,
            organization_details,
            has_paywall,
            fetch_strategy,
            last_checked_at,
        } = self;
        name.is_none()
            && waf_detected.is_none()
            && waf_type.is_none()
            && tos_url.is_none()
            && tos_permissions.is_none()
            && robots_found.is_none()
            && sitemap_urls.is_none()
            && rss_feed_urls.is_none()
            && rsl_detected.is_none()
            && ai_bot_blocks.is_none()
            && organization_details.is_none()
            && has_paywall.is_none()
            && fetch_strategy.is_none()
            && last_checked_at.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<outpost_common::JobStatus>,
    pub waf_result: Option<Value>,
    pub tos_result: Option<Value>,
    pub robots_result: Option<Value>,
    pub ai_bot_result: Option<Value>,
    pub sitemap_result: Option<Value>,
    pub rss_result: Option<Value>,
    pub rsl_result: Option<Value>,
    pub metadata_result: Option<Value>,
    pub article_result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewArticleMetadata {
    pub job_id: Uuid,
    pub article_url: String,
    pub jsonld_fields: Option<Value>,
    pub opengraph_fields: Option<Value>,
    pub microdata_fields: Option<Value>,
    pub twitter_cards: Option<Value>,
    pub has_jsonld: bool,
    pub has_opengraph: bool,
    pub has_microdata: bool,
    pub has_twitter_cards: bool,
    pub paywall_status: PaywallStatus,
    pub paywall_signals: Vec<String>,
    pub llm_summary: Option<String>,
}

/// The durable store's boundary.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_or_create_publisher(&self, domain: &str, homepage_url: &str) -> Result<Publisher>;
    async fn get_publisher(&self, id: Uuid) -> Result<Option<Publisher>>;
    async fn update_publisher(&self, id: Uuid, update: PublisherUpdate) -> Result<()>;

    async fn create_job(
        &self,
        submitted_url: &str,
        canonical_url: &str,
        publisher_id: Uuid,
    ) -> Result<ResolutionJob>;
    async fn get_job(&self, id: Uuid) -> Result<Option<ResolutionJob>>;
    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<()>;

    /// A job for `canonical_url` whose status is pending/running/completed.
    async fn find_active_job_by_canonical_url(&self, canonical_url: &str) -> Result<Option<ResolutionJob>>;

    /// The most recently completed job for `publisher_id`, excluding
    /// `excluding_job_id`.
    async fn most_recent_completed_job_for_publisher(
        &self,
        publisher_id: Uuid,
        excluding_job_id: Uuid,
    ) -> Result<Option<ResolutionJob>>;

    async fn create_article_metadata(&self, new: NewArticleMetadata) -> Result<ArticleMetadata>;

    /// Most recent `ArticleMetadata` row for `article_url`, if any (spec
    /// §4.8 `should_skip_article_steps`).
    async fn find_article_metadata(&self, article_url: &str) -> Result<Option<ArticleMetadata>>;

    /// Atomically claim the oldest pending job and mark it `running` (spec
    /// §5 "a pool of worker processes drawing from a durable job queue").
    /// Returns `None` when no pending job is available. Two concurrent
    /// callers must never claim the same job.
    async fn claim_pending_job(&self) -> Result<Option<ResolutionJob>>;
}

pub mod in_memory;
pub mod migrate;
pub mod pg;

pub use in_memory::InMemoryStore;
pub use migrate::migrate as run_migrations;
pub use pg::PgStore;
