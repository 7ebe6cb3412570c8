//! Shared data model: `Publisher`, `ResolutionJob`,
//! `ArticleMetadata`, `FetchResult`, `StepEvent`, and the typed result of
//! each Step Library function that those entities carry.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------
// Job / event lifecycle
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Closed set of step names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Waf,
    TosDiscovery,
    TosEvaluation,
    Robots,
    AiBotBlocking,
    Sitemap,
    Rss,
    Rsl,
    PublisherDetails,
    ArticleExtraction,
    PaywallDetection,
    MetadataProfile,
    Pipeline,
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepName::Waf => "waf",
            StepName::TosDiscovery => "tos_discovery",
            StepName::TosEvaluation => "tos_evaluation",
            StepName::Robots => "robots",
            StepName::AiBotBlocking => "ai_bot_blocking",
            StepName::Sitemap => "sitemap",
            StepName::Rss => "rss",
            StepName::Rsl => "rsl",
            StepName::PublisherDetails => "publisher_details",
            StepName::ArticleExtraction => "article_extraction",
            StepName::PaywallDetection => "paywall_detection",
            StepName::MetadataProfile => "metadata_profile",
            StepName::Pipeline => "pipeline",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

/// `{step, status, data?}` published to `job:{job_id}:events`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepEvent {
    pub step: StepName,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StepEvent {
    pub fn new(step: StepName, status: StepStatus) -> Self {
        Self {
            step,
            status,
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

// ---------------------------------------------------------------------
// FetchResult (value type)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchResult {
    pub body: String,
    pub status: u16,
    pub strategy: String,
    pub final_url: String,
    /// Response headers relevant to downstream steps (e.g. `Link` for RSL).
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

// ---------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Publisher {
    pub id: Uuid,
    /// Case-folded, `www.`-stripped canonical domain. Unique.
    pub domain: String,
    pub name: String,
    pub homepage_url: String,

    pub waf_detected: Option<bool>,
    pub waf_type: Option<String>,

    pub tos_url: Option<String>,
    pub tos_permissions: Option<serde_json::Value>,

    pub robots_found: Option<bool>,
    pub sitemap_urls: Option<Vec<String>>,
    pub rss_feed_urls: Option<Vec<String>>,
    pub rsl_detected: Option<bool>,
    pub ai_bot_blocks: Option<serde_json::Value>,
    pub organization_details: Option<serde_json::Value>,
    pub has_paywall: Option<bool>,

    /// Set by the Fetch Manager only, and only on a change.
    pub fetch_strategy: Option<String>,

    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publisher {
    pub fn new(domain: String, homepage_url: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: domain.clone(),
            domain,
            homepage_url,
            waf_detected: None,
            waf_type: None,
            tos_url: None,
            tos_permissions: None,
            robots_found: None,
            sitemap_urls: None,
            rss_feed_urls: None,
            rsl_detected: None,
            ai_bot_blocks: None,
            organization_details: None,
            has_paywall: None,
            fetch_strategy: None,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the name is still the default (domain-derived) name, i.e.
    /// hasn't been human-edited or promoted from structured data yet.
    pub fn has_default_name(&self) -> bool {
        self.name == self.domain
    }
}

// ---------------------------------------------------------------------
// ResolutionJob
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResolutionJob {
    pub id: Uuid,
    pub submitted_url: String,
    pub canonical_url: String,
    pub publisher_id: Uuid,
    pub status: JobStatus,

    pub waf_result: Option<serde_json::Value>,
    pub tos_result: Option<serde_json::Value>,
    pub robots_result: Option<serde_json::Value>,
    pub ai_bot_result: Option<serde_json::Value>,
    pub sitemap_result: Option<serde_json::Value>,
    pub rss_result: Option<serde_json::Value>,
    pub rsl_result: Option<serde_json::Value>,
    pub metadata_result: Option<serde_json::Value>,
    pub article_result: Option<serde_json::Value>,

    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResolutionJob {
    pub fn new(submitted_url: String, canonical_url: String, publisher_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            submitted_url,
            canonical_url,
            publisher_id,
            status: JobStatus::Pending,
            waf_result: None,
            tos_result: None,
            robots_result: None,
            ai_bot_result: None,
            sitemap_result: None,
            rss_result: None,
            rsl_result: None,
            metadata_result: None,
            article_result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------
// ArticleMetadata
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaywallStatus {
    Free,
    Paywalled,
    Metered,
    Unknown,
}

impl std::fmt::Display for PaywallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaywallStatus::Free => "free",
            PaywallStatus::Paywalled => "paywalled",
            PaywallStatus::Metered => "metered",
            PaywallStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArticleMetadata {
    pub id: Uuid,
    pub job_id: Uuid,
    pub article_url: String,

    pub jsonld_fields: Option<serde_json::Value>,
    pub opengraph_fields: Option<serde_json::Value>,
    pub microdata_fields: Option<serde_json::Value>,
    pub twitter_cards: Option<serde_json::Value>,

    pub has_jsonld: bool,
    pub has_opengraph: bool,
    pub has_microdata: bool,
    pub has_twitter_cards: bool,

    pub paywall_status: PaywallStatus,
    pub paywall_signals: Vec<String>,

    pub llm_summary: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// presence boolean ≡ (field map is non-null and non-empty).
pub fn field_map_present(value: &Option<serde_json::Value>) -> bool {
    match value {
        None => false,
        Some(serde_json::Value::Object(map)) => !map.is_empty(),
        Some(serde_json::Value::Null) => false,
        Some(_) => true,
    }
}
