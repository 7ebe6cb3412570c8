//! Postgres-backed store. Each write uses an `UPDATE ... SET` with only the
//! columns the caller supplied, rather than a full-row `UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outpost_common::{ArticleMetadata, JobStatus, PaywallStatus, Publisher, ResolutionJob};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{JobUpdate, NewArticleMetadata, PublisherUpdate, Result, Store, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> sqlx::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn job_status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

fn parse_job_status(s: &str) -> JobStatus {
    match s {
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        _ => JobStatus::Pending,
    }
}

fn parse_paywall_status(s: &str) -> PaywallStatus {
    match s {
        "paywalled" => PaywallStatus::Paywalled,
        "metered" => PaywallStatus::Metered,
        "unknown" => PaywallStatus::Unknown,
        _ => PaywallStatus::Free,
    }
}

fn row_to_publisher(row: &sqlx::postgres::PgRow) -> sqlx::Result<Publisher> {
    Ok(Publisher {
        id: row.try_get("id")?,
        domain: row.try_get("domain")?,
        name: row.try_get("name")?,
        homepage_url: row.try_get("homepage_url")?,
        waf_detected: row.try_get("waf_detected")?,
        waf_type: row.try_get("waf_type")?,
        tos_url: row.try_get("tos_url")?,
        tos_permissions: row.try_get("tos_permissions")?,
        robots_found: row.try_get("robots_found")?,
        sitemap_urls: row.try_get("sitemap_urls")?,
        rss_feed_urls: row.try_get("rss_feed_urls")?,
        rsl_detected: row.try_get("rsl_detected")?,
        ai_bot_blocks: row.try_get("ai_bot_blocks")?,
        organization_details: row.try_get("organization_details")?,
        has_paywall: row.try_get("has_paywall")?,
        fetch_strategy: row.try_get("fetch_strategy")?,
        last_checked_at: row.try_get("last_checked_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> sqlx::Result<ResolutionJob> {
    let status: String = row.try_get("status")?;
    Ok(ResolutionJob {
        id: row.try_get("id")?,
        submitted_url: row.try_get("submitted_url")?,
        canonical_url: row.try_get("canonical_url")?,
        publisher_id: row.try_get("publisher_id")?,
        status: parse_job_status(&status),
        waf_result: row.try_get("waf_result")?,
        tos_result: row.try_get("tos_result")?,
        robots_result: row.try_get("robots_result")?,
        ai_bot_result: row.try_get("ai_bot_result")?,
        sitemap_result: row.try_get("sitemap_result")?,
        rss_result: row.try_get("rss_result")?,
        rsl_result: row.try_get("rsl_result")?,
        metadata_result: row.try_get("metadata_result")?,
        article_result: row.try_get("article_result")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_article(row: &sqlx::postgres::PgRow) -> sqlx::Result<ArticleMetadata> {
    let paywall_status: String = row.try_get("paywall_status")?;
    Ok(ArticleMetadata {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        article_url: row.try_get("article_url")?,
        jsonld_fields: row.try_get("jsonld_fields")?,
        opengraph_fields: row.try_get("opengraph_fields")?,
        microdata_fields: row.try_get("microdata_fields")?,
        twitter_cards: row.try_get("twitter_cards")?,
        has_jsonld: row.try_get("has_jsonld")?,
        has_opengraph: row.try_get("has_opengraph")?,
        has_microdata: row.try_get("has_microdata")?,
        has_twitter_cards: row.try_get("has_twitter_cards")?,
        paywall_status: parse_paywall_status(&paywall_status),
        paywall_signals: row.try_get("paywall_signals")?,
        llm_summary: row.try_get("llm_summary")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_err(e: sqlx::Error) -> StoreError {
    StoreError::Failure(e.to_string())
}

#[async_trait]
impl Store for PgStore {
    async fn get_or_create_publisher(&self, domain: &str, homepage_url: &str) -> Result<Publisher> {
        if let Some(existing) = sqlx::query("SELECT * FROM publishers WHERE domain = $1")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?
        {
            return row_to_publisher(&existing).map_err(map_err);
        }

        let publisher = Publisher::new(domain.to_string(), homepage_url.to_string());
        sqlx::query(
            "INSERT INTO publishers (id, domain, name, homepage_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (domain) DO NOTHING",
        )
        .bind(publisher.id)
        .bind(&publisher.domain)
        .bind(&publisher.name)
        .bind(&publisher.homepage_url)
        .bind(publisher.created_at)
        .bind(publisher.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        let row = sqlx::query("SELECT * FROM publishers WHERE domain = $1")
            .bind(domain)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        row_to_publisher(&row).map_err(map_err)
    }

    async fn get_publisher(&self, id: Uuid) -> Result<Option<Publisher>> {
        let row = sqlx::query("SELECT * FROM publishers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_publisher).transpose().map_err(map_err)
    }

    async fn update_publisher(&self, id: Uuid, update: PublisherUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut columns = Vec::new();
        let mut idx = 1;
        macro_rules! col {
            ($name:expr) => {{
                idx += 1;
                columns.push(format!("{} = ${}", $name, idx));
            }};
        }
        if update.name.is_some() {
            col!("name");
        }
        if update.waf_detected.is_some() {
            col!("waf_detected");
        }
        if update.waf_type.is_some() {
            col!("waf_type");
        }
        if update.tos_url.is_some() {
            col!("tos_url");
        }
        if update.tos_permissions.is_some() {
            col!("tos_permissions");
        }
        if update.robots_found.is_some() {
            col!("robots_found");
        }
        if update.sitemap_urls.is_some() {
            col!("sitemap_urls");
        }
        if update.rss_feed_urls.is_some() {
            col!("rss_feed_urls");
        }
        if update.rsl_detected.is_some() {
            col!("rsl_detected");
        }
        if update.ai_bot_blocks.is_some() {
            col!("ai_bot_blocks");
        }
        if update.organization_details.is_some() {
            col!("organization_details");
        }
        if update.has_paywall.is_some() {
            col!("has_paywall");
        }
        if update.fetch_strategy.is_some() {
            col!("fetch_strategy");
        }
        if update.last_checked_at.is_some() {
            col!("last_checked_at");
        }
        columns.push("updated_at = now()".to_string());

        let sql = format!("UPDATE publishers SET {} WHERE id = $1", columns.join(", "));
        let mut query = sqlx::query(&sql).bind(id);
        if let Some(v) = update.name {
            query = query.bind(v);
        }
        if let Some(v) = update.waf_detected {
            query = query.bind(v);
        }
        if let Some(v) = update.waf_type {
            query = query.bind(v);
        }
        if let Some(v) = update.tos_url {
            query = query.bind(v);
        }
        if let Some(v) = update.tos_permissions {
            query = query.bind(v);
        }
        if let Some(v) = update.robots_found {
            query = query.bind(v);
        }
        if let Some(v) = update.sitemap_urls {
            query = query.bind(v);
        }
        if let Some(v) = update.rss_feed_urls {
            query = query.bind(v);
        }
        if let Some(v) = update.rsl_detected {
            query = query.bind(v);
        }
        if let Some(v) = update.ai_bot_blocks {
            query = query.bind(v);
        }
        if let Some(v) = update.organization_details {
            query = query.bind(v);
        }
        if let Some(v) = update.has_paywall {
            query = query.bind(v);
        }
        if let Some(v) = update.fetch_strategy {
            query = query.bind(v);
        }
        if let Some(v) = update.last_checked_at {
            query = query.bind(v);
        }

        query.execute(&self.pool).await.map_err(map_err)?;
        Ok(())
    }

    async fn create_job(
        &self,
        submitted_url: &str,
        canonical_url: &str,
        publisher_id: Uuid,
    ) -> Result<ResolutionJob> {
        let job = ResolutionJob::new(submitted_url.to_string(), canonical_url.to_string(), publisher_id);
        sqlx::query(
            "INSERT INTO resolution_jobs \
             (id, submitted_url, canonical_url, publisher_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(job.id)
        .bind(&job.submitted_url)
        .bind(&job.canonical_url)
        .bind(job.publisher_id)
        .bind(job_status_str(job.status))
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ResolutionJob>> {
        let row = sqlx::query("SELECT * FROM resolution_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_job).transpose().map_err(map_err)
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<()> {
        let mut columns = Vec::new();
        let mut idx = 1;
        macro_rules! col {
            ($name:expr) => {{
                idx += 1;
                columns.push(format!("{} = ${}", $name, idx));
            }};
        }
        if update.status.is_some() {
            col!("status");
        }
        if update.waf_result.is_some() {
            col!("waf_result");
        }
        if update.tos_result.is_some() {
            col!("tos_result");
        }
        if update.robots_result.is_some() {
            col!("robots_result");
        }
        if update.ai_bot_result.is_some() {
            col!("ai_bot_result");
        }
        if update.sitemap_result.is_some() {
            col!("sitemap_result");
        }
        if update.rss_result.is_some() {
            col!("rss_result");
        }
        if update.rsl_result.is_some() {
            col!("rsl_result");
        }
        if update.metadata_result.is_some() {
            col!("metadata_result");
        }
        if update.article_result.is_some() {
            col!("article_result");
        }
        if update.error.is_some() {
            col!("error");
        }
        columns.push("updated_at = now()".to_string());

        let sql = format!("UPDATE resolution_jobs SET {} WHERE id = $1", columns.join(", "));
        let mut query = sqlx::query(&sql).bind(id);
        if let Some(v) = update.status {
            query = query.bind(job_status_str(v));
        }
        if let Some(v) = update.waf_result {
            query = query.bind(v);
        }
        if let Some(v) = update.tos_result {
            query = query.bind(v);
        }
        if let Some(v) = update.robots_result {
            query = query.bind(v);
        }
        if let Some(v) = update.ai_bot_result {
            query = query.bind(v);
        }
        if let Some(v) = update.sitemap_result {
            query = query.bind(v);
        }
        if let Some(v) = update.rss_result {
            query = query.bind(v);
        }
        if let Some(v) = update.rsl_result {
            query = query.bind(v);
        }
        if let Some(v) = update.metadata_result {
            query = query.bind(v);
        }
        if let Some(v) = update.article_result {
            query = query.bind(v);
        }
        if let Some(v) = update.error {
            query = query.bind(v);
        }

        query.execute(&self.pool).await.map_err(map_err)?;
        Ok(())
    }

    async fn find_active_job_by_canonical_url(&self, canonical_url: &str) -> Result<Option<ResolutionJob>> {
        let row = sqlx::query(
            "SELECT * FROM resolution_jobs WHERE canonical_url = $1 \
             AND status IN ('pending', 'running', 'completed') \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(canonical_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.as_ref().map(row_to_job).transpose().map_err(map_err)
    }

    async fn most_recent_completed_job_for_publisher(
        &self,
        publisher_id: Uuid,
        excluding_job_id: Uuid,
    ) -> Result<Option<ResolutionJob>> {
        let row = sqlx::query(
            "SELECT * FROM resolution_jobs WHERE publisher_id = $1 AND id != $2 \
             AND status = 'completed' ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(publisher_id)
        .bind(excluding_job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.as_ref().map(row_to_job).transpose().map_err(map_err)
    }

    async fn create_article_metadata(&self, new: NewArticleMetadata) -> Result<ArticleMetadata> {
        let id = Uuid::new_v4();
        let created_at: DateTime<Utc> = Utc::now();
        sqlx::query(
            "INSERT INTO article_metadata \
             (id, job_id, article_url, jsonld_fields, opengraph_fields, microdata_fields, \
              twitter_cards, has_jsonld, has_opengraph, has_microdata, has_twitter_cards, \
              paywall_status, paywall_signals, llm_summary, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(id)
        .bind(new.job_id)
        .bind(&new.article_url)
        .bind(&new.jsonld_fields)
        .bind(&new.opengraph_fields)
        .bind(&new.microdata_fields)
        .bind(&new.twitter_cards)
        .bind(new.has_jsonld)
        .bind(new.has_opengraph)
        .bind(new.has_microdata)
        .bind(new.has_twitter_cards)
        .bind(match new.paywall_status {
            PaywallStatus::Free => "free",
            PaywallStatus::Paywalled => "paywalled",
            PaywallStatus::Metered => "metered",
            PaywallStatus::Unknown => "unknown",
        })
        .bind(&new.paywall_signals)
        .bind(&new.llm_summary)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(ArticleMetadata {
            id,
            job_id: new.job_id,
            article_url: new.article_url,
            jsonld_fields: new.jsonld_fields,
            opengraph_fields: new.opengraph_fields,
            microdata_fields: new.microdata_fields,
            twitter_cards: new.twitter_cards,
            has_jsonld: new.has_jsonld,
            has_opengraph: new.has_opengraph,
            has_microdata: new.has_microdata,
            has_twitter_cards: new.has_twitter_cards,
            paywall_status: new.paywall_status,
            paywall_signals: new.paywall_signals,
            llm_summary: new.llm_summary,
            created_at,
        })
    }

    async fn find_article_metadata(&self, article_url: &str) -> Result<Option<ArticleMetadata>> {
        let row = sqlx::query(
            "SELECT * FROM article_metadata WHERE article_url = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(article_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.as_ref().map(row_to_article).transpose().map_err(map_err)
    }

    async fn claim_pending_job(&self) -> Result<Option<ResolutionJob>> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        let row = sqlx::query(
            "SELECT * FROM resolution_jobs WHERE status = 'pending' \
             ORDER BY created_at ASC LIMIT 1 FOR UPDATE SKIP LOCKED",
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_err)?;

        let Some(row) = row else {
            tx.commit().await.map_err(map_err)?;
            return Ok(None);
        };
        let mut job = row_to_job(&row).map_err(map_err)?;

        sqlx::query("UPDATE resolution_jobs SET status = 'running', updated_at = now() WHERE id = $1")
            .bind(job.id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;

        job.status = JobStatus::Running;
        Ok(Some(job))
    }
}
