//! In-process store backing tests and single-worker development runs.

use async_trait::async_trait;
use chrono::Utc;
use outpost_common::{ArticleMetadata, JobStatus, Publisher, ResolutionJob};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{JobUpdate, NewArticleMetadata, PublisherUpdate, Result, Store, StoreError};

#[derive(Default)]
struct Tables {
    publishers: HashMap<Uuid, Publisher>,
    publishers_by_domain: HashMap<String, Uuid>,
    jobs: HashMap<Uuid, ResolutionJob>,
    articles: Vec<ArticleMetadata>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("in-memory store mutex poisoned")
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_or_create_publisher(&self, domain: &str, homepage_url: &str) -> Result<Publisher> {
        let mut tables = self.lock();
        if let Some(id) = tables.publishers_by_domain.get(domain) {
            return Ok(tables.publishers[id].clone());
        }
        let publisher = Publisher::new(domain.to_string(), homepage_url.to_string());
        tables
            .publishers_by_domain
            .insert(domain.to_string(), publisher.id);
        tables.publishers.insert(publisher.id, publisher.clone());
        Ok(publisher)
    }

    async fn get_publisher(&self, id: Uuid) -> Result<Option<Publisher>> {
        Ok(self.lock().publishers.get(&id).cloned())
    }

    async fn update_publisher(&self, id: Uuid, update: PublisherUpdate) -> Result<()> {
        let mut tables = self.lock();
        let publisher = tables
            .publishers
            .get_mut(&id)
            .ok_or_else(|| StoreError::Failure(format!("no publisher {id}")))?;

        if let Some(v) = update.name {
            publisher.name = v;
        }
        if let Some(v) = update.waf_detected {
            publisher.waf_detected = Some(v);
        }
        if let Some(v) = update.waf_type {
            publisher.waf_type = Some(v);
        }
        if let Some(v) = update.tos_url {
            publisher.tos_url = Some(v);
        }
        if let Some(v) = update.tos_permissions {
            publisher.tos_permissions = Some(v);
        }
        if let Some(v) = update.robots_found {
            publisher.robots_found = Some(v);
        }
        if let Some(v) = update.sitemap_urls {
            publisher.sitemap_urls = Some(v);
        }
        if let Some(v) = update.rss_feed_urls {
            publisher.rss_feed_urls = Some(v);
        }
        if let Some(v) = update.rsl_detected {
            publisher.rsl_detected = Some(v);
        }
        if let Some(v) = update.ai_bot_blocks {
            publisher.ai_bot_blocks = Some(v);
        }
        if let Some(v) = update.organization_details {
            publisher.organization_details = Some(v);
        }
        if let Some(v) = update.has_paywall {
            publisher.has_paywall = Some(v);
        }
        if let Some(v) = update.fetch_strategy {
            publisher.fetch_strategy = Some(v);
        }
        if let Some(v) = update.last_checked_at {
            publisher.last_checked_at = Some(v);
        }
        publisher.updated_at = Utc::now();
        Ok(())
    }

    async fn create_job(
        &self,
        submitted_url: &str,
        canonical_url: &str,
        publisher_id: Uuid,
    ) -> Result<ResolutionJob> {
        let job = ResolutionJob::new(submitted_url.to_string(), canonical_url.to_string(), publisher_id);
        let mut tables = self.lock();
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ResolutionJob>> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<()> {
        let mut tables = self.lock();
        let job = tables
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::Failure(format!("no job {id}")))?;

        if let Some(v) = update.status {
            job.status = v;
        }
        if let Some(v) = update.waf_result {
            job.waf_result = Some(v);
        }
        if let Some(v) = update.tos_result {
            job.tos_result = Some(v);
        }
        if let Some(v) = update.robots_result {
            job.robots_result = Some(v);
        }
        if let Some(v) = update.ai_bot_result {
            job.ai_bot_result = Some(v);
        }
        if let Some(v) = update.sitemap_result {
            job.sitemap_result = Some(v);
        }
        if let Some(v) = update.rss_result {
            job.rss_result = Some(v);
        }
        if let Some(v) = update.rsl_result {
            job.rsl_result = Some(v);
        }
        if let Some(v) = update.metadata_result {
            job.metadata_result = Some(v);
        }
        if let Some(v) = update.article_result {
            job.article_result = Some(v);
        }
        if let Some(v) = update.error {
            job.error = Some(v);
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn find_active_job_by_canonical_url(&self, canonical_url: &str) -> Result<Option<ResolutionJob>> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|j| j.canonical_url == canonical_url)
            .filter(|j| {
                matches!(
                    j.status,
                    JobStatus::Pending | JobStatus::Running | JobStatus::Completed
                )
            })
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn most_recent_completed_job_for_publisher(
        &self,
        publisher_id: Uuid,
        excluding_job_id: Uuid,
    ) -> Result<Option<ResolutionJob>> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|j| j.publisher_id == publisher_id && j.id != excluding_job_id)
            .filter(|j| j.status == JobStatus::Completed)
            .max_by_key(|j| j.updated_at)
            .cloned())
    }

    async fn create_article_metadata(&self, new: NewArticleMetadata) -> Result<ArticleMetadata> {
        let row = ArticleMetadata {
            id: Uuid::new_v4(),
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
            created_at: Utc::now(),
        };
        let mut tables = self.lock();
        tables.articles.push(row.clone());
        Ok(row)
    }

    async fn find_article_metadata(&self, article_url: &str) -> Result<Option<ArticleMetadata>> {
        Ok(self
            .lock()
            .articles
            .iter()
            .filter(|a| a.article_url == article_url)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn claim_pending_job(&self) -> Result<Option<ResolutionJob>> {
        let mut tables = self.lock();
        let claimed_id = tables
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| j.created_at)
            .map(|j| j.id);
        match claimed_id {
            Some(id) => {
                let job = tables.jobs.get_mut(&id).expect("claimed id exists");
                job.status = JobStatus::Running;
                job.updated_at = Utc::now();
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_publisher_is_idempotent_per_domain() {
        let store = InMemoryStore::new();
        let a = store
            .get_or_create_publisher("example.com", "https://example.com")
            .await
            .unwrap();
        let b = store
            .get_or_create_publisher("example.com", "https://example.com")
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn update_publisher_only_touches_supplied_fields() {
        let store = InMemoryStore::new();
        let publisher = store
            .get_or_create_publisher("example.com", "https://example.com")
            .await
            .unwrap();

        store
            .update_publisher(
                publisher.id,
                PublisherUpdate {
                    fetch_strategy: Some("proxy".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = store.get_publisher(publisher.id).await.unwrap().unwrap();
        assert_eq!(updated.fetch_strategy.as_deref(), Some("proxy"));
        assert_eq!(updated.name, "example.com");
    }

    #[tokio::test]
    async fn find_active_job_excludes_failed() {
        let store = InMemoryStore::new();
        let publisher = store
            .get_or_create_publisher("example.com", "https://example.com")
            .await
            .unwrap();
        let job = store
            .create_job("https://example.com/a", "https://example.com/a", publisher.id)
            .await
            .unwrap();
        store
            .update_job(
                job.id,
                JobUpdate {
                    status: Some(JobStatus::Failed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let active = store
            .find_active_job_by_canonical_url("https://example.com/a")
            .await
            .unwrap();
        assert!(active.is_none());
    }

    #[tokio::test]
    async fn claim_pending_job_marks_it_running_and_is_idempotent_when_empty() {
        let store = InMemoryStore::new();
        let publisher = store
            .get_or_create_publisher("example.com", "https://example.com")
            .await
            .unwrap();
        let job = store
            .create_job("https://example.com/a", "https://example.com/a", publisher.id)
            .await
            .unwrap();

        let claimed = store.claim_pending_job().await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.status, JobStatus::Running);

        assert!(store.claim_pending_job().await.unwrap().is_none());
    }
}
