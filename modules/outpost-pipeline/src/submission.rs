//! Submission Gate: validate an incoming URL, dedupe against
//! any already-active job for the same canonical URL, and enqueue a new one.
//! The HTTP-facing out-of-scope Inertia UI is represented only by the
//! redirect targets it expects; this module is the pure gate logic the
//! `outpost-api` routes wrap.

use std::sync::Arc;

use outpost_common::ResolutionJob;
use outpost_domains::canonical;

use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("url must not be empty")]
    Empty,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Outcome of a submission: either a brand-new job was enqueued, or an
/// existing pending/running/completed job for the same canonical URL was
/// found (idempotent resubmission).
pub enum Submission {
    Created(ResolutionJob),
    Existing(ResolutionJob),
}

impl Submission {
    pub fn job(&self) -> &ResolutionJob {
        match self {
            Submission::Created(j) | Submission::Existing(j) => j,
        }
    }
}

/// Validate, canonicalize, dedupe, and enqueue `raw_url`.
/// Only the durable-store side of "enqueue" happens here — scheduling the
/// Supervisor to actually run the returned job id is the caller's job.
pub async fn submit(store: &Arc<dyn Store>, raw_url: &str) -> Result<Submission, SubmissionError> {
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return Err(SubmissionError::Empty);
    }

    let canonical_url =
        canonical::canonicalize(trimmed).map_err(|e| SubmissionError::InvalidUrl(e.to_string()))?;
    let domain =
        canonical::extract_domain(trimmed).map_err(|e| SubmissionError::InvalidUrl(e.to_string()))?;
    if domain.is_empty() {
        return Err(SubmissionError::InvalidUrl("empty domain".to_string()));
    }

    if let Some(existing) = store.find_active_job_by_canonical_url(&canonical_url).await? {
        return Ok(Submission::Existing(existing));
    }

    let homepage_url = format!("https://{domain}/");
    let publisher = store.get_or_create_publisher(&domain, &homepage_url).await?;
    let job = store.create_job(trimmed, &canonical_url, publisher.id).await?;
    Ok(Submission::Created(job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn store() -> Arc<dyn Store> {
        Arc::new(InMemoryStore::new())
    }

    #[tokio::test]
    async fn rejects_empty_url() {
        let store = store();
        let err = submit(&store, "   ").await.unwrap_err();
        assert!(matches!(err, SubmissionError::Empty));
    }

    #[tokio::test]
    async fn rejects_invalid_url() {
        let store = store();
        let err = submit(&store, "not a url").await.unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn creates_publisher_and_job_on_first_submit() {
        let store = store();
        let submission = submit(&store, "https://example.com/article-x").await.unwrap();
        assert!(matches!(submission, Submission::Created(_)));
        assert_eq!(submission.job().canonical_url, "https://example.com/article-x");
    }

    #[tokio::test]
    async fn second_submit_of_same_url_is_idempotent() {
        let store = store();
        let first = submit(&store, "https://example.com/article-x").await.unwrap();
        let second = submit(&store, "HTTPS://Example.com/article-x").await.unwrap();
        assert!(matches!(second, Submission::Existing(_)));
        assert_eq!(first.job().id, second.job().id);
    }
}
