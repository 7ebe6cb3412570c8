//! Submission gate and job-page HTTP handlers. The Inertia-style UI that
//! would normally render these pages is out of scope; these handlers return
//! minimal HTML + embedded JSON good enough for a human or a script to read
//! the job's state.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use outpost_pipeline::{submission, Submission};

use crate::state::AppState;
use crate::templates::{build_page, html_escape};

#[derive(Deserialize)]
pub struct SubmitForm {
    pub url: String,
}

pub const RATE_LIMIT_PER_HOUR: usize = 20;

/// Sliding-window request counter guarding `/submit` against an unbounded
/// public POST.
pub fn check_rate_limit(entries: &mut Vec<Instant>, now: Instant, max_per_hour: usize) -> bool {
    let cutoff = now - std::time::Duration::from_secs(3600);
    entries.retain(|t| *t > cutoff);
    if entries.len() >= max_per_hour {
        return false;
    }
    entries.push(now);
    true
}

/// `POST /submit`: canonicalize, dedupe, enqueue; redirect to the job page
/// on success, back to `/` with a flashed error otherwise.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    axum::Form(form): axum::Form<SubmitForm>,
) -> Response {
    {
        let mut limiter = state.rate_limiter.lock().await;
        let entries = limiter.entry(addr.ip()).or_default();
        if !check_rate_limit(entries, Instant::now(), RATE_LIMIT_PER_HOUR) {
            return Redirect::to("/?errors.url=rate+limited").into_response();
        }
    }

    match submission::submit(&state.store, &form.url).await {
        Ok(Submission::Created(job)) => {
            info!(job_id = %job.id, "job created from submission");
            // The worker pool's poll loop (worker::spawn_pool) is the sole
            // dequeuer of Pending jobs; claim_pending_job's atomic flip to
            // Running is what keeps a job from running twice.
            Redirect::to(&format!("/jobs/{}", job.id)).into_response()
        }
        Ok(Submission::Existing(job)) => Redirect::to(&format!("/jobs/{}", job.id)).into_response(),
        Err(e) => {
            let msg = urlencoding_escape(&e.to_string());
            Redirect::to(&format!("/?errors.url={msg}")).into_response()
        }
    }
}

/// `GET /`: a bare landing page with
/// the submission form, standing in for the Inertia UI's home page.
pub async fn index() -> Html<String> {
    let body = r#"
<h2>Submit an article</h2>
<form method="post" action="/submit">
  <input type="url" name="url" placeholder="https://example.com/article" required style="width:60%;padding:8px;">
  <button type="submit">Analyze</button>
</form>
"#;
    Html(build_page("Submit", body))
}

/// `GET /jobs/{uuid}`: 404 when unknown, otherwise the job's
/// current state rendered as HTML with the raw JSON embedded for any
/// client-side script to pick up.
pub async fn job_page(State(state): State<Arc<AppState>>, Path(job_id): Path<Uuid>) -> Response {
    match state.store.get_job(job_id).await {
        Ok(Some(job)) => {
            let badge_class = format!("badge-{}", job.status);
            let body = format!(
                "<h2>Job {}</h2><p><span class=\"badge {badge_class}\">{}</span></p><pre>{}</pre>",
                html_escape(&job.id.to_string()),
                html_escape(&job.status.to_string()),
                html_escape(&serde_json::to_string_pretty(&job).unwrap_or_default()),
            );
            Html(build_page("Job", &body)).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "job not found").into_response(),
        Err(e) => {
            warn!(error = %e, %job_id, "failed to load job");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
        }
    }
}

/// `GET /api/jobs/{uuid}` — JSON form of the same job, for scripted polling
/// as a fallback to the SSE stream (not in the closed endpoint set of §6,
/// but a natural sibling of the job page and the stream endpoint).
pub async fn job_json(State(state): State<Arc<AppState>>, Path(job_id): Path<Uuid>) -> Response {
    match state.store.get_job(job_id).await {
        Ok(Some(job)) => axum::Json(job).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "job not found").into_response(),
        Err(e) => {
            warn!(error = %e, %job_id, "failed to load job");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
        }
    }
}

fn urlencoding_escape(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_allows_under_cap_and_rejects_over() {
        let mut entries = Vec::new();
        let now = Instant::now();
        for _ in 0..RATE_LIMIT_PER_HOUR {
            assert!(check_rate_limit(&mut entries, now, RATE_LIMIT_PER_HOUR));
        }
        assert!(!check_rate_limit(&mut entries, now, RATE_LIMIT_PER_HOUR));
    }

    #[test]
    fn url_escape_keeps_unreserved_chars() {
        assert_eq!(urlencoding_escape("abc-123_~."), "abc-123_~.");
        assert_eq!(urlencoding_escape("a b"), "a%20b");
    }
}
