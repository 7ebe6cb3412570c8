//! Cross-step data threading (REDESIGN FLAGS "Cross-step data threading"):
//! a small typed context the Supervisor fills in as publisher-level steps
//! run, so downstream steps never re-fetch what an earlier step already
//! pulled down.

use outpost_common::FetchResult;

#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub homepage: Option<FetchResult>,
    pub robots_raw_text: Option<String>,
    pub tos_url: Option<String>,
}

impl PipelineContext {
    pub fn homepage_html(&self) -> &str {
        self.homepage.as_ref().map(|h| h.body.as_str()).unwrap_or("")
    }

    pub fn homepage_headers(&self) -> &[(String, String)] {
        self.homepage.as_ref().map(|h| h.headers.as_slice()).unwrap_or(&[])
    }
}
