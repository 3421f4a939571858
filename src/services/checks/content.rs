//! Content fetch: retrieves the final page and extracts the basic signals the
//! intelligence checks build on.

use super::{ProfileCheck, prior_data};
use crate::models::CheckResult;
use crate::services::http_prober::HttpProber;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Characters of body text retained for the language heuristic
const TEXT_SAMPLE_CHARS: usize = 2000;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"));
static META_DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta[^>]+name=["']description["'][^>]+content=["']([^"']*)["']"#)
        .expect("static regex")
});
static H1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>").expect("static regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));

pub struct ContentFetchCheck {
    prober: Arc<HttpProber>,
}

impl ContentFetchCheck {
    pub fn new(prober: Arc<HttpProber>) -> Self {
        Self { prober }
    }
}

#[async_trait]
impl ProfileCheck for ContentFetchCheck {
    fn name(&self) -> &'static str {
        "content_fetch"
    }

    async fn run(&self, domain: &str, prior: &BTreeMap<String, CheckResult>) -> CheckResult {
        // Reuse the final URL the HTTP probe landed on when available
        let url = prior_data(prior, "http")
            .and_then(|d| d.get("final_url"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("http://{domain}/"));

        let (status, body) = match self.prober.fetch_body(&url).await {
            Ok(pair) => pair,
            Err(e) => return CheckResult::error(e.to_string(), serde_json::Value::Null),
        };

        CheckResult::success(analyze_body(&url, status, &body))
    }
}

pub(crate) fn analyze_body(url: &str, status: u16, body: &str) -> serde_json::Value {
    let title = TITLE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(m.as_str()));
    let description = META_DESCRIPTION_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(m.as_str()));
    let h1_count = H1_RE.find_iter(body).count();

    let text = collapse_whitespace(&TAG_RE.replace_all(body, " "));
    let word_count = text.split_whitespace().count();
    let text_sample: String = text.chars().take(TEXT_SAMPLE_CHARS).collect();

    serde_json::json!({
        "url": url,
        "status": status,
        "body_bytes": body.len(),
        "title": title,
        "description": description,
        "h1_count": h1_count,
        "word_count": word_count,
        "text_sample": text_sample,
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
