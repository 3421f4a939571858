//! SEO heuristics over the content check's output.

use super::{ProfileCheck, prior_data};
use crate::models::CheckResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub struct SeoScoreCheck;

#[async_trait]
impl ProfileCheck for SeoScoreCheck {
    fn name(&self) -> &'static str {
        "seo_score"
    }

    async fn run(&self, _domain: &str, prior: &BTreeMap<String, CheckResult>) -> CheckResult {
        let Some(content) = prior_data(prior, "content") else {
            return CheckResult::skipped("content fetch produced no output");
        };

        let title = content.get("title").and_then(|v| v.as_str());
        let description = content.get("description").and_then(|v| v.as_str());
        let h1_count = content.get("h1_count").and_then(|v| v.as_u64()).unwrap_or(0);
        let word_count = content.get("word_count").and_then(|v| v.as_u64()).unwrap_or(0);

        let mut score: i64 = 100;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        match title {
            None => {
                score -= 30;
                issues.push("page has no <title>".to_string());
            },
            Some(title) if title.chars().count() > 70 => {
                score -= 10;
                warnings.push(format!("title is {} characters, over 70", title.chars().count()));
            },
            Some(title) if title.chars().count() < 10 => {
                score -= 10;
                warnings.push("title is shorter than 10 characters".to_string());
            },
            Some(_) => {},
        }

        match description {
            None => {
                score -= 20;
                issues.push("page has no meta description".to_string());
            },
            Some(description) if description.chars().count() > 160 => {
                score -= 5;
                warnings.push("meta description exceeds 160 characters".to_string());
            },
            Some(_) => {},
        }

        match h1_count {
            0 => {
                score -= 15;
                warnings.push("page has no <h1>".to_string());
            },
            1 => {},
            n => {
                score -= 5;
                warnings.push(format!("page has {n} <h1> elements"));
            },
        }

        if word_count < 50 {
            score -= 10;
            warnings.push(format!("thin content: {word_count} words"));
        }

        CheckResult::success(serde_json::json!({
            "score": score.max(0),
            "title_length": title.map(|t| t.chars().count()),
            "has_description": description.is_some(),
            "h1_count": h1_count,
            "issues": issues,
            "warnings": warnings,
        }))
    }
}
