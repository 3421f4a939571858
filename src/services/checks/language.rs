//! Lithuanian-vs-other language heuristic over sampled page text.

use super::{ProfileCheck, prior_data};
use crate::models::CheckResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Letters unique to the Lithuanian alphabet
const LITHUANIAN_CHARS: &[char] = &['ą', 'č', 'ę', 'ė', 'į', 'š', 'ų', 'ū', 'ž'];

/// High-frequency Lithuanian function words
const LITHUANIAN_WORDS: &[&str] =
    &["ir", "yra", "kad", "bet", "apie", "nuo", "iki", "su", "tai", "kaip", "mes", "jūs"];

pub struct LanguageDetectCheck;

#[async_trait]
impl ProfileCheck for LanguageDetectCheck {
    fn name(&self) -> &'static str {
        "language_detect"
    }

    async fn run(&self, _domain: &str, prior: &BTreeMap<String, CheckResult>) -> CheckResult {
        let Some(content) = prior_data(prior, "content") else {
            return CheckResult::skipped("content fetch produced no output");
        };

        let mut text = content
            .get("text_sample")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_lowercase();
        if let Some(title) = content.get("title").and_then(|v| v.as_str()) {
            text.push(' ');
            text.push_str(&title.to_lowercase());
        }

        CheckResult::success(classify(&text))
    }
}

pub(crate) fn classify(text: &str) -> serde_json::Value {
    let total_chars = text.chars().filter(|c| c.is_alphabetic()).count();
    let lt_chars = text.chars().filter(|c| LITHUANIAN_CHARS.contains(c)).count();

    let words: Vec<&str> = text.split_whitespace().collect();
    let lt_words = words.iter().filter(|w| LITHUANIAN_WORDS.contains(&**w)).count();

    let char_ratio = if total_chars > 0 { lt_chars as f64 / total_chars as f64 } else { 0.0 };
    let word_ratio = if words.is_empty() { 0.0 } else { lt_words as f64 / words.len() as f64 };

    let language = if total_chars < 40 {
        "unknown"
    } else if char_ratio >= 0.01 || word_ratio >= 0.05 {
        "lt"
    } else {
        "other"
    };

    serde_json::json!({
        "language": language,
        "lithuanian_char_ratio": char_ratio,
        "lithuanian_word_ratio": word_ratio,
        "sample_words": words.len(),
    })
}
