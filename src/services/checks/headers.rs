//! Security and caching header audit over the HTTP probe's final response.

use super::{ProfileCheck, prior_data};
use crate::models::CheckResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// (header, issue text when absent, hard requirement)
const SECURITY_HEADERS: &[(&str, &str, bool)] = &[
    ("strict-transport-security", "missing Strict-Transport-Security header", true),
    ("content-security-policy", "missing Content-Security-Policy header", false),
    ("x-content-type-options", "missing X-Content-Type-Options header", false),
    ("x-frame-options", "missing X-Frame-Options header", false),
    ("referrer-policy", "missing Referrer-Policy header", false),
];

pub struct HeaderAuditCheck;

#[async_trait]
impl ProfileCheck for HeaderAuditCheck {
    fn name(&self) -> &'static str {
        "header_audit"
    }

    async fn run(&self, _domain: &str, prior: &BTreeMap<String, CheckResult>) -> CheckResult {
        let Some(http) = prior_data(prior, "http") else {
            return CheckResult::skipped("http probe produced no output");
        };

        let headers = http
            .get("headers")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        let https = http.get("https").and_then(|v| v.as_bool()).unwrap_or(false);

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if !https {
            issues.push("final response not served over https".to_string());
        }

        for (header, message, hard) in SECURITY_HEADERS {
            if !headers.contains_key(*header) {
                // HSTS only matters once the site actually speaks https
                if *header == "strict-transport-security" && !https {
                    continue;
                }
                if *hard {
                    issues.push(message.to_string());
                } else {
                    warnings.push(message.to_string());
                }
            }
        }

        if let Some(server) = headers.get("server").and_then(|v| v.as_str())
            && server.chars().any(|c| c.is_ascii_digit())
        {
            warnings.push(format!("Server header leaks version: {server}"));
        }

        CheckResult::success(serde_json::json!({
            "https": https,
            "present": headers.keys().collect::<Vec<_>>(),
            "issues": issues,
            "warnings": warnings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckStatus;

    fn prior_with_headers(https: bool, headers: serde_json::Value) -> BTreeMap<String, CheckResult> {
        let mut prior = BTreeMap::new();
        prior.insert(
            "http".to_string(),
            CheckResult::success(serde_json::json!({ "https": https, "headers": headers })),
        );
        prior
    }

    #[tokio::test]
    async fn hardened_https_site_passes() {
        let prior = prior_with_headers(
            true,
            serde_json::json!({
                "strict-transport-security": "max-age=63072000",
                "content-security-policy": "default-src 'self'",
                "x-content-type-options": "nosniff",
                "x-frame-options": "DENY",
                "referrer-policy": "no-referrer",
            }),
        );
        let result = HeaderAuditCheck.run("example.lt", &prior).await;
        assert!(result.is_success());
        assert!(result.data["issues"].as_array().unwrap().is_empty());
        assert!(result.data["warnings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bare_http_site_collects_issues() {
        let prior = prior_with_headers(false, serde_json::json!({ "server": "nginx/1.18.0" }));
        let result = HeaderAuditCheck.run("example.lt", &prior).await;
        let issues = result.data["issues"].as_array().unwrap();
        assert!(issues.iter().any(|i| i.as_str().unwrap().contains("https")));
        // HSTS is not demanded from a plain-http site
        assert!(!issues.iter().any(|i| i.as_str().unwrap().contains("Strict-Transport")));
        let warnings = result.data["warnings"].as_array().unwrap();
        assert!(warnings.iter().any(|w| w.as_str().unwrap().contains("nginx/1.18.0")));
    }

    #[tokio::test]
    async fn missing_http_output_skips() {
        let result = HeaderAuditCheck.run("example.lt", &BTreeMap::new()).await;
        assert_eq!(result.status, CheckStatus::Skipped);
    }
}
