//! Activity classification: decides whether a registered domain actually
//! serves anything, and harvests `.lt` domains surfacing in redirect chains.
//!
//! The decision tree is first-match. Canonical status policy: a final status
//! of 200-499 on a same-family host is active; 5xx is inactive.

use crate::services::dns_prober::DnsProbeResult;
use crate::services::http_prober::HttpProbeResult;
use crate::utils::{extract_lt_from_chain, normalize, same_family};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityReport {
    pub active: bool,
    /// no_dns | server_error | offsite_redirect | unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub has_dns: bool,
    pub responds: bool,
    pub status_code: Option<u16>,
    pub final_url: Option<String>,
    pub redirect_chain: Vec<String>,
    /// Distinct foreign `.lt` roots seen anywhere in the chain
    pub captured_domains: Vec<String>,
}

pub struct ActiveAnalyzer {
    keep_patterns: Vec<String>,
    ignore: Vec<String>,
}

impl ActiveAnalyzer {
    pub fn new(keep_patterns: Vec<String>, ignore: Vec<String>) -> Self {
        Self { keep_patterns, ignore }
    }

    pub fn analyze(
        &self,
        domain: &str,
        http: &HttpProbeResult,
        dns: &DnsProbeResult,
    ) -> ActivityReport {
        let has_dns = dns.has_addresses();
        let captured_domains = extract_lt_from_chain(
            &http.redirect_chain,
            domain,
            &self.keep_patterns,
            &self.ignore,
        );

        let mut report = ActivityReport {
            active: false,
            reason: None,
            has_dns,
            responds: http.final_status.is_some(),
            status_code: http.final_status,
            final_url: http.final_url.clone(),
            redirect_chain: http.redirect_chain.clone(),
            captured_domains,
        };

        // 1. Nothing resolves and nothing connects: dead domain
        if !has_dns && http.connect_failed() {
            report.reason = Some("no_dns".to_string());
            return report;
        }

        if let (Some(status), Some(final_url)) = (http.final_status, &http.final_url) {
            let final_host = normalize(final_url);
            let same = same_family(&final_host, domain, &self.keep_patterns);

            // 2. Server errors are inactive even on the domain's own host
            if (500..=599).contains(&status) {
                report.reason = Some("server_error".to_string());
                return report;
            }

            // 3. Responding on its own family, 2xx-4xx: active
            if same && (200..=499).contains(&status) {
                report.active = true;
                return report;
            }

            // 4. Landed on a foreign family (whether .lt or not): parked or moved
            if !same {
                report.reason = Some("offsite_redirect".to_string());
                return report;
            }
        }

        // 5. Resolves but never answers
        report.reason = Some("unreachable".to_string());
        report
    }
}
