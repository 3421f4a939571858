//! Check implementations behind the profile engine.
//!
//! Every analysis or intelligence profile names one or more check ids; the
//! registry maps those ids to implementations. Checks receive the outputs
//! produced by earlier groups, never those of siblings in their own group.

mod content;
mod headers;
mod language;
mod seo;
mod ssl;

pub use content::ContentFetchCheck;
pub use headers::HeaderAuditCheck;
pub use language::LanguageDetectCheck;
pub use seo::SeoScoreCheck;
pub use ssl::TlsCertificateCheck;

use crate::models::CheckResult;
use crate::services::http_prober::HttpProber;
use crate::services::tls_prober::TlsProber;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One executable check
#[async_trait]
pub trait ProfileCheck: Send + Sync {
    /// Check id referenced from the profile catalog
    fn name(&self) -> &'static str;

    /// Execute against `domain`. `prior` holds every check result produced by
    /// earlier parallel groups, keyed by profile name.
    async fn run(&self, domain: &str, prior: &BTreeMap<String, CheckResult>) -> CheckResult;
}

/// Registry of every check the orchestrator can schedule
pub struct CheckRegistry {
    checks: HashMap<&'static str, Arc<dyn ProfileCheck>>,
}

impl CheckRegistry {
    /// Register the shipped checks against shared probe handles.
    pub fn standard(http: Arc<HttpProber>, tls: Arc<TlsProber>) -> Self {
        let mut registry = Self { checks: HashMap::new() };
        registry.register(Arc::new(TlsCertificateCheck::new(tls)));
        registry.register(Arc::new(ContentFetchCheck::new(http)));
        registry.register(Arc::new(HeaderAuditCheck));
        registry.register(Arc::new(SeoScoreCheck));
        registry.register(Arc::new(LanguageDetectCheck));
        registry
    }

    pub fn register(&mut self, check: Arc<dyn ProfileCheck>) {
        self.checks.insert(check.name(), check);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProfileCheck>> {
        self.checks.get(name).cloned()
    }
}

/// Pull the `data` payload of an earlier check, if it succeeded.
pub(crate) fn prior_data<'a>(
    prior: &'a BTreeMap<String, CheckResult>,
    key: &str,
) -> Option<&'a serde_json::Value> {
    prior.get(key).filter(|r| r.is_success()).map(|r| &r.data)
}
