//! TLS certificate check: thin adapter over the TLS prober.

use super::ProfileCheck;
use crate::models::CheckResult;
use crate::services::tls_prober::TlsProber;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct TlsCertificateCheck {
    prober: Arc<TlsProber>,
}

impl TlsCertificateCheck {
    pub fn new(prober: Arc<TlsProber>) -> Self {
        Self { prober }
    }
}

#[async_trait]
impl ProfileCheck for TlsCertificateCheck {
    fn name(&self) -> &'static str {
        "tls_certificate"
    }

    async fn run(&self, domain: &str, _prior: &BTreeMap<String, CheckResult>) -> CheckResult {
        let probe = self.prober.probe(domain).await;
        let error = probe.error.clone();

        let mut data = match serde_json::to_value(&probe) {
            Ok(value) => value,
            Err(e) => return CheckResult::error(e.to_string(), serde_json::Value::Null),
        };

        // Expiry inside 30 days is worth a warning even on a clean handshake
        if let Some(days) = probe.days_until_expiry {
            let warnings: Vec<String> = if days < 0 {
                vec!["certificate has expired".to_string()]
            } else if days <= 30 {
                vec![format!("certificate expires in {days} days")]
            } else {
                Vec::new()
            };
            data["warnings"] = serde_json::json!(warnings);
        }

        if probe.handshake_ok {
            CheckResult::success(data)
        } else {
            CheckResult::error(error.unwrap_or_else(|| "handshake failed".to_string()), data)
        }
    }
}
